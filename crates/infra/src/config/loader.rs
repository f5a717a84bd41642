//! Configuration loader
//!
//! Builds a [`ClientConfig`] from environment variables or a config file.
//!
//! ## Loading Strategy
//! 1. Try environment variables
//! 2. If any required variable is missing, fall back to a file
//! 3. Probe the standard locations when no path is given
//! 4. JSON and TOML are both accepted
//!
//! ## Environment Variables
//! Required:
//! - `GRAPHLINK_API_URL`: Root API URL
//! - `GRAPHLINK_USERNAME`, `GRAPHLINK_PASSWORD`: Primary user credentials
//! - `GRAPHLINK_CLIENT_ID`, `GRAPHLINK_CLIENT_SECRET`: Application credentials
//!
//! Optional:
//! - `GRAPHLINK_MAX_RETRIES`: 401 resend budget
//! - `GRAPHLINK_REQUEST_TIMEOUT_MS`: Per-attempt timeout
//! - `GRAPHLINK_REFRESH_OFFSET_MS`: Renew this long before backend expiry
//! - `GRAPHLINK_FRESH_BUFFER_MS`: Minimum spacing between refreshes
//! - `GRAPHLINK_USER_AGENT`: `User-Agent` header value
//!
//! ## File Locations
//! Probed in order, first hit wins:
//! 1. `graphlink.{json,toml}` then `config.{json,toml}` in the working
//!    directory
//! 2. The same names in the parent and grandparent directories
//! 3. The same names next to the executable

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use graphlink_domain::{ClientConfig, GraphError, PrimaryCredentials, Result};

const ENV_PREFIX: &str = "GRAPHLINK_";
const FILE_STEMS: [&str; 2] = ["graphlink", "config"];
const EXTENSIONS: [&str; 2] = ["json", "toml"];

/// Load configuration, environment first and file second
///
/// # Errors
/// Returns `GraphError::Config` if neither source yields a valid
/// configuration.
pub fn load() -> Result<ClientConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Environment configuration incomplete, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from `GRAPHLINK_*` environment variables
///
/// # Errors
/// Returns `GraphError::Config` if a required variable is missing, an
/// optional one does not parse, or the result fails validation.
pub fn load_from_env() -> Result<ClientConfig> {
    let api_url = env_var("API_URL")?;
    let credentials = PrimaryCredentials::new(
        env_var("USERNAME")?,
        env_var("PASSWORD")?,
        env_var("CLIENT_ID")?,
        env_var("CLIENT_SECRET")?,
    );

    let mut config = ClientConfig::new(api_url, credentials)?;
    if let Some(max_retries) = env_parse::<u32>("MAX_RETRIES")? {
        config.max_retries = max_retries;
    }
    if let Some(timeout) = env_millis("REQUEST_TIMEOUT_MS")? {
        config.request_timeout = timeout;
    }
    if let Some(offset) = env_millis("REFRESH_OFFSET_MS")? {
        config.refresh_offset = offset;
    }
    if let Some(buffer) = env_millis("FRESH_BUFFER_MS")? {
        config.fresh_buffer = buffer;
    }
    if let Some(user_agent) = env_opt("USER_AGENT") {
        config.user_agent = user_agent;
    }

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, the first file found by [`probe_config_paths`] is
/// used. The format follows the file extension.
///
/// # Errors
/// Returns `GraphError::Config` if the file is missing, unreadable, not
/// valid JSON/TOML, or fails validation.
pub fn load_from_file(path: Option<PathBuf>) -> Result<ClientConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(GraphError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            GraphError::Config("No config file found in any of the standard locations".into())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| GraphError::Config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse by extension; anything without one is treated as JSON
fn parse_config(contents: &str, path: &Path) -> Result<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| GraphError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| GraphError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(GraphError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// First existing config file in the standard locations, if any
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.extend(cwd.ancestors().take(3).map(Path::to_path_buf));
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf))
    {
        roots.push(exe_dir);
    }

    for root in &roots {
        if let Some(found) = candidates_in(root).find(|path| path.is_file()) {
            return Some(found);
        }
    }
    None
}

fn candidates_in(dir: &Path) -> impl Iterator<Item = PathBuf> + '_ {
    FILE_STEMS
        .iter()
        .flat_map(move |stem| EXTENSIONS.iter().map(move |ext| dir.join(format!("{stem}.{ext}"))))
}

/// Required `GRAPHLINK_<key>` variable
fn env_var(key: &str) -> Result<String> {
    let name = format!("{ENV_PREFIX}{key}");
    env_opt(key)
        .ok_or_else(|| GraphError::Config(format!("Missing required environment variable: {name}")))
}

/// Optional variable; blank counts as unset
fn env_opt(key: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{key}")).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_opt(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| {
                GraphError::Config(format!("Invalid value for {ENV_PREFIX}{key}: {e}"))
            })
        })
        .transpose()
}

fn env_millis(key: &str) -> Result<Option<Duration>> {
    Ok(env_parse::<u64>(key)?.map(Duration::from_millis))
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use once_cell::sync::Lazy;
    use tempfile::{Builder, TempDir};

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const REQUIRED: [(&str, &str); 5] = [
        ("GRAPHLINK_API_URL", "https://graph.example.com/v1"),
        ("GRAPHLINK_USERNAME", "alice"),
        ("GRAPHLINK_PASSWORD", "hunter2"),
        ("GRAPHLINK_CLIENT_ID", "app"),
        ("GRAPHLINK_CLIENT_SECRET", "s3cr3t"),
    ];

    const OPTIONAL: [&str; 5] = [
        "GRAPHLINK_MAX_RETRIES",
        "GRAPHLINK_REQUEST_TIMEOUT_MS",
        "GRAPHLINK_REFRESH_OFFSET_MS",
        "GRAPHLINK_FRESH_BUFFER_MS",
        "GRAPHLINK_USER_AGENT",
    ];

    fn set_required() {
        for (key, value) in REQUIRED {
            std::env::set_var(key, value);
        }
    }

    fn clear_all() {
        for (key, _) in REQUIRED {
            std::env::remove_var(key);
        }
        for key in OPTIONAL {
            std::env::remove_var(key);
        }
    }

    fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).expect("create config file");
        file.write_all(contents.as_bytes()).expect("write config file");
        path
    }

    #[test]
    fn load_from_env_reads_required_and_optional_vars() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_all();
        set_required();
        std::env::set_var("GRAPHLINK_MAX_RETRIES", "5");
        std::env::set_var("GRAPHLINK_FRESH_BUFFER_MS", "250");
        std::env::set_var("GRAPHLINK_USER_AGENT", "tests/1.0");

        let result = load_from_env();
        clear_all();

        let config = result.expect("config from env");
        assert_eq!(config.api_url, "https://graph.example.com/v1");
        assert_eq!(config.credentials.username, "alice");
        assert_eq!(config.credentials.client_secret, "s3cr3t");
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.fresh_buffer, Duration::from_millis(250));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.user_agent, "tests/1.0");
    }

    #[test]
    fn load_from_env_names_the_missing_var() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_all();
        set_required();
        std::env::remove_var("GRAPHLINK_CLIENT_SECRET");

        let result = load_from_env();
        clear_all();

        let err = result.unwrap_err();
        assert!(matches!(err, GraphError::Config(_)));
        assert!(err.to_string().contains("GRAPHLINK_CLIENT_SECRET"));
    }

    #[test]
    fn load_from_env_rejects_malformed_numbers() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_all();
        set_required();
        std::env::set_var("GRAPHLINK_REQUEST_TIMEOUT_MS", "soon");

        let result = load_from_env();
        clear_all();

        let err = result.unwrap_err();
        assert!(err.to_string().contains("GRAPHLINK_REQUEST_TIMEOUT_MS"));
    }

    #[test]
    fn load_from_env_validates_the_result() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_all();
        set_required();
        std::env::set_var("GRAPHLINK_REQUEST_TIMEOUT_MS", "0");

        let result = load_from_env();
        clear_all();

        assert!(result.unwrap_err().to_string().contains("request_timeout"));
    }

    #[test]
    fn load_from_file_json() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "graphlink.json",
            r#"{
                "api_url": "https://graph.example.com/v1",
                "credentials": {
                    "username": "u", "password": "p",
                    "client_id": "c", "client_secret": "s"
                },
                "refresh_offset_ms": 60000
            }"#,
        );

        let config = load_from_file(Some(path)).expect("json config");
        assert_eq!(config.refresh_offset, Duration::from_secs(60));
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn load_from_file_toml() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "graphlink.toml",
            r#"
api_url = "https://graph.example.com/v1"
max_retries = 1
request_timeout_ms = 5000

[credentials]
username = "u"
password = "p"
client_id = "c"
client_secret = "s"
"#,
        );

        let config = load_from_file(Some(path)).expect("toml config");
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn load_from_file_validates_contents() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "graphlink.json",
            r#"{
                "api_url": "not a url",
                "credentials": {
                    "username": "u", "password": "p",
                    "client_id": "c", "client_secret": "s"
                }
            }"#,
        );

        let err = load_from_file(Some(path)).unwrap_err();
        assert!(err.to_string().contains("api_url"));
    }

    #[test]
    fn load_from_file_missing_path() {
        let err = load_from_file(Some(PathBuf::from("/nonexistent/graphlink.json"))).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn parse_config_rejects_unknown_extension() {
        let file = Builder::new().suffix(".yaml").tempfile().unwrap();
        let err = parse_config("api_url: x", file.path()).unwrap_err();
        assert!(err.to_string().contains("Unsupported config format"));
    }

    #[test]
    fn parse_config_reports_invalid_json() {
        let err = parse_config("{", Path::new("graphlink.json")).unwrap_err();
        assert!(err.to_string().contains("Invalid JSON"));
    }

    #[test]
    fn config_found_in_working_directory() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "graphlink.toml", "api_url = \"https://graph.example.com\"\n");
        let previous = std::env::current_dir().unwrap();

        std::env::set_current_dir(dir.path()).unwrap();
        let found = probe_config_paths();
        std::env::set_current_dir(previous).unwrap();

        let found = found.expect("config file found");
        assert_eq!(found.canonicalize().unwrap(), path.canonicalize().unwrap());
    }

    #[test]
    fn candidates_prefer_graphlink_then_json() {
        let names: Vec<_> = candidates_in(Path::new("/etc"))
            .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["graphlink.json", "graphlink.toml", "config.json", "config.toml"]);
    }
}
