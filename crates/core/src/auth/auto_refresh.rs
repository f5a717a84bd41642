//! Background credential renewal
//!
//! Sleeps until the credential's refresh threshold, renews it, and repeats.
//! Wakes only when there is work to do; while no credential is held it polls
//! at `idle_poll`.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::credential_store::CredentialStore;

/// Timing knobs for [`AutoRefresh`]
#[derive(Debug, Clone)]
pub struct AutoRefreshConfig {
    /// Poll interval while no credential is held (default: 60s)
    pub idle_poll: Duration,
    /// Back-off after a failed renewal (default: 60s)
    pub retry_delay: Duration,
    /// Lower bound between consecutive renewals (default: 1s)
    pub min_interval: Duration,
    /// How long `stop` waits for the task to wind down (default: 5s)
    pub join_timeout: Duration,
}

impl Default for AutoRefreshConfig {
    fn default() -> Self {
        Self {
            idle_poll: Duration::from_secs(60),
            retry_delay: Duration::from_secs(60),
            min_interval: Duration::from_secs(1),
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// Handle to the background renewal task
pub struct AutoRefresh {
    store: Arc<CredentialStore>,
    config: AutoRefreshConfig,
    handle: Option<JoinHandle<()>>,
    cancellation: CancellationToken,
}

impl AutoRefresh {
    pub fn new(store: Arc<CredentialStore>, config: AutoRefreshConfig) -> Self {
        Self { store, config, handle: None, cancellation: CancellationToken::new() }
    }

    /// Spawn the renewal task on the current runtime
    ///
    /// Does nothing if the task is already running.
    pub fn start(&mut self) {
        if self.is_running() {
            warn!("Credential auto-refresh already running");
            return;
        }

        self.cancellation = CancellationToken::new();
        let store = Arc::clone(&self.store);
        let config = self.config.clone();
        let cancel = self.cancellation.clone();
        self.handle = Some(tokio::spawn(refresh_loop(store, config, cancel)));
    }

    /// Cancel the task and wait for it to finish
    #[instrument(skip(self))]
    pub async fn stop(&mut self) {
        self.cancellation.cancel();

        let Some(handle) = self.handle.take() else {
            return;
        };
        match tokio::time::timeout(self.config.join_timeout, handle).await {
            Ok(Ok(())) => debug!("Credential auto-refresh joined"),
            Ok(Err(e)) => error!(error = %e, "Credential auto-refresh task failed"),
            Err(_) => warn!(
                timeout_ms = self.config.join_timeout.as_millis() as u64,
                "Credential auto-refresh did not stop in time"
            ),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for AutoRefresh {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("AutoRefresh dropped while running; cancelling task");
            self.cancellation.cancel();
        }
    }
}

async fn refresh_loop(store: Arc<CredentialStore>, config: AutoRefreshConfig, cancel: CancellationToken) {
    info!("Starting credential auto-refresh task");
    let mut floor = Duration::ZERO;

    loop {
        let wait = match store.time_until_refresh() {
            Some(until_threshold) => until_threshold.max(floor),
            None => config.idle_poll,
        };

        if !wait.is_zero() {
            debug!(wait_ms = wait.as_millis() as u64, "Auto-refresh sleeping until next check");
            tokio::select! {
                () = cancel.cancelled() => break,
                () = sleep(wait) => {}
            }
        }

        // Revoked or never acquired while we slept, or sitting exactly on the
        // threshold; always yield before looking again
        if !store.is_authenticated() || !store.needs_renewal() {
            if wait.is_zero() {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = sleep(config.min_interval) => {}
                }
            }
            continue;
        }

        info!("Auto-refresh: credential reached its refresh threshold, renewing");
        let renewal = tokio::select! {
            () = cancel.cancelled() => break,
            result = store.get_token_async() => result,
        };

        match renewal {
            Ok(_) => floor = config.min_interval,
            Err(err) => {
                error!(error = %err, kind = err.label(), "Auto-refresh failed");
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = sleep(config.retry_delay) => {}
                }
            }
        }
    }

    info!("Credential auto-refresh task stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use chrono::{DateTime, Utc};
    use graphlink_common::time::{Clock, MockClock};
    use graphlink_domain::constants::{APP_TOKEN_ENDPOINT, REFRESH_TOKEN_ENDPOINT};

    use super::*;
    use crate::testing::{test_config, text_response, token_response, ScriptedTransport};

    const HOUR: i64 = 3_600_000;

    fn fast_config() -> AutoRefreshConfig {
        AutoRefreshConfig {
            idle_poll: Duration::from_millis(10),
            retry_delay: Duration::from_millis(10),
            min_interval: Duration::from_millis(10),
            join_timeout: Duration::from_secs(1),
        }
    }

    async fn wait_for(condition: impl Fn() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn renews_once_threshold_is_reached() {
        let clock = MockClock::at(DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000).unwrap());
        let handle = clock.clone();
        let transport = Arc::new(ScriptedTransport::new(move |_| {
            Ok(token_response("t", handle.millis_since_epoch() + HOUR, Some("r")))
        }));
        let store = Arc::new(CredentialStore::with_clock(
            test_config(),
            transport.clone(),
            Arc::new(clock.clone()),
        ));
        store.acquire_async().await.unwrap();
        clock.advance(Duration::from_millis(HOUR as u64));

        let mut auto = AutoRefresh::new(Arc::clone(&store), fast_config());
        auto.start();
        assert!(auto.is_running());

        wait_for(|| transport.calls_to(REFRESH_TOKEN_ENDPOINT) == 1).await;
        assert!(!store.needs_renewal());

        auto.stop().await;
        assert!(!auto.is_running());
        assert_eq!(transport.calls_to(REFRESH_TOKEN_ENDPOINT), 1);
    }

    #[tokio::test]
    async fn waits_when_clock_sits_on_the_threshold() {
        let clock = MockClock::at(DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000).unwrap());
        let handle = clock.clone();
        let transport = Arc::new(ScriptedTransport::new(move |_| {
            Ok(token_response("t", handle.millis_since_epoch() + HOUR, Some("r")))
        }));
        let store = Arc::new(CredentialStore::with_clock(
            test_config(),
            transport.clone(),
            Arc::new(clock.clone()),
        ));
        store.acquire_async().await.unwrap();

        // Exactly expires_at - refresh_offset: zero wait, but not yet due
        clock.advance(Duration::from_millis((HOUR - 30_000) as u64));
        assert_eq!(store.time_until_refresh(), Some(Duration::ZERO));
        assert!(!store.needs_renewal());

        let mut auto = AutoRefresh::new(Arc::clone(&store), fast_config());
        auto.start();
        sleep(Duration::from_millis(50)).await;
        auto.stop().await;

        assert!(!auto.is_running());
        assert_eq!(transport.calls_to(REFRESH_TOKEN_ENDPOINT), 0);
    }

    #[tokio::test]
    async fn idles_without_a_credential_and_stops_promptly() {
        let transport = Arc::new(ScriptedTransport::new(|_| Ok(text_response(500, None, ""))));
        let store = Arc::new(CredentialStore::new(test_config(), transport.clone()));

        let mut auto = AutoRefresh::new(store, fast_config());
        auto.start();
        sleep(Duration::from_millis(50)).await;
        auto.stop().await;

        assert_eq!(transport.total_calls(), 0);
        assert_eq!(transport.calls_to(APP_TOKEN_ENDPOINT), 0);
    }

    #[tokio::test]
    async fn failed_renewal_backs_off_and_retries() {
        let clock = MockClock::at(DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000).unwrap());
        let handle = clock.clone();
        let refresh_ok = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&refresh_ok);
        let transport = Arc::new(ScriptedTransport::new(move |request| {
            if request.targets(REFRESH_TOKEN_ENDPOINT) && !flag.load(Ordering::SeqCst) {
                return Ok(text_response(503, None, ""));
            }
            Ok(token_response("t", handle.millis_since_epoch() + HOUR, Some("r")))
        }));
        let store = Arc::new(CredentialStore::with_clock(
            test_config(),
            transport.clone(),
            Arc::new(clock.clone()),
        ));
        store.acquire_async().await.unwrap();
        clock.advance(Duration::from_millis(HOUR as u64));

        let mut auto = AutoRefresh::new(Arc::clone(&store), fast_config());
        auto.start();
        wait_for(|| transport.calls_to(REFRESH_TOKEN_ENDPOINT) >= 2).await;
        refresh_ok.store(true, Ordering::SeqCst);
        wait_for(|| !store.needs_renewal()).await;

        auto.stop().await;
    }
}
