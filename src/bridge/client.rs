//! The IPC bridge client.
//!
//! Forwards [`Command`]s to the host process over a private loopback HTTP
//! channel. Three kinds of outcome are kept apart:
//!
//! - the bridge refuses the call up front (disabled, not initialised, shut
//!   down) with a [`BridgeError`] and no network I/O;
//! - the host or the channel fails (connection refused, timeout, non-2xx),
//!   reported as a [`CommandResponse`] with an `error` key and retried;
//! - the host answers, and its map is returned unchanged.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::bridge::command::{epoch_millis, Command, CommandResponse};
use crate::bridge::retry::RetryPolicy;
use crate::config::BridgeConfig;
use crate::error::BridgeError;

/// `requestId` used by availability probes; never produced by [`IpcBridge::send`].
pub const PROBE_REQUEST_ID: i64 = -1;

/// Snapshot of bridge state for health reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeStatistics {
    /// Whether the bridge is enabled by configuration.
    pub enabled: bool,
    /// Whether `initialize` has run.
    pub initialized: bool,
    /// Endpoint URL, or `"not-set"`.
    pub endpoint: String,
    /// Commands sent so far.
    pub request_count: u64,
    /// Result of the most recent availability probe.
    pub available: bool,
}

/// Client side of the IPC channel to the host process.
pub struct IpcBridge {
    enabled: bool,
    path: String,
    timeout: Duration,
    shutdown_grace: Duration,
    retry: RetryPolicy,
    http: reqwest::Client,
    endpoint: RwLock<Option<String>>,
    initialized: AtomicBool,
    accepting: AtomicBool,
    available: AtomicBool,
    request_counter: AtomicU64,
    tracker: TaskTracker,
    cancel: CancellationToken,
    probe_stop: CancellationToken,
}

impl IpcBridge {
    /// Creates a bridge from configuration. No connection is made.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Client`] if the HTTP client cannot be built.
    pub fn new(config: &BridgeConfig) -> Result<Self, BridgeError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .connect_timeout(config.timeout())
            .timeout(config.timeout())
            .build()
            .map_err(BridgeError::Client)?;

        let cancel = CancellationToken::new();
        Ok(Self {
            enabled: config.enabled,
            path: config.path.clone(),
            timeout: config.timeout(),
            shutdown_grace: config.shutdown_grace(),
            retry: config.retry_policy(),
            http,
            endpoint: RwLock::new(None),
            initialized: AtomicBool::new(false),
            accepting: AtomicBool::new(true),
            available: AtomicBool::new(false),
            request_counter: AtomicU64::new(0),
            tracker: TaskTracker::new(),
            probe_stop: cancel.child_token(),
            cancel,
        })
    }

    /// Points the bridge at `http://127.0.0.1:<port><path>`.
    ///
    /// Does nothing (besides logging) when the bridge is disabled.
    pub fn initialize(&self, port: u16) {
        if !self.enabled {
            info!("IPC bridge disabled, host commands will be rejected");
            return;
        }

        let endpoint = format!("http://127.0.0.1:{port}{}", self.path);
        info!(endpoint = %endpoint, "IPC bridge initialised");
        *self.endpoint.write().unwrap_or_else(PoisonError::into_inner) = Some(endpoint);
        self.initialized.store(true, Ordering::Release);
    }

    /// The endpoint URL, once initialised.
    #[must_use]
    pub fn endpoint(&self) -> Option<String> {
        self.endpoint
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The retry policy applied by [`IpcBridge::send`].
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Sends a command, retrying failed attempts with backoff.
    ///
    /// # Errors
    ///
    /// Fails fast with [`BridgeError::Disabled`], [`BridgeError::NotInitialized`]
    /// or [`BridgeError::ShutDown`]; returns [`BridgeError::Interrupted`] if
    /// shutdown cancels a backoff sleep. Host and channel failures are not
    /// errors here: they come back as a response with an `error` key.
    pub async fn send(&self, command: Command) -> Result<CommandResponse, BridgeError> {
        if !self.enabled {
            return Err(BridgeError::Disabled);
        }
        if !self.accepting.load(Ordering::Acquire) {
            return Err(BridgeError::ShutDown);
        }
        let endpoint = self.endpoint().ok_or(BridgeError::NotInitialized)?;

        let _in_flight = self.tracker.token();
        let request_id = self.next_request_id();
        debug!(request_id, action = command.action(), "Sending IPC command");

        let channel_failed = AtomicBool::new(false);
        let response = self
            .retry
            .run(&self.cancel, |attempt| {
                debug!(request_id, attempt, "IPC attempt");
                let payload = command.payload(request_id, epoch_millis());
                let (endpoint, channel_failed) = (&endpoint, &channel_failed);
                async move {
                    let outcome = self.post(endpoint, payload).await;
                    channel_failed.store(outcome.is_err(), Ordering::Relaxed);
                    outcome.unwrap_or_else(CommandResponse::failure)
                }
            })
            .await?;

        match response.error_message() {
            None => debug!(request_id, "IPC command completed"),
            Some(error) if channel_failed.load(Ordering::Relaxed) => {
                warn!(request_id, error = %error, "IPC command failed");
            }
            // Domain outcome such as a missing element.
            Some(error) => debug!(request_id, error = %error, "Host reported an error"),
        }
        Ok(response)
    }

    fn next_request_id(&self) -> i64 {
        let id = self.request_counter.fetch_add(1, Ordering::AcqRel) + 1;
        i64::try_from(id).unwrap_or(i64::MAX)
    }

    /// One HTTP round trip.
    ///
    /// `Ok` carries whatever map the host answered with, including
    /// host-reported errors. `Err` is a channel failure message.
    async fn post(
        &self,
        endpoint: &str,
        payload: Map<String, Value>,
    ) -> Result<CommandResponse, String> {
        let request = self.http.post(endpoint).json(&payload).send();

        let result = tokio::select! {
            () = self.cancel.cancelled() => {
                return Err("IPC request cancelled: bridge shutting down".to_string());
            }
            result = request => result,
        };

        let response = result.map_err(|e| self.transport_failure(&e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_failure(&e))?;

        if !status.is_success() {
            debug!(status = status.as_u16(), "IPC request rejected by host");
            return Err(format!("HTTP {}: {}", status.as_u16(), body));
        }

        serde_json::from_str::<Map<String, Value>>(&body)
            .map(CommandResponse::new)
            .map_err(|e| format!("Invalid IPC response: {e}"))
    }

    fn transport_failure(&self, error: &reqwest::Error) -> String {
        if error.is_timeout() {
            debug!(timeout_secs = self.timeout.as_secs(), "IPC request timed out");
            format!("Request timed out after {} seconds", self.timeout.as_secs())
        } else if error.is_connect() {
            debug!(error = %error, "IPC connection failed");
            "Connection failed: host IPC endpoint not available".to_string()
        } else {
            debug!(error = %error, "IPC communication failed");
            format!("IPC communication failed: {error}")
        }
    }

    /// Sends a single `ping` without retry. Never fails.
    pub async fn is_available(&self) -> bool {
        if !self.enabled {
            return false;
        }
        let Some(endpoint) = self.endpoint() else {
            return false;
        };

        let payload = Command::new("ping").payload(PROBE_REQUEST_ID, epoch_millis());
        let available = match self.post(&endpoint, payload).await {
            Ok(response) => {
                response.get("pong").and_then(Value::as_bool).unwrap_or(false)
                    || !response.is_error()
            }
            Err(_) => false,
        };

        self.available.store(available, Ordering::Release);
        available
    }

    /// Current statistics.
    #[must_use]
    pub fn statistics(&self) -> BridgeStatistics {
        BridgeStatistics {
            enabled: self.enabled,
            initialized: self.initialized.load(Ordering::Acquire),
            endpoint: self.endpoint().unwrap_or_else(|| "not-set".to_string()),
            request_count: self.request_counter.load(Ordering::Acquire),
            available: self.available.load(Ordering::Acquire),
        }
    }

    /// Logs host reachability once, after `delay`.
    ///
    /// The probe is abandoned when [`IpcBridge::shutdown`] starts.
    pub fn spawn_connection_probe(self: &Arc<Self>, delay: Duration) -> JoinHandle<()> {
        let bridge = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                () = bridge.probe_stop.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }

            if bridge.is_available().await {
                info!(endpoint = ?bridge.endpoint(), "Host IPC endpoint reachable");
            } else if bridge.enabled {
                warn!(
                    endpoint = ?bridge.endpoint(),
                    "Host IPC endpoint not reachable; host-backed tools will report errors until it starts"
                );
            }
        })
    }

    /// Stops accepting commands, waits up to the grace period for in-flight
    /// calls, then cancels whatever is left. Safe to call more than once and
    /// on a bridge that was never initialised.
    pub async fn shutdown(&self) {
        if !self.accepting.swap(false, Ordering::AcqRel) {
            return;
        }
        self.probe_stop.cancel();
        self.tracker.close();

        if tokio::time::timeout(self.shutdown_grace, self.tracker.wait())
            .await
            .is_err()
        {
            warn!(
                in_flight = self.tracker.len(),
                "IPC commands still running after grace period, cancelling"
            );
        }
        self.cancel.cancel();
        info!(
            requests = self.request_counter.load(Ordering::Acquire),
            "IPC bridge shut down"
        );
    }
}
