use crate::error::DroveError;
use crate::metrics::Metrics;
use crate::transport::AuthConfig;
use crate::types::{AppsResponse, Endpoint, EventSummary, EventsApiResponse, Leader, STATUS_SUCCESS};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, error, info, warn};

const PING_PATH: &str = "/apis/v1/ping";
const APPS_PATH: &str = "/apis/v1/endpoints";
const EVENTS_PATH: &str = "/apis/v1/cluster/events/summary";

const PROBE_INTERVAL: Duration = Duration::from_secs(2);
const EVENT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Multi-endpoint, health-checked client to a replicated controller that
/// exposes a single logical leader at any moment.
pub struct ControllerClient {
    endpoints: RwLock<Vec<Endpoint>>,
    leader: RwLock<Option<Leader>>,
    auth: AuthConfig,
    http: reqwest::Client,
    metrics: Arc<Metrics>,
}

impl ControllerClient {
    pub fn new(endpoint_csv: &str, auth: AuthConfig, skip_ssl_check: bool, metrics: Arc<Metrics>) -> Result<Self, DroveError> {
        let endpoints = endpoint_csv
            .split(',')
            .map(|e| Endpoint::new(e.trim().to_string()))
            .collect();
        let http = crate::transport::build_client(skip_ssl_check)?;
        Ok(Self {
            endpoints: RwLock::new(endpoints),
            leader: RwLock::new(None),
            auth,
            http,
            metrics,
        })
    }

    /// Run a synchronous health pass, select a leader, then start the
    /// background prober. Returns an error iff no leader was found.
    pub async fn init(self: &Arc<Self>) -> Result<(), DroveError> {
        self.probe_once().await;
        self.spawn_prober();

        let leader = self.leader.read().await;
        if leader.is_none() {
            return Err(DroveError::NoLeader);
        }
        Ok(())
    }

    fn spawn_prober(self: &Arc<Self>) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(PROBE_INTERVAL);
            ticker.tick().await; // first tick fires immediately; we already probed once
            loop {
                ticker.tick().await;
                this.probe_once().await;
            }
        });
    }

    /// Probe every configured endpoint's `/apis/v1/ping`, then run leader
    /// selection.
    async fn probe_once(&self) {
        let urls: Vec<String> = {
            let endpoints = self.endpoints.read().await;
            endpoints.iter().map(|e| e.url.clone()).collect()
        };

        let mut results = Vec::with_capacity(urls.len());
        for url in &urls {
            results.push(self.probe_endpoint(url).await);
        }

        {
            let mut endpoints = self.endpoints.write().await;
            for (endpoint, (healthy, message)) in endpoints.iter_mut().zip(results.into_iter()) {
                endpoint.healthy = healthy;
                endpoint.last_message = message;
                self.metrics
                    .controller_health
                    .with_label_values(&[endpoint.url.as_str()])
                    .set(if healthy { 1.0 } else { 0.0 });
            }
        }

        self.refresh_leader().await;
    }

    async fn probe_endpoint(&self, url: &str) -> (bool, String) {
        let request = self
            .http
            .get(format!("{url}{PING_PATH}"))
            .headers(self.auth.headers());

        match tokio::time::timeout(PROBE_TIMEOUT, request.send()).await {
            Ok(Ok(response)) => {
                let status = response.status();
                if status.as_u16() == 200 {
                    (true, "OK".to_string())
                } else if status.as_u16() == 400 {
                    (false, status.to_string())
                } else {
                    error!(endpoint = url, status = %status, "unexpected ping response from controller");
                    (false, status.to_string())
                }
            }
            Ok(Err(e)) => {
                error!(endpoint = url, error = %e, "controller endpoint is down");
                (false, e.to_string())
            }
            Err(_) => {
                error!(endpoint = url, "controller ping timed out");
                (false, "timeout".to_string())
            }
        }
    }

    /// Leader is the last healthy endpoint in configured order. Deliberate
    /// tie-break (not "first") — preserved so failover tests stay green.
    async fn refresh_leader(&self) {
        let candidate_url = {
            let endpoints = self.endpoints.read().await;
            endpoints
                .iter()
                .filter(|e| e.healthy)
                .last()
                .map(|e| e.url.clone())
        };

        let mut leader = self.leader.write().await;
        let changed = match (&*leader, &candidate_url) {
            (None, None) => false,
            (Some(current), Some(url)) => &current.url != url,
            _ => true,
        };
        if !changed {
            return;
        }

        match candidate_url {
            None => {
                info!(previous = ?leader.as_ref().map(|l| l.url.clone()), "no healthy endpoint, leader cleared");
                *leader = None;
            }
            Some(url) => match Leader::parse(&url) {
                Ok(new_leader) => {
                    info!(previous = ?leader.as_ref().map(|l| l.url.clone()), new = %new_leader.url, "leader changed");
                    *leader = Some(new_leader);
                }
                Err(e) => {
                    error!(error = %e, "failed to parse new leader url");
                }
            },
        }
    }

    async fn current_leader_url(&self) -> Result<String, DroveError> {
        let leader = self.leader.read().await;
        leader
            .as_ref()
            .map(|l| l.url.clone())
            .ok_or(DroveError::NoLeader)
    }

    /// Typed GET against the current leader. Non-2xx is not itself a decode
    /// error; only malformed JSON is.
    async fn get<T: DeserializeOwned>(&self, path: &str, timeout: Duration) -> Result<T, DroveError> {
        let leader_url = self.current_leader_url().await?;
        let url = format!("{leader_url}{path}");

        let request = self.http.get(&url).headers(self.auth.headers());
        let result = tokio::time::timeout(timeout, request.send()).await;

        let response = match result {
            Ok(Ok(response)) => {
                self.metrics
                    .api_total
                    .with_label_values(&[response.status().as_str(), "GET", leader_url.as_str()])
                    .inc();
                response
            }
            Ok(Err(e)) => {
                self.metrics
                    .api_total
                    .with_label_values(&["err", "GET", leader_url.as_str()])
                    .inc();
                return Err(DroveError::Transport(e));
            }
            Err(_) => {
                self.metrics
                    .api_total
                    .with_label_values(&["err", "GET", leader_url.as_str()])
                    .inc();
                return Err(DroveError::Timeout(format!("request to {url} timed out")));
            }
        };

        let body = response
            .text()
            .await
            .map_err(DroveError::Transport)?;
        serde_json::from_str(&body).map_err(|e| DroveError::Protocol(format!("decode {url}: {e}")))
    }

    /// `GET /apis/v1/endpoints`. No response-level status validation; the
    /// caller uses the payload directly.
    pub async fn fetch_apps(&self) -> Result<AppsResponse, DroveError> {
        self.get(APPS_PATH, REQUEST_TIMEOUT).await
    }

    /// `GET /apis/v1/cluster/events/summary?lastSyncTime=<ms>`. Rejects if
    /// `status != "SUCCESS"`; otherwise advances the sync point.
    pub async fn fetch_recent_events(&self, sync_point: &Mutex<i64>) -> Result<EventSummary, DroveError> {
        let mut last_sync_time = sync_point.lock().await;
        let path = format!("{EVENTS_PATH}?lastSyncTime={}", *last_sync_time);
        let response: EventsApiResponse = self.get(&path, REQUEST_TIMEOUT).await?;

        if response.status != STATUS_SUCCESS {
            return Err(DroveError::Protocol(format!(
                "events api call failed. message: {}",
                response.message
            )));
        }

        *last_sync_time = response.data.last_sync_time;
        Ok(response.data)
    }

    /// Spawn a background task that polls events every 2s and notifies
    /// `on_event` of summaries that should trigger a refresh. Uses a
    /// buffer-1 signal channel (not an unbuffered one) so a refresh in
    /// flight never blocks the poller — a deliberate fix over the
    /// unbuffered-channel design this client is modeled on.
    pub fn poll_events(self: &Arc<Self>) -> mpsc::Receiver<()> {
        let (tx, rx) = mpsc::channel::<()>(1);
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let sync_point = Mutex::new(0i64);
            let mut ticker = tokio::time::interval(EVENT_POLL_INTERVAL);
            loop {
                ticker.tick().await;
                debug!("polling controller for recent events");
                match this.fetch_recent_events(&sync_point).await {
                    Ok(summary) => {
                        if summary.triggers_refresh() {
                            if tx.try_send(()).is_err() {
                                debug!("refresh signal already in flight, coalescing");
                            }
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "unable to sync events from controller");
                    }
                }
            }
        });
        rx
    }

    #[cfg(test)]
    pub(crate) async fn leader_url(&self) -> Option<String> {
        self.leader.read().await.as_ref().map(|l| l.url.clone())
    }
}
