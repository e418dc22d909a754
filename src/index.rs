use crate::controller::ControllerClient;
use crate::metrics::Metrics;
use crate::types::Application;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const REFRESH_INTERVAL: std::time::Duration = std::time::Duration::from_secs(10);

#[derive(Default)]
struct IndexState {
    apps: Option<Vec<Application>>,
    by_vhost: HashMap<String, Application>,
}

/// Thread-safe vhost -> application map, rebuilt atomically on every
/// refresh and consumed concurrently by the DNS hot path.
pub struct EndpointIndex {
    client: Arc<ControllerClient>,
    state: RwLock<IndexState>,
    metrics: Arc<Metrics>,
}

impl EndpointIndex {
    /// Construct the index, performing one synchronous refresh before
    /// spawning the periodic and event-driven refresh workers.
    pub async fn new(client: Arc<ControllerClient>, metrics: Arc<Metrics>, shutdown: CancellationToken) -> Arc<Self> {
        let index = Arc::new(Self {
            client,
            state: RwLock::new(IndexState::default()),
            metrics,
        });

        index.refresh().await;
        index.clone().spawn_refresher(shutdown);
        index
    }

    fn spawn_refresher(self: Arc<Self>, shutdown: CancellationToken) {
        let mut signal_rx = self.client.poll_events();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(REFRESH_INTERVAL);
            ticker.tick().await; // consume the immediate first tick

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("endpoint index refresher shutting down");
                        return;
                    }
                    _ = signal_rx.recv() => {
                        debug!("refreshing apps due to event change from controller");
                        self.refresh().await;
                    }
                    _ = ticker.tick() => {
                        debug!("refreshing apps data from controller");
                        self.refresh().await;
                    }
                }
            }
        });
    }

    /// Fetch apps from the controller and, on success, atomically replace
    /// both `apps` and `by_vhost` under a single write-lock acquisition.
    /// On failure, retain the previous index; readiness is unaffected.
    async fn refresh(&self) {
        match self.client.fetch_apps().await {
            Ok(response) => {
                self.metrics.sync_total.inc();
                let by_vhost = build_vhost_index(&response.data);

                let mut state = self.state.write().await;
                state.by_vhost = by_vhost;
                state.apps = Some(response.data);
            }
            Err(e) => {
                self.metrics.sync_failure.inc();
                warn!(error = %e, "error refreshing apps data from controller");
            }
        }
    }

    /// Returns the current list, or `None` if the index has never synced.
    pub async fn get_apps(&self) -> Option<Vec<Application>> {
        self.state.read().await.apps.clone()
    }

    /// O(1) lookup in `by_vhost`. `None` if the index has never been
    /// populated or the name has no matching application.
    pub async fn search_apps(&self, question_name: &str) -> Option<Application> {
        self.state.read().await.by_vhost.get(question_name).cloned()
    }
}

/// Key collisions are last-writer-wins in response order (operator-visible
/// ambiguity; do not attempt to guess a smarter policy).
fn build_vhost_index(apps: &[Application]) -> HashMap<String, Application> {
    let mut by_vhost = HashMap::with_capacity(apps.len());
    for app in apps {
        by_vhost.insert(app.question_name(), app.clone());
    }
    by_vhost
}
