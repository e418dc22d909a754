use prometheus::{CounterVec, GaugeVec, Opts, Registry};

const NAMESPACE: &str = "drove_dns";

/// Counters/gauges emitted by the controller client and endpoint index.
/// Names and label sets are an external contract — keep them stable.
pub struct Metrics {
    pub registry: Registry,

    /// Incremented at every successful index refresh.
    pub sync_total: prometheus::Counter,
    /// Incremented at every `fetch_apps` error during refresh.
    pub sync_failure: prometheus::Counter,
    /// Per HTTP request to the controller; `code="err"` for transport errors.
    pub api_total: CounterVec,
    /// Controller reachability per endpoint, set after every probe cycle.
    pub controller_health: GaugeVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let sync_total = prometheus::Counter::with_opts(Opts::new(
            format!("{NAMESPACE}_sync_total"),
            "Counter of controller syncs successful",
        ))?;

        let sync_failure = prometheus::Counter::with_opts(Opts::new(
            format!("{NAMESPACE}_sync_failure"),
            "Counter of controller syncs failed",
        ))?;

        let api_total = CounterVec::new(
            Opts::new(format!("{NAMESPACE}_api_total"), "Controller API requests total"),
            &["code", "method", "host"],
        )?;

        let controller_health = GaugeVec::new(
            Opts::new(format!("{NAMESPACE}_controller_health"), "Controller health"),
            &["host"],
        )?;

        registry.register(Box::new(sync_total.clone()))?;
        registry.register(Box::new(sync_failure.clone()))?;
        registry.register(Box::new(api_total.clone()))?;
        registry.register(Box::new(controller_health.clone()))?;

        Ok(Self {
            registry,
            sync_total,
            sync_failure,
            api_total,
            controller_health,
        })
    }

    /// Render the registry in Prometheus text exposition format.
    pub fn encode(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .expect("prometheus encoding is infallible for well-formed metric families");
        String::from_utf8(buffer).expect("prometheus text encoder always emits valid utf8")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_carry_the_expected_namespace() {
        let metrics = Metrics::new().unwrap();
        metrics.sync_total.inc();
        let text = metrics.encode();
        assert!(text.contains("drove_dns_sync_total"));
    }

    #[test]
    fn api_total_accepts_err_code_label() {
        let metrics = Metrics::new().unwrap();
        metrics
            .api_total
            .with_label_values(&["err", "GET", "http://leader"])
            .inc();
        let text = metrics.encode();
        assert!(text.contains("drove_dns_api_total"));
    }
}
