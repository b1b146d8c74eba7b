use opentelemetry::global;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use tracing::info;

/// Install a meter provider and register the session counters.
///
/// Exporting is left to whoever hosts the process; until a reader is
/// attached the counters only aggregate in memory.
pub fn init_metrics() -> SdkMeterProvider {
    let provider = SdkMeterProvider::builder().build();
    global::set_meter_provider(provider.clone());

    counters::init(&global::meter("esmed"));
    info!("metrics initialized");

    provider
}

/// Session counters. Every recorder is a no-op until [`init`] has run.
pub mod counters {
    use opentelemetry::metrics::{Counter, Histogram};
    use opentelemetry::KeyValue;
    use std::sync::OnceLock;

    // ============================================================================
    // LIFECYCLE
    // ============================================================================

    static CONNECTING_TOTAL: OnceLock<Counter<u64>> = OnceLock::new();
    static CONNECT_TOTAL: OnceLock<Counter<u64>> = OnceLock::new();
    static CLOSE_TOTAL: OnceLock<Counter<u64>> = OnceLock::new();
    static RECONNECTING_TOTAL: OnceLock<Counter<u64>> = OnceLock::new();
    static BINDING_TOTAL: OnceLock<Counter<u64>> = OnceLock::new();
    static BOUND_TOTAL: OnceLock<Counter<u64>> = OnceLock::new();
    static ERRORS_TOTAL: OnceLock<Counter<u64>> = OnceLock::new();

    // ============================================================================
    // TRAFFIC
    // ============================================================================

    static SUBMITS_TOTAL: OnceLock<Counter<u64>> = OnceLock::new();
    static SUBMIT_DURATION: OnceLock<Histogram<f64>> = OnceLock::new();
    static DELIVERIES_TOTAL: OnceLock<Counter<u64>> = OnceLock::new();

    // ============================================================================
    // KEEPALIVE
    // ============================================================================

    static ENQUIRE_LINK_SENT_TOTAL: OnceLock<Counter<u64>> = OnceLock::new();
    static ENQUIRE_LINK_TIMEOUT_TOTAL: OnceLock<Counter<u64>> = OnceLock::new();

    pub fn init(meter: &opentelemetry::metrics::Meter) {
        let _ = CONNECTING_TOTAL.set(
            meter.u64_counter("esme_connecting_total")
                .with_description("Transport open attempts")
                .build(),
        );
        let _ = CONNECT_TOTAL.set(
            meter.u64_counter("esme_connect_total")
                .with_description("Transport connections established")
                .build(),
        );
        let _ = CLOSE_TOTAL.set(
            meter.u64_counter("esme_close_total")
                .with_description("Transport connections closed")
                .build(),
        );
        let _ = RECONNECTING_TOTAL.set(
            meter.u64_counter("esme_reconnecting_total")
                .with_description("Reconnects scheduled")
                .build(),
        );
        let _ = BINDING_TOTAL.set(
            meter.u64_counter("esme_binding_total")
                .with_description("Bind attempts")
                .build(),
        );
        let _ = BOUND_TOTAL.set(
            meter.u64_counter("esme_bound_total")
                .with_description("Successful binds")
                .build(),
        );
        let _ = ERRORS_TOTAL.set(
            meter.u64_counter("esme_errors_total")
                .with_description("Session errors by kind")
                .build(),
        );

        let _ = SUBMITS_TOTAL.set(
            meter.u64_counter("esme_submits_total")
                .with_description("submit calls by outcome")
                .build(),
        );
        let _ = SUBMIT_DURATION.set(
            meter.f64_histogram("esme_submit_duration_seconds")
                .with_description("submit_sm round trip")
                .build(),
        );
        let _ = DELIVERIES_TOTAL.set(
            meter.u64_counter("esme_deliveries_total")
                .with_description("deliver_sm / data_sm received")
                .build(),
        );

        let _ = ENQUIRE_LINK_SENT_TOTAL.set(
            meter.u64_counter("esme_enquire_link_sent_total")
                .with_description("Keepalive pings sent")
                .build(),
        );
        let _ = ENQUIRE_LINK_TIMEOUT_TOTAL.set(
            meter.u64_counter("esme_enquire_link_timeout_total")
                .with_description("Keepalive pings that went unanswered")
                .build(),
        );
    }

    /// Record a lifecycle event by name.
    pub fn lifecycle(event: &str) {
        let counter = match event {
            "connecting" => &CONNECTING_TOTAL,
            "connect" => &CONNECT_TOTAL,
            "close" => &CLOSE_TOTAL,
            "reconnecting" => &RECONNECTING_TOTAL,
            "binding" => &BINDING_TOTAL,
            "bound" => &BOUND_TOTAL,
            _ => return,
        };
        if let Some(c) = counter.get() {
            c.add(1, &[]);
        }
    }

    pub fn session_error(kind: &str) {
        if let Some(c) = ERRORS_TOTAL.get() {
            c.add(1, &[kv("kind", kind)]);
        }
    }

    /// Record a submit outcome: `"ok"` or an error kind.
    pub fn submit(outcome: &str) {
        if let Some(c) = SUBMITS_TOTAL.get() {
            c.add(1, &[kv("outcome", outcome)]);
        }
    }

    pub fn submit_duration(seconds: f64) {
        if let Some(h) = SUBMIT_DURATION.get() {
            h.record(seconds, &[]);
        }
    }

    pub fn delivery(command: &str) {
        if let Some(c) = DELIVERIES_TOTAL.get() {
            c.add(1, &[kv("command", command)]);
        }
    }

    pub fn enquire_link_sent() {
        if let Some(c) = ENQUIRE_LINK_SENT_TOTAL.get() {
            c.add(1, &[]);
        }
    }

    pub fn enquire_link_timeout() {
        if let Some(c) = ENQUIRE_LINK_TIMEOUT_TOTAL.get() {
            c.add(1, &[]);
        }
    }

    fn kv(key: &'static str, value: &str) -> KeyValue {
        KeyValue::new(key, value.to_string())
    }

}
