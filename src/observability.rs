use std::net::SocketAddr;

// ── Booking-flow metrics ────────────────────────────────────────

/// Counter: bookings successfully created.
pub const BOOKINGS_CREATED_TOTAL: &str = "innkeep_bookings_created_total";

/// Counter: bookings successfully rescheduled.
pub const BOOKINGS_RESCHEDULED_TOTAL: &str = "innkeep_bookings_rescheduled_total";

/// Counter: bookings successfully cancelled.
pub const BOOKINGS_CANCELLED_TOTAL: &str = "innkeep_bookings_cancelled_total";

/// Counter: create/reschedule attempts rejected because the slot is taken.
pub const CONFLICTS_REJECTED_TOTAL: &str = "innkeep_conflicts_rejected_total";

/// Counter: dual writes that left the two mirrors inconsistent. A non-zero
/// value is a reconciliation obligation, not a business rejection — alert
/// on it separately.
pub const PARTIAL_WRITES_TOTAL: &str = "innkeep_partial_writes_total";

// ── WAL metrics ─────────────────────────────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "innkeep_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "innkeep_wal_flush_batch_size";

/// Install the Prometheus metrics exporter on the given port. No-op if
/// `port` is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
