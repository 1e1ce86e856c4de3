use std::net::SocketAddr;

// ── Counter guard ───────────────────────────────────────────────

/// Counter: completed scrap toggles. Labels: action (added | removed).
pub const SCRAP_TOGGLES_TOTAL: &str = "popslot_scrap_toggles_total";

/// Counter: toggles rejected because the store lock was not acquired.
pub const LOCK_CONFLICTS_TOTAL: &str = "popslot_lock_conflicts_total";

/// Histogram: time spent inside the per-store critical section, in seconds.
pub const LOCK_HOLD_SECONDS: &str = "popslot_lock_hold_seconds";

/// Counter: cache entries seeded from the durable scrap count.
pub const COUNTER_SEEDS_TOTAL: &str = "popslot_counter_seeds_total";

// ── Slot scheduler ──────────────────────────────────────────────

/// Counter: slots written by the allocator.
pub const SLOTS_ALLOCATED_TOTAL: &str = "popslot_slots_allocated_total";

// ── Durable store ───────────────────────────────────────────────

/// Histogram: WAL append + fsync duration in seconds.
pub const WAL_APPEND_DURATION_SECONDS: &str = "popslot_wal_append_duration_seconds";

/// Counter: WAL compactions performed.
pub const WAL_COMPACTIONS_TOTAL: &str = "popslot_wal_compactions_total";

/// Install the fmt tracing subscriber and, if a port is given, the Prometheus exporter.
pub fn init(metrics_port: Option<u16>) {
    // A host process may already own the global subscriber.
    let _ = tracing_subscriber::fmt::try_init();

    let Some(port) = metrics_port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    match metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
    {
        Ok(()) => tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics"),
        Err(e) => tracing::error!("failed to install Prometheus metrics exporter: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_without_port_is_repeatable() {
        init(None);
        init(None);
    }
}
