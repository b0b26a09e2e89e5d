use anyhow::Result;
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;

pub fn describe() {
    describe_counter!(
        "ideafund_ballots_accepted_total",
        "Portfolio submissions committed to the ledger."
    );
    describe_counter!(
        "ideafund_ballots_rejected_total",
        "Portfolio submissions rejected by validation, labelled by reason."
    );
    describe_counter!(
        "ideafund_ballot_failures_total",
        "Portfolio submissions that failed during the atomic commit."
    );
    describe_counter!(
        "ideafund_leaderboard_computations_total",
        "Number of on-demand leaderboard computations."
    );
    describe_histogram!(
        "ideafund_db_query_latency_ms",
        "SQLite operation latency in milliseconds, labelled by op."
    );
    describe_counter!(
        "ideafund_db_query_errors_total",
        "SQLite operations that returned an error, labelled by op."
    );
    describe_counter!(
        "tracing_error_events",
        "ERROR-level tracing events (see common::observability)."
    );
}

pub fn install_prometheus(port: u16) -> Result<PrometheusHandle> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    Ok(PrometheusBuilder::new()
        .with_http_listener(addr)
        .install_recorder()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prometheus_handle_renders_metric_names() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            describe();
            metrics::counter!("ideafund_ballots_accepted_total").increment(1);
            metrics::counter!(
                "ideafund_ballots_rejected_total",
                "reason" => "budget_exceeded"
            )
            .increment(1);
        });

        let rendered = handle.render();
        assert!(rendered.contains("ideafund_ballots_accepted_total"));
        assert!(rendered.contains("ideafund_ballots_rejected_total"));
        assert!(rendered.contains("budget_exceeded"));
    }
}
