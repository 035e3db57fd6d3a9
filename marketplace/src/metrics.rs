//! Operational metrics.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `ledger.commands.recorded{kind}` - Payment commands written
//! - `ledger.movements.failed{kind}` - Movements declined or timed out
//! - `notifications.delivered{sink}` - Alerts a sink confirmed
//! - `notifications.failed{sink}` - Alerts a sink failed, timed out or panicked on
//! - `billing.renewals{outcome}` - Renewal sweep outcomes (renewed, cancelled, failed)
//! - `billing.expired` - Lapsed subscriptions cleared by the bulk expiry

use metrics::describe_counter;

/// Register descriptions for every marketplace metric.
///
/// Call once at startup, after installing a recorder.
pub fn register_metrics() {
    describe_counter!(
        "ledger.commands.recorded",
        "Payment commands written to the ledger, by kind (debit, credit, transfer)"
    );
    describe_counter!(
        "ledger.movements.failed",
        "Money movements the processor declined or did not answer in time, by kind"
    );
    describe_counter!(
        "notifications.delivered",
        "Alerts confirmed by a notification sink, by sink"
    );
    describe_counter!(
        "notifications.failed",
        "Alerts a notification sink failed to deliver, by sink"
    );
    describe_counter!(
        "billing.renewals",
        "Subscription renewal outcomes (renewed, cancelled, failed)"
    );
    describe_counter!(
        "billing.expired",
        "Lapsed premium subscriptions cleared by the nightly bulk expiry"
    );

    tracing::info!("Marketplace metrics registered");
}
