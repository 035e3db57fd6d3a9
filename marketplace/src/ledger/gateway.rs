//! Simulated payment gateway for development.
//!
//! Approves every movement after a short artificial delay and logs it. In
//! production this is replaced by a real card-network integration
//! implementing [`PaymentProcessor`].

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use taskmarket_core::payment::{Movement, PaymentProcessor, ProcessorError};

/// Gateway that always succeeds.
#[derive(Clone, Debug)]
pub struct SimulatedGateway {
    latency: Duration,
}

impl SimulatedGateway {
    /// Creates a gateway answering after 100ms.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            latency: Duration::from_millis(100),
        }
    }

    /// Creates a gateway answering after `latency`.
    #[must_use]
    pub const fn with_latency(latency: Duration) -> Self {
        Self { latency }
    }

    /// Creates an Arc-wrapped instance for sharing
    #[must_use]
    pub fn shared() -> Arc<dyn PaymentProcessor> {
        Arc::new(Self::new())
    }
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentProcessor for SimulatedGateway {
    async fn execute(&self, movement: &Movement) -> Result<(), ProcessorError> {
        // Simulate network delay
        tokio::time::sleep(self.latency).await;

        let transaction_id = format!("sim_txn_{}", uuid::Uuid::new_v4());

        tracing::info!(
            kind = movement.kind.as_str(),
            from = ?movement.from.as_ref().map(|m| m.id),
            to = ?movement.to.as_ref().map(|m| m.id),
            amount = movement.amount.cents(),
            transaction_id = %transaction_id,
            "Simulated payment processed"
        );

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use taskmarket_core::model::PaymentKind;
    use taskmarket_core::money::Money;

    #[tokio::test(start_paused = true)]
    async fn test_simulated_payment_success() {
        let gateway = SimulatedGateway::new();
        let movement = Movement {
            kind: PaymentKind::Credit,
            from: None,
            to: None,
            amount: Money::from_dollars(100),
        };

        let result = gateway.execute(&movement).await;

        assert!(result.is_ok());
    }
}
