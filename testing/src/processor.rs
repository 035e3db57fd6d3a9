//! Payment processor double.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use taskmarket_core::ids::PaymentMethodId;
use taskmarket_core::payment::{Movement, PaymentProcessor, ProcessorError};

#[derive(Debug, Default)]
struct Script {
    executed: Vec<Movement>,
    attempts: usize,
    fail_next: usize,
    declined_methods: Vec<PaymentMethodId>,
    delay: Option<Duration>,
}

/// Processor that approves everything unless told otherwise, and records
/// each approved movement.
///
/// Clones share the script, so a test can keep a handle after passing one
/// to the marketplace.
#[derive(Debug, Clone, Default)]
pub struct ScriptedProcessor {
    script: Arc<Mutex<Script>>,
}

impl ScriptedProcessor {
    /// Processor that approves every movement.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decline the next `count` movements regardless of method.
    #[must_use]
    pub fn failing_next(self, count: usize) -> Self {
        self.with_script(|s| s.fail_next = count);
        self
    }

    /// Decline every movement that touches `method`.
    #[must_use]
    pub fn declining(self, method: PaymentMethodId) -> Self {
        self.with_script(|s| s.declined_methods.push(method));
        self
    }

    /// Wait `delay` before answering.
    #[must_use]
    pub fn with_delay(self, delay: Duration) -> Self {
        self.with_script(|s| s.delay = Some(delay));
        self
    }

    /// Movements that were approved, in order.
    #[must_use]
    pub fn executed(&self) -> Vec<Movement> {
        self.with_script(|s| s.executed.clone())
    }

    /// Every call, approved or not.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.with_script(|s| s.attempts)
    }

    fn with_script<R>(&self, f: impl FnOnce(&mut Script) -> R) -> R {
        let mut guard = self
            .script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut guard)
    }
}

#[async_trait]
impl PaymentProcessor for ScriptedProcessor {
    async fn execute(&self, movement: &Movement) -> Result<(), ProcessorError> {
        if let Some(delay) = self.with_script(|s| s.delay) {
            tokio::time::sleep(delay).await;
        }

        self.with_script(|s| {
            s.attempts += 1;
            if s.fail_next > 0 {
                s.fail_next -= 1;
                return Err(ProcessorError::Declined {
                    reason: "scripted failure".to_string(),
                });
            }
            let touches_declined = [movement.from.as_ref(), movement.to.as_ref()]
                .into_iter()
                .flatten()
                .any(|method| s.declined_methods.contains(&method.id));
            if touches_declined {
                return Err(ProcessorError::Declined {
                    reason: "card declined".to_string(),
                });
            }
            s.executed.push(movement.clone());
            Ok(())
        })
    }
}
