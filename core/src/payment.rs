//! Payment processor collaborator.
//!
//! The processor performs the actual money movement (card network, bank,
//! wallet). The ledger calls it and records a row only when it reports
//! success.

use crate::model::{PaymentKind, PaymentMethod};
use crate::money::Money;
use async_trait::async_trait;
use thiserror::Error;

/// Reasons a movement was not performed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessorError {
    /// Card declined
    #[error("Card declined: {reason}")]
    Declined {
        /// Decline reason
        reason: String,
    },

    /// Insufficient funds
    #[error("Insufficient funds")]
    InsufficientFunds,

    /// The processor could not be reached or did not answer in time
    #[error("Payment processor unavailable: {0}")]
    Unavailable(String),
}

/// A fully-resolved movement handed to the processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Movement {
    /// Debit, credit or transfer
    pub kind: PaymentKind,
    /// Funding method, absent for credits
    pub from: Option<PaymentMethod>,
    /// Receiving method, absent for debits
    pub to: Option<PaymentMethod>,
    /// Amount to move
    pub amount: Money,
}

/// Payment processor trait
///
/// Abstraction over whatever actually moves money. Implementations must not
/// leave a partial movement behind when they return an error.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Perform one movement.
    ///
    /// # Errors
    ///
    /// Returns a [`ProcessorError`] if the money did not move.
    async fn execute(&self, movement: &Movement) -> Result<(), ProcessorError>;
}
