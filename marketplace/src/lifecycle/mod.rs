//! Request lifecycle.
//!
//! ```text
//! Open ──offer──▶ Offered ──select──▶ Selected ──complete──▶ Completed
//!                    ▲                   │
//!                    └──offer/reselect───┘
//! ```
//!
//! Only `completed_date` is a stored terminal marker; "offered" and
//! "selected" follow from the offer count and `selected_offer`. Everything
//! before completion accepts new offers and reselection.

pub mod engine;
pub mod rules;

use serde::{Deserialize, Serialize};
use taskmarket_core::model::{Offer, PaymentCommand, Request};

pub use engine::RequestLifecycleEngine;
pub use rules::settlement_amount;

/// A request together with every offer made on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestView {
    /// The request
    pub request: Request,
    /// Its offers, oldest first
    pub offers: Vec<Offer>,
}

/// Result of a successful completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// The request, now completed
    pub request: Request,
    /// The settlement transfer
    pub payment: PaymentCommand,
}
