//! Payment ledger.
//!
//! Every money movement goes through [`PaymentLedger::execute_in`]: resolve
//! the methods, ask the [`PaymentProcessor`] to move the money (bounded by a
//! timeout), and append one [`PaymentCommand`] row only once the processor
//! confirms. The row is written through the caller's transaction, so a
//! caller that rolls back (or simply drops the transaction) leaves no row.
//!
//! Zero-amount movements are executed and recorded like any other.
//!
//! The ledger knows nothing about requests or subscriptions.

pub mod gateway;

use crate::error::{Entity, MarketError, Result, ValidationReason};
use std::sync::Arc;
use std::time::Duration;
use taskmarket_core::environment::Clock;
use taskmarket_core::ids::{AccountId, PaymentCommandId, PaymentMethodId};
use taskmarket_core::model::{
    CardDetails, PaymentCommand, PaymentKind, PaymentMethod, PaymentMethodKind,
};
use taskmarket_core::money::Money;
use taskmarket_core::payment::{Movement, PaymentProcessor};
use taskmarket_core::store::{
    LedgerStore, MarketStore, PaymentMethodStore, ProfileStore, StoreTransaction,
};
use tracing::{debug, info, warn};

pub use gateway::SimulatedGateway;

/// Card details supplied at registration. Only the last four digits are kept.
#[derive(Debug, Clone)]
pub struct CardRegistration {
    /// Full card number; spaces and dashes are ignored
    pub number: String,
    /// Expiry as MM/YY
    pub expiry: String,
    /// Name on the card
    pub holder_name: String,
}

/// Executes and records money movements.
pub struct PaymentLedger {
    store: Arc<dyn MarketStore>,
    processor: Arc<dyn PaymentProcessor>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl PaymentLedger {
    /// Creates a ledger bounding each processor call by `timeout`.
    #[must_use]
    pub fn new(
        store: Arc<dyn MarketStore>,
        processor: Arc<dyn PaymentProcessor>,
        clock: Arc<dyn Clock>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            processor,
            clock,
            timeout,
        }
    }

    /// Money leaves `method` into the system.
    ///
    /// # Errors
    ///
    /// See [`PaymentLedger::execute_in`]; also [`MarketError::Store`] if the
    /// transaction cannot be opened or committed.
    pub async fn debit(&self, method: PaymentMethodId, amount: Money) -> Result<PaymentCommand> {
        self.execute(Some(method), None, amount).await
    }

    /// Money enters `method` from the system.
    ///
    /// # Errors
    ///
    /// See [`PaymentLedger::debit`].
    pub async fn credit(&self, method: PaymentMethodId, amount: Money) -> Result<PaymentCommand> {
        self.execute(None, Some(method), amount).await
    }

    /// Money moves directly from one method to another.
    ///
    /// # Errors
    ///
    /// See [`PaymentLedger::debit`].
    pub async fn transfer(
        &self,
        from: PaymentMethodId,
        to: PaymentMethodId,
        amount: Money,
    ) -> Result<PaymentCommand> {
        self.execute(Some(from), Some(to), amount).await
    }

    async fn execute(
        &self,
        from: Option<PaymentMethodId>,
        to: Option<PaymentMethodId>,
        amount: Money,
    ) -> Result<PaymentCommand> {
        let mut tx = self.store.begin().await?;
        let command = self.execute_in(tx.as_mut(), from, to, amount).await?;
        tx.commit().await?;
        Ok(command)
    }

    /// Execute one movement and record it through `tx`.
    ///
    /// The kind follows from which ends are present: only `from` is a debit,
    /// only `to` a credit, both a transfer.
    ///
    /// # Errors
    ///
    /// - [`MarketError::Validation`] if neither end is given
    /// - [`MarketError::NotFound`] if a given method does not exist
    /// - [`MarketError::PaymentFailure`] if the processor declines, fails or
    ///   times out; no row is written and the caller should roll back
    /// - [`MarketError::Store`] if the row cannot be written
    pub async fn execute_in(
        &self,
        tx: &mut dyn StoreTransaction,
        from: Option<PaymentMethodId>,
        to: Option<PaymentMethodId>,
        amount: Money,
    ) -> Result<PaymentCommand> {
        let kind = PaymentKind::for_ends(from.is_some(), to.is_some())
            .ok_or(MarketError::Validation(ValidationReason::MissingPaymentEnds))?;

        let from_method = match from {
            Some(id) => Some(resolve(tx, id).await?),
            None => None,
        };
        let to_method = match to {
            Some(id) => Some(resolve(tx, id).await?),
            None => None,
        };

        let movement = Movement {
            kind,
            from: from_method,
            to: to_method,
            amount,
        };

        match tokio::time::timeout(self.timeout, self.processor.execute(&movement)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(
                    kind = kind.as_str(),
                    amount = amount.cents(),
                    error = %e,
                    "Payment movement declined"
                );
                metrics::counter!("ledger.movements.failed", "kind" => kind.as_str()).increment(1);
                return Err(MarketError::PaymentFailure(e.to_string()));
            }
            Err(_) => {
                warn!(
                    kind = kind.as_str(),
                    amount = amount.cents(),
                    timeout = ?self.timeout,
                    "Payment processor timed out"
                );
                metrics::counter!("ledger.movements.failed", "kind" => kind.as_str()).increment(1);
                return Err(MarketError::PaymentFailure(
                    "payment processor timed out".to_string(),
                ));
            }
        }

        let command = PaymentCommand {
            id: PaymentCommandId::new(),
            from,
            to,
            amount,
            kind,
            executed_at: self.clock.now(),
        };
        tx.append_payment_command(&command).await?;

        info!(
            command_id = %command.id,
            kind = kind.as_str(),
            amount = amount.cents(),
            "Payment command recorded"
        );
        metrics::counter!("ledger.commands.recorded", "kind" => kind.as_str()).increment(1);

        Ok(command)
    }

    /// Register a card for an account. No money moves.
    ///
    /// # Errors
    ///
    /// - [`MarketError::Validation`] if the number or expiry is malformed
    /// - [`MarketError::NotFound`] if the account does not exist
    pub async fn register_card(
        &self,
        account: AccountId,
        card: CardRegistration,
    ) -> Result<PaymentMethod> {
        let details = validate_card(&card)?;

        let mut tx = self.store.begin().await?;
        tx.account(account)
            .await?
            .ok_or(MarketError::NotFound(Entity::Account))?;

        let method = PaymentMethod {
            id: PaymentMethodId::new(),
            account,
            kind: PaymentMethodKind::Card(details),
            created_at: self.clock.now(),
        };
        tx.insert_method(&method).await?;
        tx.commit().await?;

        debug!(method_id = %method.id, account_id = %account, "Card registered");
        Ok(method)
    }

    /// Methods of an account, oldest (default) first.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Store`] on persistence failure.
    pub async fn payment_methods_for(&self, account: AccountId) -> Result<Vec<PaymentMethod>> {
        let mut tx = self.store.begin().await?;
        Ok(tx.methods_for(account).await?)
    }

    /// Ledger rows touching a method.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Store`] on persistence failure.
    pub async fn commands_for(&self, method: PaymentMethodId) -> Result<Vec<PaymentCommand>> {
        let mut tx = self.store.begin().await?;
        Ok(tx.payment_commands_for(method).await?)
    }
}

async fn resolve(tx: &mut dyn StoreTransaction, id: PaymentMethodId) -> Result<PaymentMethod> {
    tx.method(id)
        .await?
        .ok_or(MarketError::NotFound(Entity::PaymentMethod))
}

fn validate_card(card: &CardRegistration) -> Result<CardDetails> {
    let digits: String = card
        .number
        .chars()
        .filter(|c| !matches!(c, ' ' | '-'))
        .collect();
    if !(12..=19).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationReason::InvalidCardNumber.into());
    }

    let expiry = card.expiry.trim();
    let valid_expiry = expiry.split_once('/').is_some_and(|(month, year)| {
        month.len() == 2
            && year.len() == 2
            && year.chars().all(|c| c.is_ascii_digit())
            && month.parse::<u8>().is_ok_and(|m| (1..=12).contains(&m))
    });
    if !valid_expiry {
        return Err(ValidationReason::InvalidCardExpiry.into());
    }

    Ok(CardDetails {
        last_four: digits[digits.len() - 4..].to_string(),
        expiry: expiry.to_string(),
        holder_name: card.holder_name.trim().to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn card(number: &str, expiry: &str) -> CardRegistration {
        CardRegistration {
            number: number.to_string(),
            expiry: expiry.to_string(),
            holder_name: " Sam Doe ".to_string(),
        }
    }

    #[test]
    fn card_keeps_only_last_four() {
        let details = validate_card(&card("4242 4242-4242 4242", "09/29")).unwrap();
        assert_eq!(details.last_four, "4242");
        assert_eq!(details.expiry, "09/29");
        assert_eq!(details.holder_name, "Sam Doe");
    }

    #[test]
    fn malformed_cards_are_rejected() {
        assert!(matches!(
            validate_card(&card("1234", "09/29")),
            Err(MarketError::Validation(ValidationReason::InvalidCardNumber))
        ));
        assert!(matches!(
            validate_card(&card("4242424242424242", "13/29")),
            Err(MarketError::Validation(ValidationReason::InvalidCardExpiry))
        ));
        assert!(matches!(
            validate_card(&card("4242424242424242", "0929")),
            Err(MarketError::Validation(ValidationReason::InvalidCardExpiry))
        ));
    }
}
