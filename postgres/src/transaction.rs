//! [`StoreTransaction`] over a sqlx transaction.

use crate::rows::{self, cents, counter, db};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{Postgres, Transaction};
use taskmarket_core::ids::{
    AccountId, ConsumerId, OfferId, PaymentMethodId, ProviderId, RequestId,
};
use taskmarket_core::model::{
    Account, Consumer, Notification, Offer, PaymentCommand, PaymentMethod, Provider, Request,
    RequestFilter, Review,
};
use taskmarket_core::store::{
    LedgerStore, NotificationStore, PaymentMethodStore, ProfileStore, RequestStore, ReviewStore,
    StoreError, StoreTransaction,
};

/// One database transaction. Rolled back on drop unless committed.
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

impl PostgresTransaction {
    pub(crate) const fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self { tx }
    }
}

fn expect_row(rows_affected: u64, what: impl std::fmt::Display) -> Result<(), StoreError> {
    if rows_affected == 0 {
        Err(StoreError::MissingRow(what.to_string()))
    } else {
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for PostgresTransaction {
    async fn account(&mut self, id: AccountId) -> Result<Option<Account>, StoreError> {
        sqlx::query("SELECT * FROM accounts WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db)?
            .as_ref()
            .map(rows::account)
            .transpose()
    }

    async fn insert_account(&mut self, account: &Account) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO accounts (id, email, full_name) VALUES ($1, $2, $3)")
            .bind(*account.id.as_uuid())
            .bind(&account.email)
            .bind(&account.full_name)
            .execute(&mut *self.tx)
            .await
            .map_err(db)?;
        Ok(())
    }

    async fn consumer_by_account(
        &mut self,
        account: AccountId,
    ) -> Result<Option<Consumer>, StoreError> {
        sqlx::query("SELECT * FROM consumers WHERE account_id = $1")
            .bind(*account.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db)?
            .as_ref()
            .map(rows::consumer)
            .transpose()
    }

    async fn consumer(&mut self, id: ConsumerId) -> Result<Option<Consumer>, StoreError> {
        sqlx::query("SELECT * FROM consumers WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db)?
            .as_ref()
            .map(rows::consumer)
            .transpose()
    }

    async fn consumer_for_update(
        &mut self,
        id: ConsumerId,
    ) -> Result<Option<Consumer>, StoreError> {
        sqlx::query("SELECT * FROM consumers WHERE id = $1 FOR UPDATE")
            .bind(*id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db)?
            .as_ref()
            .map(rows::consumer)
            .transpose()
    }

    async fn insert_consumer(&mut self, consumer: &Consumer) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO consumers (id, account_id, requests_posted, requests_completed)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(*consumer.id.as_uuid())
        .bind(*consumer.account.as_uuid())
        .bind(counter(consumer.requests_posted)?)
        .bind(counter(consumer.requests_completed)?)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn update_consumer(&mut self, consumer: &Consumer) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE consumers SET requests_posted = $2, requests_completed = $3 WHERE id = $1",
        )
        .bind(*consumer.id.as_uuid())
        .bind(counter(consumer.requests_posted)?)
        .bind(counter(consumer.requests_completed)?)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        expect_row(result.rows_affected(), format_args!("consumer {}", consumer.id))
    }

    async fn provider_by_account(
        &mut self,
        account: AccountId,
    ) -> Result<Option<Provider>, StoreError> {
        sqlx::query("SELECT * FROM providers WHERE account_id = $1")
            .bind(*account.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db)?
            .as_ref()
            .map(rows::provider)
            .transpose()
    }

    async fn provider(&mut self, id: ProviderId) -> Result<Option<Provider>, StoreError> {
        sqlx::query("SELECT * FROM providers WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db)?
            .as_ref()
            .map(rows::provider)
            .transpose()
    }

    async fn provider_for_update(
        &mut self,
        id: ProviderId,
    ) -> Result<Option<Provider>, StoreError> {
        sqlx::query("SELECT * FROM providers WHERE id = $1 FOR UPDATE")
            .bind(*id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db)?
            .as_ref()
            .map(rows::provider)
            .transpose()
    }

    async fn insert_provider(&mut self, provider: &Provider) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO providers (
                id, account_id, description, total_rating, review_count,
                is_premium, is_subscription_active, subscription_date
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(*provider.id.as_uuid())
        .bind(*provider.account.as_uuid())
        .bind(&provider.description)
        .bind(counter(provider.total_rating)?)
        .bind(counter(provider.review_count)?)
        .bind(provider.is_premium)
        .bind(provider.is_subscription_active)
        .bind(provider.subscription_date)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn update_provider(&mut self, provider: &Provider) -> Result<(), StoreError> {
        let result = sqlx::query(
            r"
            UPDATE providers
            SET description = $2,
                total_rating = $3,
                review_count = $4,
                is_premium = $5,
                is_subscription_active = $6,
                subscription_date = $7
            WHERE id = $1
            ",
        )
        .bind(*provider.id.as_uuid())
        .bind(&provider.description)
        .bind(counter(provider.total_rating)?)
        .bind(counter(provider.review_count)?)
        .bind(provider.is_premium)
        .bind(provider.is_subscription_active)
        .bind(provider.subscription_date)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        expect_row(result.rows_affected(), format_args!("provider {}", provider.id))
    }

    async fn expire_lapsed_subscriptions(
        &mut self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r"
            UPDATE providers
            SET is_premium = FALSE,
                is_subscription_active = FALSE,
                subscription_date = NULL
            WHERE NOT is_subscription_active
              AND subscription_date IS NOT NULL
              AND subscription_date < $1
            ",
        )
        .bind(cutoff)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(result.rows_affected())
    }

    async fn providers_due_for_renewal(
        &mut self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ProviderId>, StoreError> {
        let ids: Vec<(uuid::Uuid,)> = sqlx::query_as(
            r"
            SELECT id FROM providers
            WHERE is_subscription_active AND subscription_date < $1
            ORDER BY subscription_date
            ",
        )
        .bind(cutoff)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(ids.into_iter().map(|(id,)| id.into()).collect())
    }
}

#[async_trait]
impl PaymentMethodStore for PostgresTransaction {
    async fn methods_for(
        &mut self,
        account: AccountId,
    ) -> Result<Vec<PaymentMethod>, StoreError> {
        sqlx::query("SELECT * FROM payment_methods WHERE account_id = $1 ORDER BY created_at, id")
            .bind(*account.as_uuid())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db)?
            .iter()
            .map(rows::payment_method)
            .collect()
    }

    async fn method(&mut self, id: PaymentMethodId) -> Result<Option<PaymentMethod>, StoreError> {
        sqlx::query("SELECT * FROM payment_methods WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db)?
            .as_ref()
            .map(rows::payment_method)
            .transpose()
    }

    async fn insert_method(&mut self, method: &PaymentMethod) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO payment_methods (id, account_id, kind, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(*method.id.as_uuid())
        .bind(*method.account.as_uuid())
        .bind(Json(&method.kind))
        .bind(method.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(())
    }
}

#[async_trait]
impl RequestStore for PostgresTransaction {
    async fn request(&mut self, id: RequestId) -> Result<Option<Request>, StoreError> {
        sqlx::query("SELECT * FROM requests WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db)?
            .as_ref()
            .map(rows::request)
            .transpose()
    }

    async fn request_for_update(&mut self, id: RequestId) -> Result<Option<Request>, StoreError> {
        sqlx::query("SELECT * FROM requests WHERE id = $1 FOR UPDATE")
            .bind(*id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db)?
            .as_ref()
            .map(rows::request)
            .transpose()
    }

    async fn insert_request(&mut self, request: &Request) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO requests (
                id, consumer_id, title, description, location, budget_cents,
                due_date, remote_eligible, selected_offer_id, completed_date, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ",
        )
        .bind(*request.id.as_uuid())
        .bind(*request.consumer.as_uuid())
        .bind(&request.title)
        .bind(&request.description)
        .bind(&request.location)
        .bind(cents(request.budget)?)
        .bind(request.due_date)
        .bind(request.remote_eligible)
        .bind(request.selected_offer.map(|id| *id.as_uuid()))
        .bind(request.completed_date)
        .bind(request.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn update_request(&mut self, request: &Request) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE requests SET selected_offer_id = $2, completed_date = $3 WHERE id = $1",
        )
        .bind(*request.id.as_uuid())
        .bind(request.selected_offer.map(|id| *id.as_uuid()))
        .bind(request.completed_date)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        expect_row(result.rows_affected(), format_args!("request {}", request.id))
    }

    async fn find_requests(
        &mut self,
        filter: &RequestFilter,
    ) -> Result<Vec<Request>, StoreError> {
        let found = sqlx::query(
            r"
            SELECT r.* FROM requests r
            WHERE (r.completed_date IS NOT NULL) = $1
              AND ($2::text IS NULL OR r.location = $2)
              AND ($3::uuid IS NULL OR r.consumer_id = $3)
              AND ($4::uuid IS NULL OR EXISTS (
                    SELECT 1 FROM offers o
                    WHERE o.id = r.selected_offer_id AND o.provider_id = $4
              ))
            ORDER BY r.created_at, r.id
            ",
        )
        .bind(filter.completed)
        .bind(filter.location.as_deref())
        .bind(filter.consumer.map(|id| *id.as_uuid()))
        .bind(filter.provider.map(|id| *id.as_uuid()))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?;

        // Keyword matching is word-based, done here rather than in SQL.
        let mut requests = Vec::with_capacity(found.len());
        for row in &found {
            let request = rows::request(row)?;
            if filter.matches_keywords(&request) {
                requests.push(request);
            }
        }
        Ok(requests)
    }

    async fn offer(&mut self, id: OfferId) -> Result<Option<Offer>, StoreError> {
        sqlx::query("SELECT * FROM offers WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db)?
            .as_ref()
            .map(rows::offer)
            .transpose()
    }

    async fn insert_offer(&mut self, offer: &Offer) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO offers (id, provider_id, request_id, price_cents, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(*offer.id.as_uuid())
        .bind(*offer.provider.as_uuid())
        .bind(*offer.request.as_uuid())
        .bind(offer.price.map(cents).transpose()?)
        .bind(offer.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn offers_for(&mut self, request: RequestId) -> Result<Vec<Offer>, StoreError> {
        sqlx::query("SELECT * FROM offers WHERE request_id = $1 ORDER BY created_at, id")
            .bind(*request.as_uuid())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db)?
            .iter()
            .map(rows::offer)
            .collect()
    }
}

#[async_trait]
impl LedgerStore for PostgresTransaction {
    async fn append_payment_command(
        &mut self,
        command: &PaymentCommand,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO payment_commands (
                id, from_method_id, to_method_id, amount_cents, kind, executed_at
            ) VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(*command.id.as_uuid())
        .bind(command.from.map(|id| *id.as_uuid()))
        .bind(command.to.map(|id| *id.as_uuid()))
        .bind(cents(command.amount)?)
        .bind(command.kind.as_str())
        .bind(command.executed_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn payment_commands_for(
        &mut self,
        method: PaymentMethodId,
    ) -> Result<Vec<PaymentCommand>, StoreError> {
        sqlx::query(
            r"
            SELECT * FROM payment_commands
            WHERE from_method_id = $1 OR to_method_id = $1
            ORDER BY executed_at, id
            ",
        )
        .bind(*method.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?
        .iter()
        .map(rows::payment_command)
        .collect()
    }
}

#[async_trait]
impl NotificationStore for PostgresTransaction {
    async fn insert_notification(
        &mut self,
        notification: &Notification,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO notifications (id, account_id, title, content, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(*notification.id.as_uuid())
        .bind(*notification.account.as_uuid())
        .bind(&notification.title)
        .bind(&notification.content)
        .bind(notification.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn notifications_for(
        &mut self,
        account: AccountId,
        after: Option<DateTime<Utc>>,
    ) -> Result<Vec<Notification>, StoreError> {
        sqlx::query(
            r"
            SELECT * FROM notifications
            WHERE account_id = $1
              AND ($2::timestamptz IS NULL OR created_at > $2)
            ORDER BY created_at DESC
            ",
        )
        .bind(*account.as_uuid())
        .bind(after)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?
        .iter()
        .map(rows::notification)
        .collect()
    }
}

#[async_trait]
impl ReviewStore for PostgresTransaction {
    async fn insert_review(&mut self, review: &Review) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO reviews (id, request_id, rating, description, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(*review.id.as_uuid())
        .bind(*review.request.as_uuid())
        .bind(i16::from(review.rating))
        .bind(&review.description)
        .bind(review.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn review_for(&mut self, request: RequestId) -> Result<Option<Review>, StoreError> {
        sqlx::query("SELECT * FROM reviews WHERE request_id = $1")
            .bind(*request.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db)?
            .as_ref()
            .map(rows::review)
            .transpose()
    }

    async fn reviews_of_provider(
        &mut self,
        provider: ProviderId,
    ) -> Result<Vec<Review>, StoreError> {
        sqlx::query(
            r"
            SELECT rv.* FROM reviews rv
            JOIN requests r ON r.id = rv.request_id
            JOIN offers o ON o.id = r.selected_offer_id
            WHERE o.provider_id = $1
            ORDER BY rv.created_at
            ",
        )
        .bind(*provider.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?
        .iter()
        .map(rows::review)
        .collect()
    }
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let Self { tx } = *self;
        tx.commit().await.map_err(|e| {
            tracing::warn!(error = %e, "Transaction commit failed");
            StoreError::CommitFailed(e.to_string())
        })
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        let Self { tx } = *self;
        tx.rollback().await.map_err(db)
    }
}
