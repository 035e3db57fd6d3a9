//! Row decoding and value conversion.

use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{Postgres, Row};
use taskmarket_core::model::{
    Account, Consumer, Notification, Offer, PaymentCommand, PaymentKind, PaymentMethod,
    PaymentMethodKind, Provider, Request, Review,
};
use taskmarket_core::money::Money;
use taskmarket_core::store::StoreError;

pub(crate) fn db(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Serialization(format!("{column}: {e}")))
}

fn money(cents: i64, column: &str) -> Result<Money, StoreError> {
    u64::try_from(cents)
        .map(Money::from_cents)
        .map_err(|_| StoreError::Serialization(format!("{column}: negative amount {cents}")))
}

fn count(value: i32, column: &str) -> Result<u32, StoreError> {
    u32::try_from(value)
        .map_err(|_| StoreError::Serialization(format!("{column}: negative count {value}")))
}

pub(crate) fn cents(amount: Money) -> Result<i64, StoreError> {
    i64::try_from(amount.cents())
        .map_err(|_| StoreError::Serialization(format!("amount out of range: {amount}")))
}

pub(crate) fn counter(value: u32) -> Result<i32, StoreError> {
    i32::try_from(value)
        .map_err(|_| StoreError::Serialization(format!("counter out of range: {value}")))
}

pub(crate) fn account(row: &PgRow) -> Result<Account, StoreError> {
    Ok(Account {
        id: get::<uuid::Uuid>(row, "id")?.into(),
        email: get(row, "email")?,
        full_name: get(row, "full_name")?,
    })
}

pub(crate) fn consumer(row: &PgRow) -> Result<Consumer, StoreError> {
    Ok(Consumer {
        id: get::<uuid::Uuid>(row, "id")?.into(),
        account: get::<uuid::Uuid>(row, "account_id")?.into(),
        requests_posted: count(get(row, "requests_posted")?, "requests_posted")?,
        requests_completed: count(get(row, "requests_completed")?, "requests_completed")?,
    })
}

pub(crate) fn provider(row: &PgRow) -> Result<Provider, StoreError> {
    Ok(Provider {
        id: get::<uuid::Uuid>(row, "id")?.into(),
        account: get::<uuid::Uuid>(row, "account_id")?.into(),
        description: get(row, "description")?,
        total_rating: count(get(row, "total_rating")?, "total_rating")?,
        review_count: count(get(row, "review_count")?, "review_count")?,
        is_premium: get(row, "is_premium")?,
        is_subscription_active: get(row, "is_subscription_active")?,
        subscription_date: get(row, "subscription_date")?,
    })
}

pub(crate) fn payment_method(row: &PgRow) -> Result<PaymentMethod, StoreError> {
    let Json(kind) = get::<Json<PaymentMethodKind>>(row, "kind")?;
    Ok(PaymentMethod {
        id: get::<uuid::Uuid>(row, "id")?.into(),
        account: get::<uuid::Uuid>(row, "account_id")?.into(),
        kind,
        created_at: get(row, "created_at")?,
    })
}

pub(crate) fn request(row: &PgRow) -> Result<Request, StoreError> {
    Ok(Request {
        id: get::<uuid::Uuid>(row, "id")?.into(),
        consumer: get::<uuid::Uuid>(row, "consumer_id")?.into(),
        title: get(row, "title")?,
        description: get(row, "description")?,
        location: get(row, "location")?,
        budget: money(get(row, "budget_cents")?, "budget_cents")?,
        due_date: get(row, "due_date")?,
        remote_eligible: get(row, "remote_eligible")?,
        selected_offer: get::<Option<uuid::Uuid>>(row, "selected_offer_id")?.map(Into::into),
        completed_date: get(row, "completed_date")?,
        created_at: get(row, "created_at")?,
    })
}

pub(crate) fn offer(row: &PgRow) -> Result<Offer, StoreError> {
    let price = get::<Option<i64>>(row, "price_cents")?
        .map(|cents| money(cents, "price_cents"))
        .transpose()?;
    Ok(Offer {
        id: get::<uuid::Uuid>(row, "id")?.into(),
        provider: get::<uuid::Uuid>(row, "provider_id")?.into(),
        request: get::<uuid::Uuid>(row, "request_id")?.into(),
        price,
        created_at: get(row, "created_at")?,
    })
}

pub(crate) fn payment_command(row: &PgRow) -> Result<PaymentCommand, StoreError> {
    let kind: String = get(row, "kind")?;
    let kind = PaymentKind::parse(&kind)
        .ok_or_else(|| StoreError::Serialization(format!("kind: unknown payment kind {kind}")))?;
    Ok(PaymentCommand {
        id: get::<uuid::Uuid>(row, "id")?.into(),
        from: get::<Option<uuid::Uuid>>(row, "from_method_id")?.map(Into::into),
        to: get::<Option<uuid::Uuid>>(row, "to_method_id")?.map(Into::into),
        amount: money(get(row, "amount_cents")?, "amount_cents")?,
        kind,
        executed_at: get(row, "executed_at")?,
    })
}

pub(crate) fn notification(row: &PgRow) -> Result<Notification, StoreError> {
    Ok(Notification {
        id: get::<uuid::Uuid>(row, "id")?.into(),
        account: get::<uuid::Uuid>(row, "account_id")?.into(),
        title: get(row, "title")?,
        content: get(row, "content")?,
        created_at: get(row, "created_at")?,
    })
}

pub(crate) fn review(row: &PgRow) -> Result<Review, StoreError> {
    let rating: i16 = get(row, "rating")?;
    Ok(Review {
        id: get::<uuid::Uuid>(row, "id")?.into(),
        request: get::<uuid::Uuid>(row, "request_id")?.into(),
        rating: u8::try_from(rating)
            .map_err(|_| StoreError::Serialization(format!("rating: out of range {rating}")))?,
        description: get(row, "description")?,
        created_at: get(row, "created_at")?,
    })
}
