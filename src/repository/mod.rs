//! Persistence of subscribers.
//!
//! The workflow only talks to [`SubscriberRepository`]; Postgres is used in
//! production and the in-memory store for local runs and tests.

mod in_memory;
mod postgres;

pub use in_memory::InMemorySubscriberRepository;
pub use postgres::PostgresSubscriberRepository;

use crate::domain::{PendingSubscription, Subscriber, SubscriberEmail, SubscriptionToken};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[async_trait]
pub trait SubscriberRepository: Send + Sync {
    async fn find_by_email(
        &self,
        email: &SubscriberEmail,
    ) -> Result<Option<Subscriber>, RepositoryError>;

    async fn find_by_token(
        &self,
        token: &SubscriptionToken,
    ) -> Result<Option<Subscriber>, RepositoryError>;

    /// Insert a new pending subscriber. Fails with [`RepositoryError::Conflict`]
    /// if a row with the same email already exists.
    async fn insert_pending(
        &self,
        pending: &PendingSubscription,
    ) -> Result<Subscriber, RepositoryError>;

    /// Restart the pending cycle on an existing row, overwriting any previous
    /// token.
    async fn reissue_pending(
        &self,
        id: Uuid,
        pending: &PendingSubscription,
    ) -> Result<Subscriber, RepositoryError>;

    /// Move the subscriber holding `token` to `subscribed` and clear the token.
    /// Returns `false` if no row holds the token anymore.
    async fn mark_subscribed(
        &self,
        id: Uuid,
        token: &SubscriptionToken,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    async fn mark_unsubscribed(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), RepositoryError>;

    /// Whether the backing store is reachable.
    async fn is_healthy(&self) -> bool;
}

#[derive(thiserror::Error)]
pub enum RepositoryError {
    #[error("A subscriber with email {0} already exists")]
    Conflict(String),
    #[error("Failed to execute query")]
    Database(#[source] sqlx::Error),
    #[error("Stored subscriber data is invalid: {0}")]
    InvalidRow(String),
}
