use super::{RepositoryError, SubscriberRepository};
use crate::domain::{
    PendingSubscription, Subscriber, SubscriberEmail, SubscriptionState, SubscriptionToken,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use std::sync::Arc;
use uuid::Uuid;

const SUBSCRIBER_COLUMNS: &str = "id, email, subscription_state, confirmation_token, \
    token_expires_at, subscribed_at, confirmation_at, unsubscribed_at, created_at, updated_at";

/// Subscribers stored in the `subscribers` table.
#[derive(Debug, Clone)]
pub struct PostgresSubscriberRepository {
    pool: Arc<PgPool>,
}

impl PostgresSubscriberRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriberRepository for PostgresSubscriberRepository {
    #[tracing::instrument(name = "Find subscriber by email", skip(self))]
    async fn find_by_email(
        &self,
        email: &SubscriberEmail,
    ) -> Result<Option<Subscriber>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {SUBSCRIBER_COLUMNS} FROM subscribers WHERE email = $1"
        ))
        .bind(email.as_ref())
        .fetch_optional(self.pool.as_ref())
        .await
        .map_err(into_repository_error)?;

        row.as_ref().map(subscriber_from_row).transpose()
    }

    #[tracing::instrument(name = "Find subscriber by confirmation token", skip(self, token))]
    async fn find_by_token(
        &self,
        token: &SubscriptionToken,
    ) -> Result<Option<Subscriber>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {SUBSCRIBER_COLUMNS} FROM subscribers WHERE confirmation_token = $1"
        ))
        .bind(token.as_ref())
        .fetch_optional(self.pool.as_ref())
        .await
        .map_err(into_repository_error)?;

        row.as_ref().map(subscriber_from_row).transpose()
    }

    #[tracing::instrument(
        name = "Saving new pending subscriber in database",
        skip(self, pending),
        fields(subscriber_email = %pending.email)
    )]
    async fn insert_pending(
        &self,
        pending: &PendingSubscription,
    ) -> Result<Subscriber, RepositoryError> {
        let row = sqlx::query(&format!(
            r#"INSERT INTO subscribers (
                id, email, subscription_state, confirmation_token, token_expires_at,
                subscribed_at, confirmation_at, unsubscribed_at, created_at, updated_at
            )
            VALUES ($1, $2, 'pending', $3, $4, $5, NULL, NULL, $5, $5)
            RETURNING {SUBSCRIBER_COLUMNS}"#
        ))
        .bind(Uuid::new_v4())
        .bind(pending.email.as_ref())
        .bind(pending.token.as_ref())
        .bind(pending.token_expires_at)
        .bind(pending.requested_at)
        .fetch_one(self.pool.as_ref())
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_error) if db_error.is_unique_violation() => {
                RepositoryError::Conflict(pending.email.to_string())
            }
            e => into_repository_error(e),
        })?;
        tracing::info!("New subscriber details have been saved");

        subscriber_from_row(&row)
    }

    #[tracing::instrument(
        name = "Re-issuing confirmation token in database",
        skip(self, pending),
        fields(subscriber_email = %pending.email)
    )]
    async fn reissue_pending(
        &self,
        id: Uuid,
        pending: &PendingSubscription,
    ) -> Result<Subscriber, RepositoryError> {
        let row = sqlx::query(&format!(
            r#"UPDATE subscribers
            SET subscription_state = 'pending',
                confirmation_token = $2,
                token_expires_at = $3,
                subscribed_at = $4,
                confirmation_at = NULL,
                unsubscribed_at = NULL,
                updated_at = $4
            WHERE id = $1
            RETURNING {SUBSCRIBER_COLUMNS}"#
        ))
        .bind(id)
        .bind(pending.token.as_ref())
        .bind(pending.token_expires_at)
        .bind(pending.requested_at)
        .fetch_one(self.pool.as_ref())
        .await
        .map_err(into_repository_error)?;

        subscriber_from_row(&row)
    }

    #[tracing::instrument(name = "Mark subscriber as subscribed", skip(self, token))]
    async fn mark_subscribed(
        &self,
        id: Uuid,
        token: &SubscriptionToken,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let updated = sqlx::query(
            r#"UPDATE subscribers
            SET subscription_state = 'subscribed',
                confirmation_at = $3,
                subscribed_at = $3,
                confirmation_token = NULL,
                token_expires_at = NULL,
                updated_at = $3
            WHERE id = $1 AND confirmation_token = $2"#,
        )
        .bind(id)
        .bind(token.as_ref())
        .bind(now)
        .execute(self.pool.as_ref())
        .await
        .map_err(into_repository_error)?
        .rows_affected();

        Ok(updated > 0)
    }

    #[tracing::instrument(name = "Mark subscriber as unsubscribed", skip(self))]
    async fn mark_unsubscribed(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"UPDATE subscribers
            SET subscription_state = 'unsubscribed',
                unsubscribed_at = $2,
                confirmation_token = NULL,
                token_expires_at = NULL,
                updated_at = $2
            WHERE id = $1"#,
        )
        .bind(id)
        .bind(now)
        .execute(self.pool.as_ref())
        .await
        .map_err(into_repository_error)?;

        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        self.pool
            .acquire()
            .await
            .map_err(|e| {
                tracing::error!("{:?}", e);
                e
            })
            .is_ok()
    }
}

fn into_repository_error(e: sqlx::Error) -> RepositoryError {
    tracing::error!("Failed to execute query: {e:?}");
    RepositoryError::Database(e)
}

fn subscriber_from_row(row: &PgRow) -> Result<Subscriber, RepositoryError> {
    let email: String = row.try_get("email").map_err(RepositoryError::Database)?;
    let state: String = row
        .try_get("subscription_state")
        .map_err(RepositoryError::Database)?;
    let token: Option<String> = row
        .try_get("confirmation_token")
        .map_err(RepositoryError::Database)?;

    Ok(Subscriber {
        id: row.try_get("id").map_err(RepositoryError::Database)?,
        email: SubscriberEmail::parse(email).map_err(RepositoryError::InvalidRow)?,
        state: SubscriptionState::parse(&state).map_err(RepositoryError::InvalidRow)?,
        confirmation_token: token.map(SubscriptionToken::from_raw),
        token_expires_at: row
            .try_get("token_expires_at")
            .map_err(RepositoryError::Database)?,
        subscribed_at: row
            .try_get("subscribed_at")
            .map_err(RepositoryError::Database)?,
        confirmation_at: row
            .try_get("confirmation_at")
            .map_err(RepositoryError::Database)?,
        unsubscribed_at: row
            .try_get("unsubscribed_at")
            .map_err(RepositoryError::Database)?,
        created_at: row.try_get("created_at").map_err(RepositoryError::Database)?,
        updated_at: row.try_get("updated_at").map_err(RepositoryError::Database)?,
    })
}
