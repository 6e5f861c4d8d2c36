use super::{RepositoryError, SubscriberRepository};
use crate::domain::{
    PendingSubscription, Subscriber, SubscriberEmail, SubscriptionState, SubscriptionToken,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Subscribers kept in process memory, keyed by email.
#[derive(Debug, Default)]
pub struct InMemorySubscriberRepository {
    subscribers: RwLock<HashMap<SubscriberEmail, Subscriber>>,
}

impl InMemorySubscriberRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored subscriber.
    pub async fn all(&self) -> Vec<Subscriber> {
        self.subscribers.read().await.values().cloned().collect()
    }

    /// Apply `f` to the subscriber with `email`, if any. Lets tests move
    /// timestamps into the past.
    pub async fn modify<F>(&self, email: &SubscriberEmail, f: F) -> bool
    where
        F: FnOnce(&mut Subscriber),
    {
        match self.subscribers.write().await.get_mut(email) {
            Some(subscriber) => {
                f(subscriber);
                true
            }
            None => false,
        }
    }

    fn start_pending(subscriber: &mut Subscriber, pending: &PendingSubscription) {
        subscriber.state = SubscriptionState::Pending;
        subscriber.confirmation_token = Some(pending.token.clone());
        subscriber.token_expires_at = Some(pending.token_expires_at);
        subscriber.subscribed_at = Some(pending.requested_at);
        subscriber.confirmation_at = None;
        subscriber.unsubscribed_at = None;
        subscriber.updated_at = pending.requested_at;
    }
}

#[async_trait]
impl SubscriberRepository for InMemorySubscriberRepository {
    async fn find_by_email(
        &self,
        email: &SubscriberEmail,
    ) -> Result<Option<Subscriber>, RepositoryError> {
        Ok(self.subscribers.read().await.get(email).cloned())
    }

    async fn find_by_token(
        &self,
        token: &SubscriptionToken,
    ) -> Result<Option<Subscriber>, RepositoryError> {
        Ok(self
            .subscribers
            .read()
            .await
            .values()
            .find(|s| s.confirmation_token.as_ref() == Some(token))
            .cloned())
    }

    async fn insert_pending(
        &self,
        pending: &PendingSubscription,
    ) -> Result<Subscriber, RepositoryError> {
        let mut subscribers = self.subscribers.write().await;
        if subscribers.contains_key(&pending.email) {
            return Err(RepositoryError::Conflict(pending.email.to_string()));
        }

        let mut subscriber = Subscriber {
            id: Uuid::new_v4(),
            email: pending.email.clone(),
            state: SubscriptionState::Pending,
            confirmation_token: None,
            token_expires_at: None,
            subscribed_at: None,
            confirmation_at: None,
            unsubscribed_at: None,
            created_at: pending.requested_at,
            updated_at: pending.requested_at,
        };
        Self::start_pending(&mut subscriber, pending);
        subscribers.insert(pending.email.clone(), subscriber.clone());

        Ok(subscriber)
    }

    async fn reissue_pending(
        &self,
        id: Uuid,
        pending: &PendingSubscription,
    ) -> Result<Subscriber, RepositoryError> {
        let mut subscribers = self.subscribers.write().await;
        let subscriber = subscribers
            .values_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| RepositoryError::InvalidRow(format!("no subscriber with id {id}")))?;
        Self::start_pending(subscriber, pending);

        Ok(subscriber.clone())
    }

    async fn mark_subscribed(
        &self,
        id: Uuid,
        token: &SubscriptionToken,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut subscribers = self.subscribers.write().await;
        let Some(subscriber) = subscribers
            .values_mut()
            .find(|s| s.id == id && s.confirmation_token.as_ref() == Some(token))
        else {
            return Ok(false);
        };

        subscriber.state = SubscriptionState::Subscribed;
        subscriber.confirmation_at = Some(now);
        subscriber.subscribed_at = Some(now);
        subscriber.confirmation_token = None;
        subscriber.token_expires_at = None;
        subscriber.updated_at = now;

        Ok(true)
    }

    async fn mark_unsubscribed(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), RepositoryError> {
        let mut subscribers = self.subscribers.write().await;
        if let Some(subscriber) = subscribers.values_mut().find(|s| s.id == id) {
            subscriber.state = SubscriptionState::Unsubscribed;
            subscriber.unsubscribed_at = Some(now);
            subscriber.confirmation_token = None;
            subscriber.token_expires_at = None;
            subscriber.updated_at = now;
        }

        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}
