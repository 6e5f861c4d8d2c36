use super::{SubscriberEmail, SubscriptionState, SubscriptionToken};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A stored subscriber row.
#[derive(Debug, Clone)]
pub struct Subscriber {
    pub id: Uuid,
    pub email: SubscriberEmail,
    pub state: SubscriptionState,
    pub confirmation_token: Option<SubscriptionToken>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub subscribed_at: Option<DateTime<Utc>>,
    pub confirmation_at: Option<DateTime<Utc>>,
    pub unsubscribed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscriber {
    /// A missing expiry counts as expired.
    pub fn token_expired(&self, now: DateTime<Utc>) -> bool {
        self.token_expires_at.map_or(true, |expires_at| expires_at < now)
    }
}

/// Data written when a pending cycle starts, either for a new email or when
/// a token is re-issued.
#[derive(Debug)]
pub struct PendingSubscription {
    pub email: SubscriberEmail,
    pub token: SubscriptionToken,
    pub token_expires_at: DateTime<Utc>,
    pub requested_at: DateTime<Utc>,
}
