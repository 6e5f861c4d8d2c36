mod subscriber;
mod subscriber_email;
mod subscription_state;
mod subscription_token;

pub use subscriber::{PendingSubscription, Subscriber};
pub use subscriber_email::SubscriberEmail;
pub use subscription_state::SubscriptionState;
pub use subscription_token::SubscriptionToken;
