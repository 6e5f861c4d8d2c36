//! The double opt-in workflow: subscribe, confirm and unsubscribe.
//!
//! [`SubscriptionService`] owns no state of its own. Every collaborator is
//! injected, so the same workflow runs against Postgres in production and
//! against in-memory fakes in tests.

use crate::{
    captcha::{CaptchaError, CaptchaVerdict, CaptchaVerifier},
    domain::{PendingSubscription, SubscriberEmail, SubscriptionState, SubscriptionToken},
    notifier::{NotifyError, Notifier},
    repository::{RepositoryError, SubscriberRepository},
};
use chrono::{Duration, Utc};
use std::{net::IpAddr, sync::Arc};

pub const SUBSCRIBE_MESSAGE: &str =
    "Subscription request received. Please check your email to confirm.";
pub const CONFIRM_MESSAGE: &str = "Your subscription has been confirmed. Thank you!";
pub const UNSUBSCRIBE_MESSAGE: &str = "You have been successfully unsubscribed.";

/// Machine readable reason attached to every failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, utoipa::ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    EmailRequired,
    EmailInvalid,
    CaptchaRequired,
    CaptchaInvalid,
    CaptchaVerifyError,
    EmailAlreadySubscribed,
    PendingSubscriptionCoolDown,
    TokenMissing,
    TokenInvalid,
    TokenExpired,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmailRequired => "EMAIL_REQUIRED",
            Self::EmailInvalid => "EMAIL_INVALID",
            Self::CaptchaRequired => "CAPTCHA_REQUIRED",
            Self::CaptchaInvalid => "CAPTCHA_INVALID",
            Self::CaptchaVerifyError => "CAPTCHA_VERIFY_ERROR",
            Self::EmailAlreadySubscribed => "EMAIL_ALREADY_SUBSCRIBED",
            Self::PendingSubscriptionCoolDown => "PENDING_SUBSCRIPTION_COOL_DOWN",
            Self::TokenMissing => "TOKEN_MISSING",
            Self::TokenInvalid => "TOKEN_INVALID",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Whether the failure is caused by the request rather than the server.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::CaptchaVerifyError | Self::InternalError)
    }
}

#[derive(thiserror::Error)]
pub enum SubscribeError {
    #[error("Email is required")]
    EmailRequired,
    #[error("Email is invalid")]
    EmailInvalid(String),
    #[error("Captcha token is required")]
    CaptchaRequired,
    #[error("Captcha verification failed")]
    CaptchaInvalid,
    #[error("Captcha verification error")]
    CaptchaUnavailable(#[source] CaptchaError),
    #[error("This email is already subscribed")]
    AlreadySubscribed,
    #[error("A confirmation email was sent recently. Please check your inbox or try again later")]
    CoolDown,
    #[error("Failed to store the subscription")]
    Repository(#[source] RepositoryError),
    #[error("Failed to send the confirmation email")]
    Notify(#[source] NotifyError),
}

impl SubscribeError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::EmailRequired => ErrorCode::EmailRequired,
            Self::EmailInvalid(_) => ErrorCode::EmailInvalid,
            Self::CaptchaRequired => ErrorCode::CaptchaRequired,
            Self::CaptchaInvalid => ErrorCode::CaptchaInvalid,
            Self::CaptchaUnavailable(_) => ErrorCode::CaptchaVerifyError,
            Self::AlreadySubscribed => ErrorCode::EmailAlreadySubscribed,
            Self::CoolDown => ErrorCode::PendingSubscriptionCoolDown,
            Self::Repository(_) | Self::Notify(_) => ErrorCode::InternalError,
        }
    }
}

#[derive(thiserror::Error)]
pub enum ConfirmError {
    #[error("Confirmation token is missing")]
    TokenMissing,
    #[error("Confirmation token is invalid")]
    TokenInvalid,
    #[error("Confirmation token has expired")]
    TokenExpired,
    #[error("Failed to confirm the subscription")]
    Repository(#[source] RepositoryError),
}

impl ConfirmError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::TokenMissing => ErrorCode::TokenMissing,
            Self::TokenInvalid => ErrorCode::TokenInvalid,
            Self::TokenExpired => ErrorCode::TokenExpired,
            Self::Repository(_) => ErrorCode::InternalError,
        }
    }
}

#[derive(thiserror::Error)]
pub enum UnsubscribeError {
    #[error("Email is required")]
    EmailRequired,
    #[error("Failed to unsubscribe")]
    Repository(#[source] RepositoryError),
}

impl UnsubscribeError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::EmailRequired => ErrorCode::EmailRequired,
            Self::Repository(_) => ErrorCode::InternalError,
        }
    }
}

pub struct SubscriptionService {
    subscribers: Arc<dyn SubscriberRepository>,
    captcha: Arc<dyn CaptchaVerifier>,
    notifier: Notifier,
    cooldown: Duration,
    token_ttl: Duration,
}

impl SubscriptionService {
    pub fn new(
        subscribers: Arc<dyn SubscriberRepository>,
        captcha: Arc<dyn CaptchaVerifier>,
        notifier: Notifier,
        cooldown: Duration,
        token_ttl: Duration,
    ) -> Self {
        Self {
            subscribers,
            captcha,
            notifier,
            cooldown,
            token_ttl,
        }
    }

    /// Start (or restart) the double opt-in cycle for `email`.
    #[tracing::instrument(
        name = "Subscribe to the newsletter",
        skip(self, email, captcha_token),
        fields(subscriber_email = tracing::field::Empty)
    )]
    pub async fn subscribe(
        &self,
        email: Option<String>,
        captcha_token: Option<String>,
        remote_ip: Option<IpAddr>,
    ) -> Result<&'static str, SubscribeError> {
        let email = non_blank(email).ok_or(SubscribeError::EmailRequired)?;
        let captcha_token = non_blank(captcha_token).ok_or(SubscribeError::CaptchaRequired)?;
        let email = SubscriberEmail::parse(email).map_err(SubscribeError::EmailInvalid)?;
        tracing::Span::current().record("subscriber_email", &tracing::field::display(&email));

        match self
            .captcha
            .verify(&captcha_token, remote_ip)
            .await
            .map_err(SubscribeError::CaptchaUnavailable)?
        {
            CaptchaVerdict::Passed => {}
            CaptchaVerdict::Rejected { error_codes, score } => {
                tracing::info!(?error_codes, ?score, "Captcha verification failed");
                return Err(SubscribeError::CaptchaInvalid);
            }
        }

        let now = Utc::now();
        let existing = self
            .subscribers
            .find_by_email(&email)
            .await
            .map_err(SubscribeError::Repository)?;

        if let Some(existing) = &existing {
            match existing.state {
                SubscriptionState::Subscribed => return Err(SubscribeError::AlreadySubscribed),
                SubscriptionState::Pending if existing.updated_at + self.cooldown > now => {
                    return Err(SubscribeError::CoolDown)
                }
                _ => {}
            }
        }

        let pending = PendingSubscription {
            email,
            token: SubscriptionToken::generate(),
            token_expires_at: now + self.token_ttl,
            requested_at: now,
        };
        let subscriber = match existing {
            Some(existing) => self.subscribers.reissue_pending(existing.id, &pending).await,
            None => self.subscribers.insert_pending(&pending).await,
        }
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => SubscribeError::AlreadySubscribed,
            e => SubscribeError::Repository(e),
        })?;

        self.notifier
            .send_confirmation(&subscriber)
            .await
            .map_err(SubscribeError::Notify)?;

        tracing::info!("Pending subscription stored and confirmation sent");
        Ok(SUBSCRIBE_MESSAGE)
    }

    /// Activate the subscription holding `token`.
    #[tracing::instrument(name = "Confirm a pending subscriber", skip(self, token))]
    pub async fn confirm(&self, token: Option<String>) -> Result<&'static str, ConfirmError> {
        let token = non_blank(token)
            .map(SubscriptionToken::from_raw)
            .ok_or(ConfirmError::TokenMissing)?;

        let subscriber = self
            .subscribers
            .find_by_token(&token)
            .await
            .map_err(ConfirmError::Repository)?
            .ok_or(ConfirmError::TokenInvalid)?;

        let now = Utc::now();
        if subscriber.token_expired(now) {
            return Err(ConfirmError::TokenExpired);
        }

        let confirmed = self
            .subscribers
            .mark_subscribed(subscriber.id, &token, now)
            .await
            .map_err(ConfirmError::Repository)?;
        if !confirmed {
            // Someone else used the token between lookup and update.
            return Err(ConfirmError::TokenInvalid);
        }

        tracing::info!("Subscriber {} confirmed", subscriber.email);
        Ok(CONFIRM_MESSAGE)
    }

    /// Stop sending to `email`. Unknown addresses get the same answer as
    /// known ones.
    #[tracing::instrument(name = "Unsubscribe from the newsletter", skip(self, email))]
    pub async fn unsubscribe(&self, email: Option<String>) -> Result<&'static str, UnsubscribeError> {
        let email = non_blank(email).ok_or(UnsubscribeError::EmailRequired)?;
        let email = match SubscriberEmail::parse(email) {
            Ok(email) => email,
            Err(e) => {
                tracing::debug!("Unsubscribe for an invalid email: {e}");
                return Ok(UNSUBSCRIBE_MESSAGE);
            }
        };

        let subscriber = self
            .subscribers
            .find_by_email(&email)
            .await
            .map_err(UnsubscribeError::Repository)?;

        match subscriber {
            Some(subscriber) if subscriber.state.can_unsubscribe() => {
                self.subscribers
                    .mark_unsubscribed(subscriber.id, Utc::now())
                    .await
                    .map_err(UnsubscribeError::Repository)?;
                tracing::info!("Subscriber {email} unsubscribed");
            }
            Some(_) => tracing::debug!("Subscriber {email} was already unsubscribed"),
            None => tracing::debug!("No subscriber found for {email}"),
        }

        Ok(UNSUBSCRIBE_MESSAGE)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
