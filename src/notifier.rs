//! Confirmation emails sent to pending subscribers.

use crate::{
    domain::{Subscriber, SubscriberEmail},
    email_client::{Email, EmailError, EmailSender},
    templates::{RenderedTemplate, Template, TemplateName, TemplateStore},
};
use std::sync::Arc;

pub struct Notifier {
    templates: Arc<dyn TemplateStore>,
    email_sender: Arc<dyn EmailSender>,
    sender: SubscriberEmail,
    reply_to: Option<SubscriberEmail>,
    frontend_base_url: String,
    token_expiry_days: u32,
}

#[derive(thiserror::Error)]
pub enum NotifyError {
    #[error("Subscriber {0} has no confirmation token to send")]
    MissingToken(SubscriberEmail),
    #[error("Failed to deliver the confirmation email")]
    Delivery(#[source] EmailError),
}

impl Notifier {
    pub fn new(
        templates: Arc<dyn TemplateStore>,
        email_sender: Arc<dyn EmailSender>,
        sender: SubscriberEmail,
        reply_to: Option<SubscriberEmail>,
        frontend_base_url: String,
        token_expiry_days: u32,
    ) -> Self {
        Self {
            templates,
            email_sender,
            sender,
            reply_to,
            frontend_base_url: frontend_base_url.trim_end_matches('/').to_string(),
            token_expiry_days,
        }
    }

    /// Link to the frontend page that confirms `token`.
    pub fn confirmation_link(&self, token: &str) -> String {
        format!(
            "{}/subscribers/confirmation?token={}",
            self.frontend_base_url,
            urlencoding::encode(token)
        )
    }

    /// Link to the frontend page that unsubscribes `email`.
    pub fn unsubscribe_link(&self, email: &SubscriberEmail) -> String {
        format!(
            "{}/subscribers/unsubscribe?email={}",
            self.frontend_base_url,
            urlencoding::encode(email.as_ref())
        )
    }

    /// Send the pending `subscriber` an email with their confirmation link.
    #[tracing::instrument(
        name = "Send a confirmation email to a pending subscriber",
        skip(self, subscriber),
        fields(subscriber_email = %subscriber.email)
    )]
    pub async fn send_confirmation(&self, subscriber: &Subscriber) -> Result<(), NotifyError> {
        let token = subscriber
            .confirmation_token
            .as_ref()
            .ok_or_else(|| NotifyError::MissingToken(subscriber.email.clone()))?;

        let confirmation_link = self.confirmation_link(token.as_ref());
        let unsubscribe_link = self.unsubscribe_link(&subscriber.email);
        let days = self.token_expiry_days.to_string();
        let rendered = self
            .resolve(
                TemplateName::Confirmation,
                &[
                    ("USER", subscriber.email.local_part()),
                    ("EMAIL", subscriber.email.as_ref()),
                    ("URL", &confirmation_link),
                    ("UNSUBSCRIBE_URL", &unsubscribe_link),
                    ("DAYS", &days),
                ],
            )
            .await;

        let email = Email {
            to: subscriber.email.clone(),
            from: address_override(rendered.from_override.as_deref())
                .unwrap_or_else(|| self.sender.clone()),
            reply_to: address_override(rendered.reply_to_override.as_deref())
                .or_else(|| self.reply_to.clone()),
            subject: rendered.subject,
            html: rendered.html,
            text: rendered.text,
        };

        match self.email_sender.send(&email).await {
            Ok(()) => {
                tracing::info!("Confirmation email sent to {}", subscriber.email);
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    error.cause_chain = ?e,
                    "Failed to send confirmation email to {}",
                    subscriber.email
                );
                Err(NotifyError::Delivery(e))
            }
        }
    }

    /// Render the stored template, or the built-in one if the store has none
    /// or cannot be read.
    async fn resolve(&self, name: TemplateName, variables: &[(&str, &str)]) -> RenderedTemplate {
        let template = match self.templates.get(name).await {
            Ok(Some(template)) => template,
            Ok(None) => {
                tracing::debug!("No stored `{name}` template, using the built-in one");
                Template::fallback(name)
            }
            Err(e) => {
                tracing::error!(error.cause_chain = ?e, "Error getting email template `{name}`");
                Template::fallback(name)
            }
        };

        template.render(variables)
    }
}

/// A valid override address from a template. Invalid ones are logged and
/// ignored.
fn address_override(candidate: Option<&str>) -> Option<SubscriberEmail> {
    match SubscriberEmail::parse(candidate?.to_string()) {
        Ok(address) => Some(address),
        Err(e) => {
            tracing::warn!("Ignoring template address override: {e}");
            None
        }
    }
}
