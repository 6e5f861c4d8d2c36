//! Delivery of emails through an HTTP email API.
//!
//! The wire format follows Postmark's `/email` endpoint. Anything able to
//! deliver an [`Email`] can stand in through the [`EmailSender`] trait.

use crate::{configuration::EmailClientSettings, domain::SubscriberEmail};
use async_trait::async_trait;
use reqwest::{Client, Url};
use secrecy::{ExposeSecret, Secret};
use std::time::Duration;

/// A fully rendered email ready to be delivered.
#[derive(Debug, Clone)]
pub struct Email {
    pub to: SubscriberEmail,
    pub from: SubscriberEmail,
    pub reply_to: Option<SubscriberEmail>,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), EmailError>;
}

#[derive(thiserror::Error)]
pub enum EmailError {
    #[error("Failed to send email to {1}")]
    Request(#[source] reqwest::Error, SubscriberEmail),
}

#[derive(Debug)]
pub struct EmailClient {
    base_url: Url,
    http_client: Client,
    authorization_token: Secret<String>,
}

impl EmailClient {
    /// Create a new email client.
    pub fn new(
        base_url: Url,
        authorization_token: Secret<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            base_url,
            http_client: Client::builder().timeout(timeout).build()?,
            authorization_token,
        })
    }
}

#[async_trait]
impl EmailSender for EmailClient {
    #[tracing::instrument(
        name = "Send email",
        skip(self, email),
        fields(recipient = %email.to, subject = %email.subject)
    )]
    async fn send(&self, email: &Email) -> Result<(), EmailError> {
        let url = self
            .base_url
            .join("email")
            .expect("url to always be valid at this point");
        let request_body = SendEmailRequest {
            from: email.from.as_ref(),
            to: email.to.as_ref(),
            reply_to: email.reply_to.as_ref().map(AsRef::as_ref),
            subject: &email.subject,
            text_body: &email.text,
            html_body: &email.html,
        };

        self.http_client
            .post(url)
            .header(
                "X-Postmark-Server-Token",
                self.authorization_token.expose_secret(),
            )
            .json(&request_body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| EmailError::Request(e, email.to.clone()))?;

        Ok(())
    }
}

impl TryFrom<&EmailClientSettings> for EmailClient {
    type Error = String;

    fn try_from(config: &EmailClientSettings) -> Result<Self, Self::Error> {
        Self::new(
            config.base_url().map_err(|e| {
                tracing::error!("Unable to parse email client's base url: {e}");
                "Email base url is invalid".to_string()
            })?,
            config.authorization_token.clone(),
            config.timeout(),
        )
        .map_err(|e| format!("Failed to build the email HTTP client: {e}"))
    }
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
    subject: &'a str,
    text_body: &'a str,
    html_body: &'a str,
}
