//! Admin-managed email templates and their rendering.

mod in_memory;
mod postgres;
mod render;

pub use in_memory::InMemoryTemplateStore;
pub use postgres::PostgresTemplateStore;
pub use render::{html_to_text, substitute_placeholders};

use async_trait::async_trait;
use std::{fmt::Display, str::FromStr};

/// The templates the service knows how to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateName {
    Confirmation,
}

impl AsRef<str> for TemplateName {
    fn as_ref(&self) -> &str {
        match self {
            Self::Confirmation => "confirmation",
        }
    }
}

impl Display for TemplateName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl FromStr for TemplateName {
    type Err = TemplateStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmation" => Ok(Self::Confirmation),
            other => Err(TemplateStoreError::UnknownTemplate(other.to_string())),
        }
    }
}

/// An email template with `{{ VAR }}` placeholders in subject and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub subject: String,
    /// HTML body.
    pub body: String,
    pub from_override: Option<String>,
    pub reply_to_override: Option<String>,
}

/// Built-in confirmation template used whenever no stored template can be
/// resolved.
pub const FALLBACK_CONFIRMATION_SUBJECT: &str = "Please confirm your newsletter subscription";
pub const FALLBACK_CONFIRMATION_BODY: &str = r#"<h1>Welcome {{USER}}!</h1>
<p>Thank you for subscribing to our newsletter. Please click the link below to confirm your email address:</p>
<a href="{{URL}}" target="_blank" style="background-color: #007cba; color: white; padding: 10px 20px; text-decoration: none; border-radius: 5px; display: inline-block;">Confirm subscription</a>
<p>This link expires in {{DAYS}} days.</p>
<hr>
<p>If you did not request this subscription, you can safely ignore this email.</p>
<p>To unsubscribe in the future, visit: <a href="{{UNSUBSCRIBE_URL}}">unsubscribe</a>.</p>"#;

impl Template {
    pub fn fallback(name: TemplateName) -> Self {
        match name {
            TemplateName::Confirmation => Self {
                subject: FALLBACK_CONFIRMATION_SUBJECT.to_string(),
                body: FALLBACK_CONFIRMATION_BODY.to_string(),
                from_override: None,
                reply_to_override: None,
            },
        }
    }

    /// Substitute `variables` into subject and body and derive a plain text
    /// version of the body.
    pub fn render(&self, variables: &[(&str, &str)]) -> RenderedTemplate {
        let html = substitute_placeholders(&self.body, variables);
        RenderedTemplate {
            subject: substitute_placeholders(&self.subject, variables),
            text: html_to_text(&html),
            html,
            from_override: self.from_override.clone(),
            reply_to_override: self.reply_to_override.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedTemplate {
    pub subject: String,
    pub html: String,
    pub text: String,
    pub from_override: Option<String>,
    pub reply_to_override: Option<String>,
}

/// Key/value storage for templates, editable by administrators.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn get(&self, name: TemplateName) -> Result<Option<Template>, TemplateStoreError>;

    async fn put(&self, name: TemplateName, template: &Template) -> Result<(), TemplateStoreError>;
}

#[derive(thiserror::Error)]
pub enum TemplateStoreError {
    #[error("Unknown template: {0}")]
    UnknownTemplate(String),
    #[error("Failed to access the template store")]
    Database(#[source] sqlx::Error),
}

/// Store `template` under `name`, logging the outcome.
#[tracing::instrument(name = "Update email template", skip(store, template))]
pub async fn update_template(
    store: &dyn TemplateStore,
    name: &str,
    template: &Template,
) -> Result<(), TemplateStoreError> {
    let result = match name.parse::<TemplateName>() {
        Ok(name) => store.put(name, template).await,
        Err(e) => Err(e),
    };

    match &result {
        Ok(()) => tracing::info!("Email template {name} updated successfully"),
        Err(e) => tracing::error!(error.cause_chain = ?e, "Failed to update email template {name}"),
    }
    result
}
