//! Human verification through an external captcha provider.
//!
//! Both supported providers expose the same `siteverify` style API: a form
//! POST carrying the server secret and the client token, answered with a JSON
//! verdict. [`CaptchaVerifier`] hides which one is configured.

mod recaptcha;
mod turnstile;

pub use recaptcha::RecaptchaVerifier;
pub use turnstile::TurnstileVerifier;

use async_trait::async_trait;
use std::net::IpAddr;

#[async_trait]
pub trait CaptchaVerifier: Send + Sync {
    async fn verify(
        &self,
        token: &str,
        remote_ip: Option<IpAddr>,
    ) -> Result<CaptchaVerdict, CaptchaError>;
}

/// The provider's answer about a client token.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptchaVerdict {
    Passed,
    Rejected {
        error_codes: Vec<String>,
        score: Option<f64>,
    },
}

impl CaptchaVerdict {
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

/// The provider could not give an answer. Distinct from a rejected token.
#[derive(thiserror::Error)]
pub enum CaptchaError {
    #[error("The captcha secret key is not configured")]
    MissingSecret,
    #[error("Failed to reach the captcha provider")]
    Request(#[source] reqwest::Error),
}

/// Form body shared by both providers.
#[derive(serde::Serialize)]
struct SiteVerifyForm<'a> {
    secret: &'a str,
    response: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    remoteip: Option<String>,
}

impl<'a> SiteVerifyForm<'a> {
    fn new(secret: &'a str, response: &'a str, remote_ip: Option<IpAddr>) -> Self {
        Self {
            secret,
            response,
            remoteip: remote_ip.map(|ip| ip.to_string()),
        }
    }
}
