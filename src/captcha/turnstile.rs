use super::{CaptchaError, CaptchaVerdict, CaptchaVerifier, SiteVerifyForm};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use std::{net::IpAddr, time::Duration};

pub const TURNSTILE_VERIFY_URL: &str =
    "https://challenges.cloudflare.com/turnstile/v0/siteverify";

/// Verifies tokens with Cloudflare Turnstile.
#[derive(Debug)]
pub struct TurnstileVerifier {
    http_client: Client,
    verify_url: String,
    secret_key: Secret<String>,
}

#[derive(Debug, serde::Deserialize)]
struct TurnstileResponse {
    success: bool,
    #[serde(rename = "error-codes", default)]
    error_codes: Vec<String>,
}

impl TurnstileVerifier {
    pub fn new(
        verify_url: Option<String>,
        secret_key: Secret<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http_client: Client::builder().timeout(timeout).build()?,
            verify_url: verify_url.unwrap_or_else(|| TURNSTILE_VERIFY_URL.to_string()),
            secret_key,
        })
    }
}

#[async_trait]
impl CaptchaVerifier for TurnstileVerifier {
    #[tracing::instrument(name = "Verify Turnstile token", skip(self, token))]
    async fn verify(
        &self,
        token: &str,
        remote_ip: Option<IpAddr>,
    ) -> Result<CaptchaVerdict, CaptchaError> {
        let secret = self.secret_key.expose_secret();
        if secret.is_empty() {
            tracing::error!("Turnstile secret key is not configured");
            return Err(CaptchaError::MissingSecret);
        }

        let outcome: TurnstileResponse = self
            .http_client
            .post(&self.verify_url)
            .form(&SiteVerifyForm::new(secret, token, remote_ip))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(CaptchaError::Request)?
            .json()
            .await
            .map_err(CaptchaError::Request)?;

        if outcome.success {
            Ok(CaptchaVerdict::Passed)
        } else {
            tracing::warn!(error_codes = ?outcome.error_codes, "Captcha verification failed");
            Ok(CaptchaVerdict::Rejected {
                error_codes: outcome.error_codes,
                score: None,
            })
        }
    }
}
