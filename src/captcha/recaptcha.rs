use super::{CaptchaError, CaptchaVerdict, CaptchaVerifier, SiteVerifyForm};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use std::{net::IpAddr, time::Duration};

pub const RECAPTCHA_VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

/// Verifies tokens with Google reCAPTCHA. v3 responses carry a score which
/// must reach `min_score` for the token to pass.
#[derive(Debug)]
pub struct RecaptchaVerifier {
    http_client: Client,
    verify_url: String,
    secret_key: Secret<String>,
    min_score: f64,
}

#[derive(Debug, serde::Deserialize)]
struct RecaptchaResponse {
    success: bool,
    score: Option<f64>,
    action: Option<String>,
    #[serde(rename = "error-codes", default)]
    error_codes: Vec<String>,
}

impl RecaptchaVerifier {
    pub fn new(
        verify_url: Option<String>,
        secret_key: Secret<String>,
        min_score: f64,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http_client: Client::builder().timeout(timeout).build()?,
            verify_url: verify_url.unwrap_or_else(|| RECAPTCHA_VERIFY_URL.to_string()),
            secret_key,
            min_score,
        })
    }
}

#[async_trait]
impl CaptchaVerifier for RecaptchaVerifier {
    #[tracing::instrument(name = "Verify reCAPTCHA token", skip(self, token))]
    async fn verify(
        &self,
        token: &str,
        remote_ip: Option<IpAddr>,
    ) -> Result<CaptchaVerdict, CaptchaError> {
        let secret = self.secret_key.expose_secret();
        if secret.is_empty() {
            tracing::error!("reCAPTCHA secret key is not configured");
            return Err(CaptchaError::MissingSecret);
        }

        let outcome: RecaptchaResponse = self
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

        let score_ok = outcome.score.map_or(true, |score| score >= self.min_score);
        if outcome.success && score_ok {
            return Ok(CaptchaVerdict::Passed);
        }

        tracing::warn!(
            error_codes = ?outcome.error_codes,
            score = ?outcome.score,
            action = ?outcome.action,
            min_score = self.min_score,
            "Captcha verification failed"
        );
        Ok(CaptchaVerdict::Rejected {
            error_codes: outcome.error_codes,
            score: outcome.score,
        })
    }
}
