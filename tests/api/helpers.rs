use derive_getters::Getters;
use newsletter::{
    configuration::{get_configuration, CaptchaProvider},
    domain::{Subscriber, SubscriberEmail},
    repository::{InMemorySubscriberRepository, SubscriberRepository},
    telemetry::{get_subscriber, init_subscriber},
    templates::InMemoryTemplateStore,
    App,
};
use once_cell::sync::Lazy;
use reqwest::Url;
use std::sync::Arc;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

pub const CAPTCHA_TOKEN: &str = "XXXX.DUMMY.TOKEN.XXXX";

static TRACING: Lazy<()> = Lazy::new(|| {
    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = get_subscriber("test".into(), std::io::stdout);
        init_subscriber(subscriber).expect("Failed to init tracing");
    } else {
        let subscriber = get_subscriber("test".into(), std::io::sink);
        init_subscriber(subscriber).expect("Failed to init tracing");
    };
});

#[derive(Getters)]
pub struct TestApp {
    address: String,
    captcha_server: MockServer,
    email_server: MockServer,
    subscribers: Arc<InMemorySubscriberRepository>,
    templates: Arc<InMemoryTemplateStore>,
    api_client: reqwest::Client,
}

/// Links embedded in a confirmation email.
#[derive(Debug)]
pub struct ConfirmationLinks {
    pub confirmation: Url,
    pub unsubscribe: Url,
}

impl ConfirmationLinks {
    /// The token carried by the confirmation link.
    pub fn token(&self) -> String {
        self.confirmation
            .query_pairs()
            .find(|(key, _)| key == "token")
            .map(|(_, value)| value.into_owned())
            .expect("Confirmation link has no token")
    }
}

/// Spawn an instance of the app on a random port, with in-memory stores and
/// mock servers standing in for the captcha provider and the email API.
pub async fn spawn_app() -> TestApp {
    Lazy::force(&TRACING);

    let captcha_server = MockServer::start().await;
    let email_server = MockServer::start().await;
    let config = {
        let mut c = get_configuration().expect("Failed to read configuration");

        // Make OS choose random port
        c.application.port = 0;
        c.database = None;
        c.email_client.base_url = email_server.uri();
        c.captcha.provider = CaptchaProvider::Turnstile;
        c.captcha.verify_url = Some(format!("{}/siteverify", captcha_server.uri()));

        c
    };

    let subscribers = Arc::new(InMemorySubscriberRepository::new());
    let templates = Arc::new(InMemoryTemplateStore::new());
    let app = App::with_stores(config, subscribers.clone(), templates.clone())
        .expect("Failed to build application");
    let address = format!("http://127.0.0.1:{}", app.port());

    // Start server
    let _ = tokio::spawn(app.run_until_stopped());

    TestApp {
        address,
        captcha_server,
        email_server,
        subscribers,
        templates,
        api_client: reqwest::Client::new(),
    }
}

impl TestApp {
    pub fn at_url(&self, path: &str) -> String {
        format!("{}{path}", self.address)
    }

    pub async fn health_check(&self) -> reqwest::Response {
        self.api_client
            .get(self.at_url("/health"))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post_subscribe(&self, body: serde_json::Value) -> reqwest::Response {
        self.api_client
            .post(self.at_url("/subscribers/subscribe"))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Subscribe `email` with a valid captcha token.
    pub async fn subscribe(&self, email: &str) -> reqwest::Response {
        self.post_subscribe(serde_json::json!({
            "email": email,
            "captchaToken": CAPTCHA_TOKEN,
        }))
        .await
    }

    pub async fn get_confirm(&self, token: Option<&str>) -> reqwest::Response {
        let mut request = self.api_client.get(self.at_url("/subscribers/confirm"));
        if let Some(token) = token {
            request = request.query(&[("token", token)]);
        }
        request.send().await.expect("Failed to execute request")
    }

    pub async fn get_unsubscribe(&self, email: Option<&str>) -> reqwest::Response {
        let mut request = self.api_client.get(self.at_url("/subscribers/unsubscribe"));
        if let Some(email) = email {
            request = request.query(&[("email", email)]);
        }
        request.send().await.expect("Failed to execute request")
    }

    /// Answer every captcha verification with `success`.
    pub async fn mock_captcha(&self, success: bool) {
        let body = if success {
            serde_json::json!({ "success": true })
        } else {
            serde_json::json!({ "success": false, "error-codes": ["invalid-input-response"] })
        };

        Mock::given(path("/siteverify"))
            .and(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.captcha_server)
            .await;
    }

    pub async fn mock_send_email_endpoint_to_ok(&self) {
        Mock::given(path("/email"))
            .and(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&self.email_server)
            .await;
    }

    pub async fn sent_emails(&self) -> Vec<wiremock::Request> {
        self.email_server
            .received_requests()
            .await
            .unwrap_or_default()
    }

    /// Extract the links from the last email sent by the app.
    pub async fn last_confirmation_links(&self) -> ConfirmationLinks {
        let request = self
            .sent_emails()
            .await
            .pop()
            .expect("No email was sent");
        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        let html = body["HtmlBody"].as_str().unwrap();

        let links: Vec<_> = linkify::LinkFinder::new()
            .links(html)
            .filter(|l| *l.kind() == linkify::LinkKind::Url)
            .map(|l| Url::parse(l.as_str()).unwrap())
            .collect();
        let find = |page: &str| {
            links
                .iter()
                .find(|l| l.path() == page)
                .cloned()
                .unwrap_or_else(|| panic!("No link to {page} in {html}"))
        };

        ConfirmationLinks {
            confirmation: find("/subscribers/confirmation"),
            unsubscribe: find("/subscribers/unsubscribe"),
        }
    }

    pub async fn stored(&self, email: &str) -> Option<Subscriber> {
        let email = SubscriberEmail::parse(email.to_string()).unwrap();
        self.subscribers.find_by_email(&email).await.unwrap()
    }

    pub async fn metrics(&self) -> String {
        self.api_client
            .get(self.at_url("/metrics"))
            .send()
            .await
            .expect("Failed to execute request")
            .text()
            .await
            .unwrap()
    }
}

/// The `{error, errorCode}` body of a failed request.
pub async fn error_code(response: reqwest::Response) -> String {
    let body: serde_json::Value = response.json().await.expect("Body is not JSON");
    body["errorCode"].as_str().expect("No errorCode").to_string()
}
