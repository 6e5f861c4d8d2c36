pub mod captcha;
pub mod configuration;
pub mod domain;
pub mod email_client;
pub mod error;
pub mod metrics;
pub mod notifier;
pub mod repository;
mod routes;
mod state;
pub mod subscription;
pub mod telemetry;
pub mod templates;

use anyhow::Context;
use axum::{Router, Server};
use chrono::Duration;
use configuration::Settings;
use email_client::EmailClient;
use metrics::Metrics;
use notifier::Notifier;
use repository::{InMemorySubscriberRepository, PostgresSubscriberRepository, SubscriberRepository};
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::{net::TcpListener, sync::Arc};
use subscription::SubscriptionService;
use templates::{InMemoryTemplateStore, PostgresTemplateStore, TemplateStore};

pub struct App {
    listener: TcpListener,
    router: Router,
}

impl App {
    /// Build the app from `settings`, connecting to Postgres and running the
    /// migrations when a database is configured.
    pub async fn build(settings: Settings) -> anyhow::Result<Self> {
        let (subscribers, templates): (Arc<dyn SubscriberRepository>, Arc<dyn TemplateStore>) =
            match settings.database() {
                Some(database) => {
                    let pool = PgPoolOptions::new()
                        .acquire_timeout(std::time::Duration::from_secs(2))
                        .connect_lazy_with(database.with_db());
                    sqlx::migrate!("./migrations")
                        .run(&pool)
                        .await
                        .context("Failed to migrate the database")?;
                    let pool = Arc::new(pool);
                    (
                        Arc::new(PostgresSubscriberRepository::new(pool.clone())),
                        Arc::new(PostgresTemplateStore::new(pool)),
                    )
                }
                None => {
                    tracing::warn!("No database configured, subscribers are kept in memory");
                    (
                        Arc::new(InMemorySubscriberRepository::new()),
                        Arc::new(InMemoryTemplateStore::new()),
                    )
                }
            };

        Self::with_stores(settings, subscribers, templates)
    }

    /// Build the app on top of already constructed stores.
    pub fn with_stores(
        settings: Settings,
        subscribers: Arc<dyn SubscriberRepository>,
        templates: Arc<dyn TemplateStore>,
    ) -> anyhow::Result<Self> {
        let email_settings = settings.email_client();
        let email_client =
            EmailClient::try_from(email_settings).map_err(anyhow::Error::msg)?;
        let subscription_settings = settings.subscription();
        let notifier = Notifier::new(
            templates,
            Arc::new(email_client),
            email_settings.sender().map_err(anyhow::Error::msg)?,
            email_settings.reply_to().map_err(anyhow::Error::msg)?,
            subscription_settings.frontend_base_url.clone(),
            subscription_settings.token_expiry_days,
        );
        let subscription = SubscriptionService::new(
            subscribers.clone(),
            settings
                .captcha()
                .verifier()
                .context("Failed to build the captcha client")?,
            notifier,
            Duration::minutes(subscription_settings.cooldown_minutes.into()),
            Duration::days(subscription_settings.token_expiry_days.into()),
        );

        let app_state = AppState::new(subscription, subscribers, Metrics::new()?);
        let listener = TcpListener::bind(settings.application().address())
            .with_context(|| format!("Failed to bind {}", settings.application().address()))?;

        Ok(Self {
            listener,
            router: Self::build_router(&app_state),
        })
    }

    /// The port the app is listening on.
    pub fn port(&self) -> u16 {
        self.listener
            .local_addr()
            .map(|address| address.port())
            .unwrap_or_default()
    }

    /// Serve requests until the server is shut down.
    pub async fn run_until_stopped(self) -> anyhow::Result<()> {
        tracing::info!("Server running at {}", self.listener.local_addr()?);

        Server::from_tcp(self.listener)?
            .serve(self.router.into_make_service())
            .await?;
        Ok(())
    }

    /// Build the router for the application.
    fn build_router(app_state: &AppState) -> Router {
        use tower::ServiceBuilder;
        use tower_http::{
            request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
            trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
        };
        use tracing::Level;

        routes::build_router(app_state).layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(
                            DefaultMakeSpan::new()
                                .level(Level::INFO)
                                .include_headers(true),
                        )
                        .on_request(DefaultOnRequest::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
    }
}
