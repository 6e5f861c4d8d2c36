use crate::{
    metrics::Metrics,
    state::AppState,
    subscription::{
        ConfirmError, ErrorCode, SubscribeError, SubscriptionService, UnsubscribeError,
    },
};
use axum::{
    async_trait,
    body::HttpBody,
    extract::{FromRequest, Query, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    BoxError, Form, Json, Router,
};
use duplicate::duplicate_item;
use http::{header::CONTENT_TYPE, HeaderMap, Request, StatusCode};
use std::{convert::Infallible, net::IpAddr, sync::Arc};
use utoipa::ToSchema;

/// Create a router to serve the subscription endpoints.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/subscribe", post(subscribe))
        .route("/confirm", get(confirm))
        .route("/unsubscribe", get(unsubscribe))
}

#[derive(Debug, Default, serde::Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeBody {
    email: Option<String>,
    /// Also accepted as `cf-turnstile-response` or `g-recaptcha-response`.
    #[serde(alias = "cf-turnstile-response", alias = "g-recaptcha-response")]
    captcha_token: Option<String>,
}

/// Read from a JSON or a url-encoded form body. A missing or malformed body
/// leaves both fields empty so the workflow reports what is missing.
#[async_trait]
impl<S, B> FromRequest<S, B> for SubscribeBody
where
    B: HttpBody + Send + 'static,
    B::Data: Send,
    B::Error: Into<BoxError>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request(req: Request<B>, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"));

        let body = if is_form {
            Form::<SubscribeBody>::from_request(req, state)
                .await
                .map(|Form(body)| body)
                .ok()
        } else {
            Json::<SubscribeBody>::from_request(req, state)
                .await
                .map(|Json(body)| body)
                .ok()
        };
        Ok(body.unwrap_or_default())
    }
}

#[derive(Debug, serde::Deserialize)]
pub struct ConfirmParameters {
    token: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
pub struct UnsubscribeParameters {
    email: Option<String>,
}

#[derive(Debug, serde::Serialize, ToSchema)]
pub struct MessageBody {
    message: String,
}

#[derive(Debug, serde::Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    error: String,
    error_code: ErrorCode,
}

/// Request a subscription. A confirmation link is emailed to the address.
#[tracing::instrument(name = "Handle subscribe request", skip_all)]
#[utoipa::path(
    post,
    path = "/subscribers/subscribe",
    request_body(
        content = SubscribeBody,
        description = "JSON, or a url-encoded form with the same fields",
    ),
    responses(
        (status = OK, description = "Confirmation email sent", body = MessageBody),
        (status = BAD_REQUEST, description = "Invalid request or subscription state", body = ErrorBody),
        (status = INTERNAL_SERVER_ERROR, description = "Captcha provider or email delivery failed", body = ErrorBody),
    )
)]
pub async fn subscribe(
    State(service): State<Arc<SubscriptionService>>,
    State(metrics): State<Arc<Metrics>>,
    headers: HeaderMap,
    body: SubscribeBody,
) -> Result<Json<MessageBody>, SubscribeError> {
    let outcome = service
        .subscribe(body.email, body.captcha_token, client_ip(&headers))
        .await;

    metrics.record(
        "subscribe",
        outcome.as_ref().map_or_else(|e| e.code().as_str(), |_| "OK"),
    );
    outcome.map(|message| {
        Json(MessageBody {
            message: message.to_string(),
        })
    })
}

/// Confirm a subscription with the token from the confirmation email.
#[tracing::instrument(name = "Handle confirm request", skip_all)]
#[utoipa::path(
    get,
    path = "/subscribers/confirm",
    params(("token" = Option<String>, Query, description = "Token from the confirmation link")),
    responses(
        (status = OK, description = "Subscription confirmed", body = MessageBody),
        (status = BAD_REQUEST, description = "Token missing, unknown or expired", body = ErrorBody),
    )
)]
pub async fn confirm(
    State(service): State<Arc<SubscriptionService>>,
    State(metrics): State<Arc<Metrics>>,
    Query(parameters): Query<ConfirmParameters>,
) -> Result<Json<MessageBody>, ConfirmError> {
    let outcome = service.confirm(parameters.token).await;

    metrics.record(
        "confirm",
        outcome.as_ref().map_or_else(|e| e.code().as_str(), |_| "OK"),
    );
    outcome.map(|message| {
        Json(MessageBody {
            message: message.to_string(),
        })
    })
}

/// Unsubscribe an email. Answers the same whether or not the email is known.
#[tracing::instrument(name = "Handle unsubscribe request", skip_all)]
#[utoipa::path(
    get,
    path = "/subscribers/unsubscribe",
    params(("email" = Option<String>, Query, description = "Email to unsubscribe")),
    responses(
        (status = OK, description = "Email unsubscribed", body = MessageBody),
        (status = BAD_REQUEST, description = "Email parameter missing", body = ErrorBody),
    )
)]
pub async fn unsubscribe(
    State(service): State<Arc<SubscriptionService>>,
    State(metrics): State<Arc<Metrics>>,
    Query(parameters): Query<UnsubscribeParameters>,
) -> Result<Json<MessageBody>, UnsubscribeError> {
    let outcome = service.unsubscribe(parameters.email).await;

    metrics.record(
        "unsubscribe",
        outcome.as_ref().map_or_else(|e| e.code().as_str(), |_| "OK"),
    );
    outcome.map(|message| {
        Json(MessageBody {
            message: message.to_string(),
        })
    })
}

/// First hop of `X-Forwarded-For`, else `X-Real-IP`.
fn client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let header = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());

    header("x-forwarded-for")
        .and_then(|value| value.split(',').next())
        .and_then(|ip| ip.trim().parse().ok())
        .or_else(|| header("x-real-ip").and_then(|ip| ip.trim().parse().ok()))
}

#[duplicate_item(
    error_type;
    [ SubscribeError ];
    [ ConfirmError ];
    [ UnsubscribeError ];
)]
impl IntoResponse for error_type {
    fn into_response(self) -> Response {
        let error_code = self.code();
        let (status, error) = match error_code {
            ErrorCode::InternalError => {
                tracing::error!(error.cause_chain = ?self, "Request failed unexpectedly");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An unexpected error occurred".to_string(),
                )
            }
            ErrorCode::CaptchaVerifyError => {
                tracing::error!(error.cause_chain = ?self, "Captcha could not be verified");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            _ => (StatusCode::BAD_REQUEST, self.to_string()),
        };

        (status, Json(ErrorBody { error, error_code })).into_response()
    }
}
