//! Integration test for confirmation of subscription to the newsletter.
use crate::helpers::{error_code, spawn_app};
use chrono::Duration;
use claims::{assert_none, assert_some};
use newsletter::domain::{SubscriberEmail, SubscriptionState};
use pretty_assertions::assert_eq;
use reqwest::StatusCode;

#[tokio::test]
async fn confirmations_without_tokens_are_rejected_with_a_400() {
    // Arrange
    let app = spawn_app().await;

    // Act
    let response = app.get_confirm(None).await;

    // Assert
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(response).await, "TOKEN_MISSING");
}

#[tokio::test]
async fn unknown_tokens_are_rejected_with_a_400() {
    // Arrange
    let app = spawn_app().await;

    // Act
    let response = app.get_confirm(Some("0123456789abcdef")).await;

    // Assert
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(response).await, "TOKEN_INVALID");
}

#[tokio::test]
async fn the_token_from_the_email_confirms_the_subscriber() {
    // Arrange
    let app = spawn_app().await;
    app.mock_captcha(true).await;
    app.mock_send_email_endpoint_to_ok().await;
    app.subscribe("ursula_le_guin@gmail.com").await;
    let token = app.last_confirmation_links().await.token();

    // Act
    let response = app.get_confirm(Some(&token)).await;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Your subscription has been confirmed. Thank you!");

    let saved = app.stored("ursula_le_guin@gmail.com").await.unwrap();
    assert_eq!(saved.state, SubscriptionState::Subscribed);
    assert_none!(saved.confirmation_token);
    assert_some!(saved.confirmation_at);
}

#[tokio::test]
async fn a_confirmation_link_works_only_once() {
    // Arrange
    let app = spawn_app().await;
    app.mock_captcha(true).await;
    app.mock_send_email_endpoint_to_ok().await;
    app.subscribe("ursula@example.com").await;
    let token = app.last_confirmation_links().await.token();
    app.get_confirm(Some(&token)).await;

    // Act
    let response = app.get_confirm(Some(&token)).await;

    // Assert
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(response).await, "TOKEN_INVALID");
}

#[tokio::test]
async fn expired_tokens_leave_the_subscriber_pending() {
    // Arrange
    let app = spawn_app().await;
    app.mock_captcha(true).await;
    app.mock_send_email_endpoint_to_ok().await;
    app.subscribe("ursula@example.com").await;
    let token = app.last_confirmation_links().await.token();
    let email = SubscriberEmail::parse("ursula@example.com".to_string()).unwrap();
    app.subscribers()
        .modify(&email, |s| {
            s.token_expires_at = s.token_expires_at.map(|t| t - Duration::days(8))
        })
        .await;

    // Act
    let response = app.get_confirm(Some(&token)).await;

    // Assert
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(response).await, "TOKEN_EXPIRED");
    let saved = app.stored("ursula@example.com").await.unwrap();
    assert_eq!(saved.state, SubscriptionState::Pending);
}
