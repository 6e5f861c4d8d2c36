use crate::helpers::{error_code, spawn_app};
use claims::assert_some;
use newsletter::domain::SubscriptionState;
use pretty_assertions::{assert_eq, assert_ne};
use reqwest::StatusCode;

#[tokio::test]
async fn unsubscribe_without_an_email_is_rejected() {
    // Arrange
    let app = spawn_app().await;

    // Act
    let response = app.get_unsubscribe(None).await;

    // Assert
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(response).await, "EMAIL_REQUIRED");
}

#[tokio::test]
async fn unknown_and_known_emails_get_the_same_answer() {
    // Arrange
    let app = spawn_app().await;
    app.mock_captcha(true).await;
    app.mock_send_email_endpoint_to_ok().await;
    app.subscribe("ursula@example.com").await;

    // Act
    let known = app.get_unsubscribe(Some("ursula@example.com")).await;
    let unknown = app.get_unsubscribe(Some("nobody@example.com")).await;

    // Assert
    assert_eq!(known.status(), StatusCode::OK);
    assert_eq!(unknown.status(), StatusCode::OK);
    assert_eq!(known.text().await.unwrap(), unknown.text().await.unwrap());
    let saved = app.stored("ursula@example.com").await.unwrap();
    assert_eq!(saved.state, SubscriptionState::Unsubscribed);
    assert_some!(saved.unsubscribed_at);
}

#[tokio::test]
async fn the_unsubscribe_link_from_the_email_is_accepted() {
    // Arrange
    let app = spawn_app().await;
    app.mock_captcha(true).await;
    app.mock_send_email_endpoint_to_ok().await;
    app.subscribe("Ursula@Example.com").await;
    let links = app.last_confirmation_links().await;
    let email = links
        .unsubscribe
        .query_pairs()
        .find(|(key, _)| key == "email")
        .map(|(_, value)| value.into_owned())
        .unwrap();

    // Act
    let response = app.get_unsubscribe(Some(&email)).await;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let saved = app.stored("ursula@example.com").await.unwrap();
    assert_eq!(saved.state, SubscriptionState::Unsubscribed);
}

#[tokio::test]
async fn subscribe_confirm_unsubscribe_subscribe_round_trip() {
    // Arrange
    let app = spawn_app().await;
    app.mock_captcha(true).await;
    app.mock_send_email_endpoint_to_ok().await;

    // Act
    assert_eq!(app.subscribe("ursula@example.com").await.status(), StatusCode::OK);
    let first = app.last_confirmation_links().await.token();
    assert_eq!(app.get_confirm(Some(&first)).await.status(), StatusCode::OK);
    assert_eq!(
        app.get_unsubscribe(Some("ursula@example.com")).await.status(),
        StatusCode::OK
    );
    let response = app.subscribe("ursula@example.com").await;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let second = app.last_confirmation_links().await.token();
    assert_ne!(first, second);
    assert_eq!(app.get_confirm(Some(&second)).await.status(), StatusCode::OK);
    let saved = app.stored("ursula@example.com").await.unwrap();
    assert_eq!(saved.state, SubscriptionState::Subscribed);
}
