use crate::helpers::spawn_app;
use reqwest::StatusCode;

#[tokio::test]
async fn health_check_works() {
    // Arrange
    let app = spawn_app().await;

    // Act
    let response = app.health_check().await;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(Some(0), response.content_length());
}

#[tokio::test]
async fn status_reports_the_store_as_connected() {
    // Arrange
    let app = spawn_app().await;

    // Act
    let response = app
        .api_client()
        .get(app.at_url("/health/status"))
        .send()
        .await
        .expect("Failed to execute request.");

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["db_connected"], true);
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    // Arrange
    let app = spawn_app().await;

    // Act
    let response = app.health_check().await;

    // Assert
    assert!(response.headers().contains_key("x-request-id"));
}
