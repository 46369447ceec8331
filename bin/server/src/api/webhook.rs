//! Airtable webhook receiver.

use std::sync::Arc;

use airform_integration::{SIGNATURE_HEADER, WebhookError, verify_signature};
use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

use crate::auth::AppState;
use crate::error::json_error;

/// `POST /webhooks/airtable`
///
/// The signature is checked against the raw body before anything is parsed.
pub async fn receive(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(secret) = state.webhook.secret.as_deref().filter(|s| !s.is_empty()) else {
        tracing::warn!("webhook delivery refused: no secret configured");
        return json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "webhook_disabled",
            "Webhook receiver is not configured",
        );
    };

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    if let Err(e) = verify_signature(secret.as_bytes(), &body, signature) {
        tracing::warn!(error = %e, "webhook signature rejected");
        let message = match e {
            WebhookError::MissingSignature => "Missing signature",
            _ => "Invalid signature",
        };
        return json_error(StatusCode::UNAUTHORIZED, "invalid_signature", message);
    }

    match serde_json::from_slice::<Value>(&body) {
        Ok(payload) => {
            tracing::info!(%payload, "webhook received");
            Json(json!({ "success": true })).into_response()
        }
        Err(e) => json_error(
            StatusCode::BAD_REQUEST,
            "bad_request",
            &format!("payload is not JSON: {e}"),
        ),
    }
}

#[cfg(test)]
mod tests {
    use airform_integration::webhook::sign;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::test_support::{TestApp, WEBHOOK_SECRET};

    const PAYLOAD: &str = r#"{"base":{"id":"appA"},"webhook":{"id":"achW"},"timestamp":"2026-01-01T00:00:00.000Z"}"#;

    async fn deliver(app: &TestApp, signature: Option<&str>, body: &str) -> (StatusCode, Value) {
        let mut request =
            Request::post("/webhooks/airtable").header("content-type", "application/json");
        if let Some(signature) = signature {
            request = request.header("x-airtable-signature", signature);
        }
        let response = app
            .router()
            .oneshot(request.body(Body::from(body.to_string())).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn accepts_signed_delivery() {
        let app = TestApp::start().await;
        let signature = sign(WEBHOOK_SECRET.as_bytes(), PAYLOAD.as_bytes()).expect("sign");

        let (status, body) = deliver(&app, Some(&signature), PAYLOAD).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn rejects_signature_over_different_bytes() {
        let app = TestApp::start().await;
        // Same JSON value, different serialization.
        let reformatted = PAYLOAD.replace(',', ", ");
        let signature = sign(WEBHOOK_SECRET.as_bytes(), reformatted.as_bytes()).expect("sign");

        let (status, body) = deliver(&app, Some(&signature), PAYLOAD).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "invalid_signature");
    }

    #[tokio::test]
    async fn rejects_missing_or_malformed_signature() {
        let app = TestApp::start().await;
        let (status, _) = deliver(&app, None, PAYLOAD).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = deliver(&app, Some("not base64!"), PAYLOAD).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn refuses_everything_without_a_secret() {
        let app = TestApp::start_with(|config| config.webhook.secret = None).await;
        let signature = sign(b"", PAYLOAD.as_bytes()).expect("sign");

        let (status, body) = deliver(&app, Some(&signature), PAYLOAD).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "webhook_disabled");
    }
}
