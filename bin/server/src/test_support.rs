//! Router harness backed by in-memory stores and a mock provider.

use std::sync::Arc;

use airform_platform_access::{AirtableOAuthConfig, ProviderIdentity, ProviderProfile, TokenPair};
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use chrono::Utc;
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::MockServer;

use crate::app::build_router;
use crate::auth::{AppState, IdentityStore, Stores};
use crate::config::{ServerConfig, SessionConfig, WebhookConfig};
use crate::db::memory::{MemoryFormStore, MemoryIdentityStore, MemoryResponseStore};

pub const SIGNING_SECRET: &str = "test-signing-secret";
pub const WEBHOOK_SECRET: &str = "hook-secret";
pub const FRONTEND_URL: &str = "http://frontend.test";

pub fn test_config(provider: &MockServer) -> ServerConfig {
    ServerConfig {
        database_url: "postgres://unused/airform".to_string(),
        listen_addr: "127.0.0.1:0".to_string(),
        frontend_url: format!("{FRONTEND_URL}/"),
        session: SessionConfig {
            signing_secret: SIGNING_SECRET.to_string(),
            duration_days: 7,
            secure_cookies: false,
        },
        airtable: AirtableOAuthConfig::new(
            "client-123".to_string(),
            "secret-456".to_string(),
            "http://localhost:4000/auth/callback".to_string(),
        )
        .with_authorize_url(format!("{}/oauth2/v1/authorize", provider.uri()))
        .with_token_url(format!("{}/oauth2/v1/token", provider.uri()))
        .with_api_base_url(provider.uri()),
        webhook: WebhookConfig {
            secret: Some(WEBHOOK_SECRET.to_string()),
        },
    }
}

pub struct TestApp {
    pub provider: MockServer,
    pub state: Arc<AppState>,
    pub identities: Arc<MemoryIdentityStore>,
    pub forms: Arc<MemoryFormStore>,
    pub responses: Arc<MemoryResponseStore>,
}

impl TestApp {
    pub async fn start() -> Self {
        Self::build(|_| {}, |_| {}).await
    }

    pub async fn start_with(adjust_config: impl FnOnce(&mut ServerConfig)) -> Self {
        Self::build(adjust_config, |_| {}).await
    }

    pub async fn start_with_state(adjust_state: impl FnOnce(&mut AppState)) -> Self {
        Self::build(|_| {}, adjust_state).await
    }

    async fn build(
        adjust_config: impl FnOnce(&mut ServerConfig),
        adjust_state: impl FnOnce(&mut AppState),
    ) -> Self {
        let provider = MockServer::start().await;
        let mut config = test_config(&provider);
        adjust_config(&mut config);

        let identities = Arc::new(MemoryIdentityStore::default());
        let forms = Arc::new(MemoryFormStore::default());
        let responses = Arc::new(MemoryResponseStore::default());
        let stores = Stores {
            identities: identities.clone(),
            forms: forms.clone(),
            responses: responses.clone(),
        };
        let mut state = AppState::new(&config, stores).expect("app state");
        adjust_state(&mut state);

        Self {
            provider,
            state: Arc::new(state),
            identities,
            forms,
            responses,
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router().oneshot(request).await.expect("response")
    }

    /// Sends a JSON request and returns the status with the decoded body
    /// (`Null` when the body is not JSON).
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        credential: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(credential) = credential {
            request = request.header(header::AUTHORIZATION, format!("Bearer {credential}"));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .expect("request");

        let response = self.request(request).await;
        let status = response.status();
        (status, body_json(response).await)
    }

    pub async fn get(&self, uri: &str, credential: Option<&str>) -> (StatusCode, Value) {
        self.send("GET", uri, credential, None).await
    }

    /// Stores an identity with a valid access token and returns it with a
    /// session credential.
    pub async fn signed_in(
        &self,
        provider_user_id: &str,
        access_token: &str,
    ) -> (ProviderIdentity, String) {
        self.signed_in_until(provider_user_id, access_token, 3600).await
    }

    /// Like [`TestApp::signed_in`], but the stored access token has already
    /// expired. Its refresh token is `refresh-<access_token>`.
    pub async fn signed_in_expired(
        &self,
        provider_user_id: &str,
        access_token: &str,
    ) -> (ProviderIdentity, String) {
        self.signed_in_until(provider_user_id, access_token, 0).await
    }

    async fn signed_in_until(
        &self,
        provider_user_id: &str,
        access_token: &str,
        expires_in: u64,
    ) -> (ProviderIdentity, String) {
        let identity = ProviderIdentity::from_login(
            ProviderProfile {
                provider_user_id: provider_user_id.to_string(),
                email: Some(format!("{provider_user_id}@example.com")),
                display_name: None,
            },
            TokenPair {
                access_token: access_token.to_string(),
                refresh_token: Some(format!("refresh-{access_token}")),
                expires_in: Some(expires_in),
            },
            Utc::now(),
        );
        let identity = self.identities.upsert(&identity).await.expect("store identity");
        let credential = self
            .state
            .sessions
            .issue(&identity)
            .expect("credential")
            .into_string();
        (identity, credential)
    }

    /// Creates a form on `appA`/`tblA` and returns its id.
    pub async fn create_form(&self, credential: &str, questions: Value) -> String {
        let (status, body) = self
            .send(
                "POST",
                "/api/v1/form",
                Some(credential),
                Some(json!({
                    "airtableBaseId": "appA",
                    "airtableTableId": "tblA",
                    "title": "Signup",
                    "questions": questions
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create form: {body}");
        body["data"]["id"].as_str().expect("form id").to_string()
    }
}

pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}
