//! HTTP implementation of [`SplitApi`] over reqwest.
//!
//! Every request carries a bearer token from the [`TokenProvider`] and an
//! `x-request-id` correlation header; non-2xx responses are decoded into
//! [`ApiError::Remote`] with the server's error payload attached.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::error::ApiError;
use super::types::{
    Calculation, ComputeReviewResponse, CreateSplitRequest, CreatedSplit, DraftSummary,
    ItemPayload, PayRequest, PayResponse, SplitPatch,
};
use super::SplitApi;
use crate::model::{Draft, Participant};

/// Header used to correlate a request with server-side logs.
pub const CORRELATION_HEADER: &str = "x-request-id";

/// Supplies the bearer token for outgoing requests.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    fn is_signed_in(&self) -> bool;
    async fn token(&self) -> Result<String, ApiError>;
}

/// A fixed token, mainly for tests and scripts.
pub struct StaticToken(pub String);

#[async_trait]
impl TokenProvider for StaticToken {
    fn is_signed_in(&self) -> bool {
        true
    }

    async fn token(&self) -> Result<String, ApiError> {
        Ok(self.0.clone())
    }
}

/// Reads the token from an environment variable. Signed in iff it is set.
pub struct EnvToken {
    var: String,
}

impl EnvToken {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

#[async_trait]
impl TokenProvider for EnvToken {
    fn is_signed_in(&self) -> bool {
        std::env::var(&self.var).is_ok_and(|v| !v.is_empty())
    }

    async fn token(&self) -> Result<String, ApiError> {
        std::env::var(&self.var).map_err(|_| ApiError::Unauthenticated)
    }
}

pub struct HttpSplitApi {
    base_url: String,
    client: reqwest::Client,
    auth: Arc<dyn TokenProvider>,
}

impl HttpSplitApi {
    pub fn new(base_url: impl Into<String>, auth: Arc<dyn TokenProvider>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            auth,
        }
    }

    /// Issue an authenticated request and decode the JSON response.
    ///
    /// Rejects with `Unauthenticated` before touching the network when the
    /// token provider reports signed-out.
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, ApiError> {
        if !self.auth.is_signed_in() {
            return Err(ApiError::Unauthenticated);
        }
        let token = self.auth.token().await?;
        let correlation_id = uuid::Uuid::new_v4().to_string();
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, %correlation_id, "api request");

        let mut req = self
            .client
            .request(method, &url)
            .bearer_auth(token)
            .header(CORRELATION_HEADER, &correlation_id);
        if let Some(body) = body {
            req = req.json(&body);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let status = resp.status();

        if !status.is_success() {
            let details: Option<Value> = resp.json().await.ok();
            let message = details
                .as_ref()
                .and_then(|p| p.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                });
            return Err(ApiError::Remote {
                status: status.as_u16(),
                message,
                details,
                correlation_id: Some(correlation_id),
            });
        }

        if status == StatusCode::NO_CONTENT {
            // Unit decodes from null; endpoints returning 204 ask for ().
            return serde_json::from_value(Value::Null)
                .map_err(|e| ApiError::Network(format!("decode response: {}", e)));
        }

        resp.json::<T>()
            .await
            .map_err(|e| ApiError::Network(format!("decode response: {}", e)))
    }
}

#[async_trait]
impl SplitApi for HttpSplitApi {
    async fn create_split(&self, req: &CreateSplitRequest) -> Result<CreatedSplit, ApiError> {
        let body = serde_json::to_value(req).map_err(|e| ApiError::Network(e.to_string()))?;
        self.request(Method::POST, "/splits", Some(body)).await
    }

    async fn fetch_split(&self, id: &str) -> Result<Draft, ApiError> {
        self.request(Method::GET, &format!("/splits/{}", id), None)
            .await
    }

    async fn list_splits(&self) -> Result<Vec<DraftSummary>, ApiError> {
        self.request(Method::GET, "/splits", None).await
    }

    async fn delete_split(&self, id: &str) -> Result<(), ApiError> {
        self.request(Method::DELETE, &format!("/splits/{}", id), None)
            .await
    }

    async fn update_split(&self, id: &str, patch: &SplitPatch) -> Result<(), ApiError> {
        let body = serde_json::to_value(patch).map_err(|e| ApiError::Network(e.to_string()))?;
        self.request(Method::PATCH, &format!("/splits/{}", id), Some(body))
            .await
    }

    async fn put_participants(
        &self,
        id: &str,
        participants: &[Participant],
    ) -> Result<(), ApiError> {
        let body =
            serde_json::to_value(participants).map_err(|e| ApiError::Network(e.to_string()))?;
        self.request(
            Method::PUT,
            &format!("/splits/{}/participants", id),
            Some(body),
        )
        .await
    }

    async fn put_items(&self, id: &str, items: &[ItemPayload]) -> Result<(), ApiError> {
        let body = serde_json::to_value(items).map_err(|e| ApiError::Network(e.to_string()))?;
        self.request(Method::PUT, &format!("/splits/{}/items", id), Some(body))
            .await
    }

    async fn compute_review(&self, id: &str) -> Result<Calculation, ApiError> {
        let resp: ComputeReviewResponse = self
            .request(
                Method::POST,
                &format!("/splits/{}/compute-review", id),
                None,
            )
            .await?;
        Ok(resp.calculation)
    }

    async fn pay(&self, id: &str, req: &PayRequest) -> Result<PayResponse, ApiError> {
        let body = serde_json::to_value(req).map_err(|e| ApiError::Network(e.to_string()))?;
        self.request(Method::POST, &format!("/splits/{}/pay", id), Some(body))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signed_out_rejects_before_any_network_call() {
        struct SignedOut;

        #[async_trait]
        impl TokenProvider for SignedOut {
            fn is_signed_in(&self) -> bool {
                false
            }
            async fn token(&self) -> Result<String, ApiError> {
                Err(ApiError::Unauthenticated)
            }
        }

        // Unroutable base URL: if the guard failed we'd get a network error,
        // not Unauthenticated.
        let api = HttpSplitApi::new("http://127.0.0.1:1", Arc::new(SignedOut));
        let err = api.list_splits().await.unwrap_err();
        assert_eq!(err, ApiError::Unauthenticated);
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let api = HttpSplitApi::new(
            "http://localhost:3000/",
            Arc::new(StaticToken("t".to_string())),
        );
        assert_eq!(api.base_url, "http://localhost:3000");
    }
}
