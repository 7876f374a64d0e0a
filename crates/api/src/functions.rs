//! HTTP client for the serverless functions that own staff accounts and
//! image generation.
//!
//! Each call is a `POST {base_url}/{function}` with a JSON body and the
//! service key as a bearer token.

use std::time::Duration;

use labflow_core::staff::{ImageRequest, NewStaffUser};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::FunctionsConfig;

const CREATE_USER: &str = "create-user";
const DELETE_USER: &str = "delete-user";
const GENERATE_IMAGE: &str = "generate-image";

#[derive(Debug, thiserror::Error)]
pub enum FunctionsError {
    /// No base URL configured.
    #[error("Serverless functions are not configured")]
    NotConfigured,

    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("Function request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The function answered with a non-2xx status.
    #[error("Function '{function}' returned {status}: {body}")]
    Api {
        function: &'static str,
        status: u16,
        body: String,
    },
}

impl FunctionsError {
    /// The function's own error message, when it sent a JSON `{ "error" }`.
    pub fn upstream_message(&self) -> Option<String> {
        match self {
            FunctionsError::Api { body, .. } => serde_json::from_str::<serde_json::Value>(body)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedUser {
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteUserBody {
    user_id: Uuid,
}

pub struct FunctionsClient {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl FunctionsClient {
    pub fn new(config: &FunctionsConfig) -> Result<Self, FunctionsError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            service_key: config.service_key.clone(),
        })
    }

    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty()
    }

    pub async fn create_user(&self, input: &NewStaffUser) -> Result<CreatedUser, FunctionsError> {
        self.call(CREATE_USER, input).await
    }

    pub async fn delete_user(&self, user_id: Uuid) -> Result<(), FunctionsError> {
        self.send(DELETE_USER, &DeleteUserBody { user_id }).await?;
        Ok(())
    }

    pub async fn generate_image(
        &self,
        request: &ImageRequest,
    ) -> Result<GeneratedImage, FunctionsError> {
        self.call(GENERATE_IMAGE, request).await
    }

    async fn call<B, R>(&self, function: &'static str, body: &B) -> Result<R, FunctionsError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self.send(function, body).await?;
        Ok(response.json().await?)
    }

    /// POST to a function and fail on any non-2xx status.
    async fn send<B>(
        &self,
        function: &'static str,
        body: &B,
    ) -> Result<reqwest::Response, FunctionsError>
    where
        B: Serialize + ?Sized,
    {
        if !self.is_configured() {
            return Err(FunctionsError::NotConfigured);
        }

        let response = self
            .client
            .post(format!("{}/{function}", self.base_url))
            .bearer_auth(&self.service_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {e}>"));
            tracing::warn!(function, status = status.as_u16(), "Function call failed");
            return Err(FunctionsError::Api {
                function,
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(function, "Function call succeeded");
        Ok(response)
    }
}
