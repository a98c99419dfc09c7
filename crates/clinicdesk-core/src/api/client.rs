//! API client for communicating with the clinic REST API.
//!
//! This module provides the `ApiClient` struct for exchanging credentials for
//! a token, validating tokens, and making authenticated CRUD requests for
//! patients and appointments.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::{Appointment, NewAppointment, Page, PageRequest, Patient};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
}

/// API client for the clinic backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client against `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;

        // A base without a trailing slash would drop its last segment on join
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&normalized)
            .map_err(|e| ApiError::InvalidResponse(format!("Invalid base URL {}: {}", base_url, e)))?;

        Ok(Self {
            client,
            base_url,
            token: None,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(&config.api_base_url, config.request_timeout())
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token),
        }
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::InvalidResponse(format!("Invalid path {}: {}", path, e)))
    }

    // ===== Authentication =====

    /// Exchange username/password for a bearer token (`POST /token`, HTTP Basic)
    pub async fn request_token(&self, username: &str, password: &str) -> Result<String, ApiError> {
        let url = self.url("token")?;
        let response = self
            .client
            .post(url)
            .basic_auth(username, Some(password))
            .json(&serde_json::json!({}))
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let body = response.text().await?;

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| ApiError::InvalidResponse(format!("Unreadable token response: {}", e)))?;

        match parsed.token {
            Some(token) if !token.trim().is_empty() => Ok(token),
            _ => Err(ApiError::InvalidResponse(
                "Token response has no token field".to_string(),
            )),
        }
    }

    /// `GET /validate-token` with the given bearer token. Ok means 2xx.
    pub async fn check_token(&self, token: &str) -> Result<(), ApiError> {
        let url = self.url("validate-token")?;
        let response = self.client.get(url).bearer_auth(token).send().await?;
        Self::check_response(response).await?;
        Ok(())
    }

    // ===== Request plumbing =====

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match self.token {
            Some(ref token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(response: Response) -> Result<Option<Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Send with bearer auth, retrying 429s with exponential backoff.
    async fn send<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<Response, ApiError> {
        let url = self.url(path)?;
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let mut builder = self.request(method.clone(), url.clone());
            if !query.is_empty() {
                builder = builder.query(query);
            }
            if let Some(body) = body {
                builder = builder.json(body);
            }

            debug!(method = %method, path = path, "Sending request");
            let response = builder.send().await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(path = path, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }

    async fn send_json<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<T, ApiError> {
        let response = self.send(method, path, query, body).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", path, e))
        })
    }

    /// For mutations whose response body we do not need
    async fn send_discard<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<(), ApiError> {
        self.send(method, path, &[], body).await?;
        Ok(())
    }

    // ===== Patients =====

    pub async fn list_patients(&self, page: PageRequest) -> Result<Page<Patient>, ApiError> {
        self.send_json(Method::GET, "patient", &page.query(), None::<&()>)
            .await
    }

    pub async fn get_patient(&self, patient_id: i64) -> Result<Patient, ApiError> {
        self.send_json(Method::GET, &format!("patient/{}", patient_id), &[], None::<&()>)
            .await
    }

    pub async fn create_patient(&self, patient: &Patient) -> Result<(), ApiError> {
        self.send_discard(Method::POST, "patient", Some(patient)).await
    }

    /// `original_id` is the id before editing; the body may carry a new one.
    pub async fn update_patient(&self, original_id: i64, patient: &Patient) -> Result<(), ApiError> {
        self.send_discard(Method::PUT, &format!("patient/{}", original_id), Some(patient))
            .await
    }

    /// Deleting a patient also removes their appointments server-side.
    pub async fn delete_patient(&self, patient_id: i64) -> Result<(), ApiError> {
        self.send_discard(Method::DELETE, &format!("patient/{}", patient_id), None::<&()>)
            .await
    }

    // ===== Appointments =====

    pub async fn list_appointments(&self, page: PageRequest) -> Result<Page<Appointment>, ApiError> {
        self.send_json(Method::GET, "appointment", &page.query(), None::<&()>)
            .await
    }

    pub async fn create_appointment(
        &self,
        patient_id: i64,
        appointment: &NewAppointment,
    ) -> Result<(), ApiError> {
        self.send_discard(
            Method::POST,
            &format!("appointment/{}", patient_id),
            Some(appointment),
        )
        .await
    }

    pub async fn update_appointment(&self, appointment: &Appointment) -> Result<(), ApiError> {
        self.send_discard(
            Method::PUT,
            &format!("appointment/{}", appointment.appointment_id),
            Some(appointment),
        )
        .await
    }

    pub async fn delete_appointment(&self, appointment_id: i64) -> Result<(), ApiError> {
        self.send_discard(
            Method::DELETE,
            &format!("appointment/{}", appointment_id),
            None::<&()>,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_join_with_and_without_slash() {
        let a = ApiClient::new("http://localhost:8080", Duration::from_secs(5)).unwrap();
        assert_eq!(a.url("/patient").unwrap().as_str(), "http://localhost:8080/patient");

        let b = ApiClient::new("http://example.test/api", Duration::from_secs(5)).unwrap();
        assert_eq!(
            b.url("validate-token").unwrap().as_str(),
            "http://example.test/api/validate-token"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(ApiClient::new("not a url", Duration::from_secs(5)).is_err());
    }

    #[test]
    fn test_with_token_keeps_base() {
        let client = ApiClient::new("http://localhost:8080/", Duration::from_secs(5)).unwrap();
        assert!(!client.has_token());
        let authed = client.with_token("abc".into());
        assert!(authed.has_token());
        assert_eq!(authed.base_url, client.base_url);
    }
}
