use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;

use crate::models::{QueryFilters, RegistryPage};

/// Errors that can occur when querying the NPI registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API returned error status: {0}")]
    Api(StatusCode),

    #[error("registry rejected the filter combination: {0}")]
    Validation(String),

    #[error("invalid response format: {0}")]
    InvalidResponse(String),
}

impl RegistryError {
    /// Validation errors are a property of the filter combination, not of
    /// the connection; everything else is upstream/transient.
    pub fn is_transient(&self) -> bool {
        !matches!(self, RegistryError::Validation(_))
    }
}

/// The external query capability the resolver runs against.
///
/// Keeping this a trait keeps the resolver a pure function of
/// (record, query capability) and lets tests script the registry.
#[allow(async_fn_in_trait)]
pub trait Registry {
    async fn fetch_page(
        &self,
        filters: &QueryFilters,
        limit: u32,
        skip: u32,
    ) -> Result<RegistryPage, RegistryError>;
}

/// NPI registry API client.
///
/// Issues field-filtered paged queries; every request carries the fixed
/// defaults for API version, individual-provider enumeration, and country.
pub struct NpiRegistryClient {
    base_url: String,
    version: String,
    max_retries: u32,
    client: Client,
}

const ENUMERATION_TYPE: &str = "NPI-1";
const COUNTRY_CODE: &str = "US";

impl NpiRegistryClient {
    pub fn new(
        base_url: String,
        version: String,
        timeout_secs: u64,
        max_retries: u32,
    ) -> Result<Self, RegistryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            base_url,
            version,
            max_retries,
            client,
        })
    }

    fn is_retryable_status(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }

    async fn fetch_page_once(
        &self,
        filters: &QueryFilters,
        limit: u32,
        skip: u32,
    ) -> Result<RegistryPage, RegistryError> {
        let mut params: Vec<(&str, String)> = vec![
            ("version", self.version.clone()),
            ("enumeration_type", ENUMERATION_TYPE.to_string()),
            ("country_code", COUNTRY_CODE.to_string()),
        ];
        for (field, value) in filters.pairs() {
            params.push((field.param_name(), value.clone()));
        }
        params.push(("limit", limit.to_string()));
        params.push(("skip", skip.to_string()));

        tracing::debug!(?params, "querying registry");

        let response = self
            .client
            .get(&self.base_url)
            .query(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::Api(status));
        }

        let json: Value = response.json().await?;

        // The registry signals parameter problems with 200 + an Errors array.
        if let Some(errors) = json.get("Errors").and_then(|e| e.as_array()) {
            let description = errors
                .iter()
                .filter_map(|e| e.get("description").and_then(|d| d.as_str()))
                .collect::<Vec<_>>()
                .join("; ");
            let description = if description.is_empty() {
                "unspecified parameter error".to_string()
            } else {
                description
            };
            return Err(RegistryError::Validation(description));
        }

        serde_json::from_value(json)
            .map_err(|e| RegistryError::InvalidResponse(format!("failed to parse page: {e}")))
    }
}

impl Registry for NpiRegistryClient {
    /// Fetch one result page, retrying transport failures and retryable
    /// statuses with doubling backoff. Validation errors are never retried.
    async fn fetch_page(
        &self,
        filters: &QueryFilters,
        limit: u32,
        skip: u32,
    ) -> Result<RegistryPage, RegistryError> {
        let attempts = self.max_retries.max(1);
        let mut backoff = Duration::from_secs(1);

        for attempt in 1..=attempts {
            match self.fetch_page_once(filters, limit, skip).await {
                Ok(page) => return Ok(page),
                Err(err @ RegistryError::Validation(_)) => return Err(err),
                Err(err @ RegistryError::InvalidResponse(_)) => return Err(err),
                Err(RegistryError::Api(status)) if Self::is_retryable_status(status) => {
                    if attempt == attempts {
                        return Err(RegistryError::Api(status));
                    }
                    tracing::debug!(%status, attempt, "retryable registry status, backing off");
                }
                Err(err @ RegistryError::Api(_)) => return Err(err),
                Err(RegistryError::Request(err)) => {
                    if attempt == attempts {
                        return Err(RegistryError::Request(err));
                    }
                    tracing::debug!(%err, attempt, "registry request failed, backing off");
                }
            }
            tokio::time::sleep(backoff).await;
            backoff = (backoff + backoff).min(Duration::from_secs(60));
        }

        unreachable!("retry loop returns on final attempt")
    }
}
