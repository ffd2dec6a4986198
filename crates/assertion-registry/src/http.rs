//! HTTP implementation of [`RegistryClient`] over the registry member API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, LOCATION};
use reqwest::{Client, RequestBuilder, Response};
use tracing::{debug, info};

use assertion_core::AppError;
use assertion_core::config::RegistryConfig;
use assertion_entity::assertion::Assertion;
use assertion_entity::notification::NotificationPermission;

use crate::client::RegistryClient;
use crate::error::RegistryError;
use crate::wire::{
    Affiliation, PermissionNotification, SearchResponse, TokenResponse, put_code_from_location,
};

const JSON_MEDIA_TYPE: &str = "application/vnd.orcid+json";
const TOKEN_EXCHANGE_GRANT: &str = "urn:ietf:params:oauth:grant-type:token-exchange";
const ID_TOKEN_TYPE: &str = "urn:ietf:params:oauth:token-type:id_token";
const ACCESS_TOKEN_TYPE: &str = "urn:ietf:params:oauth:token-type:access_token";
const NOTIFICATION_SCOPE: &str = "/premium-notification";
const READ_PUBLIC_SCOPE: &str = "/read-public";

/// Registry client backed by `reqwest`.
///
/// Cheap to clone; the inner [`Client`] is reference counted.
#[derive(Debug, Clone)]
pub struct HttpRegistryClient {
    client: Client,
    config: RegistryConfig,
}

impl HttpRegistryClient {
    /// Build a client whose every request is bounded by
    /// `request_timeout_seconds`.
    pub fn new(config: RegistryConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| {
                AppError::configuration(format!("Failed to build registry HTTP client: {e}"))
            })?;
        Ok(Self { client, config })
    }

    fn record_url(&self, orcid: &str, path: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.api_version,
            orcid,
            path
        )
    }

    fn affiliation_url(&self, orcid: &str, assertion: &Assertion) -> String {
        self.record_url(orcid, assertion.affiliation_section.path_segment())
    }

    fn put_code_url(&self, orcid: &str, assertion: &Assertion) -> Result<String, RegistryError> {
        let put_code = assertion.put_code().ok_or_else(|| {
            RegistryError::Decode(format!("assertion {} has no put-code", assertion.id))
        })?;
        Ok(format!("{}/{}", self.affiliation_url(orcid, assertion), put_code))
    }

    fn json_request(&self, request: RequestBuilder, access_token: &str) -> RequestBuilder {
        request
            .bearer_auth(access_token)
            .header(ACCEPT, JSON_MEDIA_TYPE)
            .header(CONTENT_TYPE, JSON_MEDIA_TYPE)
    }

    async fn token(&self, form: &[(&str, &str)]) -> Result<String, RegistryError> {
        let response = self
            .client
            .post(&self.config.token_endpoint)
            .header(ACCEPT, "application/json")
            .form(form)
            .send()
            .await?;
        let response = check(response).await?;
        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }

    async fn client_credentials(&self, scope: &str) -> Result<String, RegistryError> {
        self.token(&[
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("grant_type", "client_credentials"),
            ("scope", scope),
        ])
        .await
    }

    fn search_url(&self) -> String {
        format!(
            "{}/{}/search/",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.api_version
        )
    }
}

/// Pass successful responses through; turn anything else into
/// [`RegistryError::Api`] carrying the response body.
async fn check(response: Response) -> Result<Response, RegistryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let error = response.text().await.unwrap_or_default();
    debug!(status = status.as_u16(), body = %error, "Registry rejected request");
    Err(RegistryError::Api {
        status_code: status.as_u16(),
        error,
    })
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn exchange_token(&self, id_token: &str) -> Result<String, RegistryError> {
        self.token(&[
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("grant_type", TOKEN_EXCHANGE_GRANT),
            ("subject_token", id_token),
            ("subject_token_type", ID_TOKEN_TYPE),
            ("requested_token_type", ACCESS_TOKEN_TYPE),
        ])
        .await
    }

    async fn create_affiliation(
        &self,
        orcid: &str,
        access_token: &str,
        assertion: &Assertion,
    ) -> Result<String, RegistryError> {
        let url = self.affiliation_url(orcid, assertion);
        info!(orcid, assertion_id = %assertion.id, "POST affiliation");

        let response = self
            .json_request(self.client.post(&url), access_token)
            .json(&Affiliation::for_create(assertion))
            .send()
            .await?;
        let response = check(response).await?;

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| RegistryError::Decode("create response has no Location header".into()))?;
        put_code_from_location(location)
            .map(str::to_string)
            .ok_or_else(|| RegistryError::Decode(format!("no put-code in Location '{location}'")))
    }

    async fn update_affiliation(
        &self,
        orcid: &str,
        access_token: &str,
        assertion: &Assertion,
    ) -> Result<(), RegistryError> {
        let url = self.put_code_url(orcid, assertion)?;
        let body = Affiliation::for_update(assertion)?;
        info!(
            orcid,
            assertion_id = %assertion.id,
            put_code = assertion.put_code().unwrap_or_default(),
            "PUT affiliation"
        );

        let response = self
            .json_request(self.client.put(&url), access_token)
            .json(&body)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn delete_affiliation(
        &self,
        orcid: &str,
        access_token: &str,
        assertion: &Assertion,
    ) -> Result<bool, RegistryError> {
        let url = self.put_code_url(orcid, assertion)?;
        info!(orcid, assertion_id = %assertion.id, "DELETE affiliation");

        let response = self
            .json_request(self.client.delete(&url), access_token)
            .send()
            .await?;
        let response = check(response).await?;
        Ok(response.status() == reqwest::StatusCode::NO_CONTENT)
    }

    async fn find_orcid_by_email(&self, email: &str) -> Result<Option<String>, RegistryError> {
        let access_token = self.client_credentials(READ_PUBLIC_SCOPE).await?;
        let query = format!("email:{email}");
        debug!(email, "GET search by email");

        let response = self
            .client
            .get(self.search_url())
            .bearer_auth(&access_token)
            .header(ACCEPT, JSON_MEDIA_TYPE)
            .query(&[("q", query.as_str())])
            .send()
            .await?;
        let response = check(response).await?;
        let found: SearchResponse = response.json().await?;
        Ok(found.single_orcid())
    }

    async fn post_notification(
        &self,
        orcid: &str,
        notification: &NotificationPermission,
    ) -> Result<(), RegistryError> {
        let access_token = self.client_credentials(NOTIFICATION_SCOPE).await?;
        let url = self.record_url(orcid, "notification-permission");
        info!(orcid, items = notification.items.len(), "POST notification-permission");

        let response = self
            .json_request(self.client.post(&url), &access_token)
            .json(&PermissionNotification::from(notification))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}
