//! Appwrite REST client.
//!
//! Implements the identity, profile and team contracts against the Appwrite
//! HTTP API. Admin calls carry the project API key, session calls carry the
//! caller's session secret. Reads are retried on transient failures, writes
//! are sent once.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use service_core::http::{retry_idempotent, RetryConfig};
use service_core::observability::{TracedClientExt, TracedRequest};
use std::time::Duration;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::backend::{IdentityService, ProfileStore, TeamClient};
use super::error::BackendError;
use crate::config::AppwriteConfig;
use crate::models::{
    is_valid_id, Identity, Membership, NewAccount, Permission, ProfileData, ProfileRecord,
    ProfileUpdate, Query, Session,
};

const PROJECT_HEADER: &str = "X-Appwrite-Project";
const KEY_HEADER: &str = "X-Appwrite-Key";
const SESSION_HEADER: &str = "X-Appwrite-Session";

#[derive(Clone)]
pub struct AppwriteClient {
    client: Client,
    config: AppwriteConfig,
    retry: RetryConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateUserBody<'a> {
    user_id: &'a str,
    email: &'a str,
    password: &'a str,
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct EmailSessionBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RecoveryBody<'a> {
    email: &'a str,
    url: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateDocumentBody<'a> {
    document_id: &'a str,
    data: &'a ProfileData,
    permissions: Vec<String>,
}

#[derive(Debug, Serialize)]
struct UpdateDocumentBody<'a> {
    data: &'a ProfileUpdate,
}

#[derive(Debug, Serialize)]
struct MembershipBody<'a> {
    email: &'a str,
    roles: &'a [String],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserPayload {
    #[serde(rename = "$id")]
    id: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    email_verification: bool,
}

impl From<UserPayload> for Identity {
    fn from(user: UserPayload) -> Self {
        Identity {
            id: user.id,
            email: user.email,
            name: user.name,
            email_verified: user.email_verification,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionPayload {
    #[serde(rename = "$id")]
    id: String,
    user_id: String,
    #[serde(default)]
    secret: String,
    #[serde(default)]
    expire: Option<String>,
}

impl From<SessionPayload> for Session {
    fn from(session: SessionPayload) -> Self {
        let expires_at = session
            .expire
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc));
        Session {
            id: session.id,
            user_id: session.user_id,
            secret: session.secret,
            expires_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DocumentPayload {
    #[serde(rename = "$id")]
    id: String,
    #[serde(flatten)]
    data: ProfileData,
}

impl From<DocumentPayload> for ProfileRecord {
    fn from(doc: DocumentPayload) -> Self {
        ProfileRecord {
            id: doc.id,
            data: doc.data,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DocumentListPayload {
    #[serde(default)]
    documents: Vec<DocumentPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MembershipPayload {
    #[serde(rename = "$id")]
    id: String,
    team_id: String,
    #[serde(default)]
    user_email: String,
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default)]
    confirm: bool,
}

impl From<MembershipPayload> for Membership {
    fn from(m: MembershipPayload) -> Self {
        Membership {
            id: m.id,
            team_id: m.team_id,
            user_email: m.user_email,
            roles: m.roles,
            confirmed: m.confirm,
        }
    }
}

/// Appwrite error body: `{"message": "...", "code": 409, "type": "user_already_exists"}`.
#[derive(Debug, Deserialize)]
struct ErrorPayload {
    message: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

impl AppwriteClient {
    pub fn new(config: AppwriteConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()
            .map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("Failed to build HTTP client: {}", e))
            })?;
        let retry = RetryConfig::with_max_retries(config.read_retries);

        Ok(Self {
            client,
            config,
            retry,
        })
    }

    /// Override the retry policy for reads.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint, path)
    }

    fn documents_url(&self) -> String {
        self.url(&format!(
            "/databases/{}/collections/{}/documents",
            self.config.database_id, self.config.profiles_collection_id
        ))
    }

    fn document_url(&self, document_id: &str) -> Result<String, BackendError> {
        Ok(format!("{}/{}", self.documents_url(), path_segment(document_id)?))
    }

    fn admin(&self, request: TracedRequest) -> TracedRequest {
        request
            .header(PROJECT_HEADER, &self.config.project_id)
            .header(KEY_HEADER, self.config.api_key.expose_secret())
    }

    fn as_session(&self, request: TracedRequest, session_secret: &str) -> TracedRequest {
        request
            .header(PROJECT_HEADER, &self.config.project_id)
            .header(SESSION_HEADER, session_secret)
    }

    /// Send and classify. Returns the raw body of a 2xx response.
    async fn execute(
        &self,
        operation: &'static str,
        request: TracedRequest,
    ) -> Result<String, BackendError> {
        let response = request.send().await.map_err(|e| {
            warn!(operation, error = %e, "Appwrite request failed in transport");
            BackendError::from(e)
        })?;

        let status = response.status();
        let body = response.text().await?;

        debug!(operation, status = %status, "Appwrite response");

        if status.is_success() {
            return Ok(body);
        }

        let (message, kind) = match serde_json::from_str::<ErrorPayload>(&body) {
            Ok(payload) => (payload.message, payload.kind),
            Err(_) if body.is_empty() => (status.to_string(), None),
            Err(_) => (body, None),
        };
        let err = BackendError::from_status(status.as_u16(), message);
        warn!(
            operation,
            status = status.as_u16(),
            error_type = kind.as_deref().unwrap_or("-"),
            error = %err,
            "Appwrite call failed"
        );
        Err(err)
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: TracedRequest,
    ) -> Result<T, BackendError> {
        let body = self.execute(operation, request).await?;
        serde_json::from_str(&body).map_err(|e| BackendError::Upstream {
            code: 502,
            message: format!("Unexpected {} response: {}", operation, e),
        })
    }
}

/// Encode an id as a single path segment. Malformed ids never reach the wire.
fn path_segment(id: &str) -> Result<String, BackendError> {
    if !is_valid_id(id) {
        return Err(BackendError::InvalidArgument(format!(
            "Invalid resource id: {:?}",
            id
        )));
    }
    Ok(urlencoding::encode(id).into_owned())
}

#[async_trait]
impl IdentityService for AppwriteClient {
    #[instrument(skip(self, account), fields(email = %account.email))]
    async fn create_account(&self, account: &NewAccount) -> Result<Identity, BackendError> {
        let user_id = account
            .user_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
        let body = CreateUserBody {
            user_id: &user_id,
            email: &account.email,
            password: &account.password,
            name: &account.name,
        };

        let request = self.admin(self.client.traced_post(&self.url("/users"))).json(&body);
        let user: UserPayload = self.execute_json("create_account", request).await?;
        Ok(user.into())
    }

    #[instrument(skip_all)]
    async fn get_current_user(&self, session_secret: &str) -> Result<Identity, BackendError> {
        retry_idempotent(&self.retry, "get_current_user", move || async move {
            let request =
                self.as_session(self.client.traced_get(&self.url("/account")), session_secret);
            let user: UserPayload = self.execute_json("get_current_user", request).await?;
            Ok(user.into())
        })
        .await
    }

    #[instrument(skip(self))]
    async fn get_account(&self, identity_id: &str) -> Result<Identity, BackendError> {
        let url = self.url(&format!("/users/{}", path_segment(identity_id)?));
        let url = url.as_str();
        retry_idempotent(&self.retry, "get_account", move || async move {
            let request = self.admin(self.client.traced_get(url));
            let user: UserPayload = self.execute_json("get_account", request).await?;
            Ok(user.into())
        })
        .await
    }

    #[instrument(skip(self))]
    async fn delete_account(&self, identity_id: &str) -> Result<(), BackendError> {
        let url = self.url(&format!("/users/{}", path_segment(identity_id)?));
        let request = self.admin(self.client.traced_delete(&url));
        self.execute("delete_account", request).await.map(|_| ())
    }

    #[instrument(skip(self, password))]
    async fn create_session(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        let body = EmailSessionBody { email, password };
        let request = self
            .admin(self.client.traced_post(&self.url("/account/sessions/email")))
            .json(&body);
        let session: SessionPayload = self.execute_json("create_session", request).await?;
        Ok(session.into())
    }

    #[instrument(skip_all)]
    async fn delete_session(&self, session_secret: &str) -> Result<(), BackendError> {
        let request = self.as_session(
            self.client
                .traced_delete(&self.url("/account/sessions/current")),
            session_secret,
        );
        self.execute("delete_session", request).await.map(|_| ())
    }

    #[instrument(skip(self))]
    async fn create_recovery(&self, email: &str, redirect_url: &str) -> Result<(), BackendError> {
        let body = RecoveryBody {
            email,
            url: redirect_url,
        };
        let request = self
            .admin(self.client.traced_post(&self.url("/account/recovery")))
            .json(&body);
        self.execute("create_recovery", request).await.map(|_| ())
    }
}

#[async_trait]
impl ProfileStore for AppwriteClient {
    #[instrument(skip(self, data, permissions))]
    async fn create_document(
        &self,
        document_id: &str,
        data: &ProfileData,
        permissions: &[Permission],
    ) -> Result<ProfileRecord, BackendError> {
        let body = CreateDocumentBody {
            document_id,
            data,
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
        };
        let request = self
            .admin(self.client.traced_post(&self.documents_url()))
            .json(&body);
        let doc: DocumentPayload = self.execute_json("create_document", request).await?;
        Ok(doc.into())
    }

    #[instrument(skip(self))]
    async fn get_document(&self, document_id: &str) -> Result<ProfileRecord, BackendError> {
        let url = self.document_url(document_id)?;
        let url = url.as_str();
        retry_idempotent(&self.retry, "get_document", move || async move {
            let request = self.admin(self.client.traced_get(url));
            let doc: DocumentPayload = self.execute_json("get_document", request).await?;
            Ok(doc.into())
        })
        .await
    }

    #[instrument(skip(self, update))]
    async fn update_document(
        &self,
        document_id: &str,
        update: &ProfileUpdate,
    ) -> Result<ProfileRecord, BackendError> {
        let request = self
            .admin(self.client.traced_patch(&self.document_url(document_id)?))
            .json(&UpdateDocumentBody { data: update });
        let doc: DocumentPayload = self.execute_json("update_document", request).await?;
        Ok(doc.into())
    }

    #[instrument(skip(self))]
    async fn delete_document(&self, document_id: &str) -> Result<(), BackendError> {
        let request = self.admin(self.client.traced_delete(&self.document_url(document_id)?));
        self.execute("delete_document", request).await.map(|_| ())
    }

    #[instrument(skip(self, queries), fields(filters = queries.len()))]
    async fn list_documents(&self, queries: &[Query]) -> Result<Vec<ProfileRecord>, BackendError> {
        let url = self.documents_url();
        let url = url.as_str();
        let params: Vec<(&str, String)> = queries.iter().map(|q| ("queries[]", q.to_wire())).collect();
        let params = params.as_slice();
        retry_idempotent(&self.retry, "list_documents", move || async move {
            let request = self.admin(self.client.traced_get(url)).query(params);
            let list: DocumentListPayload = self.execute_json("list_documents", request).await?;
            Ok(list.documents.into_iter().map(ProfileRecord::from).collect())
        })
        .await
    }
}

#[async_trait]
impl TeamClient for AppwriteClient {
    #[instrument(skip(self, roles))]
    async fn create_membership(
        &self,
        team_id: &str,
        roles: &[String],
        email: &str,
    ) -> Result<Membership, BackendError> {
        let url = self.url(&format!("/teams/{}/memberships", path_segment(team_id)?));
        let request = self
            .admin(self.client.traced_post(&url))
            .json(&MembershipBody { email, roles });
        let membership: MembershipPayload =
            self.execute_json("create_membership", request).await?;
        Ok(membership.into())
    }
}
