//! Contracts for the three backend collaborators.
//!
//! Each trait is object-safe and held as `Arc<dyn _>` so the Appwrite client
//! and the in-memory backend are interchangeable.

use async_trait::async_trait;
use std::sync::Arc;

use super::error::BackendError;
use crate::models::{
    Identity, Membership, NewAccount, Permission, ProfileData, ProfileRecord, ProfileUpdate,
    Query, Session,
};

#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn create_account(&self, account: &NewAccount) -> Result<Identity, BackendError>;

    /// Resolve the identity behind a session secret.
    async fn get_current_user(&self, session_secret: &str) -> Result<Identity, BackendError>;

    async fn get_account(&self, identity_id: &str) -> Result<Identity, BackendError>;

    async fn delete_account(&self, identity_id: &str) -> Result<(), BackendError>;

    async fn create_session(&self, email: &str, password: &str) -> Result<Session, BackendError>;

    async fn delete_session(&self, session_secret: &str) -> Result<(), BackendError>;

    /// Send a password recovery email whose link points at `redirect_url`.
    async fn create_recovery(&self, email: &str, redirect_url: &str) -> Result<(), BackendError>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn create_document(
        &self,
        document_id: &str,
        data: &ProfileData,
        permissions: &[Permission],
    ) -> Result<ProfileRecord, BackendError>;

    async fn get_document(&self, document_id: &str) -> Result<ProfileRecord, BackendError>;

    async fn update_document(
        &self,
        document_id: &str,
        update: &ProfileUpdate,
    ) -> Result<ProfileRecord, BackendError>;

    async fn delete_document(&self, document_id: &str) -> Result<(), BackendError>;

    async fn list_documents(&self, queries: &[Query]) -> Result<Vec<ProfileRecord>, BackendError>;
}

#[async_trait]
pub trait TeamClient: Send + Sync {
    /// Invite `email` into `team_id`. The membership stays unconfirmed until accepted.
    async fn create_membership(
        &self,
        team_id: &str,
        roles: &[String],
        email: &str,
    ) -> Result<Membership, BackendError>;
}

/// The three collaborators, wired once at startup.
#[derive(Clone)]
pub struct Backend {
    pub identity: Arc<dyn IdentityService>,
    pub profiles: Arc<dyn ProfileStore>,
    pub teams: Arc<dyn TeamClient>,
}

impl Backend {
    /// Use one implementation for all three roles.
    pub fn from_shared<T>(backend: Arc<T>) -> Self
    where
        T: IdentityService + ProfileStore + TeamClient + 'static,
    {
        Self {
            identity: backend.clone(),
            profiles: backend.clone(),
            teams: backend,
        }
    }
}
