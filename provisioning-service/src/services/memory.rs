//! In-process backend implementing all three collaborator traits.
//!
//! Used by the test suite and by `BACKEND_MODE=memory` local runs. Identity
//! ids are sequential (`u1`, `u2`, ...). Every call is counted per operation
//! and a failure can be queued for the next call of any operation.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use super::backend::{IdentityService, ProfileStore, TeamClient};
use super::error::BackendError;
use crate::models::{
    Identity, Membership, NewAccount, Permission, ProfileData, ProfileRecord, ProfileUpdate,
    Query, Session,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateAccount,
    GetCurrentUser,
    GetAccount,
    DeleteAccount,
    CreateSession,
    DeleteSession,
    CreateRecovery,
    CreateDocument,
    GetDocument,
    UpdateDocument,
    DeleteDocument,
    ListDocuments,
    CreateMembership,
}

struct StoredAccount {
    identity: Identity,
    password: String,
}

struct StoredDocument {
    record: ProfileRecord,
    permissions: Vec<String>,
}

#[derive(Default)]
struct State {
    accounts: BTreeMap<String, StoredAccount>,
    // session secret -> identity id
    sessions: HashMap<String, String>,
    documents: BTreeMap<String, StoredDocument>,
    teams: HashMap<String, Vec<Membership>>,
    recoveries: Vec<(String, String)>,
    next_user: u64,
    next_session: u64,
    next_membership: u64,
    calls: HashMap<Operation, usize>,
    failures: HashMap<Operation, VecDeque<BackendError>>,
}

impl State {
    fn begin(&mut self, op: Operation) -> Result<(), BackendError> {
        *self.calls.entry(op).or_insert(0) += 1;
        match self.failures.get_mut(&op).and_then(|q| q.pop_front()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn identity(&self, identity_id: &str) -> Result<Identity, BackendError> {
        self.accounts
            .get(identity_id)
            .map(|a| a.identity.clone())
            .ok_or_else(user_not_found)
    }
}

#[derive(Default)]
pub struct InMemoryBackend {
    state: Mutex<State>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a team that memberships can be created in.
    pub fn with_team(self, team_id: &str) -> Self {
        self.add_team(team_id);
        self
    }

    pub fn add_team(&self, team_id: &str) {
        self.state().teams.entry(team_id.to_string()).or_default();
    }

    /// Make the next call of `op` fail with `err`. Queued failures are consumed in order.
    pub fn fail_next(&self, op: Operation, err: BackendError) {
        self.state().failures.entry(op).or_default().push_back(err);
    }

    pub fn calls(&self, op: Operation) -> usize {
        self.state().calls.get(&op).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.state().calls.values().sum()
    }

    pub fn account(&self, identity_id: &str) -> Option<Identity> {
        self.state()
            .accounts
            .get(identity_id)
            .map(|a| a.identity.clone())
    }

    pub fn document(&self, document_id: &str) -> Option<ProfileRecord> {
        self.state()
            .documents
            .get(document_id)
            .map(|d| d.record.clone())
    }

    /// Permissions of a stored document in wire format.
    pub fn permissions(&self, document_id: &str) -> Vec<String> {
        self.state()
            .documents
            .get(document_id)
            .map(|d| d.permissions.clone())
            .unwrap_or_default()
    }

    pub fn memberships(&self, team_id: &str) -> Vec<Membership> {
        self.state().teams.get(team_id).cloned().unwrap_or_default()
    }

    /// Recovery requests as `(email, redirect_url)`.
    pub fn recoveries(&self) -> Vec<(String, String)> {
        self.state().recoveries.clone()
    }

    /// Drop a session as if it had expired upstream.
    pub fn expire_session(&self, session_secret: &str) {
        self.state().sessions.remove(session_secret);
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn user_not_found() -> BackendError {
    BackendError::NotFound("User with the requested ID could not be found.".to_string())
}

fn document_not_found() -> BackendError {
    BackendError::NotFound("Document with the requested ID could not be found.".to_string())
}

#[async_trait]
impl IdentityService for InMemoryBackend {
    async fn create_account(&self, account: &NewAccount) -> Result<Identity, BackendError> {
        let mut state = self.state();
        state.begin(Operation::CreateAccount)?;

        let email = account.email.trim().to_lowercase();
        let taken = state.accounts.values().any(|a| a.identity.email == email)
            || account
                .user_id
                .as_ref()
                .is_some_and(|id| state.accounts.contains_key(id));
        if taken {
            return Err(BackendError::Conflict(
                "A user with the same id, email, or phone already exists in this project."
                    .to_string(),
            ));
        }

        let id = match &account.user_id {
            Some(id) => id.clone(),
            None => {
                state.next_user += 1;
                format!("u{}", state.next_user)
            }
        };

        let identity = Identity {
            id: id.clone(),
            email,
            name: account.name.clone(),
            email_verified: false,
        };
        state.accounts.insert(
            id,
            StoredAccount {
                identity: identity.clone(),
                password: account.password.clone(),
            },
        );
        Ok(identity)
    }

    async fn get_current_user(&self, session_secret: &str) -> Result<Identity, BackendError> {
        let mut state = self.state();
        state.begin(Operation::GetCurrentUser)?;

        let identity_id = state.sessions.get(session_secret).cloned().ok_or_else(|| {
            BackendError::Unauthorized("User (role: guests) missing scope (account)".to_string())
        })?;
        state.identity(&identity_id)
    }

    async fn get_account(&self, identity_id: &str) -> Result<Identity, BackendError> {
        let mut state = self.state();
        state.begin(Operation::GetAccount)?;
        state.identity(identity_id)
    }

    async fn delete_account(&self, identity_id: &str) -> Result<(), BackendError> {
        let mut state = self.state();
        state.begin(Operation::DeleteAccount)?;

        state
            .accounts
            .remove(identity_id)
            .ok_or_else(user_not_found)?;
        state.sessions.retain(|_, owner| owner != identity_id);
        Ok(())
    }

    async fn create_session(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        let mut state = self.state();
        state.begin(Operation::CreateSession)?;

        let email = email.trim().to_lowercase();
        let identity_id = state
            .accounts
            .values()
            .find(|a| a.identity.email == email && a.password == password)
            .map(|a| a.identity.id.clone())
            .ok_or_else(|| {
                BackendError::Unauthorized(
                    "Invalid credentials. Please check the email and password.".to_string(),
                )
            })?;

        state.next_session += 1;
        let session = Session {
            id: format!("s{}", state.next_session),
            user_id: identity_id.clone(),
            secret: Uuid::new_v4().simple().to_string(),
            expires_at: None,
        };
        state.sessions.insert(session.secret.clone(), identity_id);
        Ok(session)
    }

    async fn delete_session(&self, session_secret: &str) -> Result<(), BackendError> {
        let mut state = self.state();
        state.begin(Operation::DeleteSession)?;

        state.sessions.remove(session_secret).map(|_| ()).ok_or_else(|| {
            BackendError::Unauthorized("User (role: guests) missing scope (account)".to_string())
        })
    }

    async fn create_recovery(&self, email: &str, redirect_url: &str) -> Result<(), BackendError> {
        let mut state = self.state();
        state.begin(Operation::CreateRecovery)?;

        let email = email.trim().to_lowercase();
        if !state.accounts.values().any(|a| a.identity.email == email) {
            return Err(user_not_found());
        }
        state.recoveries.push((email, redirect_url.to_string()));
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for InMemoryBackend {
    async fn create_document(
        &self,
        document_id: &str,
        data: &ProfileData,
        permissions: &[Permission],
    ) -> Result<ProfileRecord, BackendError> {
        let mut state = self.state();
        state.begin(Operation::CreateDocument)?;

        if state.documents.contains_key(document_id) {
            return Err(BackendError::Conflict(
                "Document with the requested ID already exists.".to_string(),
            ));
        }

        let record = ProfileRecord {
            id: document_id.to_string(),
            data: data.clone(),
        };
        state.documents.insert(
            document_id.to_string(),
            StoredDocument {
                record: record.clone(),
                permissions: permissions.iter().map(|p| p.to_string()).collect(),
            },
        );
        Ok(record)
    }

    async fn get_document(&self, document_id: &str) -> Result<ProfileRecord, BackendError> {
        let mut state = self.state();
        state.begin(Operation::GetDocument)?;

        state
            .documents
            .get(document_id)
            .map(|d| d.record.clone())
            .ok_or_else(document_not_found)
    }

    async fn update_document(
        &self,
        document_id: &str,
        update: &ProfileUpdate,
    ) -> Result<ProfileRecord, BackendError> {
        let mut state = self.state();
        state.begin(Operation::UpdateDocument)?;

        let stored = state
            .documents
            .get_mut(document_id)
            .ok_or_else(document_not_found)?;
        stored.record.data.apply(update);
        Ok(stored.record.clone())
    }

    async fn delete_document(&self, document_id: &str) -> Result<(), BackendError> {
        let mut state = self.state();
        state.begin(Operation::DeleteDocument)?;

        state
            .documents
            .remove(document_id)
            .map(|_| ())
            .ok_or_else(document_not_found)
    }

    async fn list_documents(&self, queries: &[Query]) -> Result<Vec<ProfileRecord>, BackendError> {
        let mut state = self.state();
        state.begin(Operation::ListDocuments)?;

        let mut records = Vec::new();
        for stored in state.documents.values() {
            let value = serde_json::to_value(&stored.record.data)
                .map_err(|e| BackendError::InvalidArgument(e.to_string()))?;
            if queries.iter().all(|q| q.matches(&value)) {
                records.push(stored.record.clone());
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl TeamClient for InMemoryBackend {
    async fn create_membership(
        &self,
        team_id: &str,
        roles: &[String],
        email: &str,
    ) -> Result<Membership, BackendError> {
        let mut state = self.state();
        state.begin(Operation::CreateMembership)?;

        state.next_membership += 1;
        let membership_id = format!("m{}", state.next_membership);

        let members = state.teams.get_mut(team_id).ok_or_else(|| {
            BackendError::NotFound("Team with the requested ID could not be found.".to_string())
        })?;

        let email = email.trim().to_lowercase();
        if members.iter().any(|m| m.user_email == email) {
            return Err(BackendError::Conflict(
                "User has already been invited or is already a member of this team".to_string(),
            ));
        }

        let membership = Membership {
            id: membership_id,
            team_id: team_id.to_string(),
            user_email: email,
            roles: roles.to_vec(),
            confirmed: false,
        };
        members.push(membership.clone());
        Ok(membership)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(email: &str) -> NewAccount {
        NewAccount {
            user_id: None,
            email: email.to_string(),
            password: "longenough1".to_string(),
            name: "A B".to_string(),
        }
    }

    #[tokio::test]
    async fn assigns_sequential_ids_and_rejects_duplicate_email() {
        let backend = InMemoryBackend::new();
        let first = backend.create_account(&account("a@x.com")).await.unwrap();
        let second = backend.create_account(&account("b@x.com")).await.unwrap();
        assert_eq!(first.id, "u1");
        assert_eq!(second.id, "u2");

        let dup = backend.create_account(&account("A@X.com")).await;
        assert!(matches!(dup, Err(BackendError::Conflict(_))));
        assert_eq!(backend.calls(Operation::CreateAccount), 3);
    }

    #[tokio::test]
    async fn injected_failure_is_consumed_once() {
        let backend = InMemoryBackend::new();
        backend.fail_next(
            Operation::CreateAccount,
            BackendError::Unavailable("timeout".into()),
        );

        assert!(backend.create_account(&account("a@x.com")).await.is_err());
        assert!(backend.create_account(&account("a@x.com")).await.is_ok());
    }

    #[tokio::test]
    async fn sessions_resolve_until_expired() {
        let backend = InMemoryBackend::new();
        backend.create_account(&account("a@x.com")).await.unwrap();
        let session = backend.create_session("a@x.com", "longenough1").await.unwrap();

        let who = backend.get_current_user(&session.secret).await.unwrap();
        assert_eq!(who.id, "u1");

        backend.expire_session(&session.secret);
        assert!(matches!(
            backend.get_current_user(&session.secret).await,
            Err(BackendError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn membership_requires_existing_team() {
        let backend = InMemoryBackend::new().with_team("t1");

        let missing = backend.create_membership("t2", &[], "a@x.com").await;
        assert!(matches!(missing, Err(BackendError::NotFound(_))));

        let m = backend.create_membership("t1", &[], "a@x.com").await.unwrap();
        assert!(!m.confirmed);
        let again = backend.create_membership("t1", &[], "a@x.com").await;
        assert!(matches!(again, Err(BackendError::Conflict(_))));
    }
}
