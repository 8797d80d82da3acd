//! Storage seams. Services depend on these traits only; `MongoStore` backs
//! production and `InMemoryStore` backs tests and local runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{
    draft::DraftSubmission,
    form::Form,
    participation::{ParticipationStatus, UserFormParticipation},
    refresh_token::RefreshToken,
    submission::Submission,
    user::User,
};

pub mod memory;
pub mod mongo;

pub use memory::InMemoryStore;
pub use mongo::MongoStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A unique index rejected the write.
    #[error("duplicate key")]
    Duplicate,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait FormRepository: Send + Sync {
    async fn insert_form(&self, form: &Form) -> RepositoryResult<()>;
    /// Live (not deleted) form by id.
    async fn find_form(&self, id: &str) -> RepositoryResult<Option<Form>>;
    /// Forms by id, deleted ones included.
    async fn find_forms_by_ids(&self, ids: &[String]) -> RepositoryResult<Vec<Form>>;
    /// Live forms of an owner, newest first.
    async fn list_forms_by_owner(&self, owner_id: &str) -> RepositoryResult<Vec<Form>>;
    /// Live forms whose window contains `now`, newest first.
    async fn list_active_forms(&self, now: DateTime<Utc>) -> RepositoryResult<Vec<Form>>;
    /// Overwrites a live form. Returns false when it no longer exists.
    async fn replace_form(&self, form: &Form) -> RepositoryResult<bool>;
    /// Marks participations deleted, removes submissions and drafts, then
    /// marks the form deleted, all or nothing. Returns false when no live
    /// form matched.
    async fn delete_form_cascade(&self, form_id: &str, now: DateTime<Utc>)
        -> RepositoryResult<bool>;
}

#[async_trait]
pub trait SubmissionRepository: Send + Sync {
    /// Fails with `Duplicate` when the user already submitted this form.
    async fn insert_submission(&self, submission: &Submission) -> RepositoryResult<()>;
    async fn submission_exists(&self, user_id: &str, form_id: &str) -> RepositoryResult<bool>;
    async fn list_submissions_by_form(&self, form_id: &str) -> RepositoryResult<Vec<Submission>>;
    async fn count_submissions_by_form(&self, form_id: &str) -> RepositoryResult<u64>;
    async fn list_submitted_form_ids(&self, user_id: &str) -> RepositoryResult<Vec<String>>;
}

#[async_trait]
pub trait DraftRepository: Send + Sync {
    /// Inserts or overwrites the (user, form) draft in one write. The stored
    /// draft keeps its original id and creation time.
    async fn upsert_draft(&self, draft: &DraftSubmission) -> RepositoryResult<DraftSubmission>;
    async fn find_draft(
        &self,
        user_id: &str,
        form_id: &str,
    ) -> RepositoryResult<Option<DraftSubmission>>;
    async fn delete_draft(&self, user_id: &str, form_id: &str) -> RepositoryResult<bool>;
}

#[async_trait]
pub trait ParticipationRepository: Send + Sync {
    async fn find_participation(
        &self,
        user_id: &str,
        form_id: &str,
    ) -> RepositoryResult<Option<UserFormParticipation>>;
    /// Fails with `Duplicate` when a row for (user, form) already exists.
    async fn insert_participation(&self, participation: &UserFormParticipation)
        -> RepositoryResult<()>;
    /// Compare-and-swap on `version`. Returns false when the stored row is no
    /// longer at `expected_version`.
    async fn replace_participation(
        &self,
        participation: &UserFormParticipation,
        expected_version: i64,
    ) -> RepositoryResult<bool>;
    async fn delete_participation(&self, user_id: &str, form_id: &str) -> RepositoryResult<bool>;
    async fn list_participations_by_user(
        &self,
        user_id: &str,
    ) -> RepositoryResult<Vec<UserFormParticipation>>;
    async fn list_participations_by_form(
        &self,
        form_id: &str,
        status: ParticipationStatus,
    ) -> RepositoryResult<Vec<UserFormParticipation>>;
    async fn count_participations(
        &self,
        user_id: &str,
        status: ParticipationStatus,
    ) -> RepositoryResult<u64>;
    async fn count_participations_modified_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> RepositoryResult<u64>;
    /// Rows of a user ordered by `last_modified` descending, plus the total
    /// matching count.
    async fn page_participations(
        &self,
        user_id: &str,
        status: Option<ParticipationStatus>,
        skip: u64,
        limit: u64,
    ) -> RepositoryResult<(Vec<UserFormParticipation>, u64)>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Duplicate` when the email is taken.
    async fn insert_user(&self, user: &User) -> RepositoryResult<()>;
    async fn find_user_by_email(&self, email: &str) -> RepositoryResult<Option<User>>;
    async fn find_user_by_id(&self, id: &str) -> RepositoryResult<Option<User>>;
    async fn find_users_by_ids(&self, ids: &[String]) -> RepositoryResult<Vec<User>>;
    async fn record_login(&self, user_id: &str, at: DateTime<Utc>) -> RepositoryResult<()>;
}

#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    async fn insert_refresh_token(&self, token: &RefreshToken) -> RepositoryResult<()>;
    async fn find_refresh_token(&self, token_hash: &str) -> RepositoryResult<Option<RefreshToken>>;
    async fn touch_refresh_token(&self, token_hash: &str, at: DateTime<Utc>)
        -> RepositoryResult<()>;
    /// Returns false when the token was unknown or already revoked.
    async fn revoke_refresh_token(&self, token_hash: &str) -> RepositoryResult<bool>;
}

#[async_trait]
pub trait Store:
    FormRepository
    + SubmissionRepository
    + DraftRepository
    + ParticipationRepository
    + UserRepository
    + RefreshTokenRepository
{
    async fn ping(&self) -> RepositoryResult<()>;
}
