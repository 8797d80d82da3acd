use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{
    DraftRepository, FormRepository, ParticipationRepository, RefreshTokenRepository,
    RepositoryError, RepositoryResult, Store, SubmissionRepository, UserRepository,
};
use crate::models::{
    draft::DraftSubmission,
    form::Form,
    participation::{ParticipationStatus, UserFormParticipation},
    refresh_token::RefreshToken,
    submission::Submission,
    user::User,
};

type PairKey = (String, String);

fn pair_key(user_id: &str, form_id: &str) -> PairKey {
    (user_id.to_string(), form_id.to_string())
}

#[derive(Default)]
struct Tables {
    forms: HashMap<String, Form>,
    submissions: HashMap<PairKey, Submission>,
    drafts: HashMap<PairKey, DraftSubmission>,
    participations: HashMap<PairKey, UserFormParticipation>,
    users: HashMap<String, User>,
    refresh_tokens: HashMap<String, RefreshToken>,
}

/// Process-local store. Every operation runs under one lock, so each call is
/// atomic with respect to the others; uniqueness is enforced by map keys.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_forms_first(mut forms: Vec<Form>) -> Vec<Form> {
    forms.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    forms
}

fn most_recent_first(mut rows: Vec<UserFormParticipation>) -> Vec<UserFormParticipation> {
    rows.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
    rows
}

#[async_trait]
impl FormRepository for InMemoryStore {
    async fn insert_form(&self, form: &Form) -> RepositoryResult<()> {
        let mut tables = self.tables.write().await;
        if tables.forms.contains_key(&form.id) {
            return Err(RepositoryError::Duplicate);
        }
        tables.forms.insert(form.id.clone(), form.clone());
        Ok(())
    }

    async fn find_form(&self, id: &str) -> RepositoryResult<Option<Form>> {
        let tables = self.tables.read().await;
        Ok(tables.forms.get(id).filter(|f| !f.is_deleted()).cloned())
    }

    async fn find_forms_by_ids(&self, ids: &[String]) -> RepositoryResult<Vec<Form>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.forms.get(id).cloned())
            .collect())
    }

    async fn list_forms_by_owner(&self, owner_id: &str) -> RepositoryResult<Vec<Form>> {
        let tables = self.tables.read().await;
        let forms = tables
            .forms
            .values()
            .filter(|f| !f.is_deleted() && f.is_owned_by(owner_id))
            .cloned()
            .collect();
        Ok(newest_forms_first(forms))
    }

    async fn list_active_forms(&self, now: DateTime<Utc>) -> RepositoryResult<Vec<Form>> {
        let tables = self.tables.read().await;
        let forms = tables
            .forms
            .values()
            .filter(|f| f.is_active_at(now))
            .cloned()
            .collect();
        Ok(newest_forms_first(forms))
    }

    async fn replace_form(&self, form: &Form) -> RepositoryResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.forms.get_mut(&form.id) {
            Some(stored) if !stored.is_deleted() => {
                *stored = form.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_form_cascade(
        &self,
        form_id: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<bool> {
        let mut tables = self.tables.write().await;

        match tables.forms.get_mut(form_id) {
            Some(form) if !form.is_deleted() => {
                form.deleted_at = Some(now);
                form.updated_at = now;
                form.questions.clear();
            }
            _ => return Ok(false),
        }

        for participation in tables.participations.values_mut() {
            if participation.form_id == form_id {
                participation.status = ParticipationStatus::Deleted;
                participation.last_modified = now;
                participation.version += 1;
            }
        }
        tables.submissions.retain(|(_, f), _| f != form_id);
        tables.drafts.retain(|(_, f), _| f != form_id);

        Ok(true)
    }
}

#[async_trait]
impl SubmissionRepository for InMemoryStore {
    async fn insert_submission(&self, submission: &Submission) -> RepositoryResult<()> {
        let mut tables = self.tables.write().await;
        let key = pair_key(&submission.user_id, &submission.form_id);
        if tables.submissions.contains_key(&key) {
            return Err(RepositoryError::Duplicate);
        }
        tables.submissions.insert(key, submission.clone());
        Ok(())
    }

    async fn submission_exists(&self, user_id: &str, form_id: &str) -> RepositoryResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables.submissions.contains_key(&pair_key(user_id, form_id)))
    }

    async fn list_submissions_by_form(&self, form_id: &str) -> RepositoryResult<Vec<Submission>> {
        let tables = self.tables.read().await;
        let mut submissions: Vec<Submission> = tables
            .submissions
            .values()
            .filter(|s| s.form_id == form_id)
            .cloned()
            .collect();
        submissions.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(submissions)
    }

    async fn count_submissions_by_form(&self, form_id: &str) -> RepositoryResult<u64> {
        let tables = self.tables.read().await;
        Ok(tables
            .submissions
            .values()
            .filter(|s| s.form_id == form_id)
            .count() as u64)
    }

    async fn list_submitted_form_ids(&self, user_id: &str) -> RepositoryResult<Vec<String>> {
        let tables = self.tables.read().await;
        Ok(tables
            .submissions
            .values()
            .filter(|s| s.user_id == user_id)
            .map(|s| s.form_id.clone())
            .collect())
    }
}

#[async_trait]
impl DraftRepository for InMemoryStore {
    async fn upsert_draft(&self, draft: &DraftSubmission) -> RepositoryResult<DraftSubmission> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .drafts
            .entry(pair_key(&draft.user_id, &draft.form_id))
            .and_modify(|existing| {
                existing.answers = draft.answers.clone();
                existing.progress_percentage = draft.progress_percentage;
                existing.updated_at = draft.updated_at;
            })
            .or_insert_with(|| draft.clone());
        Ok(stored.clone())
    }

    async fn find_draft(
        &self,
        user_id: &str,
        form_id: &str,
    ) -> RepositoryResult<Option<DraftSubmission>> {
        let tables = self.tables.read().await;
        Ok(tables.drafts.get(&pair_key(user_id, form_id)).cloned())
    }

    async fn delete_draft(&self, user_id: &str, form_id: &str) -> RepositoryResult<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.drafts.remove(&pair_key(user_id, form_id)).is_some())
    }
}

#[async_trait]
impl ParticipationRepository for InMemoryStore {
    async fn find_participation(
        &self,
        user_id: &str,
        form_id: &str,
    ) -> RepositoryResult<Option<UserFormParticipation>> {
        let tables = self.tables.read().await;
        Ok(tables.participations.get(&pair_key(user_id, form_id)).cloned())
    }

    async fn insert_participation(
        &self,
        participation: &UserFormParticipation,
    ) -> RepositoryResult<()> {
        let mut tables = self.tables.write().await;
        let key = pair_key(&participation.user_id, &participation.form_id);
        if tables.participations.contains_key(&key) {
            return Err(RepositoryError::Duplicate);
        }
        tables.participations.insert(key, participation.clone());
        Ok(())
    }

    async fn replace_participation(
        &self,
        participation: &UserFormParticipation,
        expected_version: i64,
    ) -> RepositoryResult<bool> {
        let mut tables = self.tables.write().await;
        let key = pair_key(&participation.user_id, &participation.form_id);
        match tables.participations.get_mut(&key) {
            Some(stored) if stored.id == participation.id && stored.version == expected_version => {
                *stored = participation.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_participation(&self, user_id: &str, form_id: &str) -> RepositoryResult<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .participations
            .remove(&pair_key(user_id, form_id))
            .is_some())
    }

    async fn list_participations_by_user(
        &self,
        user_id: &str,
    ) -> RepositoryResult<Vec<UserFormParticipation>> {
        let tables = self.tables.read().await;
        let rows = tables
            .participations
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        Ok(most_recent_first(rows))
    }

    async fn list_participations_by_form(
        &self,
        form_id: &str,
        status: ParticipationStatus,
    ) -> RepositoryResult<Vec<UserFormParticipation>> {
        let tables = self.tables.read().await;
        let rows = tables
            .participations
            .values()
            .filter(|p| p.form_id == form_id && p.status == status)
            .cloned()
            .collect();
        Ok(most_recent_first(rows))
    }

    async fn count_participations(
        &self,
        user_id: &str,
        status: ParticipationStatus,
    ) -> RepositoryResult<u64> {
        let tables = self.tables.read().await;
        Ok(tables
            .participations
            .values()
            .filter(|p| p.user_id == user_id && p.status == status)
            .count() as u64)
    }

    async fn count_participations_modified_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> RepositoryResult<u64> {
        let tables = self.tables.read().await;
        Ok(tables
            .participations
            .values()
            .filter(|p| p.user_id == user_id && p.last_modified >= since)
            .count() as u64)
    }

    async fn page_participations(
        &self,
        user_id: &str,
        status: Option<ParticipationStatus>,
        skip: u64,
        limit: u64,
    ) -> RepositoryResult<(Vec<UserFormParticipation>, u64)> {
        let tables = self.tables.read().await;
        let rows: Vec<UserFormParticipation> = tables
            .participations
            .values()
            .filter(|p| p.user_id == user_id && status.is_none_or(|s| p.status == s))
            .cloned()
            .collect();
        let total = rows.len() as u64;

        let page = most_recent_first(rows)
            .into_iter()
            .skip(usize::try_from(skip).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .collect();

        Ok((page, total))
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn insert_user(&self, user: &User) -> RepositoryResult<()> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(RepositoryError::Duplicate);
        }
        tables.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: &str) -> RepositoryResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(id).cloned())
    }

    async fn find_users_by_ids(&self, ids: &[String]) -> RepositoryResult<Vec<User>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.users.get(id).cloned())
            .collect())
    }

    async fn record_login(&self, user_id: &str, at: DateTime<Utc>) -> RepositoryResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(user) = tables.users.get_mut(user_id) {
            user.last_login_at = Some(at);
        }
        Ok(())
    }
}

#[async_trait]
impl RefreshTokenRepository for InMemoryStore {
    async fn insert_refresh_token(&self, token: &RefreshToken) -> RepositoryResult<()> {
        let mut tables = self.tables.write().await;
        if tables.refresh_tokens.contains_key(&token.token_hash) {
            return Err(RepositoryError::Duplicate);
        }
        tables
            .refresh_tokens
            .insert(token.token_hash.clone(), token.clone());
        Ok(())
    }

    async fn find_refresh_token(&self, token_hash: &str) -> RepositoryResult<Option<RefreshToken>> {
        let tables = self.tables.read().await;
        Ok(tables.refresh_tokens.get(token_hash).cloned())
    }

    async fn touch_refresh_token(
        &self,
        token_hash: &str,
        at: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(token) = tables.refresh_tokens.get_mut(token_hash) {
            token.last_used_at = at;
        }
        Ok(())
    }

    async fn revoke_refresh_token(&self, token_hash: &str) -> RepositoryResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.refresh_tokens.get_mut(token_hash) {
            Some(token) if !token.revoked => {
                token.revoked = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn ping(&self) -> RepositoryResult<()> {
        Ok(())
    }
}
