use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    error::{ErrorKind, WriteFailure},
    options::{IndexOptions, ReturnDocument},
    Client, Collection, Database, IndexModel,
};

use super::{
    DraftRepository, FormRepository, ParticipationRepository, RefreshTokenRepository,
    RepositoryError, RepositoryResult, Store, SubmissionRepository, UserRepository,
};
use crate::metrics::track_db_operation;
use crate::models::{
    draft::DraftSubmission,
    form::Form,
    participation::{ParticipationStatus, UserFormParticipation},
    refresh_token::RefreshToken,
    submission::Submission,
    user::User,
};
use crate::utils::time::chrono_to_bson;

const FORMS: &str = "forms";
const SUBMISSIONS: &str = "submissions";
const DRAFTS: &str = "drafts";
const PARTICIPATIONS: &str = "participations";
const USERS: &str = "users";
const REFRESH_TOKENS: &str = "refresh_tokens";

const DUPLICATE_KEY_CODE: i32 = 11000;

/// MongoDB-backed store. Form deletion uses a multi-document transaction,
/// so the deployment must be a replica set.
pub struct MongoStore {
    client: Client,
    db: Database,
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        *err.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref we)) if we.code == DUPLICATE_KEY_CODE
    )
}

fn backend(err: mongodb::error::Error, context: &'static str) -> RepositoryError {
    if is_duplicate_key(&err) {
        RepositoryError::Duplicate
    } else {
        RepositoryError::Backend(anyhow::Error::new(err).context(context))
    }
}

fn live_form_filter(id: &str) -> Document {
    doc! { "_id": id, "deleted_at": null }
}

fn pair_filter(user_id: &str, form_id: &str) -> Document {
    doc! { "user_id": user_id, "form_id": form_id }
}

impl MongoStore {
    pub async fn connect(client: Client, database: &str) -> anyhow::Result<Self> {
        let store = Self {
            db: client.database(database),
            client,
        };
        store.ensure_indexes().await?;
        Ok(store)
    }

    fn forms(&self) -> Collection<Form> {
        self.db.collection(FORMS)
    }

    fn submissions(&self) -> Collection<Submission> {
        self.db.collection(SUBMISSIONS)
    }

    fn drafts(&self) -> Collection<DraftSubmission> {
        self.db.collection(DRAFTS)
    }

    fn participations(&self) -> Collection<UserFormParticipation> {
        self.db.collection(PARTICIPATIONS)
    }

    fn users(&self) -> Collection<User> {
        self.db.collection(USERS)
    }

    fn refresh_tokens(&self) -> Collection<RefreshToken> {
        self.db.collection(REFRESH_TOKENS)
    }

    async fn ensure_indexes(&self) -> anyhow::Result<()> {
        let unique = || IndexOptions::builder().unique(true).build();
        let unique_pair = || {
            IndexModel::builder()
                .keys(doc! { "user_id": 1, "form_id": 1 })
                .options(unique())
                .build()
        };

        self.submissions()
            .create_index(unique_pair())
            .await
            .context("Failed to create submissions index")?;
        self.drafts()
            .create_index(unique_pair())
            .await
            .context("Failed to create drafts index")?;
        self.participations()
            .create_index(unique_pair())
            .await
            .context("Failed to create participations index")?;
        self.participations()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "user_id": 1, "last_modified": -1 })
                    .build(),
            )
            .await
            .context("Failed to create participations activity index")?;
        self.users()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(unique())
                    .build(),
            )
            .await
            .context("Failed to create users email index")?;
        self.refresh_tokens()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "token_hash": 1 })
                    .options(unique())
                    .build(),
            )
            .await
            .context("Failed to create refresh token index")?;
        self.forms()
            .create_index(IndexModel::builder().keys(doc! { "owner_id": 1 }).build())
            .await
            .context("Failed to create forms owner index")?;

        tracing::info!("MongoDB indexes ensured");
        Ok(())
    }
}

#[async_trait]
impl FormRepository for MongoStore {
    async fn insert_form(&self, form: &Form) -> RepositoryResult<()> {
        track_db_operation("insert_one", FORMS, async {
            self.forms()
                .insert_one(form)
                .await
                .map(|_| ())
                .map_err(|e| backend(e, "Failed to insert form"))
        })
        .await
    }

    async fn find_form(&self, id: &str) -> RepositoryResult<Option<Form>> {
        track_db_operation("find_one", FORMS, async {
            self.forms()
                .find_one(live_form_filter(id))
                .await
                .map_err(|e| backend(e, "Failed to query form"))
        })
        .await
    }

    async fn find_forms_by_ids(&self, ids: &[String]) -> RepositoryResult<Vec<Form>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        track_db_operation("find", FORMS, async {
            self.forms()
                .find(doc! { "_id": { "$in": ids.to_vec() } })
                .await
                .map_err(|e| backend(e, "Failed to query forms"))?
                .try_collect()
                .await
                .map_err(|e| backend(e, "Failed to read forms"))
        })
        .await
    }

    async fn list_forms_by_owner(&self, owner_id: &str) -> RepositoryResult<Vec<Form>> {
        track_db_operation("find", FORMS, async {
            self.forms()
                .find(doc! { "owner_id": owner_id, "deleted_at": null })
                .sort(doc! { "created_at": -1 })
                .await
                .map_err(|e| backend(e, "Failed to query owner forms"))?
                .try_collect()
                .await
                .map_err(|e| backend(e, "Failed to read owner forms"))
        })
        .await
    }

    async fn list_active_forms(&self, now: DateTime<Utc>) -> RepositoryResult<Vec<Form>> {
        let now = chrono_to_bson(now);
        track_db_operation("find", FORMS, async {
            self.forms()
                .find(doc! {
                    "deleted_at": null,
                    "start_at": { "$lte": now },
                    "$or": [
                        { "end_at": null },
                        { "end_at": { "$gte": now } },
                    ],
                })
                .sort(doc! { "created_at": -1 })
                .await
                .map_err(|e| backend(e, "Failed to query active forms"))?
                .try_collect()
                .await
                .map_err(|e| backend(e, "Failed to read active forms"))
        })
        .await
    }

    async fn replace_form(&self, form: &Form) -> RepositoryResult<bool> {
        track_db_operation("replace_one", FORMS, async {
            self.forms()
                .replace_one(live_form_filter(&form.id), form)
                .await
                .map(|result| result.matched_count > 0)
                .map_err(|e| backend(e, "Failed to update form"))
        })
        .await
    }

    async fn delete_form_cascade(
        &self,
        form_id: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<bool> {
        let deleted_at = chrono_to_bson(now);

        track_db_operation("transaction", FORMS, async {
            let mut session = self
                .client
                .start_session()
                .await
                .map_err(|e| backend(e, "Failed to start session"))?;
            session
                .start_transaction()
                .await
                .map_err(|e| backend(e, "Failed to start transaction"))?;

            let outcome: Result<bool, mongodb::error::Error> = async {
                let marked = self
                    .forms()
                    .update_one(
                        live_form_filter(form_id),
                        doc! { "$set": {
                            "deleted_at": deleted_at,
                            "updated_at": deleted_at,
                            "questions": [],
                        } },
                    )
                    .session(&mut session)
                    .await?;
                if marked.matched_count == 0 {
                    return Ok(false);
                }

                self.participations()
                    .update_many(
                        doc! { "form_id": form_id },
                        doc! {
                            "$set": {
                                "status": ParticipationStatus::Deleted.as_str(),
                                "last_modified": deleted_at,
                            },
                            "$inc": { "version": 1_i64 },
                        },
                    )
                    .session(&mut session)
                    .await?;
                self.submissions()
                    .delete_many(doc! { "form_id": form_id })
                    .session(&mut session)
                    .await?;
                self.drafts()
                    .delete_many(doc! { "form_id": form_id })
                    .session(&mut session)
                    .await?;

                Ok(true)
            }
            .await;

            match outcome {
                Ok(true) => {
                    session
                        .commit_transaction()
                        .await
                        .map_err(|e| backend(e, "Failed to commit form deletion"))?;
                    Ok(true)
                }
                Ok(false) => {
                    session
                        .abort_transaction()
                        .await
                        .map_err(|e| backend(e, "Failed to abort form deletion"))?;
                    Ok(false)
                }
                Err(err) => {
                    if let Err(abort_err) = session.abort_transaction().await {
                        tracing::warn!(error = %abort_err, "Failed to abort form deletion");
                    }
                    Err(backend(err, "Failed to delete form"))
                }
            }
        })
        .await
    }
}

#[async_trait]
impl SubmissionRepository for MongoStore {
    async fn insert_submission(&self, submission: &Submission) -> RepositoryResult<()> {
        track_db_operation("insert_one", SUBMISSIONS, async {
            self.submissions()
                .insert_one(submission)
                .await
                .map(|_| ())
                .map_err(|e| backend(e, "Failed to insert submission"))
        })
        .await
    }

    async fn submission_exists(&self, user_id: &str, form_id: &str) -> RepositoryResult<bool> {
        track_db_operation("count", SUBMISSIONS, async {
            self.submissions()
                .count_documents(pair_filter(user_id, form_id))
                .limit(1)
                .await
                .map(|count| count > 0)
                .map_err(|e| backend(e, "Failed to check submission"))
        })
        .await
    }

    async fn list_submissions_by_form(&self, form_id: &str) -> RepositoryResult<Vec<Submission>> {
        track_db_operation("find", SUBMISSIONS, async {
            self.submissions()
                .find(doc! { "form_id": form_id })
                .sort(doc! { "completed_at": -1 })
                .await
                .map_err(|e| backend(e, "Failed to query submissions"))?
                .try_collect()
                .await
                .map_err(|e| backend(e, "Failed to read submissions"))
        })
        .await
    }

    async fn count_submissions_by_form(&self, form_id: &str) -> RepositoryResult<u64> {
        track_db_operation("count", SUBMISSIONS, async {
            self.submissions()
                .count_documents(doc! { "form_id": form_id })
                .await
                .map_err(|e| backend(e, "Failed to count submissions"))
        })
        .await
    }

    async fn list_submitted_form_ids(&self, user_id: &str) -> RepositoryResult<Vec<String>> {
        track_db_operation("distinct", SUBMISSIONS, async {
            let values = self
                .submissions()
                .distinct("form_id", doc! { "user_id": user_id })
                .await
                .map_err(|e| backend(e, "Failed to list submitted forms"))?;
            let form_ids: Vec<String> = values
                .into_iter()
                .filter_map(|value| value.as_str().map(str::to_string))
                .collect();
            Ok::<_, RepositoryError>(form_ids)
        })
        .await
    }
}

#[async_trait]
impl DraftRepository for MongoStore {
    async fn upsert_draft(&self, draft: &DraftSubmission) -> RepositoryResult<DraftSubmission> {
        let answers = mongodb::bson::to_bson(&draft.answers)
            .context("Failed to encode draft answers")?;

        track_db_operation("upsert", DRAFTS, async {
            self.drafts()
                .find_one_and_update(
                    pair_filter(&draft.user_id, &draft.form_id),
                    doc! {
                        "$set": {
                            "answers": answers,
                            "progress_percentage": draft.progress_percentage,
                            "updated_at": chrono_to_bson(draft.updated_at),
                        },
                        "$setOnInsert": {
                            "_id": &draft.id,
                            "created_at": chrono_to_bson(draft.created_at),
                        },
                    },
                )
                .upsert(true)
                .return_document(ReturnDocument::After)
                .await
                .map_err(|e| backend(e, "Failed to upsert draft"))?
                .ok_or_else(|| {
                    RepositoryError::Backend(anyhow::anyhow!("Draft upsert returned no document"))
                })
        })
        .await
    }

    async fn find_draft(
        &self,
        user_id: &str,
        form_id: &str,
    ) -> RepositoryResult<Option<DraftSubmission>> {
        track_db_operation("find_one", DRAFTS, async {
            self.drafts()
                .find_one(pair_filter(user_id, form_id))
                .await
                .map_err(|e| backend(e, "Failed to query draft"))
        })
        .await
    }

    async fn delete_draft(&self, user_id: &str, form_id: &str) -> RepositoryResult<bool> {
        track_db_operation("delete_one", DRAFTS, async {
            self.drafts()
                .delete_one(pair_filter(user_id, form_id))
                .await
                .map(|result| result.deleted_count > 0)
                .map_err(|e| backend(e, "Failed to delete draft"))
        })
        .await
    }
}

#[async_trait]
impl ParticipationRepository for MongoStore {
    async fn find_participation(
        &self,
        user_id: &str,
        form_id: &str,
    ) -> RepositoryResult<Option<UserFormParticipation>> {
        track_db_operation("find_one", PARTICIPATIONS, async {
            self.participations()
                .find_one(pair_filter(user_id, form_id))
                .await
                .map_err(|e| backend(e, "Failed to query participation"))
        })
        .await
    }

    async fn insert_participation(
        &self,
        participation: &UserFormParticipation,
    ) -> RepositoryResult<()> {
        track_db_operation("insert_one", PARTICIPATIONS, async {
            self.participations()
                .insert_one(participation)
                .await
                .map(|_| ())
                .map_err(|e| backend(e, "Failed to insert participation"))
        })
        .await
    }

    async fn replace_participation(
        &self,
        participation: &UserFormParticipation,
        expected_version: i64,
    ) -> RepositoryResult<bool> {
        track_db_operation("replace_one", PARTICIPATIONS, async {
            self.participations()
                .replace_one(
                    doc! { "_id": &participation.id, "version": expected_version },
                    participation,
                )
                .await
                .map(|result| result.matched_count > 0)
                .map_err(|e| backend(e, "Failed to update participation"))
        })
        .await
    }

    async fn delete_participation(&self, user_id: &str, form_id: &str) -> RepositoryResult<bool> {
        track_db_operation("delete_one", PARTICIPATIONS, async {
            self.participations()
                .delete_one(pair_filter(user_id, form_id))
                .await
                .map(|result| result.deleted_count > 0)
                .map_err(|e| backend(e, "Failed to delete participation"))
        })
        .await
    }

    async fn list_participations_by_user(
        &self,
        user_id: &str,
    ) -> RepositoryResult<Vec<UserFormParticipation>> {
        track_db_operation("find", PARTICIPATIONS, async {
            self.participations()
                .find(doc! { "user_id": user_id })
                .sort(doc! { "last_modified": -1 })
                .await
                .map_err(|e| backend(e, "Failed to query participations"))?
                .try_collect()
                .await
                .map_err(|e| backend(e, "Failed to read participations"))
        })
        .await
    }

    async fn list_participations_by_form(
        &self,
        form_id: &str,
        status: ParticipationStatus,
    ) -> RepositoryResult<Vec<UserFormParticipation>> {
        track_db_operation("find", PARTICIPATIONS, async {
            self.participations()
                .find(doc! { "form_id": form_id, "status": status.as_str() })
                .sort(doc! { "last_modified": -1 })
                .await
                .map_err(|e| backend(e, "Failed to query form participations"))?
                .try_collect()
                .await
                .map_err(|e| backend(e, "Failed to read form participations"))
        })
        .await
    }

    async fn count_participations(
        &self,
        user_id: &str,
        status: ParticipationStatus,
    ) -> RepositoryResult<u64> {
        track_db_operation("count", PARTICIPATIONS, async {
            self.participations()
                .count_documents(doc! { "user_id": user_id, "status": status.as_str() })
                .await
                .map_err(|e| backend(e, "Failed to count participations"))
        })
        .await
    }

    async fn count_participations_modified_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> RepositoryResult<u64> {
        track_db_operation("count", PARTICIPATIONS, async {
            self.participations()
                .count_documents(doc! {
                    "user_id": user_id,
                    "last_modified": { "$gte": chrono_to_bson(since) },
                })
                .await
                .map_err(|e| backend(e, "Failed to count recent participations"))
        })
        .await
    }

    async fn page_participations(
        &self,
        user_id: &str,
        status: Option<ParticipationStatus>,
        skip: u64,
        limit: u64,
    ) -> RepositoryResult<(Vec<UserFormParticipation>, u64)> {
        let mut filter = doc! { "user_id": user_id };
        if let Some(status) = status {
            filter.insert("status", status.as_str());
        }

        track_db_operation("find", PARTICIPATIONS, async {
            let total = self
                .participations()
                .count_documents(filter.clone())
                .await
                .map_err(|e| backend(e, "Failed to count activities"))?;

            let rows = self
                .participations()
                .find(filter)
                .sort(doc! { "last_modified": -1 })
                .skip(skip)
                .limit(i64::try_from(limit).unwrap_or(i64::MAX))
                .await
                .map_err(|e| backend(e, "Failed to query activities"))?
                .try_collect()
                .await
                .map_err(|e| backend(e, "Failed to read activities"))?;

            Ok::<_, RepositoryError>((rows, total))
        })
        .await
    }
}

#[async_trait]
impl UserRepository for MongoStore {
    async fn insert_user(&self, user: &User) -> RepositoryResult<()> {
        track_db_operation("insert_one", USERS, async {
            self.users()
                .insert_one(user)
                .await
                .map(|_| ())
                .map_err(|e| backend(e, "Failed to insert user"))
        })
        .await
    }

    async fn find_user_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        track_db_operation("find_one", USERS, async {
            self.users()
                .find_one(doc! { "email": email })
                .await
                .map_err(|e| backend(e, "Failed to query user"))
        })
        .await
    }

    async fn find_user_by_id(&self, id: &str) -> RepositoryResult<Option<User>> {
        track_db_operation("find_one", USERS, async {
            self.users()
                .find_one(doc! { "_id": id })
                .await
                .map_err(|e| backend(e, "Failed to query user"))
        })
        .await
    }

    async fn find_users_by_ids(&self, ids: &[String]) -> RepositoryResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        track_db_operation("find", USERS, async {
            self.users()
                .find(doc! { "_id": { "$in": ids.to_vec() } })
                .await
                .map_err(|e| backend(e, "Failed to query users"))?
                .try_collect()
                .await
                .map_err(|e| backend(e, "Failed to read users"))
        })
        .await
    }

    async fn record_login(&self, user_id: &str, at: DateTime<Utc>) -> RepositoryResult<()> {
        track_db_operation("update_one", USERS, async {
            self.users()
                .update_one(
                    doc! { "_id": user_id },
                    doc! { "$set": { "lastLoginAt": chrono_to_bson(at) } },
                )
                .await
                .map(|_| ())
                .map_err(|e| backend(e, "Failed to update last login timestamp"))
        })
        .await
    }
}

#[async_trait]
impl RefreshTokenRepository for MongoStore {
    async fn insert_refresh_token(&self, token: &RefreshToken) -> RepositoryResult<()> {
        track_db_operation("insert_one", REFRESH_TOKENS, async {
            self.refresh_tokens()
                .insert_one(token)
                .await
                .map(|_| ())
                .map_err(|e| backend(e, "Failed to insert refresh token"))
        })
        .await
    }

    async fn find_refresh_token(&self, token_hash: &str) -> RepositoryResult<Option<RefreshToken>> {
        track_db_operation("find_one", REFRESH_TOKENS, async {
            self.refresh_tokens()
                .find_one(doc! { "token_hash": token_hash })
                .await
                .map_err(|e| backend(e, "Failed to query refresh token"))
        })
        .await
    }

    async fn touch_refresh_token(
        &self,
        token_hash: &str,
        at: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        track_db_operation("update_one", REFRESH_TOKENS, async {
            self.refresh_tokens()
                .update_one(
                    doc! { "token_hash": token_hash },
                    doc! { "$set": { "lastUsedAt": chrono_to_bson(at) } },
                )
                .await
                .map(|_| ())
                .map_err(|e| backend(e, "Failed to update refresh token"))
        })
        .await
    }

    async fn revoke_refresh_token(&self, token_hash: &str) -> RepositoryResult<bool> {
        track_db_operation("update_one", REFRESH_TOKENS, async {
            self.refresh_tokens()
                .update_one(
                    doc! { "token_hash": token_hash, "revoked": false },
                    doc! { "$set": { "revoked": true } },
                )
                .await
                .map(|result| result.modified_count > 0)
                .map_err(|e| backend(e, "Failed to revoke refresh token"))
        })
        .await
    }
}

#[async_trait]
impl Store for MongoStore {
    async fn ping(&self) -> RepositoryResult<()> {
        self.db
            .run_command(doc! { "ping": 1 })
            .await
            .map(|_| ())
            .map_err(|e| backend(e, "MongoDB ping failed"))
    }
}
