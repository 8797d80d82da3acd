use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::{bson_datetime_as_chrono, bson_datetime_as_chrono_option, new_id};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ParticipationStatus {
    Available,
    InProgress,
    Completed,
    /// Terminal. Set when the form itself is deleted.
    Deleted,
}

impl ParticipationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipationStatus::Available => "available",
            ParticipationStatus::InProgress => "in_progress",
            ParticipationStatus::Completed => "completed",
            ParticipationStatus::Deleted => "deleted",
        }
    }

    /// Statuses a participation row may start in.
    pub fn can_start_as(self) -> bool {
        !matches!(self, ParticipationStatus::Deleted)
    }

    pub fn can_transition_to(self, next: ParticipationStatus) -> bool {
        use ParticipationStatus::{Available, Completed, Deleted, InProgress};

        match (self, next) {
            (Available | InProgress, Available | InProgress | Completed | Deleted) => true,
            (Completed, Completed | Deleted) => true,
            (Completed, Available | InProgress) => false,
            (Deleted, Deleted) => true,
            (Deleted, Available | InProgress | Completed) => false,
        }
    }
}

impl fmt::Display for ParticipationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown participation status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for ParticipationStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(ParticipationStatus::Available),
            "in_progress" => Ok(ParticipationStatus::InProgress),
            "completed" => Ok(ParticipationStatus::Completed),
            "deleted" => Ok(ParticipationStatus::Deleted),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot change participation status from {from} to {to}")]
pub struct InvalidTransition {
    pub from: ParticipationStatus,
    pub to: ParticipationStatus,
}

/// Per-(user, form) status stored in MongoDB "participations" collection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserFormParticipation {
    #[serde(rename = "_id")]
    pub id: String,
    pub form_id: String,
    pub user_id: String,
    pub status: ParticipationStatus,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(with = "bson_datetime_as_chrono")]
    pub last_modified: DateTime<Utc>,
    /// Bumped on every write; updates are conditional on the value read.
    #[serde(default)]
    pub version: i64,
}

impl UserFormParticipation {
    pub fn start(
        user_id: &str,
        form_id: &str,
        status: ParticipationStatus,
        now: DateTime<Utc>,
    ) -> Result<Self, InvalidTransition> {
        if !status.can_start_as() {
            return Err(InvalidTransition {
                from: ParticipationStatus::Available,
                to: status,
            });
        }

        Ok(Self {
            id: new_id(),
            form_id: form_id.to_string(),
            user_id: user_id.to_string(),
            status,
            started_at: (status == ParticipationStatus::InProgress).then_some(now),
            completed_at: (status == ParticipationStatus::Completed).then_some(now),
            last_modified: now,
            version: 0,
        })
    }

    /// Next state of this row after moving to `to`. The row itself is untouched.
    pub fn transition(
        &self,
        to: ParticipationStatus,
        now: DateTime<Utc>,
    ) -> Result<Self, InvalidTransition> {
        if !self.status.can_transition_to(to) {
            return Err(InvalidTransition {
                from: self.status,
                to,
            });
        }

        let mut next = self.clone();
        next.status = to;
        next.last_modified = now;
        next.version = self.version + 1;

        if to == ParticipationStatus::InProgress && next.started_at.is_none() {
            next.started_at = Some(now);
        }
        if to == ParticipationStatus::Completed && self.status != ParticipationStatus::Completed {
            next.completed_at = Some(now);
        }

        Ok(next)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ParticipationResponse {
    pub form_id: String,
    pub user_id: String,
    pub status: ParticipationStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_modified: DateTime<Utc>,
}

impl From<UserFormParticipation> for ParticipationResponse {
    fn from(p: UserFormParticipation) -> Self {
        Self {
            form_id: p.form_id,
            user_id: p.user_id,
            status: p.status,
            started_at: p.started_at,
            completed_at: p.completed_at,
            last_modified: p.last_modified,
        }
    }
}
