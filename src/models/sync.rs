use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Version;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Transaction,
    Budget,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transaction => "transaction",
            Self::Budget => "budget",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A client-side entity submitted in a sync batch: the editable fields plus
/// the client-generated id that tells "new" apart from "update".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate<I> {
    pub id: Uuid,
    #[serde(flatten)]
    pub input: I,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    Pending,
    Synced,
    Conflict,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Synced => "SYNCED",
            Self::Conflict => "CONFLICT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "SYNCED" => Some(Self::Synced),
            "CONFLICT" => Some(Self::Conflict),
            _ => None,
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of one full sync call. One record per call, never per entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncAttempt {
    pub id: Uuid,
    pub user_id: Uuid,
    pub scope: String,
    /// Store version at the moment the call committed.
    pub sequence: Version,
    pub status: SyncStatus,
    pub last_attempt: DateTime<Utc>,
}

impl SyncAttempt {
    pub const SCOPE_ALL: &'static str = "ALL";

    pub fn new(user_id: Uuid, sequence: Version, status: SyncStatus) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            scope: Self::SCOPE_ALL.to_string(),
            sequence,
            status,
            last_attempt: Utc::now(),
        }
    }
}
