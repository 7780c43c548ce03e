use crate::error::StorageError;
use crate::pipeline::ReadingLevel;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Rows ────────────────────────────────────────────────────────────────────

/// Which pass of the pipeline produced a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionStage {
    Draft,
    Revised,
    Improved,
}

impl VersionStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Revised => "revised",
            Self::Improved => "improved",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, StorageError> {
        match raw {
            "draft" => Ok(Self::Draft),
            "revised" => Ok(Self::Revised),
            "improved" => Ok(Self::Improved),
            other => Err(StorageError::Query(format!("unknown stage tag: {other}"))),
        }
    }
}

/// One persisted pipeline output. Append-only; versions are never rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoemVersion {
    pub id: String,
    pub session_id: String,
    pub stage: VersionStage,
    /// Monotonically increasing within a session, starting at 1.
    pub index: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Insert payload; the backend assigns id, index, and timestamp.
#[derive(Debug, Clone)]
pub struct NewPoemVersion {
    pub session_id: String,
    pub stage: VersionStage,
    pub text: String,
}

/// Coarse ending classification used by ratings and the taste profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum EndingStyle {
    Soft,
    Twist,
    Punchline,
    Hopeful,
}

impl EndingStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Soft => "soft",
            Self::Twist => "twist",
            Self::Punchline => "punchline",
            Self::Hopeful => "hopeful",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "soft" => Some(Self::Soft),
            "twist" => Some(Self::Twist),
            "punchline" => Some(Self::Punchline),
            "hopeful" => Some(Self::Hopeful),
            _ => None,
        }
    }
}

/// A 1-5 score attached to exactly one version. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub id: i64,
    pub user_id: String,
    pub version_id: String,
    pub score: u8,
    pub ending_pref: Option<EndingStyle>,
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a rating.
#[derive(Debug, Clone)]
pub struct NewRating {
    pub user_id: String,
    pub version_id: String,
    pub score: u8,
    pub ending_pref: Option<EndingStyle>,
    pub feedback: Option<String>,
}

/// A rating joined with the version it scored; input to taste recomputation.
#[derive(Debug, Clone)]
pub struct RatedVersion {
    pub rating: Rating,
    pub version: PoemVersion,
}

/// Per-stage average score within one session.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionAverage {
    pub stage: VersionStage,
    pub average: f64,
    pub count: i64,
}

/// An entry in the people memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub relationship: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Derived aggregate of a user's rating history. Cache, not source of truth:
/// always recomputable from ratings + versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TasteProfile {
    pub user_id: String,
    pub total_ratings: i64,
    pub rhyme_pref: Option<RhymeTag>,
    pub avg_length: Option<f64>,
    pub reading_level: Option<ReadingLevel>,
    pub ending_style: Option<EndingStyle>,
    pub updated_at: DateTime<Utc>,
}

impl TasteProfile {
    pub fn empty(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            total_ratings: 0,
            rhyme_pref: None,
            avg_length: None,
            reading_level: None,
            ending_style: None,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

/// Detected rhyme-scheme tag for a poem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RhymeTag {
    Rhymed,
    Partial,
    Unrhymed,
}

impl RhymeTag {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rhymed => "rhymed",
            Self::Partial => "partial",
            Self::Unrhymed => "unrhymed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "rhymed" => Some(Self::Rhymed),
            "partial" => Some(Self::Partial),
            "unrhymed" => Some(Self::Unrhymed),
            _ => None,
        }
    }
}

// ─── Shared write validation ─────────────────────────────────────────────────

pub(crate) fn validate_rating(new: &NewRating) -> Result<(), StorageError> {
    if !(1..=5).contains(&new.score) {
        return Err(StorageError::Validation(format!(
            "rating must be 1..=5, got {}",
            new.score
        )));
    }
    Ok(())
}

pub(crate) fn validate_person(name: &str, relationship: &str) -> Result<(), StorageError> {
    if name.trim().is_empty() {
        return Err(StorageError::Validation("person name is required".into()));
    }
    if relationship.trim().is_empty() {
        return Err(StorageError::Validation("relationship is required".into()));
    }
    Ok(())
}

// ─── Backend seam ────────────────────────────────────────────────────────────

/// Capability set every persistence backend must provide.
///
/// Selected once at process start; both backends guarantee read-after-write
/// within a process and reject malformed writes with
/// [`StorageError::Validation`] before anything is persisted.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Human-readable backend tag for logs.
    fn backend_name(&self) -> String;

    /// Create tables if absent. Idempotent.
    async fn init(&self) -> Result<(), StorageError>;

    async fn store_version(&self, new: NewPoemVersion) -> Result<PoemVersion, StorageError>;

    /// Versions of one session, ordered by index.
    async fn list_versions(&self, session_id: &str) -> Result<Vec<PoemVersion>, StorageError>;

    /// Rejects out-of-range scores and ratings referencing a version that
    /// does not exist.
    async fn add_rating(&self, new: NewRating) -> Result<Rating, StorageError>;

    /// Most recent ratings first.
    async fn list_ratings(&self, user_id: &str, limit: i64) -> Result<Vec<Rating>, StorageError>;

    /// Every rating of a user joined with its version, oldest first.
    async fn rated_versions(&self, user_id: &str) -> Result<Vec<RatedVersion>, StorageError>;

    /// Average score per stage within one session.
    async fn version_averages(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<Vec<VersionAverage>, StorageError>;

    async fn add_person(
        &self,
        user_id: &str,
        name: &str,
        relationship: &str,
        notes: Option<&str>,
    ) -> Result<Person, StorageError>;

    async fn update_person_notes(
        &self,
        user_id: &str,
        person_id: i64,
        notes: Option<&str>,
    ) -> Result<(), StorageError>;

    async fn delete_person(&self, user_id: &str, person_id: i64) -> Result<(), StorageError>;

    async fn get_person(&self, user_id: &str, person_id: i64)
        -> Result<Option<Person>, StorageError>;

    /// Newest first.
    async fn list_people(&self, user_id: &str) -> Result<Vec<Person>, StorageError>;

    async fn save_taste_profile(&self, profile: &TasteProfile) -> Result<(), StorageError>;

    async fn get_taste_profile(&self, user_id: &str)
        -> Result<Option<TasteProfile>, StorageError>;
}
