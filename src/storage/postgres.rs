use super::traits::{
    validate_person, validate_rating, EndingStyle, NewPoemVersion, NewRating, Person, PoemVersion,
    RatedVersion, Rating, RhymeTag, Storage, TasteProfile, VersionAverage, VersionStage,
};
use crate::error::StorageError;
use crate::pipeline::ReadingLevel;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::info;
use uuid::Uuid;

/// Hosted relational backend for production deployments.
///
/// Rating writes run inside a transaction so the existence check and the
/// insert observe the same snapshot; concurrent submissions for different
/// versions both land (read-committed is enough, no custom locking).
/// Version inserts take a per-session advisory lock so concurrent stores
/// to one session get distinct indices instead of a unique violation.
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(Self { pool })
    }
}

fn rating_from_row(row: &PgRow) -> Result<Rating, StorageError> {
    let score: i32 = row.try_get("score")?;
    let ending: Option<String> = row.try_get("ending_pref")?;
    Ok(Rating {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        version_id: row.try_get("version_id")?,
        score: u8::try_from(score)
            .map_err(|_| StorageError::Query(format!("score {score} out of range")))?,
        ending_pref: ending.as_deref().and_then(EndingStyle::parse),
        feedback: row.try_get("feedback")?,
        created_at: row.try_get("created_at")?,
    })
}

fn version_from_row(row: &PgRow) -> Result<PoemVersion, StorageError> {
    let stage: String = row.try_get("stage")?;
    Ok(PoemVersion {
        id: row.try_get("id")?,
        session_id: row.try_get("session_id")?,
        stage: VersionStage::parse(&stage)?,
        index: row.try_get("version_index")?,
        text: row.try_get("text")?,
        created_at: row.try_get("created_at")?,
    })
}

fn person_from_row(row: &PgRow) -> Result<Person, StorageError> {
    Ok(Person {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        relationship: row.try_get("relationship")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl Storage for PostgresStorage {
    fn backend_name(&self) -> String {
        "postgres:DATABASE_URL".to_string()
    }

    async fn init(&self) -> Result<(), StorageError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS poem_versions (
                id            TEXT PRIMARY KEY,
                session_id    TEXT NOT NULL,
                stage         TEXT NOT NULL,
                version_index BIGINT NOT NULL,
                text          TEXT NOT NULL,
                created_at    TIMESTAMPTZ NOT NULL,
                UNIQUE(session_id, version_index)
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS ratings (
                id          BIGSERIAL PRIMARY KEY,
                user_id     TEXT NOT NULL,
                version_id  TEXT NOT NULL REFERENCES poem_versions(id),
                score       INTEGER NOT NULL,
                ending_pref TEXT,
                feedback    TEXT,
                created_at  TIMESTAMPTZ NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS people (
                id           BIGSERIAL PRIMARY KEY,
                user_id      TEXT NOT NULL,
                name         TEXT NOT NULL,
                relationship TEXT NOT NULL,
                notes        TEXT,
                created_at   TIMESTAMPTZ NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS taste_profile (
                user_id       TEXT PRIMARY KEY,
                total_ratings BIGINT NOT NULL,
                rhyme_pref    TEXT,
                avg_length    DOUBLE PRECISION,
                reading_level TEXT,
                ending_style  TEXT,
                updated_at    TIMESTAMPTZ NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        info!(backend = %self.backend_name(), "storage initialized");
        Ok(())
    }

    async fn store_version(&self, new: NewPoemVersion) -> Result<PoemVersion, StorageError> {
        if new.text.trim().is_empty() {
            return Err(StorageError::Validation("poem text is empty".into()));
        }
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        // Serializes index assignment within a session; released at commit.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&new.session_id)
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query(
            "INSERT INTO poem_versions(id, session_id, stage, version_index, text, created_at)
             SELECT $1, $2, $3, COALESCE(MAX(version_index), 0) + 1, $4, $5
               FROM poem_versions WHERE session_id = $2
             RETURNING version_index",
        )
        .bind(&id)
        .bind(&new.session_id)
        .bind(new.stage.as_str())
        .bind(&new.text)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        let index: i64 = row.try_get("version_index")?;
        tx.commit().await?;

        Ok(PoemVersion {
            id,
            session_id: new.session_id,
            stage: new.stage,
            index,
            text: new.text,
            created_at: now,
        })
    }

    async fn list_versions(&self, session_id: &str) -> Result<Vec<PoemVersion>, StorageError> {
        let rows = sqlx::query(
            "SELECT id, session_id, stage, version_index, text, created_at
             FROM poem_versions WHERE session_id = $1 ORDER BY version_index",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(version_from_row).collect()
    }

    async fn add_rating(&self, new: NewRating) -> Result<Rating, StorageError> {
        validate_rating(&new)?;
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query("SELECT 1 FROM poem_versions WHERE id = $1")
            .bind(&new.version_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(StorageError::Validation(format!(
                "rating references unknown version {}",
                new.version_id
            )));
        }

        let now = Utc::now();
        let row = sqlx::query(
            "INSERT INTO ratings(user_id, version_id, score, ending_pref, feedback, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id",
        )
        .bind(&new.user_id)
        .bind(&new.version_id)
        .bind(i32::from(new.score))
        .bind(new.ending_pref.map(EndingStyle::as_str))
        .bind(&new.feedback)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        let id: i64 = row.try_get("id")?;
        tx.commit().await?;

        Ok(Rating {
            id,
            user_id: new.user_id,
            version_id: new.version_id,
            score: new.score,
            ending_pref: new.ending_pref,
            feedback: new.feedback,
            created_at: now,
        })
    }

    async fn list_ratings(&self, user_id: &str, limit: i64) -> Result<Vec<Rating>, StorageError> {
        let rows = sqlx::query(
            "SELECT id, user_id, version_id, score, ending_pref, feedback, created_at
             FROM ratings WHERE user_id = $1 ORDER BY id DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(rating_from_row).collect()
    }

    async fn rated_versions(&self, user_id: &str) -> Result<Vec<RatedVersion>, StorageError> {
        let rows = sqlx::query(
            "SELECT r.id, r.user_id, r.version_id, r.score, r.ending_pref, r.feedback,
                    r.created_at,
                    v.id AS v_id, v.session_id, v.stage, v.version_index, v.text,
                    v.created_at AS v_created_at
             FROM ratings r
             JOIN poem_versions v ON v.id = r.version_id
             WHERE r.user_id = $1
             ORDER BY r.created_at, r.id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let stage: String = row.try_get("stage")?;
                Ok(RatedVersion {
                    rating: rating_from_row(row)?,
                    version: PoemVersion {
                        id: row.try_get("v_id")?,
                        session_id: row.try_get("session_id")?,
                        stage: VersionStage::parse(&stage)?,
                        index: row.try_get("version_index")?,
                        text: row.try_get("text")?,
                        created_at: row.try_get("v_created_at")?,
                    },
                })
            })
            .collect()
    }

    async fn version_averages(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<Vec<VersionAverage>, StorageError> {
        let rows = sqlx::query(
            "SELECT v.stage, AVG(r.score)::DOUBLE PRECISION AS average, COUNT(*) AS count
             FROM ratings r
             JOIN poem_versions v ON v.id = r.version_id
             WHERE r.user_id = $1 AND v.session_id = $2
             GROUP BY v.stage",
        )
        .bind(user_id)
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let stage: String = row.try_get("stage")?;
                Ok(VersionAverage {
                    stage: VersionStage::parse(&stage)?,
                    average: row.try_get("average")?,
                    count: row.try_get("count")?,
                })
            })
            .collect()
    }

    async fn add_person(
        &self,
        user_id: &str,
        name: &str,
        relationship: &str,
        notes: Option<&str>,
    ) -> Result<Person, StorageError> {
        validate_person(name, relationship)?;
        let now = Utc::now();
        let row = sqlx::query(
            "INSERT INTO people(user_id, name, relationship, notes, created_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id",
        )
        .bind(user_id)
        .bind(name.trim())
        .bind(relationship.trim())
        .bind(notes.map(str::trim))
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(Person {
            id: row.try_get("id")?,
            user_id: user_id.to_string(),
            name: name.trim().to_string(),
            relationship: relationship.trim().to_string(),
            notes: notes.map(|n| n.trim().to_string()),
            created_at: now,
        })
    }

    async fn update_person_notes(
        &self,
        user_id: &str,
        person_id: i64,
        notes: Option<&str>,
    ) -> Result<(), StorageError> {
        let result = sqlx::query("UPDATE people SET notes = $1 WHERE id = $2 AND user_id = $3")
            .bind(notes.map(str::trim))
            .bind(person_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::Validation(format!(
                "person {person_id} not found"
            )));
        }
        Ok(())
    }

    async fn delete_person(&self, user_id: &str, person_id: i64) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM people WHERE id = $1 AND user_id = $2")
            .bind(person_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::Validation(format!(
                "person {person_id} not found"
            )));
        }
        Ok(())
    }

    async fn get_person(
        &self,
        user_id: &str,
        person_id: i64,
    ) -> Result<Option<Person>, StorageError> {
        let row = sqlx::query(
            "SELECT id, user_id, name, relationship, notes, created_at
             FROM people WHERE id = $1 AND user_id = $2",
        )
        .bind(person_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(person_from_row).transpose()
    }

    async fn list_people(&self, user_id: &str) -> Result<Vec<Person>, StorageError> {
        let rows = sqlx::query(
            "SELECT id, user_id, name, relationship, notes, created_at
             FROM people WHERE user_id = $1 ORDER BY id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(person_from_row).collect()
    }

    async fn save_taste_profile(&self, profile: &TasteProfile) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO taste_profile
                (user_id, total_ratings, rhyme_pref, avg_length, reading_level,
                 ending_style, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (user_id) DO UPDATE SET
                total_ratings = EXCLUDED.total_ratings,
                rhyme_pref    = EXCLUDED.rhyme_pref,
                avg_length    = EXCLUDED.avg_length,
                reading_level = EXCLUDED.reading_level,
                ending_style  = EXCLUDED.ending_style,
                updated_at    = EXCLUDED.updated_at",
        )
        .bind(&profile.user_id)
        .bind(profile.total_ratings)
        .bind(profile.rhyme_pref.map(RhymeTag::as_str))
        .bind(profile.avg_length)
        .bind(profile.reading_level.map(ReadingLevel::as_str))
        .bind(profile.ending_style.map(EndingStyle::as_str))
        .bind(profile.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_taste_profile(
        &self,
        user_id: &str,
    ) -> Result<Option<TasteProfile>, StorageError> {
        let row = sqlx::query(
            "SELECT user_id, total_ratings, rhyme_pref, avg_length, reading_level,
                    ending_style, updated_at
             FROM taste_profile WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            let rhyme: Option<String> = row.try_get("rhyme_pref")?;
            let reading: Option<String> = row.try_get("reading_level")?;
            let ending: Option<String> = row.try_get("ending_style")?;
            Ok(TasteProfile {
                user_id: row.try_get("user_id")?,
                total_ratings: row.try_get("total_ratings")?,
                rhyme_pref: rhyme.as_deref().and_then(RhymeTag::parse),
                avg_length: row.try_get("avg_length")?,
                reading_level: reading.as_deref().and_then(ReadingLevel::parse),
                ending_style: ending.as_deref().and_then(EndingStyle::parse),
                updated_at: row.try_get("updated_at")?,
            })
        })
        .transpose()
    }
}

