use super::traits::{
    validate_person, validate_rating, EndingStyle, NewPoemVersion, NewRating, Person, PoemVersion,
    RatedVersion, Rating, RhymeTag, Storage, TasteProfile, VersionAverage, VersionStage,
};
use crate::error::StorageError;
use crate::pipeline::ReadingLevel;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// Embedded single-file backend for development and single-user installs.
///
/// One connection behind a mutex: SQLite serializes writers anyway, and the
/// mutex gives the whole capability set read-after-write semantics within
/// the process without connection-pool ceremony.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteStorage {
    pub fn open(data_dir: &Path) -> Result<Self, StorageError> {
        let db_path = data_dir.join("versecraft.db");
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::Connection(e.to_string()))?;
        }

        let conn = Connection::open(&db_path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // Poisoning only happens if a holder panicked; the connection itself
        // is still usable.
        self.conn.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Query(format!("bad timestamp {raw}: {e}")))
}

#[async_trait]
impl Storage for SqliteStorage {
    fn backend_name(&self) -> String {
        format!("sqlite:{}", self.db_path.display())
    }

    async fn init(&self) -> Result<(), StorageError> {
        let conn = self.lock();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS poem_versions (
                id            TEXT PRIMARY KEY,
                session_id    TEXT NOT NULL,
                stage         TEXT NOT NULL,
                version_index INTEGER NOT NULL,
                text          TEXT NOT NULL,
                created_at    TEXT NOT NULL,
                UNIQUE(session_id, version_index)
            );
            CREATE INDEX IF NOT EXISTS idx_versions_session
                ON poem_versions(session_id);

            CREATE TABLE IF NOT EXISTS ratings (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     TEXT NOT NULL,
                version_id  TEXT NOT NULL REFERENCES poem_versions(id),
                score       INTEGER NOT NULL,
                ending_pref TEXT,
                feedback    TEXT,
                created_at  TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_ratings_user ON ratings(user_id);

            CREATE TABLE IF NOT EXISTS people (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id      TEXT NOT NULL,
                name         TEXT NOT NULL,
                relationship TEXT NOT NULL,
                notes        TEXT,
                created_at   TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_people_user ON people(user_id);

            CREATE TABLE IF NOT EXISTS taste_profile (
                user_id       TEXT PRIMARY KEY,
                total_ratings INTEGER NOT NULL,
                rhyme_pref    TEXT,
                avg_length    REAL,
                reading_level TEXT,
                ending_style  TEXT,
                updated_at    TEXT NOT NULL
            );",
        )?;
        info!(backend = %self.backend_name(), "storage initialized");
        Ok(())
    }

    async fn store_version(&self, new: NewPoemVersion) -> Result<PoemVersion, StorageError> {
        if new.text.trim().is_empty() {
            return Err(StorageError::Validation("poem text is empty".into()));
        }
        let conn = self.lock();
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        conn.execute(
            "INSERT INTO poem_versions(id, session_id, stage, version_index, text, created_at)
             VALUES (?1, ?2, ?3,
                     (SELECT COALESCE(MAX(version_index), 0) + 1
                        FROM poem_versions WHERE session_id = ?2),
                     ?4, ?5)",
            params![id, new.session_id, new.stage.as_str(), new.text, now.to_rfc3339()],
        )?;
        let index: i64 = conn.query_row(
            "SELECT version_index FROM poem_versions WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?;
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
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, session_id, stage, version_index, text, created_at
             FROM poem_versions WHERE session_id = ?1 ORDER BY version_index",
        )?;
        let rows = stmt
            .query_map(params![session_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, session_id, stage, index, text, ts)| {
                Ok(PoemVersion {
                    id,
                    session_id,
                    stage: VersionStage::parse(&stage)?,
                    index,
                    text,
                    created_at: parse_ts(&ts)?,
                })
            })
            .collect()
    }

    async fn add_rating(&self, new: NewRating) -> Result<Rating, StorageError> {
        validate_rating(&new)?;
        let conn = self.lock();

        let exists: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM poem_versions WHERE id = ?1",
                params![new.version_id],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(StorageError::Validation(format!(
                "rating references unknown version {}",
                new.version_id
            )));
        }

        let now = Utc::now();
        conn.execute(
            "INSERT INTO ratings(user_id, version_id, score, ending_pref, feedback, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                new.user_id,
                new.version_id,
                i64::from(new.score),
                new.ending_pref.map(EndingStyle::as_str),
                new.feedback,
                now.to_rfc3339()
            ],
        )?;
        let id = conn.last_insert_rowid();
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
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, version_id, score, ending_pref, feedback, created_at
             FROM ratings WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![user_id, limit], rating_columns)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(finish_rating).collect()
    }

    async fn rated_versions(&self, user_id: &str) -> Result<Vec<RatedVersion>, StorageError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT r.id, r.user_id, r.version_id, r.score, r.ending_pref, r.feedback,
                    r.created_at,
                    v.id, v.session_id, v.stage, v.version_index, v.text, v.created_at
             FROM ratings r
             JOIN poem_versions v ON v.id = r.version_id
             WHERE r.user_id = ?1
             ORDER BY r.created_at, r.id",
        )?;
        let rows = stmt
            .query_map(params![user_id], |row| {
                let rating = rating_columns(row)?;
                let version = (
                    row.get::<_, String>(7)?,
                    row.get::<_, String>(8)?,
                    row.get::<_, String>(9)?,
                    row.get::<_, i64>(10)?,
                    row.get::<_, String>(11)?,
                    row.get::<_, String>(12)?,
                );
                Ok((rating, version))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(raw_rating, (id, session_id, stage, index, text, ts))| {
                Ok(RatedVersion {
                    rating: finish_rating(raw_rating)?,
                    version: PoemVersion {
                        id,
                        session_id,
                        stage: VersionStage::parse(&stage)?,
                        index,
                        text,
                        created_at: parse_ts(&ts)?,
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
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT v.stage, AVG(r.score), COUNT(*)
             FROM ratings r
             JOIN poem_versions v ON v.id = r.version_id
             WHERE r.user_id = ?1 AND v.session_id = ?2
             GROUP BY v.stage",
        )?;
        let rows = stmt
            .query_map(params![user_id, session_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(stage, average, count)| {
                Ok(VersionAverage {
                    stage: VersionStage::parse(&stage)?,
                    average,
                    count,
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
        let conn = self.lock();
        let now = Utc::now();
        conn.execute(
            "INSERT INTO people(user_id, name, relationship, notes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user_id,
                name.trim(),
                relationship.trim(),
                notes.map(str::trim),
                now.to_rfc3339()
            ],
        )?;
        Ok(Person {
            id: conn.last_insert_rowid(),
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
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE people SET notes = ?1 WHERE id = ?2 AND user_id = ?3",
            params![notes.map(str::trim), person_id, user_id],
        )?;
        if changed == 0 {
            return Err(StorageError::Validation(format!(
                "person {person_id} not found"
            )));
        }
        Ok(())
    }

    async fn delete_person(&self, user_id: &str, person_id: i64) -> Result<(), StorageError> {
        let conn = self.lock();
        let changed = conn.execute(
            "DELETE FROM people WHERE id = ?1 AND user_id = ?2",
            params![person_id, user_id],
        )?;
        if changed == 0 {
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
        let conn = self.lock();
        let row = conn
            .query_row(
                "SELECT id, user_id, name, relationship, notes, created_at
                 FROM people WHERE id = ?1 AND user_id = ?2",
                params![person_id, user_id],
                person_columns,
            )
            .optional()?;
        row.map(finish_person).transpose()
    }

    async fn list_people(&self, user_id: &str) -> Result<Vec<Person>, StorageError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, name, relationship, notes, created_at
             FROM people WHERE user_id = ?1 ORDER BY id DESC",
        )?;
        let rows = stmt
            .query_map(params![user_id], person_columns)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(finish_person).collect()
    }

    async fn save_taste_profile(&self, profile: &TasteProfile) -> Result<(), StorageError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO taste_profile
                (user_id, total_ratings, rhyme_pref, avg_length, reading_level,
                 ending_style, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(user_id) DO UPDATE SET
                total_ratings = excluded.total_ratings,
                rhyme_pref    = excluded.rhyme_pref,
                avg_length    = excluded.avg_length,
                reading_level = excluded.reading_level,
                ending_style  = excluded.ending_style,
                updated_at    = excluded.updated_at",
            params![
                profile.user_id,
                profile.total_ratings,
                profile.rhyme_pref.map(RhymeTag::as_str),
                profile.avg_length,
                profile.reading_level.map(ReadingLevel::as_str),
                profile.ending_style.map(EndingStyle::as_str),
                profile.updated_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    async fn get_taste_profile(
        &self,
        user_id: &str,
    ) -> Result<Option<TasteProfile>, StorageError> {
        let conn = self.lock();
        let row = conn
            .query_row(
                "SELECT user_id, total_ratings, rhyme_pref, avg_length, reading_level,
                        ending_style, updated_at
                 FROM taste_profile WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<f64>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                },
            )
            .optional()?;

        row.map(
            |(user_id, total_ratings, rhyme, avg_length, reading, ending, ts)| {
                Ok(TasteProfile {
                    user_id,
                    total_ratings,
                    rhyme_pref: rhyme.as_deref().and_then(RhymeTag::parse),
                    avg_length,
                    reading_level: reading.as_deref().and_then(ReadingLevel::parse),
                    ending_style: ending.as_deref().and_then(EndingStyle::parse),
                    updated_at: parse_ts(&ts)?,
                })
            },
        )
        .transpose()
    }
}

// ─── Row mapping helpers ─────────────────────────────────────────────────────

type RawRating = (i64, String, String, i64, Option<String>, Option<String>, String);
type RawPerson = (i64, String, String, String, Option<String>, String);

fn rating_columns(row: &Row<'_>) -> rusqlite::Result<RawRating> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn finish_rating(raw: RawRating) -> Result<Rating, StorageError> {
    let (id, user_id, version_id, score, ending, feedback, ts) = raw;
    Ok(Rating {
        id,
        user_id,
        version_id,
        score: u8::try_from(score)
            .map_err(|_| StorageError::Query(format!("score {score} out of range")))?,
        ending_pref: ending.as_deref().and_then(EndingStyle::parse),
        feedback,
        created_at: parse_ts(&ts)?,
    })
}

fn person_columns(row: &Row<'_>) -> rusqlite::Result<RawPerson> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn finish_person(raw: RawPerson) -> Result<Person, StorageError> {
    let (id, user_id, name, relationship, notes, ts) = raw;
    Ok(Person {
        id,
        user_id,
        name,
        relationship,
        notes,
        created_at: parse_ts(&ts)?,
    })
}

