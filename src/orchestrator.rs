//! Entry points composing the pipeline with persistence.
//!
//! Each call either returns a complete, persisted [`PoemVersion`] or a typed
//! failure; no partial poem is ever stored or returned. A failed stage
//! discards all intermediate text for that attempt.

use crate::config::ModelConfig;
use crate::error::{Result, StorageError, VerseError};
use crate::memory::render_user_memory;
use crate::pipeline::{Pipeline, PoemRequest};
use crate::prompt::PromptStore;
use crate::providers::Provider;
use crate::storage::{
    EndingStyle, NewPoemVersion, NewRating, Person, PoemVersion, Rating, Storage, TasteProfile,
    VersionAverage, VersionStage,
};
use crate::storage::taste;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub struct Orchestrator {
    provider: Arc<dyn Provider>,
    prompts: PromptStore,
    storage: Arc<dyn Storage>,
    params: ModelConfig,
    user_id: String,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn Provider>,
        prompts: PromptStore,
        storage: Arc<dyn Storage>,
        params: ModelConfig,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            prompts,
            storage,
            params,
            user_id: user_id.into(),
        }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    fn pipeline(&self) -> Pipeline<'_> {
        Pipeline::new(self.provider.as_ref(), &self.prompts, &self.params)
    }

    // ── Generation entry points ─────────────────────────────────────────

    /// Full pipeline run; persists the draft and the revised version,
    /// returns the revised one.
    pub async fn generate_only(&self, request: &PoemRequest) -> Result<PoemVersion> {
        self.validate(request)?;
        let user_memory = self.build_user_memory(request).await?;
        let run = self.pipeline().run_full(request, &user_memory).await?;

        let session_id = Uuid::new_v4().to_string();
        self.storage
            .store_version(NewPoemVersion {
                session_id: session_id.clone(),
                stage: VersionStage::Draft,
                text: run.draft,
            })
            .await?;
        let revised = self
            .storage
            .store_version(NewPoemVersion {
                session_id,
                stage: VersionStage::Revised,
                text: run.revised,
            })
            .await?;
        info!(session = %revised.session_id, index = revised.index, "revised version stored");
        Ok(revised)
    }

    /// Full pipeline run plus one immediate improvement pass. The revised
    /// version stays retrievable; the improved one is returned.
    pub async fn generate_and_improve(&self, request: &PoemRequest) -> Result<PoemVersion> {
        let revised = self.generate_only(request).await?;
        self.improve_again(&revised, request).await
    }

    /// One improvement pass seeded by an existing version. The new version
    /// joins the same session with the next index; nothing is replaced.
    pub async fn improve_again(
        &self,
        previous: &PoemVersion,
        request: &PoemRequest,
    ) -> Result<PoemVersion> {
        self.validate(request)?;
        let user_memory = self.build_user_memory(request).await?;
        let run = self
            .pipeline()
            .run_improve(request, &previous.text, &user_memory)
            .await?;

        if run.improved.trim() == previous.text.trim() {
            warn!(session = %previous.session_id, "improvement pass returned unchanged text");
        }

        let improved = self
            .storage
            .store_version(NewPoemVersion {
                session_id: previous.session_id.clone(),
                stage: VersionStage::Improved,
                text: run.improved,
            })
            .await?;
        info!(session = %improved.session_id, index = improved.index, "improved version stored");
        Ok(improved)
    }

    // ── Ratings and taste ───────────────────────────────────────────────

    /// Record a rating, then refresh the taste profile from the full
    /// history. The profile is a cache: losing the refresh loses nothing.
    pub async fn submit_rating(
        &self,
        version_id: &str,
        score: u8,
        ending_pref: Option<EndingStyle>,
        feedback: Option<String>,
    ) -> Result<Rating> {
        let rating = self
            .storage
            .add_rating(NewRating {
                user_id: self.user_id.clone(),
                version_id: version_id.to_string(),
                score,
                ending_pref,
                feedback,
            })
            .await?;
        self.recompute_taste().await?;
        Ok(rating)
    }

    /// Rebuild the taste profile from every rating on record.
    pub async fn recompute_taste(&self) -> Result<TasteProfile> {
        let history = self.storage.rated_versions(&self.user_id).await?;
        let profile = taste::recompute(&self.user_id, &history);
        self.storage.save_taste_profile(&profile).await?;
        Ok(profile)
    }

    pub async fn taste_profile(&self) -> Result<TasteProfile> {
        let stored = self.storage.get_taste_profile(&self.user_id).await?;
        Ok(stored.unwrap_or_else(|| TasteProfile::empty(&self.user_id)))
    }

    // ── People memory ───────────────────────────────────────────────────

    pub async fn add_person(
        &self,
        name: &str,
        relationship: &str,
        notes: Option<&str>,
    ) -> Result<Person> {
        Ok(self
            .storage
            .add_person(&self.user_id, name, relationship, notes)
            .await?)
    }

    pub async fn update_person_notes(&self, person_id: i64, notes: Option<&str>) -> Result<()> {
        Ok(self
            .storage
            .update_person_notes(&self.user_id, person_id, notes)
            .await?)
    }

    pub async fn delete_person(&self, person_id: i64) -> Result<()> {
        Ok(self.storage.delete_person(&self.user_id, person_id).await?)
    }

    pub async fn list_people(&self) -> Result<Vec<Person>> {
        Ok(self.storage.list_people(&self.user_id).await?)
    }

    // ── Session reads ───────────────────────────────────────────────────

    pub async fn versions(&self, session_id: &str) -> Result<Vec<PoemVersion>> {
        Ok(self.storage.list_versions(session_id).await?)
    }

    pub async fn version_averages(&self, session_id: &str) -> Result<Vec<VersionAverage>> {
        Ok(self
            .storage
            .version_averages(&self.user_id, session_id)
            .await?)
    }

    pub async fn list_ratings(&self, limit: i64) -> Result<Vec<Rating>> {
        Ok(self.storage.list_ratings(&self.user_id, limit).await?)
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn validate(&self, request: &PoemRequest) -> Result<()> {
        request
            .validate()
            .map_err(|reason| VerseError::Storage(StorageError::Validation(reason)))
    }

    /// Assemble the memory block for the generate stage: taste hints, the
    /// people directory, and the specifically requested person up front.
    async fn build_user_memory(&self, request: &PoemRequest) -> Result<String> {
        let profile = self.storage.get_taste_profile(&self.user_id).await?;
        let people = self.storage.list_people(&self.user_id).await?;
        let mut rendered = render_user_memory(profile.as_ref(), &people);

        if let Some(person_id) = request.person_id {
            let person = self
                .storage
                .get_person(&self.user_id, person_id)
                .await?
                .ok_or_else(|| {
                    VerseError::Storage(StorageError::Validation(format!(
                        "person {person_id} not found"
                    )))
                })?;
            let mut header = format!(
                "This poem is for {} ({}).",
                person.name, person.relationship
            );
            if let Some(notes) = person.notes.as_deref().filter(|n| !n.trim().is_empty()) {
                header.push_str(&format!(" Remember: {notes}"));
            }
            rendered = format!("{header}\n\n{rendered}");
        }

        Ok(rendered)
    }
}
