#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use versecraft::config::ModelConfig;
use versecraft::error::InvocationError;
use versecraft::orchestrator::Orchestrator;
use versecraft::prompt::PromptStore;
use versecraft::providers::Provider;
use versecraft::storage::{SqliteStorage, Storage};

/// Valid critic-stage output used across tests.
pub const CRITIQUE_JSON: &str = r#"{
    "constraint_issues": [],
    "cliches_detected": [],
    "imagery_score": 7,
    "coherence_score": 8,
    "originality_score": 6,
    "suggestions": ["sharpen the final image"]
}"#;

/// One provider call as the test double saw it.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system: String,
    pub user: String,
    pub model: String,
}

/// Scripted provider: pops pre-seeded responses in order and records every
/// call for later assertions.
pub struct RecordingProvider {
    calls: Mutex<Vec<RecordedCall>>,
    responses: Mutex<VecDeque<Result<String, InvocationError>>>,
}

impl RecordingProvider {
    pub fn scripted<I, S>(responses: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            responses: Mutex::new(responses.into_iter().map(|s| Ok(s.into())).collect()),
        })
    }

    pub fn with_outcomes(
        responses: Vec<Result<String, InvocationError>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            responses: Mutex::new(responses.into_iter().collect()),
        })
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for RecordingProvider {
    fn name(&self) -> &str {
        "recording"
    }

    async fn chat(
        &self,
        system: &str,
        user: &str,
        params: &ModelConfig,
    ) -> Result<String, InvocationError> {
        self.calls.lock().unwrap().push(RecordedCall {
            system: system.to_string(),
            user: user.to_string(),
            model: params.name.clone(),
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("no scripted response left")
    }
}

/// Fresh SQLite storage in a temp dir. The `TempDir` guard keeps the
/// directory alive for the test's duration.
pub async fn temp_storage() -> (Arc<dyn Storage>, TempDir) {
    let dir = TempDir::new().expect("temp dir");
    let storage = SqliteStorage::open(dir.path()).expect("open sqlite");
    let storage: Arc<dyn Storage> = Arc::new(storage);
    storage.init().await.expect("init schema");
    (storage, dir)
}

/// Orchestrator wired to the scripted provider and a temp SQLite backend.
pub async fn temp_orchestrator(
    provider: Arc<RecordingProvider>,
) -> (Orchestrator, Arc<dyn Storage>, TempDir) {
    let (storage, dir) = temp_storage().await;
    let orchestrator = Orchestrator::new(
        provider,
        PromptStore::load().expect("prompts"),
        Arc::clone(&storage),
        ModelConfig::default(),
        "local",
    );
    (orchestrator, storage, dir)
}
