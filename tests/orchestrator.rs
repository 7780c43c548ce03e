mod support;

use support::{temp_orchestrator, RecordingProvider, CRITIQUE_JSON};
use versecraft::error::{InvocationError, StorageError, VerseError};
use versecraft::pipeline::PoemRequest;
use versecraft::storage::{EndingStyle, VersionStage};

fn request(theme: &str) -> PoemRequest {
    PoemRequest::new(theme)
}

#[tokio::test]
async fn generate_only_persists_draft_and_revised() {
    let provider = RecordingProvider::scripted(["the draft", CRITIQUE_JSON, "the revision"]);
    let (orchestrator, storage, _dir) = temp_orchestrator(provider).await;

    let revised = orchestrator.generate_only(&request("rivers")).await.unwrap();

    assert_eq!(revised.stage, VersionStage::Revised);
    assert_eq!(revised.text, "the revision");

    let versions = storage.list_versions(&revised.session_id).await.unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0].stage, VersionStage::Draft);
    assert_eq!(versions[0].text, "the draft");
    assert_eq!(versions[1].id, revised.id);
}

#[tokio::test]
async fn improve_again_appends_to_the_same_session() {
    let provider = RecordingProvider::scripted([
        "the draft",
        CRITIQUE_JSON,
        "the revision",
        CRITIQUE_JSON,
        "the improvement",
    ]);
    let (orchestrator, storage, _dir) = temp_orchestrator(provider).await;

    let req = request("rivers");
    let revised = orchestrator.generate_only(&req).await.unwrap();
    let improved = orchestrator.improve_again(&revised, &req).await.unwrap();

    assert_eq!(improved.session_id, revised.session_id);
    assert_eq!(improved.stage, VersionStage::Improved);
    assert!(improved.index > revised.index);

    // The earlier revision is untouched.
    let versions = storage.list_versions(&revised.session_id).await.unwrap();
    assert_eq!(versions.len(), 3);
    assert_eq!(versions[1].text, "the revision");
    assert_eq!(versions[2].text, "the improvement");
}

#[tokio::test]
async fn generate_and_improve_returns_the_improved_version() {
    let provider = RecordingProvider::scripted([
        "the draft",
        CRITIQUE_JSON,
        "the revision",
        CRITIQUE_JSON,
        "the improvement",
    ]);
    let (orchestrator, storage, _dir) = temp_orchestrator(provider).await;

    let result = orchestrator
        .generate_and_improve(&request("rivers"))
        .await
        .unwrap();

    assert_eq!(result.stage, VersionStage::Improved);
    assert_eq!(result.text, "the improvement");
    let versions = storage.list_versions(&result.session_id).await.unwrap();
    assert_eq!(versions.len(), 3);
}

#[tokio::test]
async fn provider_failure_leaves_nothing_persisted() {
    let provider = RecordingProvider::with_outcomes(vec![
        Ok("the lost draft".into()),
        Err(InvocationError::Timeout {
            provider: "recording".into(),
        }),
        Ok("draft two".into()),
        Ok(CRITIQUE_JSON.into()),
        Ok("revision two".into()),
    ]);
    let (orchestrator, storage, _dir) = temp_orchestrator(provider.clone()).await;

    let err = orchestrator
        .generate_only(&request("rivers"))
        .await
        .unwrap_err();
    assert!(matches!(err, VerseError::Invocation(_)));
    assert_eq!(provider.calls().len(), 2);

    // Versions are only written after a full run, so the draft the provider
    // produced before the failure never reached storage: the next run's
    // session starts at index 1 and holds nothing but its own two versions.
    let revised = orchestrator.generate_only(&request("rivers")).await.unwrap();
    let versions = storage.list_versions(&revised.session_id).await.unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0].index, 1);
    assert!(versions.iter().all(|v| v.text != "the lost draft"));
}

#[tokio::test]
async fn invalid_request_fails_before_any_provider_call() {
    let provider = RecordingProvider::scripted(Vec::<String>::new());
    let (orchestrator, _storage, _dir) = temp_orchestrator(provider.clone()).await;

    let mut req = request("   ");
    let err = orchestrator.generate_only(&req).await.unwrap_err();
    assert!(matches!(
        err,
        VerseError::Storage(StorageError::Validation(_))
    ));

    req = request("rivers");
    req.line_count = 500;
    let err = orchestrator.generate_only(&req).await.unwrap_err();
    assert!(matches!(
        err,
        VerseError::Storage(StorageError::Validation(_))
    ));

    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn person_notes_reach_the_generator() {
    let provider = RecordingProvider::scripted(["the draft", CRITIQUE_JSON, "the revision"]);
    let (orchestrator, _storage, _dir) = temp_orchestrator(provider.clone()).await;

    let ana = orchestrator
        .add_person("Ana", "sister", Some("loves hiking"))
        .await
        .unwrap();

    let mut req = request("mountains");
    req.person_id = Some(ana.id);
    orchestrator.generate_only(&req).await.unwrap();

    let generator = &provider.calls()[0];
    assert!(generator.system.contains("Ana"));
    assert!(generator.system.contains("sister"));
    assert!(generator.system.contains("loves hiking"));
}

#[tokio::test]
async fn unknown_person_is_a_validation_error() {
    let provider = RecordingProvider::scripted(Vec::<String>::new());
    let (orchestrator, _storage, _dir) = temp_orchestrator(provider.clone()).await;

    let mut req = request("mountains");
    req.person_id = Some(999);
    let err = orchestrator.generate_only(&req).await.unwrap_err();

    assert!(matches!(
        err,
        VerseError::Storage(StorageError::Validation(_))
    ));
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn submit_rating_refreshes_the_taste_profile() {
    let provider = RecordingProvider::scripted(["the draft", CRITIQUE_JSON, "the revision"]);
    let (orchestrator, _storage, _dir) = temp_orchestrator(provider).await;

    let revised = orchestrator.generate_only(&request("rivers")).await.unwrap();
    assert_eq!(orchestrator.taste_profile().await.unwrap().total_ratings, 0);

    orchestrator
        .submit_rating(&revised.id, 5, Some(EndingStyle::Hopeful), None)
        .await
        .unwrap();

    let profile = orchestrator.taste_profile().await.unwrap();
    assert_eq!(profile.total_ratings, 1);
    assert!(profile.avg_length.is_some());
}

#[tokio::test]
async fn submit_rating_rejects_bad_scores() {
    let provider = RecordingProvider::scripted(["the draft", CRITIQUE_JSON, "the revision"]);
    let (orchestrator, _storage, _dir) = temp_orchestrator(provider).await;

    let revised = orchestrator.generate_only(&request("rivers")).await.unwrap();
    let err = orchestrator
        .submit_rating(&revised.id, 0, None, None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        VerseError::Storage(StorageError::Validation(_))
    ));
    assert_eq!(orchestrator.taste_profile().await.unwrap().total_ratings, 0);
}

#[tokio::test]
async fn recompute_is_idempotent_over_the_same_history() {
    let provider = RecordingProvider::scripted(["the draft", CRITIQUE_JSON, "the revision"]);
    let (orchestrator, _storage, _dir) = temp_orchestrator(provider).await;

    let revised = orchestrator.generate_only(&request("rivers")).await.unwrap();
    orchestrator
        .submit_rating(&revised.id, 4, None, Some("nice cadence".into()))
        .await
        .unwrap();

    let first = orchestrator.recompute_taste().await.unwrap();
    let second = orchestrator.recompute_taste().await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn version_averages_cover_the_session() {
    let provider = RecordingProvider::scripted(["the draft", CRITIQUE_JSON, "the revision"]);
    let (orchestrator, _storage, _dir) = temp_orchestrator(provider).await;

    let revised = orchestrator.generate_only(&request("rivers")).await.unwrap();
    orchestrator
        .submit_rating(&revised.id, 4, None, None)
        .await
        .unwrap();

    let averages = orchestrator
        .version_averages(&revised.session_id)
        .await
        .unwrap();
    assert_eq!(averages.len(), 1);
    assert_eq!(averages[0].stage, VersionStage::Revised);
    assert!((averages[0].average - 4.0).abs() < f64::EPSILON);
}
