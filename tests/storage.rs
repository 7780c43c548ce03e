mod support;

use std::sync::Arc;
use support::temp_storage;
use uuid::Uuid;
use versecraft::error::StorageError;
use versecraft::storage::{NewPoemVersion, NewRating, Storage, TasteProfile, VersionStage};

// Every check below runs against the `Storage` trait object only, so the
// embedded and hosted backends are held to identical observable behavior.
// Ids are freshly generated per check; the hosted suite may run against a
// database that outlives the test process.

fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

fn version(session: &str, stage: VersionStage, text: &str) -> NewPoemVersion {
    NewPoemVersion {
        session_id: session.into(),
        stage,
        text: text.into(),
    }
}

fn rating(user_id: &str, version_id: &str, score: u8) -> NewRating {
    NewRating {
        user_id: user_id.into(),
        version_id: version_id.into(),
        score,
        ending_pref: None,
        feedback: None,
    }
}

async fn check_init_idempotent(storage: Arc<dyn Storage>) {
    storage.init().await.unwrap();
    storage.init().await.unwrap();
}

async fn check_version_indices(storage: Arc<dyn Storage>) {
    let s1 = unique("s");
    let s2 = unique("s");

    let first = storage
        .store_version(version(&s1, VersionStage::Draft, "one"))
        .await
        .unwrap();
    let second = storage
        .store_version(version(&s1, VersionStage::Revised, "two"))
        .await
        .unwrap();
    let other = storage
        .store_version(version(&s2, VersionStage::Draft, "elsewhere"))
        .await
        .unwrap();

    assert_eq!(first.index, 1);
    assert_eq!(second.index, 2);
    // Sessions number independently.
    assert_eq!(other.index, 1);
}

async fn check_versions_ordered(storage: Arc<dyn Storage>) {
    let session = unique("s");
    storage
        .store_version(version(&session, VersionStage::Draft, "one"))
        .await
        .unwrap();
    storage
        .store_version(version(&session, VersionStage::Revised, "two"))
        .await
        .unwrap();
    storage
        .store_version(version(&session, VersionStage::Improved, "three"))
        .await
        .unwrap();

    let versions = storage.list_versions(&session).await.unwrap();
    assert_eq!(versions.len(), 3);
    assert_eq!(
        versions.iter().map(|v| v.index).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert_eq!(versions[0].text, "one");
    assert_eq!(versions[2].stage, VersionStage::Improved);
}

async fn check_empty_text_rejected(storage: Arc<dyn Storage>) {
    let err = storage
        .store_version(version(&unique("s"), VersionStage::Draft, "   "))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Validation(_)));
}

async fn check_concurrent_version_stores(storage: Arc<dyn Storage>) {
    let session = unique("s");
    let s1 = Arc::clone(&storage);
    let s2 = Arc::clone(&storage);
    let sa = session.clone();
    let sb = session.clone();
    let (a, b) = tokio::join!(
        tokio::spawn(async move { s1.store_version(version(&sa, VersionStage::Draft, "left")).await }),
        tokio::spawn(async move { s2.store_version(version(&sb, VersionStage::Draft, "right")).await }),
    );
    let a = a.unwrap().unwrap();
    let b = b.unwrap().unwrap();

    let mut indices = vec![a.index, b.index];
    indices.sort_unstable();
    assert_eq!(indices, vec![1, 2]);
    assert_eq!(storage.list_versions(&session).await.unwrap().len(), 2);
}

async fn check_out_of_range_scores(storage: Arc<dyn Storage>) {
    let user = unique("u");
    let v = storage
        .store_version(version(&unique("s"), VersionStage::Revised, "a poem"))
        .await
        .unwrap();

    for score in [0u8, 6] {
        let err = storage
            .add_rating(rating(&user, &v.id, score))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)), "score {score}");
    }
    assert!(storage.list_ratings(&user, 10).await.unwrap().is_empty());
}

async fn check_orphaned_rating(storage: Arc<dyn Storage>) {
    let err = storage
        .add_rating(rating(&unique("u"), "no-such-version", 4))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Validation(_)));
}

async fn check_rating_read_after_write(storage: Arc<dyn Storage>) {
    let user = unique("u");
    let v = storage
        .store_version(version(&unique("s"), VersionStage::Revised, "a poem"))
        .await
        .unwrap();

    let written = storage.add_rating(rating(&user, &v.id, 5)).await.unwrap();
    let listed = storage.list_ratings(&user, 10).await.unwrap();

    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, written.id);
    assert_eq!(listed[0].score, 5);
    assert_eq!(listed[0].version_id, v.id);
}

async fn check_concurrent_ratings(storage: Arc<dyn Storage>) {
    let user = unique("u");
    let session = unique("s");
    let v1 = storage
        .store_version(version(&session, VersionStage::Revised, "first poem"))
        .await
        .unwrap();
    let v2 = storage
        .store_version(version(&session, VersionStage::Improved, "second poem"))
        .await
        .unwrap();

    let s1 = Arc::clone(&storage);
    let s2 = Arc::clone(&storage);
    let u1 = user.clone();
    let u2 = user.clone();
    let id1 = v1.id.clone();
    let id2 = v2.id.clone();
    let (a, b) = tokio::join!(
        tokio::spawn(async move { s1.add_rating(rating(&u1, &id1, 4)).await }),
        tokio::spawn(async move { s2.add_rating(rating(&u2, &id2, 2)).await }),
    );
    a.unwrap().unwrap();
    b.unwrap().unwrap();

    assert_eq!(storage.list_ratings(&user, 10).await.unwrap().len(), 2);
}

async fn check_rated_versions_order(storage: Arc<dyn Storage>) {
    let user = unique("u");
    let session = unique("s");
    let v1 = storage
        .store_version(version(&session, VersionStage::Revised, "first"))
        .await
        .unwrap();
    let v2 = storage
        .store_version(version(&session, VersionStage::Improved, "second"))
        .await
        .unwrap();
    storage.add_rating(rating(&user, &v2.id, 3)).await.unwrap();
    storage.add_rating(rating(&user, &v1.id, 5)).await.unwrap();

    let joined = storage.rated_versions(&user).await.unwrap();
    assert_eq!(joined.len(), 2);
    assert_eq!(joined[0].version.text, "second");
    assert_eq!(joined[1].rating.score, 5);
}

async fn check_version_averages(storage: Arc<dyn Storage>) {
    let user = unique("u");
    let session = unique("s");
    let v1 = storage
        .store_version(version(&session, VersionStage::Revised, "first"))
        .await
        .unwrap();
    storage.add_rating(rating(&user, &v1.id, 2)).await.unwrap();
    storage.add_rating(rating(&user, &v1.id, 4)).await.unwrap();

    let averages = storage.version_averages(&user, &session).await.unwrap();
    assert_eq!(averages.len(), 1);
    assert_eq!(averages[0].stage, VersionStage::Revised);
    assert!((averages[0].average - 3.0).abs() < f64::EPSILON);
    assert_eq!(averages[0].count, 2);
}

async fn check_person_crud(storage: Arc<dyn Storage>) {
    let user = unique("u");

    let ana = storage
        .add_person(&user, "Ana", "sister", Some("loves hiking"))
        .await
        .unwrap();
    assert_eq!(ana.notes.as_deref(), Some("loves hiking"));

    storage
        .update_person_notes(&user, ana.id, Some("moved to Lisbon"))
        .await
        .unwrap();
    let fetched = storage.get_person(&user, ana.id).await.unwrap().unwrap();
    assert_eq!(fetched.notes.as_deref(), Some("moved to Lisbon"));

    storage.delete_person(&user, ana.id).await.unwrap();
    assert!(storage.get_person(&user, ana.id).await.unwrap().is_none());
    assert!(storage.list_people(&user).await.unwrap().is_empty());
}

async fn check_blank_person_name(storage: Arc<dyn Storage>) {
    let err = storage
        .add_person(&unique("u"), "  ", "sister", None)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Validation(_)));
}

async fn check_people_scoped_by_user(storage: Arc<dyn Storage>) {
    let owner = unique("u");
    let stranger = unique("u");
    let ana = storage
        .add_person(&owner, "Ana", "sister", None)
        .await
        .unwrap();
    // A different user cannot see or delete her.
    assert!(storage.get_person(&stranger, ana.id).await.unwrap().is_none());
    assert!(storage.delete_person(&stranger, ana.id).await.is_err());
}

async fn check_taste_profile_roundtrip(storage: Arc<dyn Storage>) {
    let user = unique("u");
    assert!(storage.get_taste_profile(&user).await.unwrap().is_none());

    let mut profile = TasteProfile::empty(&user);
    profile.total_ratings = 3;
    profile.avg_length = Some(42.5);
    storage.save_taste_profile(&profile).await.unwrap();

    let loaded = storage.get_taste_profile(&user).await.unwrap().unwrap();
    assert_eq!(loaded.total_ratings, 3);
    assert_eq!(loaded.avg_length, Some(42.5));

    profile.total_ratings = 4;
    storage.save_taste_profile(&profile).await.unwrap();
    let reloaded = storage.get_taste_profile(&user).await.unwrap().unwrap();
    assert_eq!(reloaded.total_ratings, 4);
}

mod embedded {
    use super::*;

    macro_rules! embedded_test {
        ($name:ident, $check:ident) => {
            #[tokio::test]
            async fn $name() {
                let (storage, _dir) = temp_storage().await;
                $check(storage).await;
            }
        };
    }

    embedded_test!(init_is_idempotent, check_init_idempotent);
    embedded_test!(version_indices_increase_within_a_session, check_version_indices);
    embedded_test!(versions_are_append_only_and_ordered, check_versions_ordered);
    embedded_test!(empty_poem_text_rejected, check_empty_text_rejected);
    embedded_test!(concurrent_stores_get_distinct_indices, check_concurrent_version_stores);
    embedded_test!(out_of_range_scores_rejected_without_a_row, check_out_of_range_scores);
    embedded_test!(orphaned_rating_rejected, check_orphaned_rating);
    embedded_test!(rating_read_after_write, check_rating_read_after_write);
    embedded_test!(concurrent_ratings_both_persist, check_concurrent_ratings);
    embedded_test!(rated_versions_joins_in_rating_order, check_rated_versions_order);
    embedded_test!(version_averages_grouped_by_stage, check_version_averages);
    embedded_test!(person_crud_roundtrip, check_person_crud);
    embedded_test!(blank_person_name_rejected, check_blank_person_name);
    embedded_test!(people_are_scoped_by_user, check_people_scoped_by_user);
    embedded_test!(taste_profile_upsert_roundtrip, check_taste_profile_roundtrip);
}

/// The same checks against the hosted backend. Ignored by default; run with
/// `cargo test -- --ignored` and `DATABASE_URL` pointing at a disposable
/// Postgres database.
mod hosted {
    use super::*;
    use versecraft::storage::PostgresStorage;

    async fn hosted_storage() -> Arc<dyn Storage> {
        let url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must point at a disposable Postgres database");
        let storage: Arc<dyn Storage> =
            Arc::new(PostgresStorage::connect(&url).await.expect("connect"));
        storage.init().await.expect("init schema");
        storage
    }

    macro_rules! hosted_test {
        ($name:ident, $check:ident) => {
            #[tokio::test]
            #[ignore = "requires DATABASE_URL pointing at a disposable Postgres"]
            async fn $name() {
                $check(hosted_storage().await).await;
            }
        };
    }

    hosted_test!(init_is_idempotent, check_init_idempotent);
    hosted_test!(version_indices_increase_within_a_session, check_version_indices);
    hosted_test!(versions_are_append_only_and_ordered, check_versions_ordered);
    hosted_test!(empty_poem_text_rejected, check_empty_text_rejected);
    hosted_test!(concurrent_stores_get_distinct_indices, check_concurrent_version_stores);
    hosted_test!(out_of_range_scores_rejected_without_a_row, check_out_of_range_scores);
    hosted_test!(orphaned_rating_rejected, check_orphaned_rating);
    hosted_test!(rating_read_after_write, check_rating_read_after_write);
    hosted_test!(concurrent_ratings_both_persist, check_concurrent_ratings);
    hosted_test!(rated_versions_joins_in_rating_order, check_rated_versions_order);
    hosted_test!(version_averages_grouped_by_stage, check_version_averages);
    hosted_test!(person_crud_roundtrip, check_person_crud);
    hosted_test!(blank_person_name_rejected, check_blank_person_name);
    hosted_test!(people_are_scoped_by_user, check_people_scoped_by_user);
    hosted_test!(taste_profile_upsert_roundtrip, check_taste_profile_roundtrip);
}
