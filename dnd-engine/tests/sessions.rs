//! Saving, loading and the session store.

use dnd_engine::character::HitPoints;
use dnd_engine::persist::{list_saves, save_path, PersistError};
use dnd_engine::{
    create_sample_fighter, EngineConfig, GameSession, SessionError, SessionStore, Surprise,
};
use std::time::Duration;
use tempfile::TempDir;

fn config() -> EngineConfig {
    EngineConfig::default().with_seed(17)
}

#[tokio::test]
async fn test_save_and_resume() {
    let dir = TempDir::new().unwrap();
    let path = save_path(dir.path(), "Roland");

    let mut session = GameSession::new(create_sample_fighter("Roland"), config());
    session.process_narration("[RECRUIT: lyra] [GOLD: 40] [ITEM: lantern]");
    session.travel("Wave Echo Cave", true).unwrap();
    session.save(&path).await.unwrap();

    let loaded = GameSession::load(&path, config()).await.unwrap();
    assert_eq!(loaded.character(), session.character());
    assert_eq!(loaded.party(), session.party());
    assert_eq!(loaded.location().name, "Wave Echo Cave");
    assert!(loaded.location().dark);
    assert!(!loaded.in_combat());

    let saves = list_saves(dir.path()).await.unwrap();
    assert_eq!(saves.len(), 1);
    assert_eq!(saves[0].metadata.party_size, 1);
}

#[tokio::test]
async fn test_cannot_save_mid_combat() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("combat.json");

    let mut character = create_sample_fighter("Roland");
    character.hit_points = HitPoints::new(500);
    let mut session = GameSession::new(character, config());
    session
        .start_combat(&["ogre".to_string()], Surprise::None)
        .unwrap();

    let err = session.save(&path).await.unwrap_err();
    assert!(matches!(err, SessionError::InCombat("save")));
    assert!(!path.exists());
}

#[tokio::test]
async fn test_missing_and_corrupted_saves() {
    let dir = TempDir::new().unwrap();

    let missing = GameSession::load(dir.path().join("none.json"), config())
        .await
        .unwrap_err();
    assert!(matches!(missing, SessionError::Persist(ref e) if e.is_missing()));

    let corrupted_path = dir.path().join("bad.json");
    tokio::fs::write(&corrupted_path, r#"{"version": 1, "character": 7}"#)
        .await
        .unwrap();
    let corrupted = GameSession::load(&corrupted_path, config())
        .await
        .unwrap_err();
    assert!(matches!(
        corrupted,
        SessionError::Persist(PersistError::Json(_))
    ));
}

#[tokio::test]
async fn test_tampered_hit_points_refuse_to_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tampered.json");
    GameSession::new(create_sample_fighter("Roland"), config())
        .save(&path)
        .await
        .unwrap();

    let content = tokio::fs::read_to_string(&path).await.unwrap();
    let mut save: serde_json::Value = serde_json::from_str(&content).unwrap();
    save["character"]["hit_points"]["maximum"] = serde_json::json!(-5);
    tokio::fs::write(&path, save.to_string()).await.unwrap();

    let err = GameSession::load(&path, config()).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Persist(PersistError::Corrupted(_))
    ));
}

#[tokio::test]
async fn test_store_hands_out_independent_sessions() {
    let store = SessionStore::from_config(&config());
    let a = store
        .create(GameSession::new(create_sample_fighter("Roland"), config()))
        .await;
    let b = store
        .create(GameSession::new(create_sample_fighter("Mira"), config()))
        .await;
    assert_ne!(a, b);

    {
        let handle = store.get(a).await.unwrap();
        let mut session = handle.lock().await;
        session.process_narration("[GOLD: 100]");
    }

    let gold_a = store.get(a).await.unwrap().lock().await.character().inventory.gold;
    let gold_b = store.get(b).await.unwrap().lock().await.character().inventory.gold;
    assert_eq!(gold_a, 115);
    assert_eq!(gold_b, 15);
}

#[tokio::test]
async fn test_concurrent_turns_on_separate_sessions() {
    let store = std::sync::Arc::new(SessionStore::new(Duration::from_secs(60)));
    let mut ids = Vec::new();
    for i in 0..4 {
        let id = store
            .create(GameSession::new(
                create_sample_fighter(&format!("Hero {i}")),
                config(),
            ))
            .await;
        ids.push(id);
    }

    let mut tasks = Vec::new();
    for id in ids.clone() {
        let store = std::sync::Arc::clone(&store);
        tasks.push(tokio::spawn(async move {
            for _ in 0..10 {
                let handle = store.get(id).await.unwrap();
                handle.lock().await.process_narration("[GOLD: 1]");
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    for id in ids {
        let gold = store.get(id).await.unwrap().lock().await.character().inventory.gold;
        assert_eq!(gold, 25);
    }
}

#[tokio::test]
async fn test_zero_ttl_expires_everything() {
    let store = SessionStore::from_config(&config().with_session_ttl(Duration::ZERO));
    let id = store
        .create(GameSession::new(create_sample_fighter("Roland"), config()))
        .await;

    assert!(store.get(id).await.is_none());
    assert_eq!(store.expire_idle().await, 1);
    assert!(store.is_empty().await);
}
