//! Session persistence through the file-backed store.

use passgate_core::storage::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY};
use passgate_core::{AccessToken, KeyValueStore, RefreshToken, Session, SessionStorage, UserInfo};
use passgate_file::FileStore;

fn refreshed_session() -> Session {
    Session::new(
        AccessToken::new("a2"),
        RefreshToken::new("r2"),
        UserInfo::new("u1", "e@x.com"),
    )
}

#[test]
fn persisted_session_survives_a_new_store_instance() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("session.json");

    SessionStorage::new(FileStore::new(&path))
        .persist(&refreshed_session())
        .unwrap();

    let reopened = SessionStorage::new(FileStore::new(&path));
    let session = reopened.load().unwrap().expect("session should be stored");
    assert_eq!(session.access_token.as_str(), "a2");
    assert_eq!(session.refresh_token.as_str(), "r2");
    assert_eq!(session.user, UserInfo::new("u1", "e@x.com"));
}

#[test]
fn stored_keys_match_browser_layout() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path().join("session.json"));
    SessionStorage::new(store.clone())
        .persist(&refreshed_session())
        .unwrap();

    assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("a2"));
    assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("r2"));

    let user: serde_json::Value =
        serde_json::from_str(&store.get(USER_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(user, serde_json::json!({"user_id": "u1", "email": "e@x.com"}));
}

#[test]
fn clear_leaves_unrelated_keys() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path().join("session.json"));
    store.set("theme", "dark").unwrap();

    let storage = SessionStorage::new(store.clone());
    storage.persist(&refreshed_session()).unwrap();
    storage.clear().unwrap();

    assert!(storage.load().unwrap().is_none());
    assert_eq!(store.get("theme").unwrap().as_deref(), Some("dark"));
}

#[test]
fn concurrent_writers_do_not_lose_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = FileStore::new(&path);
            std::thread::spawn(move || store.set(&format!("key-{i}"), "v").unwrap())
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let store = FileStore::new(&path);
    for i in 0..8 {
        assert_eq!(store.get(&format!("key-{i}")).unwrap().as_deref(), Some("v"));
    }
}

#[test]
fn corrupt_session_file_can_be_cleared() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    std::fs::write(&path, "{truncated").unwrap();

    let storage = SessionStorage::new(FileStore::new(&path));
    storage.clear().unwrap();

    assert!(storage.load().unwrap().is_none());
    assert!(!storage.is_authenticated().unwrap());
}

#[test]
fn corrupt_session_file_is_overwritten_by_sign_in() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    std::fs::write(&path, "\0\0\0").unwrap();

    let storage = SessionStorage::new(FileStore::new(&path));
    storage.persist(&refreshed_session()).unwrap();

    let session = storage.load().unwrap().expect("session should be stored");
    assert_eq!(session.access_token.as_str(), "a2");
}
