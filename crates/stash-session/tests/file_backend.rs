use std::time::Duration;

use pretty_assertions::assert_eq;
use stash_cache::FileRegistry;
use stash_session::SessionStore;
use tempfile::TempDir;

#[test]
fn test_sessions_survive_reopen() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("cache");

    let id = {
        let registry = FileRegistry::new(root.clone(), "1").unwrap();
        let sessions = SessionStore::open(&registry, "session").unwrap();
        let mut session = sessions.create();
        session.set("auth", "user", "alice");
        session.set_json("prefs", "theme", "dark").unwrap();
        sessions.save(&session).unwrap();
        session.id().to_owned()
    };

    let registry = FileRegistry::new(root, "1").unwrap();
    let sessions = SessionStore::open(&registry, "session").unwrap();
    let session = sessions.load(&id).unwrap().unwrap();
    assert_eq!(session.get("auth", "user"), Some("alice"));
    assert_eq!(
        session.get_json::<String>("prefs", "theme").unwrap(),
        Some("dark".to_owned())
    );
    assert_eq!(sessions.len().unwrap(), 1);
}

#[test]
fn test_format_version_change_drops_sessions() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("cache");

    let id = {
        let registry = FileRegistry::new(root.clone(), "1").unwrap();
        let sessions = SessionStore::open(&registry, "session").unwrap();
        let session = sessions.create();
        sessions.save(&session).unwrap();
        session.id().to_owned()
    };

    let registry = FileRegistry::new(root, "2").unwrap();
    let sessions = SessionStore::open(&registry, "session").unwrap();
    assert_eq!(sessions.load(&id).unwrap(), None);
}

#[test]
fn test_garbage_collect_keeps_fresh_sessions() {
    let tmp = TempDir::new().unwrap();
    let registry = FileRegistry::new(tmp.path().join("cache"), "1").unwrap();
    let sessions = SessionStore::open(&registry, "session").unwrap();
    for _ in 0..3 {
        sessions.save(&sessions.create()).unwrap();
    }

    assert_eq!(sessions.garbage_collect(Duration::from_secs(3_600)).unwrap(), 0);
    assert_eq!(sessions.len().unwrap(), 3);
}
