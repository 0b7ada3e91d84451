#![cfg(feature = "sqlite")]

use std::sync::Arc;

use pretty_assertions::assert_eq;
use tokio::sync::Barrier;
use secrets_auth::{
    CredentialHash, Error, IdentityStore, ProfileDefaults, SqliteIdentityStore, Username,
};

async fn store() -> SqliteIdentityStore {
    SqliteIdentityStore::connect("sqlite::memory:")
        .await
        .expect("in-memory database")
}

fn name(s: &str) -> Username {
    s.parse().unwrap()
}

fn defaults(display_name: &str) -> ProfileDefaults {
    ProfileDefaults {
        display_name: Some(display_name.into()),
        picture: Some("https://img.example/p.png".into()),
    }
}

#[tokio::test]
async fn test_create_local_round_trips() {
    let store = store().await;
    let created = store
        .create_local(name("Alice"), CredentialHash::new("h1"))
        .await
        .unwrap();

    let found = store.find_by_username(&name("alice")).await.unwrap().unwrap();
    assert_eq!(found.id, created.id);
    assert_eq!(found.username.as_ref().map(Username::as_str), Some("Alice"));
    assert_eq!(found.credential_hash.as_ref().map(CredentialHash::as_str), Some("h1"));
    assert_eq!(found.display_name.as_deref(), Some("Alice"));

    let by_id = store.find_by_id(created.id).await.unwrap().unwrap();
    assert_eq!(by_id.id, created.id);
}

#[tokio::test]
async fn test_duplicate_username_is_rejected_by_constraint() {
    let store = store().await;
    store
        .create_local(name("alice"), CredentialHash::new("h1"))
        .await
        .unwrap();
    let err = store
        .create_local(name("ALICE"), CredentialHash::new("h2"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateUsername));
    assert_eq!(store.count().await.unwrap(), 1);

    let kept = store.find_by_username(&name("alice")).await.unwrap().unwrap();
    assert_eq!(kept.credential_hash.as_ref().map(CredentialHash::as_str), Some("h1"));
}

#[tokio::test]
async fn test_find_or_create_is_idempotent() {
    let store = store().await;
    let first = store
        .find_or_create_by_provider("google", "p1", defaults("Pat"))
        .await
        .unwrap();
    let second = store
        .find_or_create_by_provider("google", "p1", defaults("Renamed"))
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.display_name.as_deref(), Some("Pat"));
    assert_eq!(second.provider_subject("google"), Some("p1"));
    assert!(second.username.is_none());
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_concurrent_find_or_create_yields_one_account() {
    let store = Arc::new(store().await);
    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .find_or_create_by_provider("google", "racer", ProfileDefaults::default())
                    .await
                    .unwrap()
                    .id
            })
        })
        .collect();

    let mut ids = Vec::new();
    for task in tasks {
        ids.push(task.await.unwrap());
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_find_or_create_on_shared_file_database() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("accounts.db").display());
    let store = Arc::new(SqliteIdentityStore::connect(&url).await.unwrap());

    for round in 0..20 {
        let subject = format!("racer-{round}");
        let start = Arc::new(Barrier::new(5));
        let tasks: Vec<_> = (0..5)
            .map(|_| {
                let store = store.clone();
                let subject = subject.clone();
                let start = start.clone();
                tokio::spawn(async move {
                    start.wait().await;
                    store
                        .find_or_create_by_provider("google", &subject, ProfileDefaults::default())
                        .await
                        .unwrap()
                        .id
                })
            })
            .collect();

        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1, "round {round}");

        let linked = store.find_by_provider("google", &subject).await.unwrap().unwrap();
        assert_eq!(linked.id, ids[0]);
    }
    assert_eq!(store.count().await.unwrap(), 20);
}

#[tokio::test]
async fn test_link_provider_rules() {
    let store = store().await;
    let local = store
        .create_local(name("bob"), CredentialHash::new("h"))
        .await
        .unwrap();
    let other = store
        .find_or_create_by_provider("google", "taken", ProfileDefaults::default())
        .await
        .unwrap();

    let linked = store.link_provider(local.id, "google", "bob-sub").await.unwrap();
    assert_eq!(linked.provider_subject("google"), Some("bob-sub"));
    let found = store.find_by_provider("google", "bob-sub").await.unwrap().unwrap();
    assert_eq!(found.id, local.id);

    // Same owner: no-op.
    store.link_provider(local.id, "google", "bob-sub").await.unwrap();

    let err = store
        .link_provider(local.id, "google", "taken")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateProviderLink { .. }));
    let still = store.find_by_provider("google", "taken").await.unwrap().unwrap();
    assert_eq!(still.id, other.id);

    let missing = secrets_auth::AccountId::generate();
    assert!(matches!(
        store.link_provider(missing, "github", "x").await.unwrap_err(),
        Error::AccountNotFound
    ));
}

#[tokio::test]
async fn test_rotate_credential_replaces_hash() {
    let store = store().await;
    let account = store
        .create_local(name("bob"), CredentialHash::new("old"))
        .await
        .unwrap();
    let rotated = store
        .rotate_credential(account.id, CredentialHash::new("new"))
        .await
        .unwrap();
    assert_eq!(rotated.credential_hash.as_ref().map(CredentialHash::as_str), Some("new"));

    assert!(matches!(
        store
            .rotate_credential(secrets_auth::AccountId::generate(), CredentialHash::new("x"))
            .await
            .unwrap_err(),
        Error::AccountNotFound
    ));
}
