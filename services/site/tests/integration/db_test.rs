use chrono::Utc;
use uuid::Uuid;

use inkwell_site::domain::repository::{PasskeyRepository, UserRepository};
use inkwell_site::domain::types::{PasskeyRecord, SiteUser};
use inkwell_site::infra::db::{DbPasskeyRepository, DbUserRepository};

use crate::helpers::test_db;

#[tokio::test]
async fn should_create_and_find_user_by_username() {
    let repo = DbUserRepository { db: test_db().await };
    let user = SiteUser {
        id: Uuid::new_v4(),
        username: "alice".to_owned(),
    };

    let stored = repo.create(&user).await.unwrap();
    assert_eq!(stored, user);

    let found = repo.find_by_username("alice").await.unwrap();
    assert_eq!(found, Some(user));
    assert!(repo.find_by_username("nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn should_keep_first_user_on_username_conflict() {
    let repo = DbUserRepository { db: test_db().await };
    let first = SiteUser {
        id: Uuid::new_v4(),
        username: "alice".to_owned(),
    };
    let second = SiteUser {
        id: Uuid::new_v4(),
        username: "alice".to_owned(),
    };

    repo.create(&first).await.unwrap();
    let stored = repo.create(&second).await.unwrap();
    assert_eq!(stored.id, first.id);
}

#[tokio::test]
async fn should_store_list_and_update_passkeys() {
    let db = test_db().await;
    let users = DbUserRepository { db: db.clone() };
    let passkeys = DbPasskeyRepository { db };

    let user = users
        .create(&SiteUser {
            id: Uuid::new_v4(),
            username: "alice".to_owned(),
        })
        .await
        .unwrap();

    let record = PasskeyRecord {
        credential_id: vec![0xAA, 0xBB],
        user_id: user.id,
        credential: b"v1".to_vec(),
        created_at: Utc::now(),
    };
    passkeys.create(&record).await.unwrap();

    let listed = passkeys.list_by_user(user.id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].credential_id, vec![0xAA, 0xBB]);

    passkeys
        .update_credential(&[0xAA, 0xBB], b"v2")
        .await
        .unwrap();
    let listed = passkeys.list_by_user(user.id).await.unwrap();
    assert_eq!(listed[0].credential, b"v2".to_vec());

    assert!(passkeys.list_by_user(Uuid::new_v4()).await.unwrap().is_empty());
}
