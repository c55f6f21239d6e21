use crate::db::*;
use tempfile::NamedTempFile;

#[tokio::test]
async fn test_missing_key_reads_as_none() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    assert_eq!(db.get_state(keys::CURRENT_TASK_ID).await.unwrap(), None);

    db.close().await;
}

#[tokio::test]
async fn test_set_then_overwrite_state() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    db.set_state(keys::CURRENT_TASK_ID, "t-1").await.unwrap();
    assert_eq!(
        db.get_state(keys::CURRENT_TASK_ID).await.unwrap().as_deref(),
        Some("t-1")
    );

    db.set_state(keys::CURRENT_TASK_ID, "t-2").await.unwrap();
    assert_eq!(
        db.get_state(keys::CURRENT_TASK_ID).await.unwrap().as_deref(),
        Some("t-2")
    );

    db.close().await;
}

#[tokio::test]
async fn test_delete_state_is_idempotent() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    db.set_state(keys::API_KEY, "sk-abc").await.unwrap();
    db.delete_state(keys::API_KEY).await.unwrap();
    assert_eq!(db.get_state(keys::API_KEY).await.unwrap(), None);

    // Deleting again is fine
    db.delete_state(keys::API_KEY).await.unwrap();

    db.close().await;
}

#[tokio::test]
async fn test_keys_are_independent() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    db.set_state(keys::API_KEY, "sk-abc").await.unwrap();
    db.set_state(keys::CURRENT_TASK_ID, "t-9").await.unwrap();
    db.delete_state(keys::CURRENT_TASK_ID).await.unwrap();

    assert_eq!(
        db.get_state(keys::API_KEY).await.unwrap().as_deref(),
        Some("sk-abc")
    );

    db.close().await;
}

#[tokio::test]
async fn test_state_survives_reopen() {
    // Simulates a process restart between two sessions
    let temp_file = NamedTempFile::new().unwrap();

    {
        let db = Database::new(temp_file.path()).await.unwrap();
        db.set_state(keys::CURRENT_TASK_ID, "t-2").await.unwrap();
        db.close().await;
    }

    {
        let db = Database::new(temp_file.path()).await.unwrap();
        assert_eq!(
            db.get_state(keys::CURRENT_TASK_ID).await.unwrap().as_deref(),
            Some("t-2")
        );
        db.close().await;
    }
}
