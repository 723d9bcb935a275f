//! On-disk database initialization

use gk_common::db::init::init_database;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("quiz_attempts.db");

    let result = init_database(&db_path).await;
    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing_and_keeps_rows() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("quiz_attempts.db");

    let pool = init_database(&db_path).await.unwrap();
    sqlx::query(
        "INSERT INTO quiz_attempts (member_id, command, created_at, result) VALUES (7, 'k!quiz gn1 nd 20 mmq=4', CURRENT_TIMESTAMP, 'FAILED')",
    )
    .execute(&pool)
    .await
    .unwrap();
    pool.close().await;

    let reopened = init_database(&db_path).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM quiz_attempts WHERE member_id = 7")
        .fetch_one(&reopened)
        .await
        .unwrap();
    assert_eq!(count, 1);
}
