//! Tests for schema initialization, the atomic executor and embed_id allocation

use super::*;
use tempfile::TempDir;

async fn create_test_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::open_local(temp_dir.path().join("test.db"))
        .await
        .unwrap();
    (db, temp_dir)
}

async fn count(conn: &Connection, sql: &str) -> i64 {
    let mut rows = conn.query(sql, ()).await.unwrap();
    let row = rows.next().await.unwrap().unwrap();
    row.get(0).unwrap()
}

// =========================================================================
// Connection mode
// =========================================================================

#[test]
fn test_connection_mode_from_url() {
    assert_eq!(
        ConnectionMode::from_url("/tmp/graph.db", None),
        ConnectionMode::Local(PathBuf::from("/tmp/graph.db"))
    );
    assert_eq!(
        ConnectionMode::from_url("libsql://graph.turso.io", Some("token".to_string())),
        ConnectionMode::Remote {
            url: "libsql://graph.turso.io".to_string(),
            auth_token: "token".to_string(),
        }
    );
    assert!(matches!(
        ConnectionMode::from_url("http://127.0.0.1:8080", None),
        ConnectionMode::Remote { ref auth_token, .. } if auth_token.is_empty()
    ));
}

// =========================================================================
// Schema
// =========================================================================

#[tokio::test]
async fn test_schema_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("graph.db");

    let first = Database::open_local(&path).await.unwrap();
    let conn = first.connect_with_timeout().await.unwrap();
    let first_id = next_embed_id(&conn, EntityTable::Nodes).await.unwrap();
    drop(conn);

    // Reopening must not reset the counters
    let second = Database::open_local(&path).await.unwrap();
    let conn = second.connect_with_timeout().await.unwrap();
    let second_id = next_embed_id(&conn, EntityTable::Nodes).await.unwrap();

    assert_eq!(first_id, 1);
    assert_eq!(second_id, 2);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM embed_counters").await, 2);
}

#[tokio::test]
async fn test_foreign_keys_enforced() {
    let (db, _temp) = create_test_db().await;
    let conn = db.connect_with_timeout().await.unwrap();

    let result = conn
        .execute(
            "INSERT INTO edges (embed_id, source, target, label, attribute) VALUES (1, 'a', 'b', 'x', '{}')",
            (),
        )
        .await;
    assert!(result.is_err(), "edge to missing nodes must be rejected");
}

// =========================================================================
// Atomic executor
// =========================================================================

#[tokio::test]
async fn test_atomic_commits_on_success() {
    let (db, _temp) = create_test_db().await;

    let embed_id = db
        .atomic(|conn| async move {
            let embed_id = next_embed_id(&conn, EntityTable::Nodes).await?;
            conn.execute(
                "INSERT INTO nodes (embed_id, id, label, attribute) VALUES (?1, 'n1', 'N', '{}')",
                libsql::params![embed_id],
            )
            .await?;
            Ok::<_, DatabaseError>(embed_id)
        })
        .await
        .unwrap();

    assert_eq!(embed_id, 1);
    let conn = db.connect_with_timeout().await.unwrap();
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM nodes").await, 1);
}

#[tokio::test]
async fn test_atomic_rolls_back_on_error() {
    let (db, _temp) = create_test_db().await;

    let result = db
        .atomic(|conn| async move {
            let embed_id = next_embed_id(&conn, EntityTable::Nodes).await?;
            conn.execute(
                "INSERT INTO nodes (embed_id, id, label, attribute) VALUES (?1, 'n1', 'N', '{}')",
                libsql::params![embed_id],
            )
            .await?;
            Err::<(), _>(DatabaseError::sql_execution("provider exploded"))
        })
        .await;
    assert!(result.is_err());

    let conn = db.connect_with_timeout().await.unwrap();
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM nodes").await, 0);

    // The counter increment was rolled back with everything else
    assert_eq!(next_embed_id(&conn, EntityTable::Nodes).await.unwrap(), 1);
}

#[tokio::test]
async fn test_counters_are_independent_per_table() {
    let (db, _temp) = create_test_db().await;
    let conn = db.connect_with_timeout().await.unwrap();

    assert_eq!(next_embed_id(&conn, EntityTable::Nodes).await.unwrap(), 1);
    assert_eq!(next_embed_id(&conn, EntityTable::Nodes).await.unwrap(), 2);
    assert_eq!(next_embed_id(&conn, EntityTable::Edges).await.unwrap(), 1);
}
