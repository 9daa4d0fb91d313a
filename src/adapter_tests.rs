//! End-to-end adapter scenarios against SQLite files and in-memory databases.

use std::time::Duration;

use tempfile::TempDir;

use crate::compiler::{IndexDescriptor, IntegerSize};
use crate::database::extensions::sqlite_config;
use crate::schema::SchemaError;
use crate::{
    AdapterOptions, AioDatabase, ColumnDescriptor, DataType, DatabaseError, DatabaseType,
    DatabaseValue, Error, IndexField, ModelDescriptor, Settings, SqlExecutor,
};

fn users() -> ModelDescriptor {
    ModelDescriptor::new("users")
        .with_column(
            ColumnDescriptor::new("id", DataType::Integer(IntegerSize::I64))
                .primary_key()
                .auto_increment(),
        )
        .with_column(ColumnDescriptor::new("name", DataType::Varchar(100)).not_null())
        .with_column(ColumnDescriptor::new("email", DataType::Varchar(255)).unique())
}

fn orders() -> ModelDescriptor {
    ModelDescriptor::new("orders")
        .with_column(ColumnDescriptor::new("id", DataType::BigInt).primary_key())
        .with_column(
            ColumnDescriptor::new("user_id", DataType::BigInt)
                .not_null()
                .references("users", "id"),
        )
        .with_column(ColumnDescriptor::new("placed_at", DataType::DateTime))
        .with_index(IndexDescriptor::new(["user_id", "placed_at"]))
}

async fn file_db(dir: &TempDir) -> AioDatabase {
    let path = dir.path().join("app.db");
    let db = AioDatabase::new(DatabaseType::Sqlite);
    db.connect(sqlite_config(path.to_string_lossy().to_string()))
        .await
        .unwrap();
    db
}

async fn memory_db() -> AioDatabase {
    let db = AioDatabase::new(DatabaseType::Sqlite);
    db.connect(sqlite_config(":memory:")).await.unwrap();
    db
}

/// Table names in creation order
async fn creation_order(db: &AioDatabase) -> Vec<String> {
    let mut cursor = db
        .execute_sql(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY rowid",
            &[],
        )
        .await
        .unwrap();
    cursor
        .fetchall()
        .iter()
        .map(|row| row.get_string("name").unwrap())
        .collect()
}

#[tokio::test]
async fn test_create_tables_orders_parents_first() {
    let dir = tempfile::tempdir().unwrap();
    let db = file_db(&dir).await;

    db.create_tables(&[orders(), users()], false).await.unwrap();

    assert_eq!(creation_order(&db).await, ["users", "orders"]);
    assert_eq!(db.get_tables(None).await.unwrap(), ["orders", "users"]);
    assert!(db.table_exists("orders", None).await.unwrap());
    assert!(!db.table_exists("invoices", None).await.unwrap());

    let indexes = db.get_indexes("orders", None).await.unwrap();
    let declared = indexes
        .iter()
        .find(|idx| idx.name == "orders_user_id_placed_at_idx")
        .unwrap();
    assert_eq!(declared.columns, ["user_id", "placed_at"]);
    assert!(!declared.unique);
    assert_eq!(declared.table, "orders");
    assert!(declared.sql.as_deref().unwrap().starts_with("CREATE INDEX"));

    db.close().await.unwrap();
    assert_eq!(db.open_handles(), 0);
}

#[tokio::test]
async fn test_users_orders_introspection() {
    let db = memory_db().await;
    db.create_tables(&[users(), orders()], false).await.unwrap();

    let fks = db.get_foreign_keys("orders", None).await.unwrap();
    let tuples: Vec<_> = fks.iter().map(|fk| fk.as_tuple()).collect();
    assert_eq!(tuples, [("user_id", "users", "id")]);
    assert_eq!(fks[0].table, "orders");
    assert!(db.get_foreign_keys("users", None).await.unwrap().is_empty());

    assert_eq!(db.get_primary_keys("users", None).await.unwrap(), ["id"]);

    let columns = db.get_columns("users", None).await.unwrap();
    let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["id", "name", "email"]);
    assert_eq!(columns[0].data_type, "INTEGER");
    assert!(!columns[0].nullable);
    assert!(!columns[1].nullable);
    assert!(columns[2].nullable);

    // UNIQUE columns surface as automatic indexes
    let indexes = db.get_indexes("users", None).await.unwrap();
    assert_eq!(indexes.len(), 1);
    assert!(indexes[0].unique);
    assert_eq!(indexes[0].columns, ["email"]);

    db.close().await.unwrap();
}

#[tokio::test]
async fn test_primary_key_flags_match_primary_keys() {
    let db = memory_db().await;
    let memberships = ModelDescriptor {
        primary_key: Some(vec!["group_id".into(), "user_id".into()]),
        ..ModelDescriptor::new("memberships")
            .with_column(ColumnDescriptor::new("user_id", DataType::BigInt).not_null())
            .with_column(ColumnDescriptor::new("group_id", DataType::BigInt).not_null())
            .with_column(ColumnDescriptor::new("role", DataType::Text(None)))
    };
    db.create_tables(&[users(), orders(), memberships], false)
        .await
        .unwrap();

    for table in ["users", "orders", "memberships"] {
        let primary_keys = db.get_primary_keys(table, None).await.unwrap();
        let flagged: Vec<String> = db
            .get_columns(table, None)
            .await
            .unwrap()
            .into_iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name)
            .collect();

        let mut sorted_keys = primary_keys.clone();
        sorted_keys.sort();
        let mut sorted_flags = flagged;
        sorted_flags.sort();
        assert_eq!(sorted_keys, sorted_flags, "{table}");
    }

    // Key order, not column order
    assert_eq!(
        db.get_primary_keys("memberships", None).await.unwrap(),
        ["group_id", "user_id"]
    );
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_cycle_issues_no_ddl() {
    let db = memory_db().await;
    let a = ModelDescriptor::new("a")
        .with_column(ColumnDescriptor::new("id", DataType::BigInt).primary_key())
        .with_column(ColumnDescriptor::new("b_id", DataType::BigInt).references("b", "id"));
    let b = ModelDescriptor::new("b")
        .with_column(ColumnDescriptor::new("id", DataType::BigInt).primary_key())
        .with_column(ColumnDescriptor::new("a_id", DataType::BigInt).references("a", "id"));

    let err = db
        .create_tables(&[users(), a, b], false)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Schema(SchemaError::DependencyCycle { ref tables }) if tables == &["a", "b"]
    ));
    assert!(db.get_tables(None).await.unwrap().is_empty());
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_compile_error_issues_no_ddl() {
    let db = memory_db().await;
    let broken = ModelDescriptor::new("broken")
        .with_column(ColumnDescriptor::new("id", DataType::BigInt).primary_key())
        .with_index(IndexDescriptor::new(["missing"]));

    let err = db.create_tables(&[users(), broken], false).await.unwrap_err();
    assert!(matches!(err, Error::Compile(_)));
    assert!(db.get_tables(None).await.unwrap().is_empty());
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_invalid_index_fields_fail_before_io() {
    // Never connected: any I/O attempt would report NotConnected instead
    let db = AioDatabase::new(DatabaseType::Sqlite);
    let model = users();

    for fields in [
        vec![],
        vec![IndexField::from("nickname")],
        vec![IndexField::from("name"), IndexField::from("name")],
    ] {
        let err = db.create_index(&model, &fields, false).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)), "{err}");
    }
    assert_eq!(db.open_handles(), 0);

    let err = db.get_columns("", None).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[tokio::test]
async fn test_create_index() {
    let db = memory_db().await;
    let model = users();
    db.create_table(&model, false).await.unwrap();

    db.create_index(&model, &["name".into(), model.columns[0].clone().into()], true)
        .await
        .unwrap();

    let indexes = db.get_indexes("users", None).await.unwrap();
    let created = indexes
        .iter()
        .find(|idx| idx.name == "users_name_id_idx")
        .unwrap();
    assert!(created.unique);
    assert_eq!(created.columns, ["name", "id"]);

    let err = db
        .create_index(&model, &["name".into(), "id".into()], true)
        .await
        .unwrap_err();
    assert!(err.is_already_exists(), "{err}");
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_safe_and_unsafe_create() {
    let db = memory_db().await;

    db.create_table(&users(), true).await.unwrap();
    db.create_table(&users(), true).await.unwrap();

    let err = db.create_table(&users(), false).await.unwrap_err();
    assert!(err.is_already_exists(), "{err}");
    assert!(matches!(
        err,
        Error::Database(DatabaseError::AlreadyExists(_))
    ));
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_fail_silently_only_skips_existing_tables() {
    let db = memory_db().await;
    db.create_table(&users(), false).await.unwrap();

    let err = db
        .create_tables(&[users(), orders()], false)
        .await
        .unwrap_err();
    assert!(err.is_already_exists());
    assert_eq!(db.get_tables(None).await.unwrap(), ["users"]);

    db.create_tables(&[users(), orders()], true).await.unwrap();
    assert_eq!(db.get_tables(None).await.unwrap(), ["orders", "users"]);

    // Other failures still abort
    let bad = ModelDescriptor::new("bad").with_column(ColumnDescriptor::new(
        "v",
        DataType::Custom("INTEGER CHECK (".into()),
    ));
    let err = db.create_tables(&[bad], true).await.unwrap_err();
    assert!(!err.is_already_exists());
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_drop_tables_children_first() {
    let dir = tempfile::tempdir().unwrap();
    let db = file_db(&dir).await;
    db.create_tables(&[users(), orders()], false).await.unwrap();

    db.execute_sql(
        "INSERT INTO users (name) VALUES (?)",
        &[DatabaseValue::from("ada")],
    )
    .await
    .unwrap();
    db.execute_sql("INSERT INTO orders (id, user_id) VALUES (1, 1)", &[])
        .await
        .unwrap();

    db.drop_tables(&[users(), orders()], false).await.unwrap();
    assert!(db.get_tables(None).await.unwrap().is_empty());

    db.drop_table(&users(), true).await.unwrap();
    let err = db.drop_table(&users(), false).await.unwrap_err();
    assert!(err.as_database_error().is_some());
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_close_is_idempotent_and_final() {
    let db = memory_db().await;
    assert!(db.is_connected().await);

    db.close().await.unwrap();
    db.close().await.unwrap();
    assert!(!db.is_connected().await);

    assert!(db.get_tables(None).await.unwrap_err().is_not_connected());
    assert!(db.execute_sql("SELECT 1", &[]).await.unwrap_err().is_not_connected());
    assert!(db.connection().await.unwrap_err().is_not_connected());
    assert!(db
        .create_table(&users(), true)
        .await
        .unwrap_err()
        .is_not_connected());
}

#[tokio::test]
async fn test_connect_twice_and_reconnect() {
    let db = memory_db().await;
    let err = db.connect(sqlite_config(":memory:")).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Database(DatabaseError::Configuration(_))
    ));

    db.create_table(&users(), false).await.unwrap();
    db.close().await.unwrap();

    // A fresh in-memory database after reconnecting
    db.connect(sqlite_config(":memory:")).await.unwrap();
    assert!(db.get_tables(None).await.unwrap().is_empty());
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_connects_bind_once() {
    let db = AioDatabase::new(DatabaseType::Sqlite);
    let (first, second) = tokio::join!(
        db.connect(sqlite_config(":memory:")),
        db.connect(sqlite_config(":memory:"))
    );

    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().any(|r| matches!(
        r,
        Err(Error::Database(DatabaseError::Configuration(_)))
    )));

    db.execute_sql("CREATE TABLE t (id INTEGER PRIMARY KEY)", &[])
        .await
        .unwrap();
    assert_eq!(db.get_tables(None).await.unwrap(), vec!["t"]);
    assert_eq!(db.open_handles(), 0);
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_memory_database_survives_between_scopes() {
    let db = memory_db().await;
    db.execute_sql("CREATE TABLE kv (k TEXT PRIMARY KEY, v TEXT)", &[])
        .await
        .unwrap();
    db.execute_sql("INSERT INTO kv (k, v) VALUES ('a', '1')", &[])
        .await
        .unwrap();

    let mut cursor = db.execute_sql("SELECT v FROM kv WHERE k = 'a'", &[]).await.unwrap();
    assert_eq!(cursor.fetchone().unwrap().get_string("v").unwrap(), "1");
    assert_eq!(db.open_handles(), 0);
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_memory_uri_survives_between_scopes() {
    let db = AioDatabase::new(DatabaseType::Sqlite);
    db.connect(sqlite_config("file::memory:")).await.unwrap();
    db.execute_sql("CREATE TABLE t (id INTEGER PRIMARY KEY)", &[])
        .await
        .unwrap();

    assert_eq!(db.get_tables(None).await.unwrap(), vec!["t"]);
    assert!(db.table_exists("t", None).await.unwrap());
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_statement_results_ignore_comments_and_literals() {
    let db = memory_db().await;
    db.execute_sql("CREATE TABLE log (id INTEGER PRIMARY KEY, msg TEXT)", &[])
        .await
        .unwrap();
    let cursor = db
        .execute_sql("INSERT INTO log (msg) VALUES ('plain')", &[])
        .await
        .unwrap();
    assert_eq!(cursor.rowcount(), 1);
    assert_eq!(cursor.last_insert_id(), Some(1));

    let cursor = db
        .execute_sql("INSERT INTO log (msg) VALUES ('returning soon')", &[])
        .await
        .unwrap();
    assert_eq!(cursor.rowcount(), 1);
    assert_eq!(cursor.last_insert_id(), Some(2));

    let mut cursor = db
        .execute_sql("-- leading comment\nSELECT msg FROM log", &[])
        .await
        .unwrap();
    assert_eq!(cursor.rowcount(), 2);
    assert_eq!(cursor.fetchall().len(), 2);

    let cursor = db
        .execute_sql("UPDATE log SET msg = 'select' WHERE id = ?", &[DatabaseValue::Integer(2)])
        .await
        .unwrap();
    assert_eq!(cursor.rowcount(), 1);
    assert_eq!(cursor.remaining(), 0);
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_counter_restored_after_scopes() {
    let db = memory_db().await;
    db.create_table(&users(), false).await.unwrap();
    assert_eq!(db.open_handles(), 0);

    // Normal exit
    let count = db
        .with_connection(|conn| {
            Box::pin(async move {
                conn.execute("INSERT INTO users (name) VALUES ('a')", &[]).await?;
                let cursor = conn.execute("SELECT id FROM users", &[]).await?;
                Ok::<_, Error>(cursor.rowcount())
            })
        })
        .await
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(db.open_handles(), 0);

    // Failing exit
    let err = db
        .with_connection(|conn| {
            Box::pin(async move {
                conn.execute("INSERT INTO nowhere (x) VALUES (1)", &[]).await?;
                Ok::<_, Error>(())
            })
        })
        .await
        .unwrap_err();
    assert!(err.as_database_error().is_some());
    assert_eq!(db.open_handles(), 0);

    // Cancelled exit
    let held = db.connection().await.unwrap();
    assert_eq!(db.open_handles(), 1);
    drop(held);
    assert_eq!(db.open_handles(), 0);

    let cancelled = tokio::time::timeout(
        Duration::from_millis(20),
        db.with_connection(|_conn| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok::<_, Error>(())
            })
        }),
    )
    .await;
    assert!(cancelled.is_err());
    assert_eq!(db.open_handles(), 0);

    // Failing execute_sql
    assert!(db.execute_sql("SELEC 1", &[]).await.is_err());
    assert_eq!(db.open_handles(), 0);
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_manual_commit_scopes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("manual.db");
    let db = AioDatabase::new(DatabaseType::Sqlite).with_options(AdapterOptions {
        autocommit: false,
        autorollback: true,
    });
    db.connect(sqlite_config(path.to_string_lossy().to_string()))
        .await
        .unwrap();
    db.create_table(&users(), false).await.unwrap();

    // Committed when the scope succeeds
    db.with_connection(|conn| {
        Box::pin(async move {
            conn.execute("INSERT INTO users (name) VALUES ('kept')", &[]).await?;
            assert!(conn.in_transaction());
            Ok::<_, Error>(())
        })
    })
    .await
    .unwrap();

    // Rolled back when it fails
    let result: crate::Result<()> = db
        .with_connection(|conn| {
            Box::pin(async move {
                conn.execute("INSERT INTO users (name) VALUES ('lost')", &[]).await?;
                Err(Error::InvalidArgument("abort".into()))
            })
        })
        .await;
    assert!(result.is_err());

    let mut cursor = db.execute_sql("SELECT name FROM users", &[]).await.unwrap();
    let rows = cursor.fetchall();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get_string("name").unwrap(), "kept");
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_execute_script() {
    let db = memory_db().await;
    db.execute_script(
        "CREATE TABLE tags (id INTEGER PRIMARY KEY, label TEXT NOT NULL);\
         INSERT INTO tags (label) VALUES ('one; two');\
         INSERT INTO tags (label) VALUES ('three');",
    )
    .await
    .unwrap();

    let cursor = db.execute_sql("SELECT label FROM tags", &[]).await.unwrap();
    assert_eq!(cursor.rowcount(), 2);
    db.close().await.unwrap();
}

async fn count_rows<E: SqlExecutor>(executor: &mut E, table: &str) -> crate::Result<u64> {
    let cursor = executor
        .execute_sql(&format!("SELECT * FROM {table}"), &[])
        .await?;
    Ok(cursor.rowcount())
}

#[tokio::test]
async fn test_sql_executor_on_adapter_and_connection() {
    let mut db = memory_db().await;
    db.create_table(&users(), false).await.unwrap();
    db.execute_sql("INSERT INTO users (name) VALUES ('x')", &[])
        .await
        .unwrap();

    assert_eq!(count_rows(&mut db, "users").await.unwrap(), 1);

    let mut conn = db.connection().await.unwrap();
    assert_eq!(count_rows(&mut conn, "users").await.unwrap(), 1);
    conn.release().await.unwrap();
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_from_settings() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("settings.db");
    let toml = format!(
        "[database]\ndb_type = \"sqlite\"\ndatabase = \"{}\"\n\n[adapter]\nautorollback = true\n",
        db_path.display()
    );
    let settings = Settings::from_toml_str(&toml).unwrap();

    let db = AioDatabase::from_settings(&settings).await.unwrap();
    assert!(db.is_connected().await);
    assert!(db.options().autorollback);
    db.create_table(&users(), false).await.unwrap();
    assert!(db_path.exists());
    db.close().await.unwrap();
}
