// Unit tests for the database module
// Note: These only test functionality that doesn't require a server

use super::*;
use std::collections::HashMap;

#[test]
fn test_database_type_display() {
    assert_eq!(DatabaseType::Postgres.to_string(), "postgres");
    assert_eq!(DatabaseType::MySql.to_string(), "mysql");
    assert_eq!(DatabaseType::Sqlite.to_string(), "sqlite");
}

#[test]
fn test_database_type_from_str_aliases() {
    assert_eq!("PostgreSQL".parse::<DatabaseType>().unwrap(), DatabaseType::Postgres);
    assert_eq!("pg".parse::<DatabaseType>().unwrap(), DatabaseType::Postgres);
    assert_eq!("mariadb".parse::<DatabaseType>().unwrap(), DatabaseType::MySql);
    assert_eq!(" sqlite3 ".parse::<DatabaseType>().unwrap(), DatabaseType::Sqlite);

    let err = "oracle".parse::<DatabaseType>().unwrap_err();
    assert!(matches!(err, DatabaseError::Configuration(ref msg) if msg.contains("oracle")));
}

#[test]
fn test_database_config_serialization() {
    let mut extra_params = HashMap::new();
    extra_params.insert("mode".to_string(), "readwrite".to_string());

    let config = DatabaseConfig {
        db_type: DatabaseType::Postgres,
        host: Some("localhost".to_string()),
        port: Some(5432),
        database: "testdb".to_string(),
        username: Some("user".to_string()),
        password: Some("pass".to_string()),
        ssl_mode: Some("prefer".to_string()),
        extra_params,
    };

    let serialized = serde_json::to_string(&config).unwrap();
    assert!(serialized.contains("\"db_type\":\"postgres\""));

    let deserialized: DatabaseConfig = serde_json::from_str(&serialized).unwrap();
    assert_eq!(deserialized, config);
}

#[test]
fn test_database_config_minimal_json() {
    let config: DatabaseConfig =
        serde_json::from_str(r#"{"db_type":"sqlite","database":"app.db"}"#).unwrap();
    assert_eq!(config.db_type, DatabaseType::Sqlite);
    assert_eq!(config.database, "app.db");
    assert!(config.host.is_none());
    assert!(config.extra_params.is_empty());
    assert!(!config.is_in_memory());
}

#[test]
fn test_in_memory_detection() {
    assert!(DatabaseConfig::default().is_in_memory());
    assert!(extensions::sqlite_config("file:shared?mode=memory&cache=shared").is_in_memory());
    assert!(extensions::sqlite_config("file::memory:").is_in_memory());
    assert!(extensions::sqlite_config("file::memory:?cache=shared").is_in_memory());
    assert!(!extensions::sqlite_config("/var/lib/app.db").is_in_memory());
    assert!(!extensions::sqlite_config("file:/var/lib/app.db?mode=rwc").is_in_memory());
    assert!(!extensions::sqlite_config("file:memory.db").is_in_memory());

    let mut pg = extensions::postgres_config("h", 5432, ":memory:", "u", "p");
    pg.database = ":memory:".to_string();
    assert!(!pg.is_in_memory());
}

#[test]
fn test_extension_constructors() {
    let pg = extensions::postgres_config("db", 5432, "app", "svc", "pw");
    assert_eq!(pg.db_type, DatabaseType::Postgres);
    assert_eq!(pg.ssl_mode.as_deref(), Some("prefer"));
    assert_eq!(
        pg.extra_params.get("application_name").map(String::as_str),
        Some("aiodb")
    );

    let my = extensions::mysql_config("db", 3306, "app", "svc", "pw");
    assert_eq!(my.db_type, DatabaseType::MySql);
    assert_eq!(my.extra_params.get("charset").map(String::as_str), Some("utf8mb4"));
}

#[test]
fn test_database_value_conversions() {
    assert_eq!(DatabaseValue::from("a"), DatabaseValue::Text("a".to_string()));
    assert_eq!(DatabaseValue::from(7_i64), DatabaseValue::Integer(7));
    assert_eq!(DatabaseValue::from(None::<&str>), DatabaseValue::Null);
    assert_eq!(
        DatabaseValue::from(Some("b")),
        DatabaseValue::Text("b".to_string())
    );
}

#[test]
fn test_already_exists_classification() {
    assert!(DatabaseError::AlreadyExists("table users".into()).is_already_exists());
    assert!(!DatabaseError::Query("table users already exists".into()).is_already_exists());
    assert_eq!(DatabaseError::NotConnected.to_string(), "not connected");
}

#[cfg(feature = "database")]
#[test]
fn test_extra_params_are_sorted() {
    let mut params = HashMap::new();
    params.insert("b".to_string(), "2".to_string());
    params.insert("a".to_string(), "1".to_string());

    let mut url = "sqlite:app.db".to_string();
    append_extra_params(&mut url, &params);
    assert_eq!(url, "sqlite:app.db?a=1&b=2");

    let mut url = "postgres://h/db?sslmode=require".to_string();
    append_extra_params(&mut url, &params);
    assert_eq!(url, "postgres://h/db?sslmode=require&a=1&b=2");
}

#[cfg(not(feature = "postgres"))]
#[test]
fn test_disabled_backend_is_configuration_error() {
    let config = extensions::postgres_config("db", 5432, "app", "svc", "pw");
    assert!(matches!(
        create_driver(&config),
        Err(DatabaseError::Configuration(_))
    ));
}
