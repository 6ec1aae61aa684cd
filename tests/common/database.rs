//! Test database setup
#![allow(dead_code)]

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// A fresh in-memory SQLite database with the full schema.
///
/// The pool holds exactly one connection: every connection to `:memory:`
/// opens its own database, so a second one would see no tables.
pub async fn setup_test_database() -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new("sqlite::memory:".to_owned());
    opt.max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(opt).await?;
    cloudroom::db::create_schema(&db).await?;
    Ok(db)
}

/// A file-backed SQLite database whose pool allows several open
/// transactions at once. Keep the returned directory alive for the test.
pub async fn setup_concurrent_test_database(
) -> Result<(tempfile::TempDir, DatabaseConnection), DbErr> {
    let dir = tempfile::tempdir().map_err(|e| DbErr::Custom(e.to_string()))?;
    let path = dir.path().join("cloudroom.db");
    let mut opt = ConnectOptions::new(format!("sqlite://{}?mode=rwc", path.display()));
    opt.max_connections(4)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(opt).await?;
    cloudroom::db::create_schema(&db).await?;
    Ok((dir, db))
}
