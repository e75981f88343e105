// SPDX-FileCopyrightText: The pkgdist authors
// SPDX-License-Identifier: MPL-2.0

use std::{path::Path, time::Duration};

use sqlx::{
    SqliteExecutor, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

/// How long a connection waits for concurrent writers before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Table definitions.
///
/// Every statement is idempotent. Foreign keys are only enforced if
/// enabled per connection, see [`open_database()`].
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS "packages" (
    "id" INTEGER PRIMARY KEY AUTOINCREMENT,
    "package_name" TEXT NOT NULL DEFAULT '',
    "distribution_group" TEXT NOT NULL DEFAULT '',
    "delivery_type" TEXT NOT NULL DEFAULT '',
    "email_title" TEXT NOT NULL DEFAULT '',
    "email_message" TEXT NOT NULL DEFAULT '',
    "location" TEXT NOT NULL DEFAULT ''
);
CREATE TABLE IF NOT EXISTS "package_contents" (
    "id" INTEGER PRIMARY KEY AUTOINCREMENT,
    "package_id" INTEGER NOT NULL,
    "file_path" TEXT NOT NULL DEFAULT '',
    "output_filename" TEXT NOT NULL DEFAULT '',
    "access_group" TEXT NOT NULL DEFAULT '',
    "enabled" INTEGER NOT NULL DEFAULT 1,
    FOREIGN KEY("package_id") REFERENCES "packages"("id") ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS "package_contents_package_id" ON "package_contents"("package_id");
CREATE TABLE IF NOT EXISTS "package_parameters" (
    "id" INTEGER PRIMARY KEY AUTOINCREMENT,
    "package_id" INTEGER NOT NULL,
    "param_name" TEXT NOT NULL DEFAULT '',
    "literal_value" TEXT NOT NULL DEFAULT '',
    "is_static" INTEGER NOT NULL DEFAULT 1,
    FOREIGN KEY("package_id") REFERENCES "packages"("id") ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS "package_parameters_package_id" ON "package_parameters"("package_id");
CREATE TABLE IF NOT EXISTS "distributions" (
    "id" INTEGER PRIMARY KEY AUTOINCREMENT,
    "distribution_name" TEXT NOT NULL DEFAULT '',
    "is_public" INTEGER NOT NULL DEFAULT 1
);
CREATE TABLE IF NOT EXISTS "distribution_users" (
    "id" INTEGER PRIMARY KEY AUTOINCREMENT,
    "distribution_id" INTEGER NOT NULL,
    "username" TEXT NOT NULL DEFAULT '',
    "alternate_email" TEXT NOT NULL DEFAULT '',
    "enabled" INTEGER NOT NULL DEFAULT 1,
    FOREIGN KEY("distribution_id") REFERENCES "distributions"("id") ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS "distribution_users_distribution_id" ON "distribution_users"("distribution_id");
"#;

/// Creates all tables if absent.
pub async fn create_schema(executor: impl SqliteExecutor<'_>) -> sqlx::Result<()> {
    sqlx::raw_sql(SCHEMA).execute(executor).await?;
    Ok(())
}

/// Opens the database file and creates the schema.
///
/// The file is created if it doesn't exist yet.
pub async fn open_database(file_path: impl AsRef<Path>) -> sqlx::Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(file_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT);
    let pool = SqlitePool::connect_with(options).await?;
    create_schema(&pool).await?;
    Ok(pool)
}

/// Opens a private, in-memory database with the schema.
///
/// The database vanishes when its last connection is closed. The pool is
/// therefore restricted to a single connection that is never recycled.
pub async fn open_in_memory_database() -> sqlx::Result<SqlitePool> {
    let options = "sqlite::memory:"
        .parse::<SqliteConnectOptions>()?
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    create_schema(&pool).await?;
    Ok(pool)
}
