// SPDX-FileCopyrightText: The pkgdist authors
// SPDX-License-Identifier: MPL-2.0

use serde::Serialize;
use serde_json::Value;
use sqlx::{FromRow, SqliteExecutor};

use crate::{PackageId, input};

crate::db_id!(ContentId);

/// A file delivered with a [`Package`](crate::Package).
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    pub id: ContentId,
    pub file_path: String,
    pub output_filename: String,
    pub access_group: String,
    pub enabled: bool,
}

/// Incoming [`Content`] without an ID.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewContent {
    pub file_path: String,
    pub output_filename: String,
    pub access_group: String,
    pub enabled: bool,
}

impl NewContent {
    /// Reads a content entry leniently.
    ///
    /// `enabled` is `false` unless present and truthy.
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        let object = input::as_object(value);
        Self {
            file_path: input::text(object, "filePath"),
            output_filename: input::text(object, "outputFilename"),
            access_group: input::text(object, "accessGroup"),
            enabled: input::flag(object, "enabled", false),
        }
    }
}

impl Content {
    /// Loads all contents of a package, ordered by ID.
    pub(crate) async fn load_all_of_package(
        executor: impl SqliteExecutor<'_>,
        package_id: PackageId,
    ) -> sqlx::Result<Vec<Self>> {
        sqlx::query_as(
            r#"SELECT "id","file_path","output_filename","access_group","enabled"
               FROM "package_contents" WHERE "package_id"=?1 ORDER BY "id""#,
        )
        .bind(package_id)
        .fetch_all(executor)
        .await
    }

    pub(crate) async fn insert(
        executor: impl SqliteExecutor<'_>,
        package_id: PackageId,
        new_content: &NewContent,
    ) -> sqlx::Result<ContentId> {
        let NewContent {
            file_path,
            output_filename,
            access_group,
            enabled,
        } = new_content;
        let result = sqlx::query(
            r#"INSERT INTO "package_contents"
               ("package_id","file_path","output_filename","access_group","enabled")
               VALUES (?1,?2,?3,?4,?5)"#,
        )
        .bind(package_id)
        .bind(file_path)
        .bind(output_filename)
        .bind(access_group)
        .bind(enabled)
        .execute(executor)
        .await?;
        debug_assert_eq!(result.rows_affected(), 1);
        Ok(ContentId::new(result.last_insert_rowid()))
    }

    pub(crate) async fn delete_all_of_package(
        executor: impl SqliteExecutor<'_>,
        package_id: PackageId,
    ) -> sqlx::Result<u64> {
        sqlx::query(r#"DELETE FROM "package_contents" WHERE "package_id"=?1"#)
            .bind(package_id)
            .execute(executor)
            .await
            .map(|result| result.rows_affected())
    }
}
