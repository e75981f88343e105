// SPDX-FileCopyrightText: The pkgdist authors
// SPDX-License-Identifier: MPL-2.0

use serde::Serialize;
use serde_json::Value;
use sqlx::{FromRow, SqliteExecutor};

use crate::{DistributionId, input};

crate::db_id!(DistUserId);

/// A recipient of a [`Distribution`](crate::Distribution).
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistUser {
    pub id: DistUserId,
    /// User name or identifier.
    #[sqlx(rename = "username")]
    pub user: String,
    /// Empty if not set.
    pub alternate_email: String,
    pub enabled: bool,
}

/// Incoming [`DistUser`] without an ID.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewDistUser {
    pub user: String,
    pub alternate_email: String,
    pub enabled: bool,
}

impl NewDistUser {
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        let object = input::as_object(value);
        Self {
            user: input::text(object, "user"),
            alternate_email: input::text(object, "alternateEmail"),
            enabled: input::flag(object, "enabled", false),
        }
    }
}

impl DistUser {
    /// Loads all users of a distribution, ordered by ID.
    pub(crate) async fn load_all_of_distribution(
        executor: impl SqliteExecutor<'_>,
        distribution_id: DistributionId,
    ) -> sqlx::Result<Vec<Self>> {
        sqlx::query_as(
            r#"SELECT "id","username","alternate_email","enabled"
               FROM "distribution_users" WHERE "distribution_id"=?1 ORDER BY "id""#,
        )
        .bind(distribution_id)
        .fetch_all(executor)
        .await
    }

    pub(crate) async fn insert(
        executor: impl SqliteExecutor<'_>,
        distribution_id: DistributionId,
        new_user: &NewDistUser,
    ) -> sqlx::Result<DistUserId> {
        let NewDistUser {
            user,
            alternate_email,
            enabled,
        } = new_user;
        let result = sqlx::query(
            r#"INSERT INTO "distribution_users"
               ("distribution_id","username","alternate_email","enabled")
               VALUES (?1,?2,?3,?4)"#,
        )
        .bind(distribution_id)
        .bind(user)
        .bind(alternate_email)
        .bind(enabled)
        .execute(executor)
        .await?;
        Ok(DistUserId::new(result.last_insert_rowid()))
    }

    pub(crate) async fn delete_all_of_distribution(
        executor: impl SqliteExecutor<'_>,
        distribution_id: DistributionId,
    ) -> sqlx::Result<u64> {
        sqlx::query(r#"DELETE FROM "distribution_users" WHERE "distribution_id"=?1"#)
            .bind(distribution_id)
            .execute(executor)
            .await
            .map(|result| result.rows_affected())
    }
}
