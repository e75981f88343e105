// SPDX-FileCopyrightText: The pkgdist authors
// SPDX-License-Identifier: MPL-2.0

use futures_util::{TryStreamExt as _, stream::BoxStream};
use serde::Serialize;
use serde_json::Value;
use sqlx::{FromRow, SqliteConnection, SqliteExecutor, SqliteTransaction};

use crate::input;

mod user;
pub use self::user::{DistUser, DistUserId, NewDistUser};

crate::db_id!(DistributionId);

/// Visibility of a [`Distribution`].
///
/// Stored as the boolean column `is_public`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Enabled,
    Disabled,
}

impl Visibility {
    #[must_use]
    pub const fn from_public(is_public: bool) -> Self {
        if is_public {
            Self::Enabled
        } else {
            Self::Disabled
        }
    }

    #[must_use]
    pub const fn is_public(self) -> bool {
        matches!(self, Self::Enabled)
    }

    /// Reads the visibility leniently.
    ///
    /// Only the literal string `"disabled"` disables a distribution.
    #[must_use]
    pub fn from_json(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(text)) if text == "disabled" => Self::Disabled,
            _ => Self::Enabled,
        }
    }
}

impl sqlx::Type<sqlx::Sqlite> for Visibility {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <bool as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <bool as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for Visibility {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        <bool as sqlx::Decode<'r, sqlx::Sqlite>>::decode(value).map(Self::from_public)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for Visibility {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <bool as sqlx::Encode<'q, sqlx::Sqlite>>::encode_by_ref(&self.is_public(), buf)
    }
}

/// A named group of recipients.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Distribution {
    pub id: DistributionId,
    pub distribution_name: String,
    pub is_public: Visibility,
    #[sqlx(skip)]
    pub users: Vec<DistUser>,
}

/// Incoming [`Distribution`] for creating or replacing a distribution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewDistribution {
    pub distribution_name: String,
    pub is_public: Visibility,
    pub users: Vec<NewDistUser>,
}

impl NewDistribution {
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        let object = input::as_object(value);
        let users = input::array(object, "users")
            .unwrap_or_default()
            .iter()
            .map(NewDistUser::from_json)
            .collect();
        Self {
            distribution_name: input::text(object, "distributionName"),
            is_public: Visibility::from_json(object.get("isPublic")),
            users,
        }
    }
}

impl Distribution {
    /// Fetches the IDs of all [`Distribution`]s in ascending order.
    #[must_use]
    pub fn fetch_all_ids<'a>(
        executor: impl SqliteExecutor<'a> + 'a,
    ) -> BoxStream<'a, sqlx::Result<DistributionId>> {
        sqlx::query_scalar(r#"SELECT "id" FROM "distributions" ORDER BY "id""#).fetch(executor)
    }

    /// Loads a single [`Distribution`] by ID, including all users.
    ///
    /// Returns `Ok(None)` if the requested [`Distribution`] has not been found.
    pub async fn try_load(
        conn: &mut SqliteConnection,
        id: DistributionId,
    ) -> sqlx::Result<Option<Self>> {
        let distribution: Option<Self> =
            sqlx::query_as(r#"SELECT * FROM "distributions" WHERE "id"=?1"#)
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;
        let Some(mut distribution) = distribution else {
            return Ok(None);
        };
        distribution.users = DistUser::load_all_of_distribution(&mut *conn, id).await?;
        Ok(Some(distribution))
    }

    /// Loads all [`Distribution`]s ordered by ID.
    pub async fn load_all(conn: &mut SqliteConnection) -> sqlx::Result<Vec<Self>> {
        let ids: Vec<DistributionId> = Self::fetch_all_ids(&mut *conn).try_collect().await?;
        let mut distributions = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(distribution) = Self::try_load(conn, id).await? {
                distributions.push(distribution);
            }
        }
        Ok(distributions)
    }

    /// Creates a new [`Distribution`] with all users.
    ///
    /// The transaction is not committed.
    pub async fn create(
        tx: &mut SqliteTransaction<'_>,
        new_distribution: &NewDistribution,
    ) -> sqlx::Result<Self> {
        let NewDistribution {
            distribution_name,
            is_public,
            users,
        } = new_distribution;
        let result = sqlx::query(
            r#"INSERT INTO "distributions" ("distribution_name","is_public") VALUES (?1,?2)"#,
        )
        .bind(distribution_name)
        .bind(is_public)
        .execute(&mut **tx)
        .await?;
        let id = DistributionId::new(result.last_insert_rowid());
        for new_user in users {
            DistUser::insert(&mut **tx, id, new_user).await?;
        }
        log::debug!("Created distribution {id}");
        Self::try_load(&mut **tx, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// Replaces an existing [`Distribution`].
    ///
    /// All users are deleted and re-inserted with new IDs.
    ///
    /// Returns `Ok(None)` without modifying anything if the requested
    /// [`Distribution`] has not been found. The transaction is not committed.
    pub async fn update(
        tx: &mut SqliteTransaction<'_>,
        id: DistributionId,
        new_distribution: &NewDistribution,
    ) -> sqlx::Result<Option<Self>> {
        let NewDistribution {
            distribution_name,
            is_public,
            users,
        } = new_distribution;
        // Writing first lets the transaction wait for concurrent writers.
        let result = sqlx::query(
            r#"UPDATE "distributions" SET "distribution_name"=?1,"is_public"=?2 WHERE "id"=?3"#,
        )
        .bind(distribution_name)
        .bind(is_public)
        .bind(id)
        .execute(&mut **tx)
        .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        let deleted_users = DistUser::delete_all_of_distribution(&mut **tx, id).await?;
        log::debug!("Replacing {deleted_users} user(s) of distribution {id}");
        for new_user in users {
            DistUser::insert(&mut **tx, id, new_user).await?;
        }
        Self::try_load(&mut **tx, id).await
    }

    /// Deletes a [`Distribution`] together with all users.
    pub async fn delete(
        executor: impl SqliteExecutor<'_>,
        id: DistributionId,
    ) -> sqlx::Result<bool> {
        sqlx::query(r#"DELETE FROM "distributions" WHERE "id"=?1"#)
            .bind(id)
            .execute(executor)
            .await
            .map(|result| {
                debug_assert!(result.rows_affected() <= 1);
                result.rows_affected() > 0
            })
    }
}
