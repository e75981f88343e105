// SPDX-FileCopyrightText: The pkgdist authors
// SPDX-License-Identifier: MPL-2.0

use futures_util::{TryStreamExt as _, stream::BoxStream};
use serde::Serialize;
use serde_json::Value;
use sqlx::{FromRow, SqliteConnection, SqliteExecutor, SqliteTransaction};

use crate::input;

mod content;
pub use self::content::{Content, ContentId, NewContent};

mod parameter;
pub use self::parameter::{NewParameter, Parameter, ParameterId, static_parameter_defaults};

crate::db_id!(PackageId);

/// A distributable package with its contents and parameters.
///
/// Both child collections are owned by the package and ordered by ID.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub id: PackageId,
    pub package_name: String,
    pub distribution_group: String,
    pub delivery_type: String,
    pub email_title: String,
    pub email_message: String,
    pub location: String,
    #[sqlx(skip)]
    pub contents: Vec<Content>,
    #[sqlx(skip)]
    pub parameters: Vec<Parameter>,
}

/// Incoming [`Package`] for creating or replacing a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPackage {
    pub package_name: String,
    pub distribution_group: String,
    pub delivery_type: String,
    pub email_title: String,
    pub email_message: String,
    pub location: String,
    pub contents: Vec<NewContent>,
    /// Never empty.
    pub parameters: Vec<NewParameter>,
}

impl Default for NewPackage {
    fn default() -> Self {
        Self {
            package_name: String::new(),
            distribution_group: String::new(),
            delivery_type: String::new(),
            email_title: String::new(),
            email_message: String::new(),
            location: String::new(),
            contents: Vec::new(),
            parameters: static_parameter_defaults(),
        }
    }
}

impl NewPackage {
    /// Reads a package record leniently.
    ///
    /// Missing text fields become empty. A missing or empty list of
    /// parameters is substituted by [`static_parameter_defaults()`].
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        let object = input::as_object(value);
        let contents = input::array(object, "contents")
            .unwrap_or_default()
            .iter()
            .map(NewContent::from_json)
            .collect();
        let parameters = match input::array(object, "parameters") {
            Some(parameters) if !parameters.is_empty() => {
                parameters.iter().map(NewParameter::from_json).collect()
            }
            _ => static_parameter_defaults(),
        };
        Self {
            package_name: input::text(object, "packageName"),
            distribution_group: input::text(object, "distributionGroup"),
            delivery_type: input::text(object, "deliveryType"),
            email_title: input::text(object, "emailTitle"),
            email_message: input::text(object, "emailMessage"),
            location: input::text(object, "location"),
            contents,
            parameters,
        }
    }
}

impl Package {
    /// Fetches the IDs of all [`Package`]s in ascending order.
    #[must_use]
    pub fn fetch_all_ids<'a>(
        executor: impl SqliteExecutor<'a> + 'a,
    ) -> BoxStream<'a, sqlx::Result<PackageId>> {
        sqlx::query_scalar(r#"SELECT "id" FROM "packages" ORDER BY "id""#).fetch(executor)
    }

    /// Loads a single [`Package`] by ID, including all children.
    ///
    /// Returns `Ok(None)` if the requested [`Package`] has not been found.
    ///
    /// Should run within a transaction to obtain a consistent view.
    pub async fn try_load(
        conn: &mut SqliteConnection,
        id: PackageId,
    ) -> sqlx::Result<Option<Self>> {
        let package: Option<Self> = sqlx::query_as(r#"SELECT * FROM "packages" WHERE "id"=?1"#)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        let Some(mut package) = package else {
            return Ok(None);
        };
        package.contents = Content::load_all_of_package(&mut *conn, id).await?;
        package.parameters = Parameter::load_all_of_package(&mut *conn, id).await?;
        Ok(Some(package))
    }

    /// Loads all [`Package`]s ordered by ID.
    ///
    /// Should run within a transaction to obtain a consistent view.
    pub async fn load_all(conn: &mut SqliteConnection) -> sqlx::Result<Vec<Self>> {
        let ids: Vec<PackageId> = Self::fetch_all_ids(&mut *conn).try_collect().await?;
        let mut packages = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(package) = Self::try_load(conn, id).await? {
                packages.push(package);
            }
        }
        Ok(packages)
    }

    /// Creates a new [`Package`] with all children.
    ///
    /// Returns the package as persisted. The transaction is not committed.
    pub async fn create(
        tx: &mut SqliteTransaction<'_>,
        new_package: &NewPackage,
    ) -> sqlx::Result<Self> {
        let NewPackage {
            package_name,
            distribution_group,
            delivery_type,
            email_title,
            email_message,
            location,
            contents: _,
            parameters: _,
        } = new_package;
        let result = sqlx::query(
            r#"INSERT INTO "packages"
               ("package_name","distribution_group","delivery_type","email_title","email_message","location")
               VALUES (?1,?2,?3,?4,?5,?6)"#,
        )
        .bind(package_name)
        .bind(distribution_group)
        .bind(delivery_type)
        .bind(email_title)
        .bind(email_message)
        .bind(location)
        .execute(&mut **tx)
        .await?;
        let id = PackageId::new(result.last_insert_rowid());
        insert_children(tx, id, new_package).await?;
        log::debug!("Created package {id}");
        Self::try_load(&mut **tx, id).await?.ok_or(sqlx::Error::RowNotFound)
    }

    /// Replaces an existing [`Package`].
    ///
    /// Overwrites all fields and replaces both child collections with new
    /// rows. IDs of the previous children are not reused.
    ///
    /// Returns `Ok(None)` without modifying anything if the requested
    /// [`Package`] has not been found. The transaction is not committed.
    ///
    /// The first statement must be a write, otherwise concurrent updates
    /// fail with `SQLITE_BUSY` instead of waiting for each other.
    pub async fn update(
        tx: &mut SqliteTransaction<'_>,
        id: PackageId,
        new_package: &NewPackage,
    ) -> sqlx::Result<Option<Self>> {
        let NewPackage {
            package_name,
            distribution_group,
            delivery_type,
            email_title,
            email_message,
            location,
            contents: _,
            parameters: _,
        } = new_package;
        let result = sqlx::query(
            r#"UPDATE "packages" SET
               "package_name"=?1,"distribution_group"=?2,"delivery_type"=?3,
               "email_title"=?4,"email_message"=?5,"location"=?6
               WHERE "id"=?7"#,
        )
        .bind(package_name)
        .bind(distribution_group)
        .bind(delivery_type)
        .bind(email_title)
        .bind(email_message)
        .bind(location)
        .bind(id)
        .execute(&mut **tx)
        .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        debug_assert_eq!(result.rows_affected(), 1);
        let deleted_contents = Content::delete_all_of_package(&mut **tx, id).await?;
        let deleted_parameters = Parameter::delete_all_of_package(&mut **tx, id).await?;
        log::debug!(
            "Replacing {deleted_contents} content(s) and {deleted_parameters} parameter(s) of package {id}"
        );
        insert_children(tx, id, new_package).await?;
        Self::try_load(&mut **tx, id).await
    }

    /// Deletes a [`Package`] together with all children.
    pub async fn delete(executor: impl SqliteExecutor<'_>, id: PackageId) -> sqlx::Result<bool> {
        sqlx::query(r#"DELETE FROM "packages" WHERE "id"=?1"#)
            .bind(id)
            .execute(executor)
            .await
            .map(|result| {
                debug_assert!(result.rows_affected() <= 1);
                result.rows_affected() > 0
            })
    }
}

async fn insert_children(
    tx: &mut SqliteTransaction<'_>,
    id: PackageId,
    new_package: &NewPackage,
) -> sqlx::Result<()> {
    for new_content in &new_package.contents {
        Content::insert(&mut **tx, id, new_content).await?;
    }
    debug_assert!(!new_package.parameters.is_empty());
    for new_parameter in &new_package.parameters {
        Parameter::insert(&mut **tx, id, new_parameter).await?;
    }
    Ok(())
}
