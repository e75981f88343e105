// SPDX-FileCopyrightText: The pkgdist authors
// SPDX-License-Identifier: MPL-2.0

use serde::Serialize;
use serde_json::Value;
use sqlx::{FromRow, SqliteExecutor};

use crate::{PackageId, input};

crate::db_id!(ParameterId);

/// Fallback parameters as (name, literal value) pairs.
///
/// All of them are static.
const STATIC_PARAMETER_DEFAULTS: [(&str, &str); 3] = [
    ("param_Consol", "USD"),
    ("Param_Store_Entities", "STORE_REG"),
    ("Param_Time", "|!Param_Time_Input!|"),
];

/// Returns the parameters that substitute an empty parameter list.
///
/// Each invocation returns a fresh copy.
#[must_use]
pub fn static_parameter_defaults() -> Vec<NewParameter> {
    STATIC_PARAMETER_DEFAULTS
        .iter()
        .map(|(name, value)| NewParameter {
            name: (*name).to_owned(),
            value: (*value).to_owned(),
            is_static: true,
        })
        .collect()
}

/// A named parameter of a [`Package`](crate::Package).
///
/// The value is stored literally. Placeholders like `|!Name!|` are not
/// interpreted.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub id: ParameterId,
    #[sqlx(rename = "param_name")]
    pub name: String,
    #[sqlx(rename = "literal_value")]
    pub value: String,
    pub is_static: bool,
}

/// Incoming [`Parameter`] without an ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewParameter {
    pub name: String,
    pub value: String,
    pub is_static: bool,
}

impl Default for NewParameter {
    fn default() -> Self {
        Self {
            name: String::new(),
            value: String::new(),
            is_static: true,
        }
    }
}

impl NewParameter {
    /// Reads a parameter entry leniently.
    ///
    /// `isStatic` is `true` unless present and falsy.
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        let object = input::as_object(value);
        Self {
            name: input::text(object, "name"),
            value: input::text(object, "value"),
            is_static: input::flag(object, "isStatic", true),
        }
    }
}

impl Parameter {
    /// Loads all parameters of a package, ordered by ID.
    pub(crate) async fn load_all_of_package(
        executor: impl SqliteExecutor<'_>,
        package_id: PackageId,
    ) -> sqlx::Result<Vec<Self>> {
        sqlx::query_as(
            r#"SELECT "id","param_name","literal_value","is_static"
               FROM "package_parameters" WHERE "package_id"=?1 ORDER BY "id""#,
        )
        .bind(package_id)
        .fetch_all(executor)
        .await
    }

    pub(crate) async fn insert(
        executor: impl SqliteExecutor<'_>,
        package_id: PackageId,
        new_parameter: &NewParameter,
    ) -> sqlx::Result<ParameterId> {
        let NewParameter {
            name,
            value,
            is_static,
        } = new_parameter;
        let result = sqlx::query(
            r#"INSERT INTO "package_parameters"
               ("package_id","param_name","literal_value","is_static")
               VALUES (?1,?2,?3,?4)"#,
        )
        .bind(package_id)
        .bind(name)
        .bind(value)
        .bind(is_static)
        .execute(executor)
        .await?;
        debug_assert_eq!(result.rows_affected(), 1);
        Ok(ParameterId::new(result.last_insert_rowid()))
    }

    pub(crate) async fn delete_all_of_package(
        executor: impl SqliteExecutor<'_>,
        package_id: PackageId,
    ) -> sqlx::Result<u64> {
        sqlx::query(r#"DELETE FROM "package_parameters" WHERE "package_id"=?1"#)
            .bind(package_id)
            .execute(executor)
            .await
            .map(|result| result.rows_affected())
    }
}
