// SPDX-FileCopyrightText: The pkgdist authors
// SPDX-License-Identifier: MPL-2.0

use serde::Serialize;
use serde_json::Value;
use sqlx::{SqliteConnection, SqliteTransaction};

use crate::{Distribution, NewDistribution, NewPackage, Package, input};

/// All records of the database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub packages: Vec<Package>,
    pub distributions: Vec<Distribution>,
}

impl Snapshot {
    /// Loads all packages and distributions.
    ///
    /// Should run within a transaction to obtain a consistent view.
    pub async fn load(conn: &mut SqliteConnection) -> sqlx::Result<Self> {
        let packages = Package::load_all(conn).await?;
        let distributions = Distribution::load_all(conn).await?;
        Ok(Self {
            packages,
            distributions,
        })
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportOutcome {
    /// Number of packages that have been created.
    pub packages: u64,

    /// Number of distributions that have been created.
    pub distributions: u64,
}

/// Imports packages and distributions from a snapshot.
///
/// Each record is created anew, incoming IDs are ignored. Records are read
/// leniently like request bodies.
///
/// Must run within a transaction. The transaction is not committed.
pub async fn import_snapshot(
    tx: &mut SqliteTransaction<'_>,
    snapshot: &Value,
) -> sqlx::Result<ImportOutcome> {
    let object = input::as_object(snapshot);
    let mut outcome = ImportOutcome::default();
    for distribution in input::array(object, "distributions").unwrap_or_default() {
        Distribution::create(tx, &NewDistribution::from_json(distribution)).await?;
        outcome.distributions += 1;
    }
    for package in input::array(object, "packages").unwrap_or_default() {
        Package::create(tx, &NewPackage::from_json(package)).await?;
        outcome.packages += 1;
    }
    log::info!(
        "Imported {packages} package(s) and {distributions} distribution(s)",
        packages = outcome.packages,
        distributions = outcome.distributions
    );
    Ok(outcome)
}
