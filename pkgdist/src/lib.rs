// SPDX-FileCopyrightText: The pkgdist authors
// SPDX-License-Identifier: MPL-2.0

#![doc = include_str!("../README.md")]

mod database;
pub use self::database::{create_schema, open_database, open_in_memory_database};

mod db_id;

mod distribution;
pub use self::distribution::{
    DistUser, DistUserId, Distribution, DistributionId, NewDistUser, NewDistribution, Visibility,
};

mod input;
pub use self::input::parse_body;

mod package;
pub use self::package::{
    Content, ContentId, NewContent, NewPackage, NewParameter, Package, PackageId, Parameter,
    ParameterId, static_parameter_defaults,
};

mod snapshot;
pub use self::snapshot::{ImportOutcome, Snapshot, import_snapshot};
