//! AWS resource adapters for drift.
//!
//! - **`aws_qldb_stream`** ([`qldb`]): QLDB journal streams into Kinesis.
//! - **`aws_simpledb_domain`** ([`simpledb`]): `SimpleDB` domains.
//!
//! Adapters talk to AWS through the [`StreamApi`](qldb::StreamApi) and
//! [`DomainApi`](simpledb::DomainApi) seams. The AWS-backed implementations
//! are behind the `qldb` and `simpledb` features (the latter a signed Query
//! API client in `sdb`); [`memory`] has in-memory ones. All clients share a
//! common [`AwsBaseConfig`](config::AwsBaseConfig) for region, profile,
//! endpoint override, and optional STS assume-role credentials.

pub mod auth;
pub mod config;
pub mod error;
pub mod memory;
pub mod qldb;
#[cfg(feature = "simpledb")]
pub mod sdb;
pub mod settings;
pub mod simpledb;

// Re-exports for convenience.
pub use config::AwsBaseConfig;
pub use error::AwsProviderError;
pub use qldb::{STREAM_TYPE_NAME, StreamApi, StreamResource, StreamTimeouts};
#[cfg(feature = "simpledb")]
pub use sdb::SimpleDbClient;
pub use settings::ProviderSettings;
pub use simpledb::{DOMAIN_TYPE_NAME, DomainApi, DomainResource};
