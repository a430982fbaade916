//! # keel_manifest
//!
//! Application manifest and account configuration handling for keel.
//!
//! A manifest (`keel.yml`) declares an application made of named services grouped
//! into named environments. This crate loads it, enforces the structural rules every
//! manifest must satisfy before any deployment phase runs, and loads the account
//! configuration describing the target cloud account.
//!
//! Nothing here knows which service types exist; checks that need the service
//! registry live in `keel_core`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use keel_manifest::{AccountConfigLoader, ManifestReader};
//!
//! let manifest = ManifestReader::read_file("keel.yml").unwrap();
//! let account = AccountConfigLoader::load("account.yml").unwrap();
//!
//! for (env_name, services) in &manifest.environments {
//!     println!("{}: {} services in {}", env_name, services.len(), account.region);
//! }
//! ```

pub mod account;
pub mod error;
pub mod extension;
pub mod models;
pub mod reader;
pub mod tags;
pub mod validator;

pub use account::{AccountConfig, AccountConfigLoader};
pub use error::{ManifestError, ManifestResult};
pub use extension::ExtensionDefinition;
pub use models::*;
pub use reader::{ManifestReader, DEFAULT_MANIFEST_FILE};
pub use tags::{parse_tag_args, validate_tags, Tags};
pub use validator::{ManifestValidator, ValidationResult};
