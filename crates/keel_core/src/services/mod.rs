//! Built-in service types.
//!
//! These are registered under the standard-library prefix and are written in
//! manifests without a prefix.

pub mod api_access;

use std::sync::Arc;

use async_trait::async_trait;

use crate::extension::{Extension, ExtensionContext, ExtensionLoadError};

pub use api_access::ApiAccessDeployer;

/// Name the standard library is loaded under.
pub const STDLIB_EXTENSION_NAME: &str = "keel-stdlib";

/// The built-in extension.
pub struct StandardLibrary;

#[async_trait]
impl Extension for StandardLibrary {
    async fn load(&self, context: &mut ExtensionContext) -> Result<(), ExtensionLoadError> {
        context.service(api_access::SERVICE_TYPE, Arc::new(ApiAccessDeployer));
        Ok(())
    }
}
