//! Host application identity.
//!
//! The host knows which release it is and what it is called; the updater
//! only consumes those two strings. [`StaticIdentity`] covers hosts that
//! pass them in directly (the CLI does this from flags).

use crate::core::OtaResult;
use crate::layout::validate_app_version;

/// Supplies the host application's version and package identifier.
pub trait AppIdentity: Send + Sync {
    /// Release string of the installed application, e.g. `"1.4.0"`.
    fn current_app_version(&self) -> String;

    /// Package identifier of the application, e.g. `"com.acme.shop"`.
    fn current_package_identifier(&self) -> String;
}

/// Identity fixed at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticIdentity {
    app_version: String,
    package_identifier: String,
}

impl StaticIdentity {
    /// Validates `app_version` as a version directory name.
    pub fn new(
        app_version: impl Into<String>,
        package_identifier: impl Into<String>,
    ) -> OtaResult<Self> {
        let app_version = app_version.into();
        validate_app_version(&app_version)?;
        Ok(Self {
            app_version,
            package_identifier: package_identifier.into(),
        })
    }
}

impl AppIdentity for StaticIdentity {
    fn current_app_version(&self) -> String {
        self.app_version.clone()
    }

    fn current_package_identifier(&self) -> String {
        self.package_identifier.clone()
    }
}

/// `<platform>_<package>_<version>`: the identifier used before any bundle exists.
#[must_use]
pub fn fallback_identifier(platform: &str, identity: &dyn AppIdentity) -> String {
    format!(
        "{}_{}_{}",
        platform,
        identity.current_package_identifier(),
        identity.current_app_version()
    )
}
