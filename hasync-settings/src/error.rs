use std::path::PathBuf;

use thiserror::Error;

/// Failures of a high availability settings reconciliation.
///
/// Every variant is fatal and raised before the config file is replaced. The
/// `Display` strings of [`HaError::InterfaceNotFound`] and
/// [`HaError::UnknownService`] are relied on by callers and must not change.
#[derive(Debug, Error)]
pub enum HaError {
    /// Requested sync interface is missing, disabled, or virtual.
    #[error("'{name}' is not a valid interface. If the interface exists, ensure it is enabled and also not virtual.")]
    InterfaceNotFound { name: String },

    /// Requested service is not in the catalog for the running version.
    #[error("Service {name} could not be found in your Opnsense installation. These are all the available services: {}", .available.join(", "))]
    UnknownService {
        name: String,
        available: Vec<String>,
    },

    /// An address parameter did not parse as an IP address.
    #[error("'{value}' is not a valid IP address for {field}.")]
    InvalidAddress { field: &'static str, value: String },

    /// The persisted config could not be parsed or has the wrong shape.
    #[error("malformed config document: {0}")]
    MalformedDocument(String),

    /// The config file could not be read or locked.
    #[error("failed to read config {}", .path.display())]
    ConfigUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing or renaming the replacement config failed; the original is intact.
    #[error("failed to persist config {}", .path.display())]
    PersistenceError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The running product version could not be determined.
    #[error("unable to determine OPNsense version: {0}")]
    VersionUnavailable(String),

    /// The service catalog could not be loaded.
    #[error("invalid service catalog: {0}")]
    InvalidCatalog(String),
}

impl From<opnsense_xml::ParseError> for HaError {
    fn from(err: opnsense_xml::ParseError) -> Self {
        HaError::MalformedDocument(err.to_string())
    }
}
