//! OPNsense high availability (CARP/pfsync) settings reconciliation.
//!
//! This library brings the `<hasync>` section of an OPNsense `config.xml`
//! in line with a requested set of settings. Stored values are read, the
//! request is validated against the live system, the two are diffed and the
//! file is rewritten only when something actually differs. Running the same
//! request twice reports no change the second time.
//!
//! # Architecture
//!
//! ## Model
//!
//! - [`model`] — Typed view of `<hasync>` and its on/absent flag encoding
//! - [`request`] — Requested settings; omitted fields keep stored values
//! - [`catalog`] — Version-aware catalog of synchronizable services
//! - [`version`] — Installed product version and where it is read from
//!
//! ## Reconciliation
//!
//! - [`probe`] — Interface assignments and version lookups
//! - [`reconcile`] — Validation, merge and field-level diff
//! - [`document`] — Parsed config that re-renders only `<hasync>`
//! - [`store`] — Locked, atomic read-modify-write of the config file
//!
//! ## Reporting & Configuration
//!
//! - [`report`] — Colored diff, JSON and listing output
//! - [`settings`] — Host paths from a TOML settings file
//! - [`error`] — Error kinds surfaced to callers
//!
//! # Examples
//!
//! ```ignore
//! use hasync_settings::catalog::ServiceCatalog;
//! use hasync_settings::probe::SystemProbe;
//! use hasync_settings::reconcile::Reconciler;
//! use hasync_settings::request::HaSettingsRequest;
//! use hasync_settings::store::ConfigStore;
//! use hasync_settings::version::VersionSource;
//!
//! let catalog = ServiceCatalog::embedded()?;
//! let probe = SystemProbe::new(VersionSource::File("/usr/local/opnsense/version/core".into()));
//! let reconciler = Reconciler::new(&probe, &catalog);
//!
//! let mut request = HaSettingsRequest::new("LAN");
//! request.synchronize_states = Some(true);
//! request.services_to_synchronize = Some(vec!["NAT".into(), "Aliases".into()]);
//!
//! let result = ConfigStore::new("/conf/config.xml").reconcile(&reconciler, &request, false)?;
//! println!("changed={}", result.changed);
//! ```
//!
//! # Built on opnsense-xml
//!
//! XML parsing and serialization live in `opnsense-xml`, which keeps the
//! byte spans needed to splice a rewritten section back into the original
//! file. Everything specific to high availability settings is in this crate.

pub mod catalog;
pub mod document;
pub mod error;
pub mod model;
pub mod probe;
pub mod reconcile;
pub mod report;
pub mod request;
pub mod settings;
pub mod store;
pub mod version;
