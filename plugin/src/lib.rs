//! Provisioning glue around [`imprint_browser`].
//!
//! Ties the fingerprint service, the automation library's launcher and the
//! viewport-enforcement core together while keeping the launcher's public
//! surface unchanged: callers get back an ordinary root handle whose pages
//! simply come out matching the fingerprint-mandated viewport.

pub mod options;
pub mod plugin;
pub mod provider;

pub use options::IGNORED_ARGUMENTS;
pub use options::LaunchOptions;
pub use options::UNSUPPORTED_OPTIONS;
pub use plugin::FingerprintPlugin;
pub use plugin::Launcher;
pub use plugin::configure;
pub use provider::Fingerprint;
pub use provider::FingerprintProvider;
