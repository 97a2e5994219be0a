use imprint_browser::BrowserError;
use imprint_browser::Result;
use serde_json::Map;
use serde_json::Value;

/// Launcher options whose semantics the plugin cannot honor; requesting one
/// fails the launch before any remote call is made.
pub const UNSUPPORTED_OPTIONS: &[&str] = &["product", "channel", "firefox_user_prefs"];

/// Arguments stripped from the browser's default argument set on every
/// launch; extensions are managed by the fingerprint service.
pub const IGNORED_ARGUMENTS: &[&str] = &["--disable-extensions"];

/// Options forwarded to the automation library's launcher.
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    /// Service key for applying a fingerprint.
    pub key: String,
    pub headless: Option<bool>,
    pub args: Vec<String>,
    pub ignore_default_args: Vec<String>,
    /// Launcher options forwarded verbatim.
    pub extra: Map<String, Value>,
}

impl LaunchOptions {
    pub fn validate(&self) -> Result<()> {
        for option in UNSUPPORTED_OPTIONS {
            if self.extra.contains_key(*option) {
                return Err(BrowserError::UnsupportedOption((*option).to_string()));
            }
        }
        Ok(())
    }

    /// Merge the plugin's built-in ignored arguments into the caller's list.
    pub(crate) fn merge_ignored_arguments(mut self) -> Self {
        for argument in IGNORED_ARGUMENTS {
            if !self.ignore_default_args.iter().any(|existing| existing == argument) {
                self.ignore_default_args.push((*argument).to_string());
            }
        }
        self
    }
}
