use async_trait::async_trait;
use imprint_browser::Result;
use imprint_browser::ViewportSize;
use serde_json::Value;

/// A fingerprint negotiated with the provisioning service.
#[derive(Debug, Clone)]
pub struct Fingerprint {
    /// Content viewport mandated by the fingerprint; zero dimensions leave
    /// the viewport unconstrained.
    pub viewport: ViewportSize,
    /// Opaque payload applied by the provisioning service.
    pub payload: Value,
}

/// The fingerprint-provisioning collaborator.
#[async_trait]
pub trait FingerprintProvider: Send + Sync {
    /// Exchange a service key for a fingerprint.
    async fn fetch(&self, key: &str) -> Result<Fingerprint>;
}
