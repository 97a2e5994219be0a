pub mod cdp;
pub mod config;
pub mod driver;
pub mod hooks;
pub mod lifecycle;
pub mod viewport;

pub use config::OuterBounds;
pub use config::ViewportSize;
pub use driver::BoundsSession;
pub use driver::ContextDriver;
pub use driver::CreationOptions;
pub use driver::PageDriver;
pub use driver::RootDriver;
pub use driver::Shape;
pub use hooks::Hooks;
pub use hooks::PageCreatedHook;
pub use hooks::bind_hooks;
pub use lifecycle::on_close;
pub use viewport::get_viewport;
pub use viewport::set_viewport;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrowserError {
    /// The remote debugging connection dropped mid-operation.
    #[error("transport error: {0}")]
    Transport(String),

    /// The target window or session is no longer valid.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Script evaluation failed because the page cannot run scripts right now.
    #[error("evaluation error: {0}")]
    Evaluation(String),

    /// A launch option the plugin contract forbids.
    #[error("the built-in \"{0}\" option is not supported by this plugin")]
    UnsupportedOption(String),

    #[error("browser not connected")]
    NotConnected,
}

impl From<chromiumoxide::error::CdpError> for BrowserError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        match err {
            chromiumoxide::error::CdpError::Chrome(err) => BrowserError::Protocol(err.to_string()),
            other => BrowserError::Transport(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, BrowserError>;
