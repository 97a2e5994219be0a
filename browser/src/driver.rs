//! Capability seam over the two automation object models this crate wraps.
//!
//! The interceptor never mutates a driver; it layers decorator objects that
//! implement the same traits on top of the original handles.

use crate::Result;
use crate::config::OuterBounds;
use crate::config::ViewportSize;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// The two supported automation object models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// No separate context concept; the root doubles as the default context
    /// and pages expose a direct viewport setter.
    Classic,
    /// First-class isolated browsing contexts own the pages.
    ContextNative,
}

impl Shape {
    /// Resolve the shape once per root. Only the classic model reports a
    /// product version directly on the root object.
    pub fn detect(root: &dyn RootDriver) -> Self {
        if root.version().is_some() {
            Self::Classic
        } else {
            Self::ContextNative
        }
    }
}

/// Options accepted by the context- and page-creation entry points.
#[derive(Debug, Clone, Default)]
pub struct CreationOptions {
    /// A fixed content viewport requested by the caller.
    pub viewport: Option<ViewportSize>,
}

impl CreationOptions {
    pub(crate) fn without_viewport(mut self) -> Self {
        self.viewport = None;
        self
    }
}

pub type CloseListener = Box<dyn FnOnce() + Send>;

/// A launched (or attached) browser instance.
#[async_trait]
pub trait RootDriver: Send + Sync {
    /// Product version string; present only on the classic shape.
    fn version(&self) -> Option<String>;

    /// Create an isolated browsing context.
    async fn new_context(&self, options: CreationOptions) -> Result<Arc<dyn ContextDriver>>;

    /// The root's own context view, if the model has one.
    fn default_context(&self) -> Option<Arc<dyn ContextDriver>>;

    /// Pages already open on this root.
    async fn pages(&self) -> Result<Vec<Arc<dyn PageDriver>>>;

    /// Register a listener on the shutdown/disconnect signal.
    fn on_disconnect(&self, listener: CloseListener);

    /// Marker keeping hook installation idempotent per root.
    fn instrumented(&self) -> bool {
        false
    }
}

#[async_trait]
pub trait ContextDriver: Send + Sync {
    async fn new_page(&self, options: CreationOptions) -> Result<Arc<dyn PageDriver>>;
}

#[async_trait]
pub trait PageDriver: std::fmt::Debug + Send + Sync {
    /// Evaluate an expression in the page, resolving promises.
    async fn evaluate(&self, expression: &str) -> Result<Value>;

    /// Open a window-bounds session against the OS window hosting this page.
    async fn bounds_session(&self) -> Result<Box<dyn BoundsSession>>;

    /// The driver's native fixed-viewport override.
    async fn override_viewport(&self, size: ViewportSize) -> Result<()>;
}

/// Scoped access to the outer window of one page.
///
/// A session is exclusively owned by one reconciliation at a time and must
/// be released on every exit path before another session is opened for the
/// same window.
#[async_trait]
pub trait BoundsSession: Send {
    async fn bounds(&mut self) -> Result<OuterBounds>;

    async fn set_bounds(&mut self, bounds: OuterBounds) -> Result<()>;

    async fn release(self: Box<Self>) -> Result<()>;
}
