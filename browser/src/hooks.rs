//! Shape detection and creation-path interception.
//!
//! [`bind_hooks`] resolves the root's object model once, then layers
//! decorators over the context- and page-creation entry points so that every
//! page produced through them is announced to the registered hook before the
//! caller sees it. On the classic shape the decorators also take ownership of
//! the viewport: caller-supplied fixed-viewport options are stripped before
//! delegation and the resulting pages lose their direct viewport setter.

use crate::Result;
use crate::config::ViewportSize;
use crate::driver::BoundsSession;
use crate::driver::CloseListener;
use crate::driver::ContextDriver;
use crate::driver::CreationOptions;
use crate::driver::PageDriver;
use crate::driver::RootDriver;
use crate::driver::Shape;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// Callback invoked with every page produced through a wrapped creation
/// entry point, before the page is handed back to the caller. Errors abort
/// the creation call.
pub type PageCreatedHook =
    Arc<dyn Fn(Arc<dyn PageDriver>) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Hooks installed by [`bind_hooks`].
#[derive(Clone, Default)]
pub struct Hooks {
    pub on_page_created: Option<PageCreatedHook>,
}

/// Wrap `root` so its creation entry points normalize the pages they
/// produce. Installing twice is a no-op; the instrumented root is returned
/// for chaining.
pub fn bind_hooks(root: Arc<dyn RootDriver>, hooks: Hooks) -> Arc<dyn RootDriver> {
    if root.instrumented() {
        return root;
    }

    let shape = Shape::detect(root.as_ref());
    Arc::new(InstrumentedRoot {
        shape,
        hooks,
        inner: root,
    })
}

struct InstrumentedRoot {
    inner: Arc<dyn RootDriver>,
    shape: Shape,
    hooks: Hooks,
}

impl InstrumentedRoot {
    fn wrap_context(&self, context: Arc<dyn ContextDriver>) -> Arc<dyn ContextDriver> {
        Arc::new(InstrumentedContext {
            inner: context,
            shape: self.shape,
            hooks: self.hooks.clone(),
        })
    }
}

#[async_trait]
impl RootDriver for InstrumentedRoot {
    fn version(&self) -> Option<String> {
        self.inner.version()
    }

    async fn new_context(&self, options: CreationOptions) -> Result<Arc<dyn ContextDriver>> {
        // On the classic shape the plugin, not the caller, controls the
        // viewport; the context-native model isolates pages on its own.
        let options = match self.shape {
            Shape::Classic => options.without_viewport(),
            Shape::ContextNative => options,
        };
        let context = self.inner.new_context(options).await?;
        Ok(self.wrap_context(context))
    }

    fn default_context(&self) -> Option<Arc<dyn ContextDriver>> {
        self.inner
            .default_context()
            .map(|context| self.wrap_context(context))
    }

    async fn pages(&self) -> Result<Vec<Arc<dyn PageDriver>>> {
        self.inner.pages().await
    }

    fn on_disconnect(&self, listener: CloseListener) {
        self.inner.on_disconnect(listener);
    }

    fn instrumented(&self) -> bool {
        true
    }
}

struct InstrumentedContext {
    inner: Arc<dyn ContextDriver>,
    shape: Shape,
    hooks: Hooks,
}

#[async_trait]
impl ContextDriver for InstrumentedContext {
    async fn new_page(&self, options: CreationOptions) -> Result<Arc<dyn PageDriver>> {
        let options = match self.shape {
            Shape::Classic => options.without_viewport(),
            Shape::ContextNative => options,
        };
        let page = self.inner.new_page(options).await?;

        if let Some(hook) = &self.hooks.on_page_created {
            hook(Arc::clone(&page)).await?;
        }

        match self.shape {
            Shape::Classic => Ok(Arc::new(HardenedPage { inner: page }) as Arc<dyn PageDriver>),
            Shape::ContextNative => Ok(page),
        }
    }
}

/// Classic-shape page whose direct viewport setter is disabled so caller
/// code cannot defeat the fingerprint-mandated viewport.
#[derive(Debug)]
struct HardenedPage {
    inner: Arc<dyn PageDriver>,
}

#[async_trait]
impl PageDriver for HardenedPage {
    async fn evaluate(&self, expression: &str) -> Result<Value> {
        self.inner.evaluate(expression).await
    }

    async fn bounds_session(&self) -> Result<Box<dyn BoundsSession>> {
        self.inner.bounds_session().await
    }

    async fn override_viewport(&self, _size: ViewportSize) -> Result<()> {
        warn!("setting the viewport size is not allowed (limited by fingerprint)");
        Ok(())
    }
}
