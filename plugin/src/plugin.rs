//! Launch orchestration: validate options, fetch the fingerprint, launch,
//! then wire viewport enforcement and shutdown cleanup onto the root.

use crate::options::LaunchOptions;
use crate::provider::FingerprintProvider;
use async_trait::async_trait;
use imprint_browser::Hooks;
use imprint_browser::PageCreatedHook;
use imprint_browser::Result;
use imprint_browser::RootDriver;
use imprint_browser::ViewportSize;
use imprint_browser::bind_hooks;
use imprint_browser::get_viewport;
use imprint_browser::on_close;
use imprint_browser::set_viewport;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use tokio::sync::Mutex;
use tracing::debug;

/// The automation library's launcher collaborator.
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Launch (or attach to) a browser with the given options.
    async fn launch(&self, options: LaunchOptions) -> Result<Arc<dyn RootDriver>>;
}

/// Install the shutdown hook on `root` and, when `bounds` is constrained,
/// the creation-time viewport reconciliation.
///
/// `sync` serializes reconciliations per root: bounds commands are keyed to
/// an OS window id, and concurrent commands against the same window produce
/// undefined final bounds. The instrumented root is returned for chaining.
pub async fn configure<F>(
    cleanup: F,
    root: Arc<dyn RootDriver>,
    bounds: ViewportSize,
    sync: Arc<Mutex<()>>,
) -> Result<Arc<dyn RootDriver>>
where
    F: FnOnce() + Send + 'static,
{
    on_close(root.as_ref(), cleanup);

    if bounds.is_unset() {
        return Ok(root);
    }

    let resize = resize_hook(bounds, sync);
    let root = bind_hooks(
        root,
        Hooks {
            on_page_created: Some(Arc::clone(&resize)),
        },
    );

    // A page open at configuration time never goes through a creation hook;
    // reconcile it eagerly.
    if let Some(page) = root.pages().await?.into_iter().next() {
        resize(page).await?;
    }

    Ok(root)
}

fn resize_hook(bounds: ViewportSize, sync: Arc<Mutex<()>>) -> PageCreatedHook {
    Arc::new(move |page| {
        let sync = Arc::clone(&sync);
        Box::pin(async move {
            let current = get_viewport(page.as_ref()).await?;
            if current != bounds {
                let _guard = sync.lock().await;
                set_viewport(page.as_ref(), bounds).await?;
            }
            Ok(())
        })
    })
}

/// Front object tying provisioning, launching and viewport enforcement
/// together.
pub struct FingerprintPlugin {
    launcher: Arc<dyn Launcher>,
    provider: Arc<dyn FingerprintProvider>,
    active_sessions: Arc<AtomicUsize>,
}

impl FingerprintPlugin {
    pub fn new(launcher: Arc<dyn Launcher>, provider: Arc<dyn FingerprintProvider>) -> Self {
        Self {
            launcher,
            provider,
            active_sessions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Roots launched through this plugin that have not shut down yet.
    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::SeqCst)
    }

    /// Validate `options`, fetch the fingerprint, launch the browser and
    /// hand back the instrumented root.
    pub async fn launch(&self, options: LaunchOptions) -> Result<Arc<dyn RootDriver>> {
        options.validate()?;
        let options = options.merge_ignored_arguments();

        let fingerprint = self.provider.fetch(&options.key).await?;
        let root = self.launcher.launch(options).await?;

        self.active_sessions.fetch_add(1, Ordering::SeqCst);
        let active = Arc::clone(&self.active_sessions);
        let cleanup = move || {
            active.fetch_sub(1, Ordering::SeqCst);
            debug!("browser shut down, fingerprint session released");
        };

        let sync = Arc::new(Mutex::new(()));
        configure(cleanup, root, fingerprint.viewport, sync).await
    }
}
