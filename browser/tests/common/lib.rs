//! Scripted in-memory drivers for the integration suites.
//!
//! The fakes model an OS window per page: the measured content viewport is
//! the outer bounds minus a per-window chrome overhead. The default overhead
//! deliberately differs from the reconciler's seeded estimate so convergence
//! takes a correction step; a configurable drift makes the overhead shift on
//! every bounds command, which no finite retry budget can chase. Every
//! remote interaction is appended to a shared event log so tests can assert
//! on ordering and interleaving.

use async_trait::async_trait;
use imprint_browser::BoundsSession;
use imprint_browser::BrowserError;
use imprint_browser::ContextDriver;
use imprint_browser::CreationOptions;
use imprint_browser::OuterBounds;
use imprint_browser::PageDriver;
use imprint_browser::Result;
use imprint_browser::RootDriver;
use imprint_browser::ViewportSize;
use imprint_browser::lifecycle::ClosedSignal;
use serde_json::Value;
use serde_json::json;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

/// Everything the fakes observed, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    ContextCreated { viewport: Option<ViewportSize> },
    PageCreated { page: usize, viewport: Option<ViewportSize> },
    SessionAcquired { page: usize },
    QueryBounds { page: usize },
    SetBounds { page: usize, bounds: OuterBounds },
    SessionReleased { page: usize },
    ViewportOverride { page: usize, size: ViewportSize },
}

#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<Event>>,
}

impl EventLog {
    pub fn record(&self, event: Event) {
        self.events.lock().expect("event log lock").push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().expect("event log lock").clone()
    }

    pub fn set_bounds_count(&self, page: usize) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, Event::SetBounds { page: p, .. } if *p == page))
            .count()
    }

    /// Panics if bounds commands for two different pages interleave without
    /// a completed session release in between.
    pub fn assert_serialized_bounds(&self) {
        let mut open: Option<usize> = None;
        for event in self.events() {
            match event {
                Event::SessionAcquired { page } => {
                    assert!(
                        open.is_none(),
                        "session for page {page} acquired while page {open:?} still holds one"
                    );
                    open = Some(page);
                }
                Event::QueryBounds { page } | Event::SetBounds { page, .. } => {
                    assert_eq!(
                        open,
                        Some(page),
                        "bounds command for page {page} outside its session"
                    );
                }
                Event::SessionReleased { page } => {
                    assert_eq!(open, Some(page), "release for page {page} without session");
                    open = None;
                }
                _ => {}
            }
        }
        assert!(open.is_none(), "session for page {open:?} never released");
    }
}

struct FakeState {
    next_page: AtomicUsize,
    log: Arc<EventLog>,
    overhead: Mutex<OuterBounds>,
    drift: Mutex<OuterBounds>,
}

impl FakeState {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            next_page: AtomicUsize::new(0),
            log: Arc::new(EventLog::default()),
            // Differs from the reconciler's estimate on purpose.
            overhead: Mutex::new(OuterBounds {
                width: 12,
                height: 80,
            }),
            drift: Mutex::new(OuterBounds::default()),
        })
    }

    fn overhead(&self) -> OuterBounds {
        *self.overhead.lock().expect("overhead lock")
    }

    fn drift(&self) -> OuterBounds {
        *self.drift.lock().expect("drift lock")
    }
}

#[derive(Debug)]
struct WindowState {
    outer: OuterBounds,
    overhead: OuterBounds,
    drift: OuterBounds,
}

impl WindowState {
    fn content(&self) -> ViewportSize {
        ViewportSize {
            width: (self.outer.width - self.overhead.width).max(0) as u32,
            height: (self.outer.height - self.overhead.height).max(0) as u32,
        }
    }
}

#[derive(Debug)]
pub struct FakePage {
    id: usize,
    window: Arc<Mutex<WindowState>>,
    log: Arc<EventLog>,
    fail_evaluations: AtomicBool,
}

impl FakePage {
    fn new(state: &FakeState) -> Arc<Self> {
        let id = state.next_page.fetch_add(1, Ordering::SeqCst);
        let overhead = state.overhead();
        Arc::new(Self {
            id,
            window: Arc::new(Mutex::new(WindowState {
                // 800x600 content under the default overhead.
                outer: OuterBounds {
                    width: 800 + overhead.width,
                    height: 600 + overhead.height,
                },
                overhead,
                drift: state.drift(),
            })),
            log: Arc::clone(&state.log),
            fail_evaluations: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// The content viewport as the window model currently renders it.
    pub fn content_viewport(&self) -> ViewportSize {
        self.window.lock().expect("window lock").content()
    }

    /// Resize the modeled window so the content viewport equals `size`.
    pub fn set_content_viewport(&self, size: ViewportSize) {
        let mut window = self.window.lock().expect("window lock");
        window.outer = OuterBounds {
            width: i64::from(size.width) + window.overhead.width,
            height: i64::from(size.height) + window.overhead.height,
        };
    }

    /// Make every subsequent evaluation fail, as on a closed page.
    pub fn fail_evaluations(&self) {
        self.fail_evaluations.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn evaluate(&self, expression: &str) -> Result<Value> {
        if self.fail_evaluations.load(Ordering::SeqCst) {
            return Err(BrowserError::Evaluation(
                "execution context destroyed".to_string(),
            ));
        }

        if expression.contains("clientWidth") {
            let content = self.content_viewport();
            return Ok(json!({ "width": content.width, "height": content.height }));
        }

        if expression.contains("addEventListener('resize'") {
            return Ok(json!(true));
        }

        Err(BrowserError::Evaluation(format!(
            "unrecognized expression: {expression}"
        )))
    }

    async fn bounds_session(&self) -> Result<Box<dyn BoundsSession>> {
        self.log.record(Event::SessionAcquired { page: self.id });
        Ok(Box::new(FakeBoundsSession {
            page: self.id,
            window: Arc::clone(&self.window),
            log: Arc::clone(&self.log),
        }))
    }

    async fn override_viewport(&self, size: ViewportSize) -> Result<()> {
        self.log.record(Event::ViewportOverride {
            page: self.id,
            size,
        });
        self.set_content_viewport(size);
        Ok(())
    }
}

struct FakeBoundsSession {
    page: usize,
    window: Arc<Mutex<WindowState>>,
    log: Arc<EventLog>,
}

#[async_trait]
impl BoundsSession for FakeBoundsSession {
    async fn bounds(&mut self) -> Result<OuterBounds> {
        self.log.record(Event::QueryBounds { page: self.page });
        Ok(self.window.lock().expect("window lock").outer)
    }

    async fn set_bounds(&mut self, bounds: OuterBounds) -> Result<()> {
        self.log.record(Event::SetBounds {
            page: self.page,
            bounds,
        });
        let mut window = self.window.lock().expect("window lock");
        window.outer = bounds;
        // A drifting window manager re-decorates on every command.
        window.overhead.width += window.drift.width;
        window.overhead.height += window.drift.height;
        Ok(())
    }

    async fn release(self: Box<Self>) -> Result<()> {
        self.log.record(Event::SessionReleased { page: self.page });
        Ok(())
    }
}

pub struct FakeContext {
    state: Arc<FakeState>,
    received: Mutex<Vec<CreationOptions>>,
    fail_next_page: AtomicBool,
}

impl FakeContext {
    fn new(state: Arc<FakeState>) -> Arc<Self> {
        Arc::new(Self {
            state,
            received: Mutex::new(Vec::new()),
            fail_next_page: AtomicBool::new(false),
        })
    }

    /// Options as they arrived at the driver, per `new_page` call.
    pub fn received_options(&self) -> Vec<CreationOptions> {
        self.received.lock().expect("options lock").clone()
    }

    pub fn fail_next_page(&self) {
        self.fail_next_page.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ContextDriver for FakeContext {
    async fn new_page(&self, options: CreationOptions) -> Result<Arc<dyn PageDriver>> {
        self.received
            .lock()
            .expect("options lock")
            .push(options.clone());

        if self.fail_next_page.swap(false, Ordering::SeqCst) {
            return Err(BrowserError::Protocol("target crashed".to_string()));
        }

        let page = FakePage::new(&self.state);
        self.state.log.record(Event::PageCreated {
            page: page.id(),
            viewport: options.viewport,
        });
        if let Some(viewport) = options.viewport {
            page.override_viewport(viewport).await?;
        }
        Ok(page)
    }
}

pub struct FakeRoot {
    version: Option<String>,
    state: Arc<FakeState>,
    default_ctx: Option<Arc<FakeContext>>,
    contexts: Mutex<Vec<Arc<FakeContext>>>,
    preopened: Mutex<Vec<Arc<FakePage>>>,
    closed: Arc<ClosedSignal>,
}

impl FakeRoot {
    /// A root with the classic object model: version accessor present, the
    /// root itself acting as the default context.
    pub fn classic() -> Arc<Self> {
        let state = FakeState::new();
        Arc::new(Self {
            version: Some("HeadlessChrome/124.0.6367.60".to_string()),
            default_ctx: Some(FakeContext::new(Arc::clone(&state))),
            state,
            contexts: Mutex::new(Vec::new()),
            preopened: Mutex::new(Vec::new()),
            closed: Arc::new(ClosedSignal::new()),
        })
    }

    /// A root with first-class browsing contexts and no version accessor.
    pub fn context_native() -> Arc<Self> {
        let state = FakeState::new();
        Arc::new(Self {
            version: None,
            default_ctx: None,
            state,
            contexts: Mutex::new(Vec::new()),
            preopened: Mutex::new(Vec::new()),
            closed: Arc::new(ClosedSignal::new()),
        })
    }

    pub fn log(&self) -> Arc<EventLog> {
        Arc::clone(&self.state.log)
    }

    /// Chrome overhead applied to windows created after this call.
    pub fn set_overhead(&self, width: i64, height: i64) {
        *self.state.overhead.lock().expect("overhead lock") = OuterBounds { width, height };
    }

    /// Overhead drift applied by the window manager on every bounds command.
    pub fn set_drift(&self, width: i64, height: i64) {
        *self.state.drift.lock().expect("drift lock") = OuterBounds { width, height };
    }

    /// Open a page outside any creation hook, as if it existed at launch.
    pub fn open_page(&self) -> Arc<FakePage> {
        let page = FakePage::new(&self.state);
        self.preopened
            .lock()
            .expect("pages lock")
            .push(Arc::clone(&page));
        page
    }

    /// The driver behind the root's own context view (classic only).
    pub fn default_fake_context(&self) -> Arc<FakeContext> {
        Arc::clone(self.default_ctx.as_ref().expect("classic root"))
    }

    pub fn created_contexts(&self) -> Vec<Arc<FakeContext>> {
        self.contexts.lock().expect("contexts lock").clone()
    }

    /// Raise the shutdown signal; safe to call more than once.
    pub fn fire_close(&self) {
        self.closed.fire();
    }
}

#[async_trait]
impl RootDriver for FakeRoot {
    fn version(&self) -> Option<String> {
        self.version.clone()
    }

    async fn new_context(&self, options: CreationOptions) -> Result<Arc<dyn ContextDriver>> {
        self.state.log.record(Event::ContextCreated {
            viewport: options.viewport,
        });
        let context = FakeContext::new(Arc::clone(&self.state));
        self.contexts
            .lock()
            .expect("contexts lock")
            .push(Arc::clone(&context));
        Ok(context)
    }

    fn default_context(&self) -> Option<Arc<dyn ContextDriver>> {
        self.default_ctx
            .as_ref()
            .map(|context| Arc::clone(context) as Arc<dyn ContextDriver>)
    }

    async fn pages(&self) -> Result<Vec<Arc<dyn PageDriver>>> {
        Ok(self
            .preopened
            .lock()
            .expect("pages lock")
            .iter()
            .map(|page| Arc::clone(page) as Arc<dyn PageDriver>)
            .collect())
    }

    fn on_disconnect(&self, listener: Box<dyn FnOnce() + Send>) {
        self.closed.subscribe(listener);
    }
}
