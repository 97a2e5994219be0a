//! Viewport probe and closed-loop reconciler.
//!
//! Window chrome (title bar, tab strip, scrollbars) is not knowable
//! analytically and varies by platform, window manager and DPI scaling, so a
//! requested content viewport cannot be translated into an outer-bounds
//! command in one shot. The reconciler seeds a correction term with a
//! platform estimate and refines it with the signed measurement error until
//! the probe reports an exact match or the retry budget runs out.

use crate::BrowserError;
use crate::Result;
use crate::config::OuterBounds;
use crate::config::ViewportSize;
use crate::driver::BoundsSession;
use crate::driver::PageDriver;
use serde_json::Value;
use tracing::debug;
use tracing::warn;

/// Reads the rendered content viewport, scrollbars excluded.
const VIEWPORT_PROBE: &str = "(() => ({ width: (document.documentElement.clientWidth|0), height: (document.documentElement.clientHeight|0) }))()";

/// Resolves once a resize event fires, or with `false` after a grace period
/// when the window manager applies bounds without an observable resize.
const RESIZE_WAIT: &str = r#"new Promise((resolve) => {
  window.addEventListener('resize', () => resolve(true), { once: true });
  setTimeout(() => resolve(false), 1000);
})"#;

const MAX_RESIZE_RETRIES: u32 = 3;

/// Chrome overhead estimate seeding the correction term: scrollbar width
/// plus title/tab bar height.
const INITIAL_DELTA: OuterBounds = OuterBounds {
    width: 16,
    height: 88,
};

/// Read the current content viewport of `page`.
pub async fn get_viewport(page: &dyn PageDriver) -> Result<ViewportSize> {
    parse_viewport(&page.evaluate(VIEWPORT_PROBE).await?)
}

/// Drive the content viewport of `page` to `size` by adjusting the outer
/// window bounds until the measured viewport matches.
///
/// A request with either dimension zero is a no-op. Non-convergence within
/// the retry budget is reported as a warning and leaves the page at the last
/// achieved size; transport, protocol and evaluation failures propagate.
pub async fn set_viewport(page: &dyn PageDriver, size: ViewportSize) -> Result<()> {
    if size.is_unset() {
        return Ok(());
    }

    let mut session = page.bounds_session().await?;
    let outcome = reconcile(session.as_mut(), page, size).await;

    // Released on every path, including failed attempts.
    if let Err(err) = session.release().await {
        warn!("failed to release window bounds session: {err}");
    }

    outcome
}

async fn reconcile(
    session: &mut dyn BoundsSession,
    page: &dyn PageDriver,
    size: ViewportSize,
) -> Result<()> {
    let mut delta = INITIAL_DELTA;

    for attempt in 0..MAX_RESIZE_RETRIES {
        let bounds = OuterBounds {
            width: i64::from(size.width) + delta.width,
            height: i64::from(size.height) + delta.height,
        };

        // Arm the in-page resize listener together with the bounds command so
        // the probe below never measures a stale layout.
        tokio::try_join!(session.set_bounds(bounds), wait_for_resize(page))?;

        let measured = get_viewport(page).await?;
        if measured == size {
            debug!(
                attempt,
                width = size.width,
                height = size.height,
                "viewport converged"
            );
            return Ok(());
        }

        if attempt == MAX_RESIZE_RETRIES - 1 {
            warn!(
                requested_width = size.width,
                requested_height = size.height,
                measured_width = measured.width,
                measured_height = measured.height,
                "unable to set the requested viewport size"
            );
        }

        // Correct by the error since the previous attempt, not the
        // cumulative error since the first.
        delta.width += i64::from(size.width) - i64::from(measured.width);
        delta.height += i64::from(size.height) - i64::from(measured.height);
    }

    Ok(())
}

async fn wait_for_resize(page: &dyn PageDriver) -> Result<()> {
    page.evaluate(RESIZE_WAIT).await.map(|_| ())
}

fn parse_viewport(value: &Value) -> Result<ViewportSize> {
    let read = |key: &str| value.get(key).and_then(Value::as_u64);
    match (read("width"), read("height")) {
        (Some(width), Some(height)) => Ok(ViewportSize {
            width: width as u32,
            height: height as u32,
        }),
        _ => Err(BrowserError::Evaluation(format!(
            "viewport probe returned {value}"
        ))),
    }
}
