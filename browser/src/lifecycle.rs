//! One-shot shutdown notification for root handles.

use crate::driver::CloseListener;
use crate::driver::RootDriver;
use std::sync::Mutex;
use std::sync::PoisonError;

/// Attach `callback` to the root's shutdown/disconnect signal.
///
/// The callback fires at most once and exactly once under normal shutdown,
/// regardless of which close signal the underlying shape emits.
pub fn on_close<F>(root: &dyn RootDriver, callback: F)
where
    F: FnOnce() + Send + 'static,
{
    root.on_disconnect(Box::new(callback));
}

/// One-shot close signal shared by drivers.
///
/// Listeners registered after the signal fired run immediately; firing more
/// than once never re-notifies a listener.
#[derive(Default)]
pub struct ClosedSignal {
    state: Mutex<SignalState>,
}

#[derive(Default)]
struct SignalState {
    fired: bool,
    listeners: Vec<CloseListener>,
}

impl ClosedSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: CloseListener) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.fired {
            drop(state);
            listener();
        } else {
            state.listeners.push(listener);
        }
    }

    pub fn fire(&self) {
        let listeners = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.fired = true;
            std::mem::take(&mut state.listeners)
        };
        for listener in listeners {
            listener();
        }
    }
}
