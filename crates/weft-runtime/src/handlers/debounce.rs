#![forbid(unsafe_code)]

//! Trailing-edge debounce for high-frequency event classes.
//!
//! [`wrap`] either returns the listener untouched or interposes a wrapper
//! that coalesces a burst of events into one call, made `delay` after the
//! last event of the burst, with that last event.
//!
//! # State
//!
//! Each wrapper owns a private `{pending, last}` pair. `pending` is a
//! [`PendingTimer`] guard: replacing it cancels the old host timer and
//! firing disarms it. The scheduled timer callback keeps the pair alive, so
//! a window open when the subscription is removed still delivers its
//! trailing call. With [`DebounceConfig::cancel_on_unsubscribe`] the
//! callback holds the pair weakly instead, and dropping the wrapper cancels
//! the window.
//!
//! # Invariants
//!
//! 1. At most one host timer is pending per wrapper.
//! 2. A window fires at most once, with the most recent event.
//! 3. Two wrappers around the same listener never share a timer.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use tracing::trace;
use weft_core::{Event, Listener, TimerHost, TimerId};

use super::DebounceMode;
use crate::config::DebounceConfig;

/// Window to apply for `class` under `mode`, or `None` for no debounce.
#[must_use]
pub fn debounce_delay(class: &str, mode: DebounceMode, config: &DebounceConfig) -> Option<Duration> {
    if !config.is_high_frequency(class) {
        return None;
    }
    match mode {
        DebounceMode::Disabled => None,
        DebounceMode::Delay(delay) => Some(delay),
        DebounceMode::Auto => Some(config.default_delay),
    }
}

/// A scheduled host timer, cancelled on drop unless disarmed.
struct PendingTimer {
    id: TimerId,
    timers: Weak<dyn TimerHost>,
    armed: bool,
}

impl PendingTimer {
    /// The timer fired; nothing to cancel.
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingTimer {
    fn drop(&mut self) {
        if self.armed {
            if let Some(timers) = self.timers.upgrade() {
                timers.clear_timeout(self.id);
            }
        }
    }
}

#[derive(Default)]
struct DebounceState {
    pending: Option<PendingTimer>,
    last: Option<Event>,
}

/// Wrap `listener` for `class` if the debounce policy calls for it.
pub fn wrap(
    listener: Listener,
    class: &str,
    mode: DebounceMode,
    config: &DebounceConfig,
    timers: &Rc<dyn TimerHost>,
) -> Listener {
    let Some(delay) = debounce_delay(class, mode, config) else {
        return listener;
    };
    let state = Rc::new(RefCell::new(DebounceState::default()));
    let timers = Rc::downgrade(timers);
    let class = class.to_owned();
    let outlive_wrapper = !config.cancel_on_unsubscribe;

    Rc::new(move |ev: &Event| {
        let Some(host) = timers.upgrade() else {
            return;
        };
        // Release the previous window outside the state borrow.
        let previous = {
            let mut s = state.borrow_mut();
            s.last = Some(ev.clone());
            s.pending.take()
        };
        drop(previous);

        let weak_state = Rc::downgrade(&state);
        let held = outlive_wrapper.then(|| Rc::clone(&state));
        let target = Rc::clone(&listener);
        let fired_class = class.clone();
        let id = host.set_timeout(
            delay,
            Box::new(move || {
                let _held = held;
                let Some(state) = weak_state.upgrade() else {
                    return;
                };
                let last = {
                    let mut s = state.borrow_mut();
                    if let Some(pending) = s.pending.take() {
                        pending.disarm();
                    }
                    s.last.take()
                };
                if let Some(ev) = last {
                    trace!(class = %fired_class, "debounce window elapsed");
                    target(&ev);
                }
            }),
        );
        state.borrow_mut().pending = Some(PendingTimer {
            id,
            timers: timers.clone(),
            armed: true,
        });
    })
}
