//! One-shot load gate for scene assets.
//!
//! Each asset gets an [`AssetSignal`] that resolves exactly once (it is
//! consumed by `resolve`). The gate flips `Loading -> Loaded` after it has been
//! sealed and every signal has settled, failures included. Failed assets are
//! logged and recorded; they never keep the gate closed.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
    Fetch(String),
    Decode(String),
    /// The signal was dropped without being resolved.
    Dropped,
    /// Registration attempted after `seal`.
    GateSealed,
}

impl fmt::Display for AssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetError::Fetch(msg) => write!(f, "fetch failed: {msg}"),
            AssetError::Decode(msg) => write!(f, "decode failed: {msg}"),
            AssetError::Dropped => write!(f, "asset signal dropped before completion"),
            AssetError::GateSealed => write!(f, "load gate already sealed"),
        }
    }
}

impl std::error::Error for AssetError {}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Loaded,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LoadProgress {
    pub settled: usize,
    pub total: usize,
}

type Listener = Box<dyn FnOnce()>;

#[derive(Default)]
struct GateInner {
    total: usize,
    settled: usize,
    sealed: bool,
    loaded: bool,
    failures: Vec<(String, AssetError)>,
    listeners: Vec<Listener>,
}

impl GateInner {
    /// Flip to `Loaded` if possible; returns listeners to fire once borrow is released.
    fn try_complete(&mut self) -> Vec<Listener> {
        if self.loaded || !self.sealed || self.settled < self.total {
            return Vec::new();
        }
        self.loaded = true;
        info!(
            total = self.total,
            failed = self.failures.len(),
            "loading finished"
        );
        std::mem::take(&mut self.listeners)
    }
}

/// Tracks asset completion and exposes the `loaded` signal to the host.
#[derive(Clone, Default)]
pub struct LoadProgressGate {
    inner: Rc<RefCell<GateInner>>,
}

impl fmt::Debug for LoadProgressGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("LoadProgressGate")
            .field("total", &inner.total)
            .field("settled", &inner.settled)
            .field("sealed", &inner.sealed)
            .field("loaded", &inner.loaded)
            .finish()
    }
}

impl LoadProgressGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>) -> Result<AssetSignal, AssetError> {
        let name = name.into();
        let mut inner = self.inner.borrow_mut();
        if inner.sealed {
            return Err(AssetError::GateSealed);
        }
        if inner.total == 0 {
            info!("loading started");
        }
        inner.total += 1;
        Ok(AssetSignal {
            name,
            gate: Rc::downgrade(&self.inner),
            resolved: false,
        })
    }

    /// No further assets will be registered.
    pub fn seal(&self) {
        let listeners = {
            let mut inner = self.inner.borrow_mut();
            inner.sealed = true;
            inner.try_complete()
        };
        fire(listeners);
    }

    pub fn state(&self) -> LoadState {
        if self.inner.borrow().loaded {
            LoadState::Loaded
        } else {
            LoadState::Loading
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.state() == LoadState::Loaded
    }

    pub fn progress(&self) -> LoadProgress {
        let inner = self.inner.borrow();
        LoadProgress {
            settled: inner.settled,
            total: inner.total,
        }
    }

    pub fn failures(&self) -> Vec<(String, AssetError)> {
        self.inner.borrow().failures.clone()
    }

    /// Run `f` once when the gate opens; immediately if it already has.
    pub fn on_loaded(&self, f: impl FnOnce() + 'static) {
        let already = {
            let mut inner = self.inner.borrow_mut();
            if !inner.loaded {
                inner.listeners.push(Box::new(f));
                return;
            }
            f
        };
        already();
    }
}

fn fire(listeners: Vec<Listener>) {
    for listener in listeners {
        listener();
    }
}

/// Completion handle for a single asset.
///
/// Holds only a weak reference: resolving after the gate is gone is a no-op.
#[derive(Debug)]
pub struct AssetSignal {
    name: String,
    gate: Weak<RefCell<GateInner>>,
    resolved: bool,
}

impl AssetSignal {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resolve(mut self, outcome: Result<(), AssetError>) {
        self.settle(outcome);
    }

    fn settle(&mut self, outcome: Result<(), AssetError>) {
        if self.resolved {
            return;
        }
        self.resolved = true;
        let Some(gate) = self.gate.upgrade() else {
            return;
        };

        let listeners = {
            let mut inner = gate.borrow_mut();
            inner.settled += 1;
            match outcome {
                Ok(()) => info!(
                    asset = %self.name,
                    loaded = inner.settled,
                    total = inner.total,
                    "loading progressing"
                ),
                Err(err) => {
                    warn!(asset = %self.name, error = %err, "loading error");
                    inner.failures.push((self.name.clone(), err));
                }
            }
            inner.try_complete()
        };
        fire(listeners);
    }
}

impl Drop for AssetSignal {
    fn drop(&mut self) {
        self.settle(Err(AssetError::Dropped));
    }
}

#[cfg(test)]
mod tests {
    use super::{AssetError, LoadProgress, LoadProgressGate, LoadState};
    use pretty_assertions::assert_eq;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn opens_after_all_signals_settle() {
        let gate = LoadProgressGate::new();
        let globe = gate.register("globe").expect("register");
        let stars = gate.register("stars").expect("register");
        gate.seal();
        assert_eq!(gate.state(), LoadState::Loading);

        globe.resolve(Ok(()));
        assert_eq!(gate.progress(), LoadProgress { settled: 1, total: 2 });
        assert!(!gate.is_loaded());

        stars.resolve(Ok(()));
        assert!(gate.is_loaded());
    }

    #[test]
    fn failures_still_open_the_gate() {
        let gate = LoadProgressGate::new();
        let globe = gate.register("globe").expect("register");
        gate.seal();
        globe.resolve(Err(AssetError::Fetch("404".into())));

        assert!(gate.is_loaded());
        assert_eq!(
            gate.failures(),
            vec![("globe".to_string(), AssetError::Fetch("404".into()))]
        );
    }

    #[test]
    fn unsealed_gate_stays_loading() {
        let gate = LoadProgressGate::new();
        gate.register("globe").expect("register").resolve(Ok(()));
        assert_eq!(gate.state(), LoadState::Loading);
        gate.seal();
        assert_eq!(gate.state(), LoadState::Loaded);
    }

    #[test]
    fn empty_gate_opens_on_seal() {
        let gate = LoadProgressGate::new();
        gate.seal();
        assert!(gate.is_loaded());
        assert_eq!(gate.register("late").unwrap_err(), AssetError::GateSealed);
    }

    #[test]
    fn listeners_fire_exactly_once() {
        let gate = LoadProgressGate::new();
        let fired = Rc::new(Cell::new(0));
        let counter = fired.clone();
        gate.on_loaded(move || counter.set(counter.get() + 1));

        let a = gate.register("a").expect("register");
        gate.seal();
        a.resolve(Ok(()));
        gate.seal();
        assert_eq!(fired.get(), 1);

        let late = fired.clone();
        gate.on_loaded(move || late.set(late.get() + 10));
        assert_eq!(fired.get(), 11);
    }

    #[test]
    fn dropped_signal_counts_as_failure() {
        let gate = LoadProgressGate::new();
        let signal = gate.register("font").expect("register");
        gate.seal();
        drop(signal);
        assert!(gate.is_loaded());
        assert_eq!(gate.failures()[0].1, AssetError::Dropped);
    }

    #[test]
    fn resolving_after_gate_dropped_is_inert() {
        let gate = LoadProgressGate::new();
        let signal = gate.register("globe").expect("register");
        drop(gate);
        signal.resolve(Ok(()));
    }
}
