//! Start/stop lifecycle and per-iteration ordering of the frame driver.
//!
//! Ordering contract for one iteration:
//! 1. `update_controls` (orbit damping)
//! 2. `advance_scene` (auto-rotation, scene mutation)
//! 3. `render_scene`
//! 4. `render_overlay`
//!
//! `start` hands out a [`LoopToken`] that `stop` consumes. Scheduled callbacks
//! capture a [`FrameTicket`] instead; a ticket from a stopped or replaced run
//! makes `run_frame` return `None`, so a late callback can never touch a
//! torn-down scene.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use foundation::time::Time;
use tracing::debug;

use crate::clock::Clock;
use crate::frame::Frame;

static NEXT_LOOP_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LoopState {
    Stopped,
    Running,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LoopError {
    AlreadyRunning,
    NotRunning,
    StaleToken,
}

impl fmt::Display for LoopError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopError::AlreadyRunning => write!(f, "render loop is already running"),
            LoopError::NotRunning => write!(f, "render loop is not running"),
            LoopError::StaleToken => write!(f, "token does not belong to the current run"),
        }
    }
}

impl std::error::Error for LoopError {}

/// Proof of a running loop. Required by [`RenderLoop::stop`]; not cloneable.
#[derive(Debug, PartialEq, Eq)]
pub struct LoopToken {
    loop_id: u64,
    generation: u64,
}

impl LoopToken {
    /// Copyable capability for scheduled frame callbacks.
    pub fn ticket(&self) -> FrameTicket {
        FrameTicket {
            loop_id: self.loop_id,
            generation: self.generation,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FrameTicket {
    loop_id: u64,
    generation: u64,
}

/// The four ordered stages of one loop iteration.
pub trait FrameStages {
    fn update_controls(&mut self, frame: &Frame);
    fn advance_scene(&mut self, frame: &Frame);
    fn render_scene(&mut self, frame: &Frame);
    fn render_overlay(&mut self, frame: &Frame);
}

#[derive(Debug)]
pub struct RenderLoop {
    id: u64,
    state: LoopState,
    generation: u64,
    started_at: Time,
    last_frame: Option<Frame>,
}

impl Default for RenderLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderLoop {
    pub fn new() -> Self {
        Self {
            id: NEXT_LOOP_ID.fetch_add(1, Ordering::Relaxed),
            state: LoopState::Stopped,
            generation: 0,
            started_at: Time::ZERO,
            last_frame: None,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == LoopState::Running
    }

    pub fn frames_run(&self) -> u64 {
        self.last_frame.map(|f| f.index + 1).unwrap_or(0)
    }

    /// `Stopped -> Running`. The clock origin for `Frame::elapsed` is sampled here.
    pub fn start(&mut self, clock: &dyn Clock) -> Result<LoopToken, LoopError> {
        if self.is_running() {
            return Err(LoopError::AlreadyRunning);
        }
        self.generation += 1;
        self.state = LoopState::Running;
        self.started_at = clock.now();
        self.last_frame = None;
        debug!(loop_id = self.id, generation = self.generation, "render loop started");
        Ok(LoopToken {
            loop_id: self.id,
            generation: self.generation,
        })
    }

    /// `Running -> Stopped`. Consumes the token handed out by `start`.
    pub fn stop(&mut self, token: LoopToken) -> Result<(), LoopError> {
        if !self.is_running() {
            return Err(LoopError::NotRunning);
        }
        if !self.owns(token.ticket()) {
            return Err(LoopError::StaleToken);
        }
        self.state = LoopState::Stopped;
        debug!(
            loop_id = self.id,
            generation = self.generation,
            frames = self.frames_run(),
            "render loop stopped"
        );
        Ok(())
    }

    /// Whether a callback holding `ticket` may still run a frame.
    pub fn is_live(&self, ticket: FrameTicket) -> bool {
        self.is_running() && self.owns(ticket)
    }

    fn owns(&self, ticket: FrameTicket) -> bool {
        ticket.loop_id == self.id && ticket.generation == self.generation
    }

    /// Run one iteration if `ticket` is live. Returns the frame that ran.
    pub fn run_frame<S: FrameStages + ?Sized>(
        &mut self,
        ticket: FrameTicket,
        clock: &dyn Clock,
        stages: &mut S,
    ) -> Option<Frame> {
        if !self.is_live(ticket) {
            return None;
        }

        let elapsed = Time(clock.now().since(self.started_at));
        let frame = match self.last_frame {
            Some(prev) => prev.next(elapsed),
            None => Frame::first(elapsed),
        };

        stages.update_controls(&frame);
        stages.advance_scene(&frame);
        stages.render_scene(&frame);
        stages.render_overlay(&frame);

        self.last_frame = Some(frame);
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::{FrameStages, LoopError, LoopState, RenderLoop};
    use crate::clock::ManualClock;
    use crate::frame::Frame;
    use foundation::time::Time;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<(&'static str, u64)>,
    }

    impl FrameStages for Recorder {
        fn update_controls(&mut self, frame: &Frame) {
            self.calls.push(("controls", frame.index));
        }
        fn advance_scene(&mut self, frame: &Frame) {
            self.calls.push(("scene", frame.index));
        }
        fn render_scene(&mut self, frame: &Frame) {
            self.calls.push(("render", frame.index));
        }
        fn render_overlay(&mut self, frame: &Frame) {
            self.calls.push(("overlay", frame.index));
        }
    }

    #[test]
    fn stages_run_in_contract_order() {
        let clock = ManualClock::new(0.0);
        let mut lp = RenderLoop::new();
        let token = lp.start(&clock).expect("start");
        let mut rec = Recorder::default();

        lp.run_frame(token.ticket(), &clock, &mut rec).expect("frame");
        assert_eq!(
            rec.calls,
            vec![("controls", 0), ("scene", 0), ("render", 0), ("overlay", 0)]
        );
    }

    #[test]
    fn elapsed_is_measured_from_start() {
        let clock = ManualClock::new(100.0);
        let mut lp = RenderLoop::new();
        let token = lp.start(&clock).expect("start");
        let mut rec = Recorder::default();

        clock.advance(0.25);
        let f0 = lp.run_frame(token.ticket(), &clock, &mut rec).expect("frame");
        clock.advance(0.5);
        let f1 = lp.run_frame(token.ticket(), &clock, &mut rec).expect("frame");
        assert_eq!(f0.elapsed, Time(0.25));
        assert_eq!(f1.index, 1);
        assert_eq!(f1.dt_s, 0.5);
    }

    #[test]
    fn stopped_loop_ignores_old_tickets() {
        let clock = ManualClock::new(0.0);
        let mut lp = RenderLoop::new();
        let token = lp.start(&clock).expect("start");
        let ticket = token.ticket();
        lp.stop(token).expect("stop");

        let mut rec = Recorder::default();
        assert!(lp.run_frame(ticket, &clock, &mut rec).is_none());
        assert!(rec.calls.is_empty());
        assert_eq!(lp.state(), LoopState::Stopped);
    }

    #[test]
    fn restart_invalidates_previous_generation() {
        let clock = ManualClock::new(0.0);
        let mut lp = RenderLoop::new();
        let first = lp.start(&clock).expect("start");
        let stale = first.ticket();
        lp.stop(first).expect("stop");

        let second = lp.start(&clock).expect("restart");
        let mut rec = Recorder::default();
        assert!(lp.run_frame(stale, &clock, &mut rec).is_none());
        assert!(lp.run_frame(second.ticket(), &clock, &mut rec).is_some());
    }

    #[test]
    fn lifecycle_misuse_is_reported() {
        let clock = ManualClock::new(0.0);
        let mut a = RenderLoop::new();
        let mut b = RenderLoop::new();

        let token_a = a.start(&clock).expect("start a");
        assert_eq!(a.start(&clock), Err(LoopError::AlreadyRunning));

        let token_b = b.start(&clock).expect("start b");
        assert_eq!(a.stop(token_b), Err(LoopError::StaleToken));
        assert!(a.is_running());

        a.stop(token_a).expect("stop a");
        let token_a2 = a.start(&clock).expect("restart a");
        a.stop(token_a2).expect("stop a again");
        let token_b2 = b.start(&clock);
        assert_eq!(token_b2, Err(LoopError::AlreadyRunning));
    }
}
