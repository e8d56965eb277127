use foundation::time::Time;

/// Per-frame metadata handed to every stage of one loop iteration.
///
/// `elapsed` is measured from the moment the loop started, so it restarts at
/// zero on every mount.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Frame {
    /// 0-based frame index within the current run.
    pub index: u64,
    /// Seconds since the previous frame (0 for the first frame).
    pub dt_s: f64,
    /// Time since the loop started.
    pub elapsed: Time,
}

impl Frame {
    pub fn first(elapsed: Time) -> Self {
        Self {
            index: 0,
            dt_s: 0.0,
            elapsed,
        }
    }

    pub fn next(self, elapsed: Time) -> Self {
        Self {
            index: self.index + 1,
            dt_s: elapsed.since(self.elapsed),
            elapsed,
        }
    }
}
