//! Pipeline stage instrumentation.
//!
//! The equalizer calls [`StageTimer::start`] once and
//! [`StageTimer::mark`] after each [`Stage`]. It never reads the timer
//! back; interpreting the marks is up to the implementation.

use alloc::vec::Vec;
use std::time::{Duration, Instant};

/// The seven equalization stages, in pipeline order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Bulk read of the source pixels.
    Read,
    /// Packed color to hue/saturation/brightness.
    Convert,
    /// Bin assignment and counting.
    Histogram,
    /// Per-bin probability.
    Probability,
    /// Cumulative distribution scan.
    Cumulative,
    /// Brightness remapping and conversion back to packed color.
    Remap,
    /// Bulk write of the destination pixels.
    Write,
}

impl Stage {
    /// All stages in pipeline order.
    pub const ALL: [Stage; 7] = [
        Stage::Read,
        Stage::Convert,
        Stage::Histogram,
        Stage::Probability,
        Stage::Cumulative,
        Stage::Remap,
        Stage::Write,
    ];

    /// Human-readable label.
    pub const fn label(self) -> &'static str {
        match self {
            Stage::Read => "read pixels",
            Stage::Convert => "convert to HSB",
            Stage::Histogram => "brightness histogram",
            Stage::Probability => "probability array",
            Stage::Cumulative => "cumulative distribution",
            Stage::Remap => "equalize pixels",
            Stage::Write => "write pixels",
        }
    }
}

/// Receiver of stage boundary marks.
pub trait StageTimer {
    /// Called once before the first stage.
    fn start(&mut self) {}

    /// Called right after `stage` completes.
    fn mark(&mut self, stage: Stage);
}

/// Timer that ignores every mark.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoTimer;

impl StageTimer for NoTimer {
    #[inline]
    fn mark(&mut self, _stage: Stage) {}
}

/// Records the wall-clock duration of each stage.
#[derive(Clone, Debug, Default)]
pub struct StageTimes {
    last: Option<Instant>,
    stages: Vec<(Stage, Duration)>,
}

impl StageTimes {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded `(stage, duration)` pairs in mark order.
    pub fn stages(&self) -> &[(Stage, Duration)] {
        &self.stages
    }

    /// Duration of the most recent mark of `stage`.
    pub fn get(&self, stage: Stage) -> Option<Duration> {
        self.stages
            .iter()
            .rev()
            .find(|(s, _)| *s == stage)
            .map(|&(_, d)| d)
    }

    /// Sum of all recorded durations.
    pub fn total(&self) -> Duration {
        self.stages.iter().map(|&(_, d)| d).sum()
    }
}

impl StageTimer for StageTimes {
    fn start(&mut self) {
        self.last = Some(Instant::now());
    }

    fn mark(&mut self, stage: Stage) {
        let now = Instant::now();
        let elapsed = self.last.map_or(Duration::ZERO, |last| now - last);
        self.last = Some(now);
        tracing::trace!(
            stage = stage.label(),
            elapsed_us = elapsed.as_micros() as u64,
            "stage complete"
        );
        self.stages.push((stage, elapsed));
    }
}
