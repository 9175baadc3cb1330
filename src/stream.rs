//! Incremental flight output in fixed time windows.
//!
//! Each call to [`Iterator::next`] integrates one window and hands its record
//! to the caller before any further work is done. Dropping the stream is the
//! only cancellation there is.

use crate::error::SimResult;
use crate::ode::SolverOptions;
use crate::state::KinematicState;
use crate::trajectory::{FlightSimulator, Trajectory, TrajectoryRecord};

/// Length of one streamed segment (s).
pub const STREAM_WINDOW: f64 = 1.0;

/// Speed below which a grounded disc counts as settled (m/s).
pub const SETTLE_SPEED: f64 = 0.05;

/// One item of a flight stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    /// Samples of one window. After the first window the seam sample is
    /// omitted, so times increase strictly across segments.
    Segment(TrajectoryRecord),
    /// End of flight.
    End,
}

impl StreamFrame {
    /// Wire form; the terminator is the empty record.
    pub fn into_record(self) -> TrajectoryRecord {
        match self {
            StreamFrame::Segment(record) => record,
            StreamFrame::End => TrajectoryRecord::terminator(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Flying,
    Landed,
    Done,
}

/// Iterator over the windows of one flight.
#[derive(Debug, Clone)]
pub struct FlightStream {
    simulator: FlightSimulator,
    options: SolverOptions,
    previous: Option<Trajectory>,
    initial: KinematicState,
    start: f64,
    end: f64,
    window: f64,
    phase_offset: f64,
    phase: Phase,
}

impl FlightStream {
    /// Stream `duration` seconds of flight from `initial` at `t = 0`.
    pub fn new(
        simulator: FlightSimulator,
        initial: KinematicState,
        duration: f64,
        options: SolverOptions,
        phase_offset: f64,
    ) -> Self {
        Self {
            simulator,
            options,
            previous: None,
            initial,
            start: 0.0,
            end: duration.max(0.0),
            window: STREAM_WINDOW,
            phase_offset,
            phase: Phase::Flying,
        }
    }

    /// Use a different window length; non-positive values are ignored.
    pub fn with_window(mut self, window: f64) -> Self {
        if window > 0.0 {
            self.window = window;
        }
        self
    }

    fn next_segment(&self) -> SimResult<Trajectory> {
        match &self.previous {
            None => {
                let t1 = (self.start + self.window).min(self.end);
                self.simulator
                    .compute_trajectory(&self.initial, Some((self.start, t1)), &self.options)
            }
            Some(previous) => {
                let t0 = previous.last().map_or(self.start, |s| s.t);
                let duration = self.window.min(self.end - t0);
                self.simulator.resume(previous, duration, &self.options)
            }
        }
    }

    fn flight_over(&self, segment: &Trajectory) -> bool {
        let Some(last) = segment.last() else {
            return true;
        };
        if segment.terminated_by_event() || last.t >= self.end {
            return true;
        }
        self.simulator.environment().ground_play()
            && last.state.speed() < SETTLE_SPEED
            && last.state.position.z < self.simulator.coefficients().diameter()
    }
}

impl Iterator for FlightStream {
    type Item = SimResult<StreamFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.phase {
            Phase::Done => return None,
            Phase::Landed => {
                self.phase = Phase::Done;
                return Some(Ok(StreamFrame::End));
            }
            Phase::Flying => {}
        }

        let segment = match self.next_segment() {
            Ok(segment) => segment,
            Err(err) => {
                self.phase = Phase::Done;
                return Some(Err(err));
            }
        };

        if self.flight_over(&segment) {
            self.phase = Phase::Landed;
        }
        let mut record = segment.to_record(self.phase_offset);
        if self.previous.is_some() {
            record.drop_seam();
        }
        self.previous = Some(segment);
        Some(Ok(StreamFrame::Segment(record)))
    }
}
