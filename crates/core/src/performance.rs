//! Frame-time bookkeeping for overlays and logging.

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

/// Number of frame times kept in the history.
pub const HISTORY_LEN: usize = 1000;

/// Tracks the current frame delta and a bounded history of past deltas.
#[derive(Debug, Default)]
pub struct PerformanceCounter {
    running: bool,
    current_time: f64,
    delta_time: f32,
    frame_times: VecDeque<f32>,
}

impl PerformanceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts counting from the current wall-clock time with a zeroed history.
    pub fn start(&mut self) {
        self.current_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        self.running = true;
        self.delta_time = 0.0;
        self.frame_times.clear();
        self.frame_times.resize(HISTORY_LEN, 0.0);
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Records a new frame time in seconds.
    ///
    /// The previous delta moves into the history; the oldest entry is dropped
    /// once the history is full. Does nothing while stopped.
    pub fn run(&mut self, frame_time: f32) {
        if !self.running {
            return;
        }

        if self.frame_times.len() >= HISTORY_LEN {
            self.frame_times.pop_front();
        }
        self.frame_times.push_back(self.delta_time);

        self.delta_time = frame_time;
        self.current_time += f64::from(frame_time);
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    #[inline]
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    #[inline]
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Frames per second derived from the last delta, 0 before the first frame.
    pub fn fps(&self) -> f32 {
        if self.delta_time > 0.0 {
            1.0 / self.delta_time
        } else {
            0.0
        }
    }

    /// Past frame times, oldest first.
    pub fn frame_times(&self) -> impl ExactSizeIterator<Item = f32> + '_ {
        self.frame_times.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stopped_counter_ignores_frames() {
        let mut counter = PerformanceCounter::new();
        counter.run(0.5);
        assert_eq!(counter.delta_time(), 0.0);
        assert_eq!(counter.frame_times().len(), 0);
    }

    #[test]
    fn test_run_shifts_previous_delta_into_history() {
        let mut counter = PerformanceCounter::new();
        counter.start();
        let t0 = counter.current_time();
        assert_eq!(counter.frame_times().len(), HISTORY_LEN);

        counter.run(0.25);
        counter.run(0.5);

        assert_eq!(counter.delta_time(), 0.5);
        assert_eq!(counter.fps(), 2.0);
        assert!((counter.current_time() - t0 - 0.75).abs() < 1e-9);

        let history: Vec<f32> = counter.frame_times().collect();
        assert_eq!(history.len(), HISTORY_LEN);
        assert_eq!(history[HISTORY_LEN - 1], 0.25);
        assert_eq!(history[HISTORY_LEN - 2], 0.0);
    }

    #[test]
    fn test_stop_freezes_state() {
        let mut counter = PerformanceCounter::new();
        counter.start();
        counter.run(0.1);
        counter.stop();
        counter.run(1.0);
        assert!(!counter.is_running());
        assert_eq!(counter.delta_time(), 0.1);
    }

    #[test]
    fn test_fps_zero_before_first_frame() {
        let mut counter = PerformanceCounter::new();
        counter.start();
        assert_eq!(counter.fps(), 0.0);
    }
}
