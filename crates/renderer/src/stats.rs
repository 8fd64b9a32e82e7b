use std::time::{Duration, Instant};

/// Rolling frames-per-second counter, refreshed once per second.
#[derive(Debug, Clone)]
pub struct FrameStats {
    frame_count: u64,
    frames_since_last_update: u32,
    frames_per_second: f32,
    last_fps_update: Instant,
}

impl FrameStats {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(now: Instant) -> Self {
        Self {
            frame_count: 0,
            frames_since_last_update: 0,
            frames_per_second: 0.0,
            last_fps_update: now,
        }
    }

    /// Counts one presented frame. Returns the new rate when a one-second
    /// window has just closed.
    pub fn record(&mut self, now: Instant) -> Option<f32> {
        self.frame_count += 1;
        self.frames_since_last_update += 1;
        let elapsed = now.saturating_duration_since(self.last_fps_update);
        if elapsed < Duration::from_secs(1) {
            return None;
        }
        self.frames_per_second = self.frames_since_last_update as f32 / elapsed.as_secs_f32();
        self.frames_since_last_update = 0;
        self.last_fps_update = now;
        tracing::debug!(
            fps = self.frames_per_second.round(),
            frame_count = self.frame_count,
            "render stats"
        );
        Some(self.frames_per_second)
    }

    pub fn frames_per_second(&self) -> f32 {
        self.frames_per_second
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new()
    }
}
