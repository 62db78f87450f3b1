use std::time::{Duration, Instant};

/// Keeps a loop from running faster than a target rate.
pub struct FpsLimiter {
    fps_control: Instant,
    fps_wait: Duration,
}

impl FpsLimiter {
    pub fn new(fps: u32) -> Self {
        Self {
            fps_control: Instant::now(),
            fps_wait: Duration::from_secs_f64(1.0 / fps.max(1) as f64),
        }
    }

    /// Sleeps out whatever is left of the current frame slot.
    pub fn wait(&mut self) {
        let elapsed = self.fps_control.elapsed();

        if self.fps_wait > elapsed {
            spin_sleep::sleep(self.fps_wait - elapsed);
        }
        self.fps_control = Instant::now();
    }
}
