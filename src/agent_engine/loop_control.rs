// Iteration and wall-clock limits for the control loop.
use std::time::Duration;

use tokio::time::Instant;

use crate::agent_engine::state::LoopConfig;

pub struct LoopController {
    config: LoopConfig,
    start_time: Instant,
}

impl LoopController {
    pub fn new(config: LoopConfig) -> Self {
        Self {
            config,
            start_time: Instant::now(),
        }
    }

    /// True once either configured limit is reached after `iterations`
    /// completed iterations. No limits means never.
    pub fn should_stop(&self, iterations: u64) -> bool {
        if let Some(max) = self.config.max_iterations {
            if iterations >= max {
                return true;
            }
        }
        if let Some(max_min) = self.config.max_duration_minutes {
            let limit = Duration::from_secs(u64::from(max_min) * 60);
            if self.start_time.elapsed() >= limit {
                return true;
            }
        }
        false
    }
}
