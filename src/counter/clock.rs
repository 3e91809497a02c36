use std::time::{Duration, Instant};
use tokio::time::sleep;

use super::{CounterEngine, Paint};
use crate::logging::{log, obj, Domain, Level};
use serde_json::json;

/// Drives [`CounterEngine::tick`] once per frame while any counter is moving.
///
/// The driver holds no timer between runs: `run` returns as soon as the
/// engine stops asking for frames, and the frontend calls it again after the
/// next update or visibility change.
#[derive(Debug, Clone)]
pub struct ClockDriver {
    pub frame: Duration,
}

impl ClockDriver {
    pub fn new(frame_ms: u64) -> Self {
        Self { frame: Duration::from_millis(frame_ms.max(1)) }
    }

    /// Run frames until the engine goes idle or `budget` elapses. Returns
    /// the number of frames ticked.
    pub async fn run<F>(&self, engine: &mut CounterEngine, budget: Option<Duration>, mut apply: F) -> usize
    where
        F: FnMut(&Paint),
    {
        let started = Instant::now();
        let mut frames = 0usize;
        // Baseline tick so the first real frame measures one frame of motion.
        if engine.wants_frame() {
            engine.tick(Instant::now());
        }
        while engine.wants_frame() {
            if budget.map_or(false, |b| started.elapsed() >= b) {
                break;
            }
            sleep(self.frame).await;
            let tick = engine.tick(Instant::now());
            for paint in &tick.paints {
                apply(paint);
            }
            frames += 1;
            if !tick.reschedule {
                break;
            }
        }
        log(
            Level::Debug,
            Domain::Counter,
            "clock_parked",
            obj(&[("frames", json!(frames)), ("active", json!(engine.active_count()))]),
        );
        frames
    }
}
