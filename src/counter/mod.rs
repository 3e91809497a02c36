//! Live counters driven by one shared clock.
//!
//! Each counter is keyed by the id of the surface it renders into. The engine
//! never owns that surface: rendering produces a [`Paint`] the frontend
//! applies, and only when the formatted text actually changed. Registration
//! and release are explicit, so a re-rendered list must release the ids it
//! no longer shows.

pub mod clock;

use std::collections::BTreeMap;
use std::time::Instant;

use crate::format::Formatter;
use crate::logging::{log, obj, v_num, v_str, Domain, Level};
use crate::timectx::LiveParams;

pub type TargetId = String;

#[derive(Debug, Clone, PartialEq)]
pub struct CounterState {
    /// Always within `[0, ceiling]`
    pub displayed_value: f64,
    pub rate_per_second: f64,
    pub ceiling: f64,
    pub last_rendered_text: String,
}

impl CounterState {
    fn empty() -> Self {
        Self {
            displayed_value: 0.0,
            rate_per_second: 0.0,
            ceiling: 0.0,
            last_rendered_text: String::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.rate_per_second > 0.0 && self.displayed_value < self.ceiling
    }

    fn apply(&mut self, params: LiveParams) {
        let ceiling = if params.ceiling.is_finite() { params.ceiling.max(0.0) } else { 0.0 };
        let rate = if params.rate_per_second.is_finite() && params.rate_per_second > 0.0 && ceiling > 0.0 {
            params.rate_per_second
        } else {
            0.0
        };
        let target = if params.target_value.is_finite() { params.target_value } else { 0.0 };
        self.ceiling = ceiling;
        self.rate_per_second = rate;
        self.displayed_value = target.min(ceiling).max(0.0);
    }

    fn advance(&mut self, dt_secs: f64) {
        if !self.is_active() || dt_secs <= 0.0 {
            return;
        }
        self.displayed_value = (self.displayed_value + self.rate_per_second * dt_secs).min(self.ceiling);
    }
}

struct Counter {
    state: CounterState,
    format: Formatter,
}

impl Counter {
    /// Text to write, if it differs from what the surface already shows.
    fn render(&mut self, target: &str) -> Option<Paint> {
        let text = (self.format)(self.state.displayed_value);
        if text == self.state.last_rendered_text {
            return None;
        }
        self.state.last_rendered_text = text.clone();
        Some(Paint { target: target.to_string(), text })
    }
}

/// A text write for one display surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paint {
    pub target: TargetId,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tick {
    pub paints: Vec<Paint>,
    /// Whether the clock should schedule another frame.
    pub reschedule: bool,
}

#[derive(Default)]
pub struct CounterEngine {
    counters: BTreeMap<TargetId, Counter>,
    last_tick: Option<Instant>,
    reduced_motion: bool,
    hidden: bool,
    armed: bool,
}

impl CounterEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a counter to `target`. Re-registering keeps the value but takes
    /// the new formatter and forces the next render to paint.
    pub fn register(&mut self, target: &str, format: Formatter) {
        match self.counters.get_mut(target) {
            Some(counter) => {
                counter.format = format;
                counter.state.last_rendered_text.clear();
            }
            None => {
                self.counters.insert(
                    target.to_string(),
                    Counter { state: CounterState::empty(), format },
                );
            }
        }
    }

    /// Jump the counter to its "as of now" value and render it. Unknown
    /// targets are ignored.
    pub fn update(&mut self, target: &str, params: LiveParams) -> Option<Paint> {
        let Some(counter) = self.counters.get_mut(target) else {
            log(
                Level::Debug,
                Domain::Counter,
                "update_unregistered",
                obj(&[("target", v_str(target))]),
            );
            return None;
        };
        counter.state.apply(params);
        let paint = counter.render(target);
        let wants = self.wants_frame();
        if wants && !self.armed {
            self.last_tick = None;
            log(
                Level::Trace,
                Domain::Counter,
                "clock_armed",
                obj(&[("target", v_str(target)), ("rate", v_num(params.rate_per_second))]),
            );
        }
        self.armed = wants;
        paint
    }

    /// Drop the counter for a surface that is no longer displayed.
    pub fn release(&mut self, target: &str) -> bool {
        let removed = self.counters.remove(target).is_some();
        if self.active_count() == 0 {
            self.armed = false;
        }
        removed
    }

    /// Release every counter whose id is not in `keep`.
    pub fn retain(&mut self, keep: &[TargetId]) -> usize {
        let stale: Vec<TargetId> = self
            .counters
            .keys()
            .filter(|id| !keep.contains(id))
            .cloned()
            .collect();
        for id in &stale {
            self.release(id);
        }
        stale.len()
    }

    /// Advance every active counter by the wall-clock time since the last
    /// tick and collect the resulting paints.
    pub fn tick(&mut self, now: Instant) -> Tick {
        if !self.motion_allowed() {
            self.last_tick = None;
            self.armed = false;
            return Tick::default();
        }
        let dt = self
            .last_tick
            .map(|prev| now.saturating_duration_since(prev).as_secs_f64())
            .unwrap_or(0.0);
        self.last_tick = Some(now);

        let mut paints = Vec::new();
        let mut any_active = false;
        for (target, counter) in self.counters.iter_mut() {
            if !counter.state.is_active() {
                continue;
            }
            counter.state.advance(dt);
            if let Some(p) = counter.render(target) {
                paints.push(p);
            }
            any_active |= counter.state.is_active();
        }
        self.armed = any_active;
        if !any_active {
            self.last_tick = None;
        }
        Tick { paints, reschedule: any_active }
    }

    /// Motion preference changed. Returns whether the clock needs arming.
    pub fn set_reduced_motion(&mut self, reduced: bool) -> bool {
        self.reduced_motion = reduced;
        self.rebaseline()
    }

    /// Page visibility changed. Returns whether the clock needs arming.
    pub fn set_hidden(&mut self, hidden: bool) -> bool {
        self.hidden = hidden;
        self.rebaseline()
    }

    fn rebaseline(&mut self) -> bool {
        self.last_tick = None;
        self.armed = self.wants_frame();
        self.armed
    }

    fn motion_allowed(&self) -> bool {
        !self.reduced_motion && !self.hidden
    }

    pub fn wants_frame(&self) -> bool {
        self.motion_allowed() && self.active_count() > 0
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn active_count(&self) -> usize {
        self.counters.values().filter(|c| c.state.is_active()).count()
    }

    pub fn registered_count(&self) -> usize {
        self.counters.len()
    }

    pub fn state(&self, target: &str) -> Option<&CounterState> {
        self.counters.get(target).map(|c| &c.state)
    }

    pub fn value(&self, target: &str) -> Option<f64> {
        self.state(target).map(|s| s.displayed_value)
    }
}
