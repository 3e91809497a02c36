//! Axis scales and human-friendly tick selection.

/// Most regular ticks an axis renders (the ceiling tick comes on top).
pub const MAX_TICKS: usize = 8;

/// Drop float noise such as `2.9999999999999996` before rounding decisions.
fn settle(ratio: f64) -> f64 {
    (ratio * 1e9).round() / 1e9
}

/// Power of ten at or below `v` (`v > 0`).
fn magnitude(v: f64) -> f64 {
    let mut mag = 10f64.powf(v.log10().floor());
    if settle(v / mag) >= 10.0 {
        mag *= 10.0;
    } else if settle(v / mag) < 1.0 {
        mag /= 10.0;
    }
    mag
}

/// Round a positive maximum up to one significant digit: 834 → 900,
/// 45 → 50. Non-positive or non-finite input gives 1.
pub fn nice_ceil(v: f64) -> f64 {
    if !(v.is_finite() && v > 0.0) {
        return 1.0;
    }
    let mag = magnitude(v);
    settle(v / mag).ceil() * mag
}

/// Tick interval for a `[0, range]` axis, keyed by the leading digit.
pub fn nice_step(range: f64) -> f64 {
    if !(range.is_finite() && range > 0.0) {
        return 0.2;
    }
    let mag = magnitude(range);
    let norm = settle(range / mag);
    let frac = if norm <= 1.0 {
        0.2
    } else if norm <= 2.0 {
        0.5
    } else if norm <= 5.0 {
        1.0
    } else {
        2.0
    };
    frac * mag
}

fn round_to_step(v: f64, step: f64) -> f64 {
    let decimals = (-step.log10().floor()).max(0.0) as i32 + 1;
    let f = 10f64.powi(decimals);
    (v * f).round() / f
}

/// Ticks from zero for an axis ending at `ceiling`.
pub fn ticks(ceiling: f64) -> Vec<f64> {
    ticks_for(ceiling, nice_step(ceiling))
}

/// Regular ticks at `step` (at most [`MAX_TICKS`]), plus a tick exactly at
/// `ceiling` when the last regular tick stops more than a quarter step short.
pub fn ticks_for(ceiling: f64, step: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(MAX_TICKS + 1);
    if !(ceiling.is_finite() && ceiling > 0.0 && step.is_finite() && step > 0.0) {
        return out;
    }
    for k in 0..MAX_TICKS {
        let v = round_to_step(k as f64 * step, step);
        if v > ceiling + step * 1e-9 {
            break;
        }
        out.push(v);
    }
    if let Some(&last) = out.last() {
        if ceiling - last > step * 0.25 {
            out.push(ceiling);
        }
    }
    out
}

/// Linear map from a data domain onto a pixel range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearScale {
    pub domain: (f64, f64),
    pub range: (f64, f64),
}

impl LinearScale {
    pub fn new(domain: (f64, f64), range: (f64, f64)) -> Self {
        Self { domain, range }
    }

    pub fn apply(&self, v: f64) -> f64 {
        let (d0, d1) = self.domain;
        let (r0, r1) = self.range;
        if d1 == d0 {
            return r0;
        }
        r0 + (v - d0) / (d1 - d0) * (r1 - r0)
    }
}

/// Radius scale where bubble area, not radius, grows with the value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SqrtScale {
    pub max_value: f64,
    pub min_radius: f64,
    pub max_radius: f64,
}

impl SqrtScale {
    pub fn apply(&self, v: f64) -> f64 {
        if !(self.max_value > 0.0) || !v.is_finite() {
            return self.min_radius;
        }
        let t = (v / self.max_value).clamp(0.0, 1.0).sqrt();
        self.min_radius + (self.max_radius - self.min_radius) * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nice_ceil_examples() {
        assert_eq!(nice_ceil(834.0), 900.0);
        assert_eq!(nice_ceil(45.0), 50.0);
        assert_eq!(nice_ceil(0.0), 1.0);
        assert_eq!(nice_ceil(-3.0), 1.0);
        assert_eq!(nice_ceil(f64::NAN), 1.0);
        assert_eq!(nice_ceil(1000.0), 1000.0);
        assert_eq!(nice_ceil(1_234_567.0), 2_000_000.0);
    }

    #[test]
    fn nice_step_table() {
        assert_eq!(nice_step(1.0), 0.2);
        assert_eq!(nice_step(20.0), 5.0);
        assert_eq!(nice_step(50.0), 10.0);
        assert_eq!(nice_step(900.0), 200.0);
    }

    #[test]
    fn supplementary_tick_fills_large_gap() {
        assert_eq!(ticks(900.0), vec![0.0, 200.0, 400.0, 600.0, 800.0, 900.0]);
    }

    #[test]
    fn exact_ceiling_gets_no_extra_tick() {
        assert_eq!(ticks(50.0), vec![0.0, 10.0, 20.0, 30.0, 40.0, 50.0]);
        assert_eq!(ticks(1.0), vec![0.0, 0.2, 0.4, 0.6, 0.8, 1.0]);
    }

    #[test]
    fn tick_count_is_capped() {
        let t = ticks_for(100.0, 1.0);
        assert_eq!(t.len(), MAX_TICKS + 1);
        assert_eq!(t[MAX_TICKS - 1], 7.0);
        assert_eq!(*t.last().unwrap(), 100.0);
    }

    #[test]
    fn small_gap_is_left_alone() {
        // last regular tick 800, gap 20 < 50
        assert_eq!(ticks_for(820.0, 200.0), vec![0.0, 200.0, 400.0, 600.0, 800.0]);
    }

    #[test]
    fn linear_and_sqrt_scales() {
        let s = LinearScale::new((0.0, 100.0), (400.0, 0.0));
        assert_eq!(s.apply(25.0), 300.0);
        assert_eq!(LinearScale::new((5.0, 5.0), (1.0, 2.0)).apply(5.0), 1.0);

        let r = SqrtScale { max_value: 100.0, min_radius: 4.0, max_radius: 24.0 };
        assert_eq!(r.apply(0.0), 4.0);
        assert_eq!(r.apply(25.0), 14.0);
        assert_eq!(r.apply(100.0), 24.0);
        assert_eq!(r.apply(400.0), 24.0);
    }
}
