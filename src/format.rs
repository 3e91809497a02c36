/// Formatter a live counter renders its value through.
pub type Formatter = Box<dyn Fn(f64) -> String + Send>;

fn group_thousands(whole: u64) -> String {
    let digits = whole.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn whole(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.floor() as u64
    } else {
        0
    }
}

/// `$1,234,567`, truncated toward zero so a live counter never shows a
/// dollar it has not reached yet.
pub fn usd_whole(value: f64) -> String {
    format!("${}", group_thousands(whole(value)))
}

/// `$4.6B`, `$812.3M`, `$12.5K`, `$950`
pub fn usd_compact(value: f64) -> String {
    let v = if value.is_finite() { value.abs() } else { 0.0 };
    let sign = if value < 0.0 { "-" } else { "" };
    let (scaled, suffix) = if v >= 1e12 {
        (v / 1e12, "T")
    } else if v >= 1e9 {
        (v / 1e9, "B")
    } else if v >= 1e6 {
        (v / 1e6, "M")
    } else if v >= 1e3 {
        (v / 1e3, "K")
    } else {
        return format!("{}${:.0}", sign, v);
    };
    format!("{}${:.1}{}", sign, scaled, suffix)
}

/// Signed change, e.g. `+$2.0B`.
pub fn usd_delta(delta: f64) -> String {
    if delta > 0.0 {
        format!("+{}", usd_compact(delta))
    } else {
        usd_compact(delta)
    }
}

/// Whole count with separators, or `n/a` when unknown.
pub fn count(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() && v >= 0.0 => group_thousands(v.round() as u64),
        _ => "n/a".to_string(),
    }
}

/// `1.2M`, `35K`, `950`: axis labels for counts.
pub fn count_compact(value: f64) -> String {
    let v = if value.is_finite() { value.abs() } else { 0.0 };
    let (scaled, suffix) = if v >= 1e9 {
        (v / 1e9, "B")
    } else if v >= 1e6 {
        (v / 1e6, "M")
    } else if v >= 1e3 {
        (v / 1e3, "K")
    } else {
        return trim_zeros(format!("{:.1}", v));
    };
    format!("{}{}", trim_zeros(format!("{:.1}", scaled)), suffix)
}

fn trim_zeros(s: String) -> String {
    if s.ends_with(".0") {
        s[..s.len() - 2].to_string()
    } else {
        s
    }
}

pub fn percent(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

pub fn usd_whole_formatter() -> Formatter {
    Box::new(usd_whole)
}
