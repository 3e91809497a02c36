use crate::config::Config;

/// What a canonical upload name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Dataset(i32),
    Context,
    Unrecognized,
}

/// Strip a trailing browser duplicate marker such as `(1)` or ` (12)`.
fn strip_duplicate_suffix(stem: &str) -> &str {
    let trimmed = stem.trim_end();
    if let Some(body) = trimmed.strip_suffix(')') {
        if let Some(open) = body.rfind('(') {
            let digits = &body[open + 1..];
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                return body[..open].trim_end();
            }
        }
    }
    trimmed
}

/// Normalize an uploaded file name: lowercase, no directory, no duplicate
/// marker, separators folded to single underscores.
pub fn canonicalize(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    let base = lower.rsplit(&['/', '\\'][..]).next().unwrap_or("");
    let (stem, ext) = match base.rfind('.') {
        Some(idx) if idx > 0 => (&base[..idx], &base[idx + 1..]),
        _ => (base, ""),
    };
    let stem = strip_duplicate_suffix(stem);

    let mut out = String::with_capacity(stem.len() + ext.len() + 1);
    for ch in stem.chars() {
        let mapped = if ch.is_alphanumeric() {
            Some(ch)
        } else if ch.is_whitespace() || matches!(ch, '_' | '-' | '.') {
            Some('_')
        } else {
            None
        };
        if let Some(c) = mapped {
            if c == '_' && (out.is_empty() || out.ends_with('_')) {
                continue;
            }
            out.push(c);
        }
    }
    while out.ends_with('_') {
        out.pop();
    }

    let ext: String = ext.trim().chars().filter(|c| c.is_alphanumeric()).collect();
    if !ext.is_empty() {
        out.push('.');
        out.push_str(&ext);
    }
    out
}

/// Match a canonical name against the dataset and context shapes.
pub fn classify(canonical: &str, cfg: &Config) -> UploadKind {
    if canonical == cfg.context_file {
        return UploadKind::Context;
    }
    let year = canonical
        .strip_prefix(cfg.dataset_prefix.as_str())
        .and_then(|rest| rest.strip_suffix(".json"))
        .filter(|digits| digits.len() == 4 && digits.chars().all(|c| c.is_ascii_digit()))
        .and_then(|digits| digits.parse::<i32>().ok());
    match year {
        Some(y) => UploadKind::Dataset(y),
        None => UploadKind::Unrecognized,
    }
}
