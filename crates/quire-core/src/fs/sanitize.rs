//! User-supplied file names.
//!
//! [`FilenameSanitizer`] turns arbitrary input into a portable file name;
//! [`PatternFilenameGenerator`] invents one when the user gave none.

use std::fmt::Write;

/// Longest file name, in bytes, most filesystems accept.
pub const MAX_NAME_BYTES: usize = 255;

/// Pattern used when a configured one cannot be formatted.
pub const DEFAULT_FILENAME_PATTERN: &str = "%Y%m%d%H%M%S.md";

pub trait NameSanitizer: Send + Sync {
    /// Returns a safe version of `raw`, using `replacement` for every
    /// character that cannot appear in a file name. May return an empty
    /// string; callers treat that as invalid.
    fn sanitize(&self, raw: &str, replacement: &str) -> String;
}

pub trait FilenameGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Portable file name rules.
///
/// Strips path separators, reserved punctuation, control characters,
/// Windows device names, names made of dots only and trailing dots or
/// spaces, then truncates to [`MAX_NAME_BYTES`]. The result is sanitised a
/// second time with an empty replacement in case the replacement itself was
/// unsafe.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilenameSanitizer;

impl FilenameSanitizer {
    pub fn new() -> Self {
        Self
    }
}

impl NameSanitizer for FilenameSanitizer {
    fn sanitize(&self, raw: &str, replacement: &str) -> String {
        let once = sanitize_pass(raw.trim(), replacement);
        sanitize_pass(&once, "")
    }
}

fn is_illegal(c: char) -> bool {
    matches!(c, '/' | '?' | '<' | '>' | '\\' | ':' | '*' | '|' | '"')
        || matches!(c as u32, 0x00..=0x1f | 0x80..=0x9f)
}

fn is_reserved(name: &str) -> bool {
    let stem = name.split('.').next().unwrap_or(name).to_ascii_lowercase();
    match stem.as_str() {
        "con" | "prn" | "aux" | "nul" => true,
        _ => match (stem.get(..3), stem.get(3..)) {
            (Some("com" | "lpt"), Some(digit)) => {
                digit.len() == 1 && digit.chars().all(|c| c.is_ascii_digit())
            }
            _ => false,
        },
    }
}

fn sanitize_pass(input: &str, replacement: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if is_illegal(c) {
            out.push_str(replacement);
        } else {
            out.push(c);
        }
    }

    if !out.is_empty() && out.chars().all(|c| c == '.') {
        out = replacement.to_owned();
    }
    if is_reserved(&out) {
        out = replacement.to_owned();
    }

    let kept = out.trim_end_matches(['.', ' ']).len();
    if kept < out.len() {
        out.truncate(kept);
        out.push_str(replacement);
    }

    truncate_to_boundary(&mut out, MAX_NAME_BYTES);
    out
}

fn truncate_to_boundary(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}

/// Names new files after the current local time.
#[derive(Debug, Clone)]
pub struct PatternFilenameGenerator {
    pattern: String,
}

impl PatternFilenameGenerator {
    /// `pattern` is a chrono `strftime` pattern, e.g. `%Y%m%d%H%M%S.md`.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Formats `time` with the pattern, falling back to the default pattern
    /// if the configured one is malformed.
    pub fn format_at(&self, time: chrono::DateTime<chrono::Local>) -> String {
        let mut out = String::new();
        if write!(out, "{}", time.format(&self.pattern)).is_ok() {
            return out;
        }
        tracing::warn!(pattern = %self.pattern, "invalid filename pattern, using default");
        time.format(DEFAULT_FILENAME_PATTERN).to_string()
    }
}

impl Default for PatternFilenameGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_FILENAME_PATTERN)
    }
}

impl FilenameGenerator for PatternFilenameGenerator {
    fn generate(&self) -> String {
        self.format_at(chrono::Local::now())
    }
}
