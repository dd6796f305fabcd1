// src/util.rs — Shared utility functions

use std::time::Duration;

/// Truncate a string for logging (UTF-8 safe).
///
/// Returns a prefix of at most `max_len` bytes, cut on a character
/// boundary.
pub fn truncate_str(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        s
    } else {
        let mut end = max_len;
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        &s[..end]
    }
}

/// Uniformly pick a duration in `[min, max]` with millisecond resolution.
///
/// Uses the OS RNG via `getrandom`; falls back to `min` if it is
/// unavailable, which only ever shortens a politeness delay.
pub fn random_duration_between(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let span_ms = (max - min).as_millis() as u64;
    let mut buf = [0u8; 8];
    match getrandom::getrandom(&mut buf) {
        Ok(()) => {
            let r = u64::from_le_bytes(buf) % (span_ms + 1);
            min + Duration::from_millis(r)
        }
        Err(e) => {
            tracing::debug!("getrandom unavailable ({e}), using minimum delay");
            min
        }
    }
}

/// Escape text for inclusion in HTML bodies and attribute values.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}
