//! Helpers for putting radio-supplied text into log lines.
//! Message bodies come straight off the mesh and may contain anything, so they are
//! escaped onto a single line and shortened before logging.

/// Escape control characters and cut the result to at most `max_chars` characters
/// of input, appending `…` when shortened.
pub fn preview(s: &str, max_chars: usize) -> String {
    let mut out = String::with_capacity(s.len().min(max_chars) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count >= max_chars {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                use std::fmt::Write;
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Preview length used for message bodies in per-message log lines.
pub const MESSAGE_PREVIEW: usize = 50;
