use crate::error::VoiceError;
use crate::style::Style;
use once_cell::sync::Lazy;
use regex::Regex;

static RE_TERMINAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]$").expect("valid regex"));
static RE_COLON: Lazy<Regex> = Lazy::new(|| Regex::new(r":\s+").expect("valid regex"));

/// Speech-friendly touch-ups that keep the meaning intact.
///
/// Trims, guarantees terminal punctuation, spells out `&`, lengthens the
/// pause after a colon, and softens a trailing `!` for friendly delivery.
pub fn polish_text(text: &str, style: Style) -> Result<String, VoiceError> {
    let mut t = text.trim().to_string();
    if t.is_empty() {
        return Err(VoiceError::EmptyText);
    }

    if !RE_TERMINAL.is_match(&t) {
        t.push('.');
    }

    t = t.replace(" & ", " and ");
    t = RE_COLON.replace_all(&t, ": \u{2014} ").into_owned();

    if style == Style::Friendly && t.ends_with('!') {
        t.pop();
        t.push('.');
    }

    Ok(t)
}
