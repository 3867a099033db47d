//! Callback-padded JSON (`callback({...})`), as served by the worker monitors and the
//! master's aggregating proxy. Plain JSON bodies pass through untouched.

use serde::de::DeserializeOwned;

/// Callback name sent in the `callback` query parameter.
pub const CALLBACK: &str = "callback";

/// Returns the JSON text inside the padding, or the body itself if it is not padded.
pub fn strip_padding(body: &str) -> Result<&str, String> {
    let mut s = body.trim();
    if let Some(rest) = s.strip_prefix("/**/") {
        s = rest.trim_start();
    }

    if s.starts_with('{') || s.starts_with('[') {
        return Ok(s);
    }

    let open = s
        .find('(')
        .ok_or_else(|| "expected JSON or callback(...) body".to_string())?;
    let callee = s[..open].trim();
    if callee.is_empty() || !callee.chars().all(is_callee_char) {
        return Err(format!("invalid callback name `{callee}`"));
    }

    let tail = s[open + 1..].trim_end();
    let tail = tail.strip_suffix(';').unwrap_or(tail).trim_end();
    let inner = tail
        .strip_suffix(')')
        .ok_or_else(|| "unterminated callback(...) body".to_string())?;

    Ok(inner.trim())
}

/// Strip the padding (if any) and deserialize.
pub fn decode<T: DeserializeOwned>(body: &str) -> Result<T, String> {
    let json = strip_padding(body)?;
    serde_json::from_str(json).map_err(|err| format!("invalid JSON: {err}"))
}

fn is_callee_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | '$' | '.')
}
