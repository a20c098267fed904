use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::error::ReasoningError;

/// Parse model output as a JSON object, tolerating surrounding prose and
/// trailing commas.
///
/// Only the span from the first `{` to the last `}` is considered. If that
/// span is not valid JSON, commas directly before `}` or `]` are removed and
/// parsing is tried once more. Anything still invalid is an error.
pub fn repair_json(text: &str) -> Result<Value, ReasoningError> {
    static TRAILING_COMMA_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r",\s*([\]}])").expect("valid regex"));

    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        return Err(ReasoningError::ResponseParsing(format!(
            "no JSON object in response: {}",
            preview(text)
        )));
    };
    if end < start {
        return Err(ReasoningError::ResponseParsing(format!(
            "unbalanced JSON object in response: {}",
            preview(text)
        )));
    }
    let span = &text[start..=end];

    if let Ok(value) = serde_json::from_str(span) {
        return Ok(value);
    }
    let repaired = TRAILING_COMMA_RE.replace_all(span, "$1");
    serde_json::from_str(&repaired).map_err(|e| {
        ReasoningError::ResponseParsing(format!("{e} in response: {}", preview(span)))
    })
}

/// Top-level key lookup that ignores ASCII case. An exact match wins.
pub fn get_case_insensitive<'a>(obj: &'a Value, key: &str) -> Option<&'a Value> {
    let map = obj.as_object()?;
    map.get(key).or_else(|| {
        map.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

fn preview(text: &str) -> String {
    const MAX: usize = 200;
    if text.len() <= MAX {
        return text.to_string();
    }
    let mut cut = MAX;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &text[..cut])
}
