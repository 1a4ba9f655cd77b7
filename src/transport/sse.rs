//! Line-oriented helpers for tapping a `text/event-stream` body without
//! altering the bytes that reach the client. Per `spec.md` §4.8's response
//! path: split each chunk by lines, and for each line starting with
//! `data:` attempt to parse the remainder as JSON; non-JSON data lines and
//! comment lines are ignored.

use serde_json::Value;

/// Parse every `data:` line in `chunk` as a JSON value. Lines that don't
/// start with `data:`, or whose payload doesn't parse as JSON, are skipped
/// — observation never raises into the HTTP stack.
#[must_use]
pub fn extract_sse_data_lines(chunk: &[u8]) -> Vec<Value> {
    let Ok(text) = std::str::from_utf8(chunk) else {
        return Vec::new();
    };

    text.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
        .filter(|payload| !payload.is_empty())
        .filter_map(|payload| serde_json::from_str(payload).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extracts_json_data_lines() {
        let chunk = b"id: 1\ndata: {\"a\":1}\n\ndata: {\"a\":2}\n\n";
        let values = extract_sse_data_lines(chunk);
        assert_eq!(values, vec![json!({"a": 1}), json!({"a": 2})]);
    }

    #[test]
    fn test_ignores_non_json_and_comment_lines() {
        let chunk = b": this is a comment\ndata: ping\nid: 2\n\n";
        let values = extract_sse_data_lines(chunk);
        assert!(values.is_empty());
    }

    #[test]
    fn test_invalid_utf8_yields_empty() {
        let chunk = [0xff, 0xfe, 0xfd];
        assert!(extract_sse_data_lines(&chunk).is_empty());
    }
}
