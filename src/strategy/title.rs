use serde_json::Value;

/// Extract a short human-readable title from a response body.
///
/// Bodies that declare `application/json` (or simply look like JSON) go
/// through the JSON path; everything else is treated as HTML. The function
/// is pure and never returns an empty string: edge cases produce a fixed
/// sentinel describing what went wrong.
pub fn extract_title(body: &str, content_type: &str) -> String {
    if content_type.contains("application/json") || body.starts_with('{') || body.starts_with('[') {
        extract_json_title(body)
    } else {
        extract_html_title(body)
    }
}

/// Pull the inner text of the first `<title>` tag.
///
/// The opening tag is located case-insensitively; a matching close tag must
/// follow or the markup is reported as malformed.
fn extract_html_title(html: &str) -> String {
    let Some(open) = find_ascii_ci(html, "<title>") else {
        return "No HTML title found".to_string();
    };

    let content_start = open + "<title>".len();
    let Some(close) = html[content_start..].find("</title>") else {
        return "Malformed HTML title".to_string();
    };

    let title = html[content_start..content_start + close].trim();
    if title.is_empty() {
        "Empty HTML title".to_string()
    } else {
        title.to_string()
    }
}

/// Derive a title from a JSON object.
///
/// Probes a fixed list of well-known keys first; failing that, scans the
/// remaining keys in lexicographic order and reports the first short string
/// value as `key: value`. Only top-level objects are supported; arrays and
/// scalars read as invalid.
fn extract_json_title(raw: &str) -> String {
    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(_) => return "Invalid JSON".to_string(),
    };

    let Some(object) = value.as_object() else {
        return "Invalid JSON".to_string();
    };

    for key in ["title", "name", "login", "message", "description"] {
        if let Some(text) = object.get(key).and_then(Value::as_str) {
            if !text.is_empty() {
                return text.to_string();
            }
        }
    }

    let mut keys: Vec<&String> = object.keys().collect();
    keys.sort();
    for key in keys {
        if let Some(text) = object.get(key).and_then(Value::as_str) {
            if !text.is_empty() && text.len() < 100 {
                return format!("{}: {}", key, text);
            }
        }
    }

    "JSON response (no title field)".to_string()
}

/// Byte offset of an ASCII-case-insensitive needle match.
fn find_ascii_ci(haystack: &str, needle: &str) -> Option<usize> {
    let haystack = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}
