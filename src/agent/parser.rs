//! Tool Protocol Parser (§4.A).
//!
//! Extracts an ordered list of [`ToolCall`]s from raw LLM output, plus a
//! "cleaned" version of the text with the tool-call markup stripped. The
//! canonical form is authoritative; the alternate form is isolated in its
//! own functions so it can be disabled independently in tests (Design
//! Notes: "isolate the alternate grammar so it can be disabled for
//! tests").

use std::collections::HashMap;

use crate::agent::types::ToolCall;

const TOOL_OPEN: &str = "<tool>";
const TOOL_CLOSE: &str = "</tool>";
const PARAMS_OPEN: &str = "<params>";
const PARAMS_CLOSE: &str = "</params>";

/// Parse `text` for tool calls. `catalog_names` is the fixed set of tool
/// names recognised by the alternate `<NAME>BODY</NAME>` syntax; it is
/// ignored when the canonical form matches at least once.
pub fn parse_tool_calls(text: &str, catalog_names: &[&str]) -> (Vec<ToolCall>, String) {
    let (calls, cleaned) = parse_canonical(text);
    if !calls.is_empty() {
        return (calls, cleaned);
    }
    parse_alternate(text, catalog_names)
}

/// Render a [`ToolCall`] back into canonical wire syntax. Used by tests to
/// exercise the parser's round-trip law and by mock backends that need to
/// script a tool-calling turn.
pub fn format_tool_call(call: &ToolCall) -> String {
    format!(
        "{TOOL_OPEN}{}{TOOL_CLOSE}{PARAMS_OPEN}{}{PARAMS_CLOSE}",
        call.name,
        call.params_canonical_json()
    )
}

fn parse_canonical(text: &str) -> (Vec<ToolCall>, String) {
    let mut calls = Vec::new();
    let mut cleaned = String::new();
    let mut rest = text;

    loop {
        let Some(tool_start) = rest.find(TOOL_OPEN) else {
            cleaned.push_str(rest);
            break;
        };
        cleaned.push_str(&rest[..tool_start]);
        let after_open = &rest[tool_start + TOOL_OPEN.len()..];

        let Some(name_end) = after_open.find(TOOL_CLOSE) else {
            // Unclosed tag terminates parsing of canonical form; the
            // remainder is kept as plain text.
            cleaned.push_str(after_open);
            break;
        };
        let name = after_open[..name_end].trim().to_string();
        let after_name = &after_open[name_end + TOOL_CLOSE.len()..];
        let after_name_trimmed = after_name.trim_start();

        if !after_name_trimmed.starts_with(PARAMS_OPEN) {
            cleaned.push_str(after_name);
            break;
        }
        let after_params_open = &after_name_trimmed[PARAMS_OPEN.len()..];

        let Some(params_end) = after_params_open.find(PARAMS_CLOSE) else {
            cleaned.push_str(after_name);
            break;
        };
        let raw_params = &after_params_open[..params_end];
        let params = parse_params_json(raw_params);
        calls.push(ToolCall::new(name, params));

        rest = &after_params_open[params_end + PARAMS_CLOSE.len()..];
    }

    (calls, cleaned)
}

fn parse_params_json(raw: &str) -> HashMap<String, String> {
    let candidate = raw.trim().trim_start_matches('<').trim_end_matches('>').trim();

    if let Some(map) = try_parse_json_object(candidate) {
        return map;
    }

    // Embedded extraneous text before/after valid JSON: re-extract the
    // substring from the first `{` to the last `}` and reparse.
    if let (Some(start), Some(end)) = (candidate.find('{'), candidate.rfind('}')) {
        if start < end {
            if let Some(map) = try_parse_json_object(&candidate[start..=end]) {
                return map;
            }
        }
    }

    tracing::debug!(
        raw,
        "parse_degraded: tool-call params failed to parse as JSON, using empty map"
    );
    HashMap::new()
}

fn try_parse_json_object(s: &str) -> Option<HashMap<String, String>> {
    let value: serde_json::Value = serde_json::from_str(s).ok()?;
    let obj = value.as_object()?;
    let mut map = HashMap::with_capacity(obj.len());
    for (k, v) in obj {
        let sval = match v {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        map.insert(k.clone(), sval);
    }
    Some(map)
}

fn parse_alternate(text: &str, catalog_names: &[&str]) -> (Vec<ToolCall>, String) {
    let mut matches: Vec<(usize, usize, &str, String)> = Vec::new();

    for &name in catalog_names {
        let open = format!("<{name}>");
        let close = format!("</{name}>");
        let mut search_from = 0usize;
        while let Some(rel_start) = text[search_from..].find(&open) {
            let start = search_from + rel_start;
            let body_start = start + open.len();
            let Some(rel_end) = text[body_start..].find(&close) else {
                break;
            };
            let body_end = body_start + rel_end;
            let end = body_end + close.len();
            matches.push((start, end, name, text[body_start..body_end].to_string()));
            search_from = end;
        }
    }
    matches.sort_by_key(|m| m.0);

    let mut calls = Vec::new();
    let mut cleaned = String::new();
    let mut cursor = 0usize;
    for (start, end, name, body) in &matches {
        if *start < cursor {
            continue; // overlapping match from a different catalog name, skip
        }
        cleaned.push_str(&text[cursor..*start]);
        calls.push(ToolCall::new(*name, parse_alternate_body(body)));
        cursor = *end;
    }
    cleaned.push_str(&text[cursor..]);

    (calls, cleaned)
}

fn parse_alternate_body(body: &str) -> HashMap<String, String> {
    let trimmed = body.trim();

    if let Some(map) = try_parse_json_object(trimmed) {
        return map;
    }
    if let Some(map) = try_parse_kv_pairs(trimmed) {
        return map;
    }

    let mut map = HashMap::new();
    if !trimmed.is_empty() {
        map.insert("query".to_string(), trimmed.to_string());
    }
    map
}

/// Parse one-or-more `key="value"` pairs. Returns `None` if no such pair
/// is present so the caller can fall through to the bare-value case.
fn try_parse_kv_pairs(s: &str) -> Option<HashMap<String, String>> {
    if !s.contains("=\"") {
        return None;
    }

    let mut map = HashMap::new();
    let mut rest = s;
    loop {
        let rest_trimmed = rest.trim_start();
        let key_len = rest_trimmed
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(rest_trimmed.len());
        if key_len == 0 {
            break;
        }
        let key = &rest_trimmed[..key_len];
        let after_key = rest_trimmed[key_len..].trim_start();
        if !after_key.starts_with("=\"") {
            break;
        }
        let after_eq = &after_key[2..];
        let Some(end_quote) = after_eq.find('"') else {
            break;
        };
        map.insert(key.to_string(), after_eq[..end_quote].to_string());
        rest = &after_eq[end_quote + 1..];
    }

    if map.is_empty() {
        None
    } else {
        Some(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &[&str] = &["read_file", "search_files", "web_search"];

    #[test]
    fn canonical_round_trip() {
        let mut params = HashMap::new();
        params.insert("path".to_string(), "main.go".to_string());
        let call = ToolCall::new("read_file", params);

        let wire = format_tool_call(&call);
        let (parsed, cleaned) = parse_tool_calls(&wire, CATALOG);

        assert_eq!(parsed, vec![call]);
        assert!(cleaned.trim().is_empty());
    }

    #[test]
    fn tolerates_surrounding_whitespace_and_text() {
        let text = "Let me check.\n<tool>read_file</tool><params>  {\"path\": \"a.rs\"}  </params>\nDone.";
        let (calls, cleaned) = parse_tool_calls(text, CATALOG);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].params.get("path").unwrap(), "a.rs");
        assert!(cleaned.contains("Let me check."));
        assert!(cleaned.contains("Done."));
    }

    #[test]
    fn reextracts_json_from_extraneous_text() {
        let text = "<tool>search_files</tool><params>noise before {\"pattern\":\"*.md\"} noise after</params>";
        let (calls, _) = parse_tool_calls(text, CATALOG);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].params.get("pattern").unwrap(), "*.md");
    }

    #[test]
    fn unparseable_json_yields_empty_params_not_failure() {
        let text = "<tool>read_file</tool><params>not json at all</params>";
        let (calls, _) = parse_tool_calls(text, CATALOG);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "read_file");
        assert!(calls[0].params.is_empty());
    }

    #[test]
    fn multiple_calls_returned_in_source_order() {
        let text = "<tool>read_file</tool><params>{\"path\":\"a\"}</params><tool>read_file</tool><params>{\"path\":\"b\"}</params>";
        let (calls, _) = parse_tool_calls(text, CATALOG);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].params.get("path").unwrap(), "a");
        assert_eq!(calls[1].params.get("path").unwrap(), "b");
    }

    #[test]
    fn unclosed_tool_tag_terminates_canonical_parsing() {
        let text = "preamble <tool>read_file without closing tag";
        let (calls, cleaned) = parse_tool_calls(text, CATALOG);
        assert!(calls.is_empty());
        // falls through to alternate parsing, which also finds nothing
        assert!(cleaned.is_empty() || cleaned.contains("preamble"));
    }

    #[test]
    fn zero_canonical_matches_falls_back_to_alternate_json_object() {
        let text = "<search_files>{\"pattern\": \"*.md\"}</search_files>";
        let (calls, cleaned) = parse_tool_calls(text, CATALOG);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "search_files");
        assert_eq!(calls[0].params.get("pattern").unwrap(), "*.md");
        assert!(cleaned.is_empty());
    }

    #[test]
    fn alternate_syntax_key_value_pairs() {
        let text = "<read_file path=\"main.go\"></read_file>";
        let (calls, _) = parse_tool_calls(text, CATALOG);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].params.get("path").unwrap(), "main.go");
    }

    #[test]
    fn alternate_syntax_bare_value_becomes_query() {
        let text = "<web_search>rust async traits</web_search>";
        let (calls, _) = parse_tool_calls(text, CATALOG);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].params.get("query").unwrap(), "rust async traits");
    }

    #[test]
    fn alternate_names_outside_catalog_are_ignored() {
        let text = "<unknown_tool>body</unknown_tool>";
        let (calls, cleaned) = parse_tool_calls(text, CATALOG);
        assert!(calls.is_empty());
        assert_eq!(cleaned, text);
    }
}
