use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{ClientError, Result};

/// Parse newline-delimited JSON, one value per non-blank line.
///
/// Fails on the first malformed line, reporting its 1-based line number.
pub fn parse_jsonl<T: DeserializeOwned>(payload: &str) -> Result<Vec<T>> {
    payload
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line.trim()).map_err(|source| ClientError::Jsonl {
                line: idx + 1,
                source,
            })
        })
        .collect()
}

/// Serialize values as newline-delimited JSON
pub fn to_jsonl<T: Serialize>(values: &[T]) -> Result<String> {
    let lines = values
        .iter()
        .map(serde_json::to_string)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_parse_skips_blank_lines() {
        let payload = "{\"title\":\"Dune\"}\n\n  \r\n{\"title\":\"Emma\"}\n";
        let docs: Vec<Value> = parse_jsonl(payload).unwrap();
        assert_eq!(docs, vec![json!({"title": "Dune"}), json!({"title": "Emma"})]);
    }

    #[test]
    fn test_parse_reports_bad_line() {
        let payload = "{\"title\":\"Dune\"}\n\n{\"title\":\n";
        let err = parse_jsonl::<Value>(payload).unwrap_err();
        match err {
            ClientError::Jsonl { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_empty_payload() {
        assert!(parse_jsonl::<Value>("").unwrap().is_empty());
        assert_eq!(to_jsonl::<Value>(&[]).unwrap(), "");
    }

    #[test]
    fn test_to_jsonl_one_line_per_value() {
        let body = to_jsonl(&[json!({"a": 1}), json!({"b": "x\ny"})]).unwrap();
        assert_eq!(body, "{\"a\":1}\n{\"b\":\"x\\ny\"}");
    }
}
