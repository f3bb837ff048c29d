//! Text handler: line/word statistics, a short summary and JSON structure

use super::{has_extension, read_host, Extracted, MetadataHandler};
use crate::error::Result;
use crate::segment::Payload;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use tracing::warn;

const EXTENSIONS: &[&str] = &["txt", "md", "rst", "log", "csv", "json", "xml", "html"];
const SUMMARY_LINES: usize = 5;

#[derive(Debug, Clone, Copy, Default)]
pub struct TextHandler;

#[derive(Debug, Serialize)]
struct TextStats {
    line_count: usize,
    word_count: usize,
    char_count: usize,
    encoding: &'static str,
}

#[derive(Debug, Serialize)]
struct JsonSchema {
    #[serde(rename = "type")]
    kind: &'static str,
    keys: Option<Vec<String>>,
    length: Option<usize>,
}

impl MetadataHandler for TextHandler {
    fn name(&self) -> &'static str {
        "TextHandler"
    }

    fn can_handle(&self, path: &Path) -> bool {
        has_extension(path, EXTENSIONS)
    }

    fn extract_metadata(&self, path: &Path) -> Result<Extracted> {
        let raw = read_host(path)?;
        let mut extracted = Extracted::new();

        let content = match String::from_utf8(raw) {
            Ok(content) => content,
            Err(_) => {
                warn!("{:?} is not valid UTF-8", path);
                extracted.insert(
                    "extraction_error".to_string(),
                    Payload::from("file is not valid UTF-8 text"),
                );
                return Ok(extracted);
            }
        };

        let lines: Vec<&str> = content.split('\n').collect();
        let stats = TextStats {
            line_count: lines.len(),
            word_count: content.split_whitespace().count(),
            char_count: content.chars().count(),
            encoding: "utf-8",
        };
        extracted.insert(
            "text_stats".to_string(),
            Payload::Text(serde_json::to_string(&stats)?),
        );

        let summary = lines
            .iter()
            .take(SUMMARY_LINES)
            .copied()
            .collect::<Vec<_>>()
            .join("\n");
        extracted.insert("summary".to_string(), Payload::Text(summary));

        if has_extension(path, &["json"]) {
            match serde_json::from_str::<Value>(&content) {
                Ok(value) => {
                    extracted.insert(
                        "json_schema".to_string(),
                        Payload::Text(serde_json::to_string(&describe_json(&value))?),
                    );
                }
                Err(e) => {
                    extracted.insert("json_error".to_string(), Payload::Text(e.to_string()));
                }
            }
        }

        Ok(extracted)
    }
}

fn describe_json(value: &Value) -> JsonSchema {
    match value {
        Value::Object(map) => JsonSchema {
            kind: "object",
            keys: Some(map.keys().cloned().collect()),
            length: Some(map.len()),
        },
        Value::Array(items) => JsonSchema {
            kind: "array",
            keys: None,
            length: Some(items.len()),
        },
        Value::String(_) => JsonSchema {
            kind: "string",
            keys: None,
            length: None,
        },
        Value::Number(_) => JsonSchema {
            kind: "number",
            keys: None,
            length: None,
        },
        Value::Bool(_) => JsonSchema {
            kind: "boolean",
            keys: None,
            length: None,
        },
        Value::Null => JsonSchema {
            kind: "null",
            keys: None,
            length: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn extract(name: &str, content: &[u8]) -> Extracted {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        TextHandler.extract_metadata(&path).unwrap()
    }

    fn json_of(extracted: &Extracted, key: &str) -> Value {
        match extracted.get(key) {
            Some(Payload::Text(text)) => serde_json::from_str(text).unwrap(),
            other => panic!("expected text for {}, got {:?}", key, other),
        }
    }

    #[test]
    fn test_stats_and_summary() {
        let extracted = extract("notes.txt", b"one two\nthree\nfour\nfive\nsix\nseven");

        let stats = json_of(&extracted, "text_stats");
        assert_eq!(stats["line_count"], 6);
        assert_eq!(stats["word_count"], 7);
        assert_eq!(stats["encoding"], "utf-8");

        assert_eq!(
            extracted.get("summary"),
            Some(&Payload::from("one two\nthree\nfour\nfive\nsix"))
        );
        assert!(!extracted.contains_key("json_schema"));
    }

    #[test]
    fn test_json_schema() {
        let extracted = extract("data.json", br#"{"name": "x", "tags": [1, 2]}"#);
        let schema = json_of(&extracted, "json_schema");
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["length"], 2);
        assert_eq!(schema["keys"][0], "name");
    }

    #[test]
    fn test_json_error() {
        let extracted = extract("broken.json", b"{not json");
        assert!(extracted.contains_key("json_error"));
        assert!(!extracted.contains_key("json_schema"));
    }

    #[test]
    fn test_non_utf8() {
        let extracted = extract("binary.txt", &[0xFF, 0xFE, 0x00]);
        assert!(extracted.contains_key("extraction_error"));
    }
}
