//! Detection of serialized attachment lists
//!
//! A cell may hold a JSON array of attachment descriptors instead of a scalar.
//! The editor only needs to recognise these for display and to keep a blank
//! edit from wiping a non-empty list; uploads live elsewhere.

use serde::{Deserialize, Serialize};

use crate::{Result, TabulaError, Value};

/// Attachment identifiers arrive as either strings or numbers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttachmentId {
    Number(i64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentDescriptor {
    #[serde(default)]
    pub id: Option<AttachmentId>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    /// Anything else the store attached
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AttachmentDescriptor {
    pub fn is_image(&self) -> bool {
        self.mime_type
            .as_deref()
            .map(|m| m.starts_with("image/"))
            .unwrap_or(false)
    }

    /// Name for display, falling back to the last URL segment
    pub fn display_name(&self) -> String {
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        self.url
            .as_deref()
            .and_then(|u| u.rsplit('/').next())
            .unwrap_or("attachment")
            .to_string()
    }
}

/// Cheap shape check: a bracketed JSON array whose first element is an object.
pub fn looks_like_attachment_list(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.starts_with('[')
        && trimmed.ends_with(']')
        && trimmed[1..].trim_start().starts_with('{')
}

/// Parse a serialized attachment list.
pub fn parse_attachment_list(text: &str) -> Result<Vec<AttachmentDescriptor>> {
    serde_json::from_str(text.trim())
        .map_err(|e| TabulaError::Parse(format!("attachment list: {}", e)))
}

/// The attachments held by a cell value, if it holds any.
///
/// Malformed JSON degrades to `None` so the raw text is shown instead.
pub fn attachments_of(value: &Value) -> Option<Vec<AttachmentDescriptor>> {
    match value {
        Value::String(text) if looks_like_attachment_list(text) => {
            match parse_attachment_list(text) {
                Ok(list) => Some(list),
                Err(e) => {
                    tracing::warn!(error = %e, "cell looks like an attachment list but failed to parse");
                    None
                }
            }
        }
        Value::Json(json @ serde_json::Value::Array(items))
            if items.first().map(|i| i.is_object()).unwrap_or(false) =>
        {
            serde_json::from_value(json.clone()).ok()
        }
        _ => None,
    }
}

/// Whether a cell holds at least one attachment
pub fn has_attachments(value: &Value) -> bool {
    attachments_of(value)
        .map(|list| !list.is_empty())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[{"id": 7, "url": "https://cdn/x/photo.png", "name": "photo.png", "mimeType": "image/png", "size": 1024, "bucket": "b1"}]"#;

    #[test]
    fn parses_descriptor_fields_and_extras() {
        let list = parse_attachment_list(SAMPLE).unwrap();
        assert_eq!(list.len(), 1);
        let item = &list[0];
        assert_eq!(item.id, Some(AttachmentId::Number(7)));
        assert!(item.is_image());
        assert_eq!(item.size, Some(1024));
        assert_eq!(item.extra.get("bucket"), Some(&serde_json::json!("b1")));
    }

    #[test]
    fn string_ids_are_accepted() {
        let list = parse_attachment_list(r#"[{"id": "abc", "url": "u/file.pdf"}]"#).unwrap();
        assert_eq!(list[0].id, Some(AttachmentId::Text("abc".into())));
        assert_eq!(list[0].display_name(), "file.pdf");
    }

    #[test]
    fn malformed_json_is_a_parse_error_and_not_attachments() {
        let broken = r#"[{"id": 1, "url": }]"#;
        assert!(looks_like_attachment_list(broken));
        assert!(matches!(
            parse_attachment_list(broken),
            Err(TabulaError::Parse(_))
        ));
        assert!(!has_attachments(&Value::String(broken.into())));
    }

    #[test]
    fn scalars_are_not_attachments() {
        assert!(!has_attachments(&Value::String("hello".into())));
        assert!(!has_attachments(&Value::String("[1, 2]".into())));
        assert!(!has_attachments(&Value::String("[]".into())));
        assert!(has_attachments(&Value::String(SAMPLE.into())));
        assert!(has_attachments(&Value::Json(serde_json::json!([{"url": "x"}]))));
    }
}
