//! Free functions implementing the "sensitive edge cases" of spec.md
//! §4.3 — kept separate from the dispatcher's match arms because each
//! one encodes an ordering or precedence rule that is easy to get
//! backwards, and worth testing in isolation.

use serde_json::{json, Value};

use crate::error::{GatewayError, GatewayResult};
use crate::services::types::ScheduleInputPayload;

/// Build the response-data payload for `resolve_human_input`.
///
/// The caller's `data` is spread first, then the server-derived status
/// overrides whatever `data.status` said. Reversing this order would let
/// a caller claim an approval was a rejection (or vice versa) by setting
/// `data.status` directly — a security regression (spec.md §4.3).
pub fn resolve_human_input_payload(action: &str, data: Option<Value>) -> GatewayResult<Value> {
    let status = match action {
        "approve" => "approved",
        "reject" => "rejected",
        other => {
            return Err(GatewayError::Validation(format!(
                "resolve_human_input: unknown action '{other}', expected 'approve' or 'reject'"
            )))
        }
    };

    let mut payload = match data {
        Some(Value::Object(map)) => Value::Object(map),
        Some(_) => {
            return Err(GatewayError::Validation(
                "resolve_human_input: 'data' must be an object".to_string(),
            ))
        }
        None => json!({}),
    };

    payload
        .as_object_mut()
        .expect("payload is always constructed as an object above")
        .insert("status".to_string(), Value::String(status.to_string()));

    Ok(payload)
}

/// What `view_artifact` returns to the caller once a byte range has been
/// sliced out of the stored blob.
#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactView {
    Text { content: String, has_more: bool },
    Binary { size: usize, mime_type: String },
}

const TEXT_MIME_PREFIXES: &[&str] = &["text/", "application/json", "application/xml", "application/yaml"];

fn looks_like_text(mime_type: &str, window: &[u8]) -> bool {
    if TEXT_MIME_PREFIXES.iter().any(|p| mime_type.starts_with(p)) {
        return true;
    }
    let probe = &window[..window.len().min(512)];
    !probe.contains(&0u8)
}

/// Slice `[offset, offset+limit)` out of `buffer`, deciding text vs
/// binary per spec.md §4.3's MIME-prefix-or-no-null-byte rule.
pub fn view_artifact_window(buffer: &[u8], mime_type: &str, offset: usize, limit: usize) -> ArtifactView {
    let start = offset.min(buffer.len());
    let end = (start + limit).min(buffer.len());
    let window = &buffer[start..end];

    if looks_like_text(mime_type, window) {
        let content = String::from_utf8_lossy(window).into_owned();
        ArtifactView::Text {
            content,
            has_more: end < buffer.len(),
        }
    } else {
        ArtifactView::Binary {
            size: buffer.len(),
            mime_type: mime_type.to_string(),
        }
    }
}

/// Translate the flat `inputs` mapping a tool caller provides into the
/// nested `{ runtimeInputs, nodeOverrides }` shape the schedules service
/// actually accepts. The flat form must never reach the service
/// directly (spec.md §4.3).
pub fn schedule_input_payload(inputs: Option<Value>) -> ScheduleInputPayload {
    let inputs = inputs.unwrap_or_else(|| json!({}));
    ScheduleInputPayload {
        runtime_inputs: inputs,
        node_overrides: json!({}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_human_input_server_status_overrides_caller_supplied_status() {
        let data = json!({"status": "approved", "comment": "looks fine"});
        let payload = resolve_human_input_payload("reject", Some(data)).unwrap();
        assert_eq!(payload["status"], "rejected");
        assert_eq!(payload["comment"], "looks fine");
    }

    #[test]
    fn resolve_human_input_rejects_unknown_action() {
        let err = resolve_human_input_payload("maybe", None).unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
    }

    #[test]
    fn text_mime_type_returns_text_view() {
        let buffer = b"hello world".to_vec();
        let view = view_artifact_window(&buffer, "text/plain", 0, 5);
        assert_eq!(
            view,
            ArtifactView::Text {
                content: "hello".to_string(),
                has_more: true,
            }
        );
    }

    #[test]
    fn binary_content_without_text_mime_returns_metadata_only() {
        let mut buffer = vec![1u8, 2, 3, 0, 4, 5];
        buffer.extend(std::iter::repeat(0xffu8).take(10));
        let view = view_artifact_window(&buffer, "application/octet-stream", 0, buffer.len());
        assert_eq!(
            view,
            ArtifactView::Binary {
                size: buffer.len(),
                mime_type: "application/octet-stream".to_string(),
            }
        );
    }

    #[test]
    fn unknown_mime_without_null_byte_is_treated_as_text() {
        let buffer = b"plain ascii, no nulls here".to_vec();
        let view = view_artifact_window(&buffer, "application/octet-stream", 0, buffer.len());
        assert!(matches!(view, ArtifactView::Text { .. }));
    }

    #[test]
    fn flat_inputs_are_nested_under_runtime_inputs() {
        let payload = schedule_input_payload(Some(json!({"x": 1})));
        assert_eq!(payload.runtime_inputs, json!({"x": 1}));
        assert_eq!(payload.node_overrides, json!({}));
    }
}
