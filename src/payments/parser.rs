//! XML response parsing and classification.
//!
//! MWS replies with either an action-specific success payload or an error
//! payload shaped `<ErrorResponse><Error><Code/><Message/></Error>
//! <RequestId/></ErrorResponse>`. Both are parsed into a nested map before
//! classification; the root element is dropped and its children become the
//! top-level keys.

use crate::payments::error::{classify_api_error, PaymentError};
use crate::payments::models::{ApiResponse, ErrorInfo};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::{Map, Value};
use std::str;
use tracing::trace;

/// Classifies a non-retryable response: parses the body and either returns
/// the response data or the error the service reported.
pub fn classify(status: u16, body: &str) -> Result<ApiResponse, PaymentError> {
    let data = parse_document(body).map_err(|detail| PaymentError::ResponseFormat {
        status,
        detail,
    })?;

    if let Some(info) = extract_error(&data) {
        trace!("Service reported error code {}", info.code);
        return Err(classify_api_error(
            &info.code,
            &info.message,
            status,
            info.request_id,
        ));
    }

    Ok(ApiResponse { status, data })
}

/// One element currently being assembled.
struct Frame {
    name: String,
    children: Map<String, Value>,
    text: String,
}

/// Parses an XML document into a nested map. Text-only elements become
/// strings, elements with children become maps, and repeated sibling names
/// collect into arrays. Attributes are not carried over; MWS payment
/// payloads put everything in element content.
pub fn parse_document(xml: &str) -> Result<Map<String, Value>, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<Map<String, Value>> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                stack.push(Frame {
                    name: tag_name(e.name().as_ref())?,
                    children: Map::new(),
                    text: String::new(),
                });
            }
            Ok(Event::Empty(ref e)) => {
                let name = tag_name(e.name().as_ref())?;
                match stack.last_mut() {
                    Some(parent) => {
                        insert_child(&mut parent.children, name, Value::String(String::new()));
                    }
                    // Degenerate document: a single self-closing root
                    None => root = Some(Map::new()),
                }
            }
            Ok(Event::Text(ref t)) => {
                if let Some(frame) = stack.last_mut() {
                    let text = t.unescape().map_err(|e| e.to_string())?;
                    frame.text.push_str(&text);
                }
            }
            Ok(Event::CData(ref t)) => {
                if let Some(frame) = stack.last_mut() {
                    let text =
                        str::from_utf8(t).map_err(|_| "invalid UTF-8 in CDATA".to_string())?;
                    frame.text.push_str(text);
                }
            }
            Ok(Event::End(_)) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| "unbalanced closing tag".to_string())?;
                let value = if frame.children.is_empty() {
                    Value::String(frame.text)
                } else {
                    Value::Object(frame.children)
                };

                match stack.last_mut() {
                    Some(parent) => insert_child(&mut parent.children, frame.name, value),
                    None => {
                        // Document root closed: drop the element itself,
                        // keep its children as the top level.
                        root = Some(match value {
                            Value::Object(map) => map,
                            other => Map::from_iter([(frame.name, other)]),
                        });
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(format!(
                    "XML error at byte {}: {}",
                    reader.buffer_position(),
                    e
                ))
            }
        }
    }

    if !stack.is_empty() {
        return Err("unexpected end of document".to_string());
    }

    root.ok_or_else(|| "response body is not an XML document".to_string())
}

fn tag_name(raw: &[u8]) -> Result<String, String> {
    str::from_utf8(raw)
        .map(str::to_string)
        .map_err(|_| "invalid UTF-8 in tag name".to_string())
}

/// Inserts a child value; a second occurrence of the same tag name turns the
/// slot into an array, further occurrences append.
fn insert_child(children: &mut Map<String, Value>, name: String, value: Value) {
    match children.get_mut(&name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            children.insert(name, value);
        }
    }
}

/// Pulls `Error/Code`, `Error/Message`, and the optional top-level
/// `RequestId` out of a parsed body. An `Error` node with an empty or
/// missing `Code` does not count as an error.
fn extract_error(data: &Map<String, Value>) -> Option<ErrorInfo> {
    let error = data.get("Error")?.as_object()?;
    let code = error.get("Code")?.as_str()?;
    if code.is_empty() {
        return None;
    }

    let message = error
        .get("Message")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let request_id = data
        .get("RequestId")
        .and_then(Value::as_str)
        .map(String::from);

    Some(ErrorInfo {
        code: code.to_string(),
        message: message.to_string(),
        request_id,
    })
}
