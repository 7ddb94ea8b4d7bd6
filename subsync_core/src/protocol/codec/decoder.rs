//! Method response decoder
//!
//! The response document is first read into a small element tree and then
//! mapped onto [`RpcValue`]s, so a malformed document is reported as a
//! [`ProtocolError`] instead of surfacing half-parsed values.

use crate::protocol::codec::value::{RpcMember, RpcValue};
use crate::protocol::error::{ProtocolError, Result, StatusLine};
use log::{debug, trace, warn};
use quick_xml::events::Event;
use quick_xml::reader::Reader;

/// Largest response body accepted (base64 subtitles are well below this)
pub const MAX_RESPONSE_SIZE: usize = 16 * 1024 * 1024;

/// Deepest element nesting accepted; the value tree is walked recursively
pub const MAX_NESTING_DEPTH: usize = 64;

/// Parsed `methodResponse`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MethodResponse {
    pub params: Vec<RpcValue>,
}

impl MethodResponse {
    /// Find a member by name across all params, case-insensitively
    pub fn find(&self, name: &str) -> Option<&RpcValue> {
        self.params.iter().find_map(|param| param.find(name))
    }

    /// First param, which carries the whole result for this service
    pub fn first(&self) -> Option<&RpcValue> {
        self.params.first()
    }

    /// The `status` member, if it parses as a status line
    pub fn status(&self) -> Option<StatusLine> {
        self.find("status")
            .and_then(RpcValue::as_str)
            .and_then(StatusLine::parse)
    }
}

#[derive(Debug, Default)]
struct Element {
    name: String,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.name == name)
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// Text of this element and all its descendants, in document order
    fn text_content(&self) -> String {
        let mut out = self.text.clone();
        for child in &self.children {
            out.push_str(&child.text_content());
        }
        out
    }
}

/// Decoder for XML-RPC method responses
pub struct Decoder {
    max_size: usize,
}

impl Decoder {
    /// Create a new decoder
    pub fn new() -> Self {
        Self {
            max_size: MAX_RESPONSE_SIZE,
        }
    }

    /// Create a decoder with a custom body size limit
    pub fn with_max_size(max_size: usize) -> Self {
        Self { max_size }
    }

    /// Decode a response body
    pub fn decode(&self, data: &[u8]) -> Result<MethodResponse> {
        trace!("Decoder::decode called with {} bytes", data.len());

        if data.len() > self.max_size {
            warn!(
                "Response too large: {} bytes (max: {})",
                data.len(),
                self.max_size
            );
            return Err(ProtocolError::decoding(format!(
                "Response of {} bytes exceeds limit of {} bytes",
                data.len(),
                self.max_size
            )));
        }

        let text = std::str::from_utf8(data)
            .map_err(|e| ProtocolError::decoding(format!("Invalid UTF-8: {e}")))?;
        let root = parse_document(text)?;

        if root.name != "methodResponse" {
            return Err(ProtocolError::invalid_response(
                "methodResponse",
                root.name.clone(),
            ));
        }

        if let Some(fault) = root.child("fault") {
            let value = fault
                .child("value")
                .ok_or_else(|| ProtocolError::missing_field("fault value"))?;
            let value = parse_value(value)?;
            let code = value.find("faultCode").and_then(RpcValue::as_int).unwrap_or(0);
            let message = value
                .find("faultString")
                .map(ToString::to_string)
                .unwrap_or_default();
            debug!("Server returned fault {code}: {message}");
            return Err(ProtocolError::server_fault(code, message));
        }

        let params = root
            .child("params")
            .ok_or_else(|| ProtocolError::missing_field("params"))?;

        let mut response = MethodResponse::default();
        for param in params.children_named("param") {
            let value = param
                .child("value")
                .ok_or_else(|| ProtocolError::missing_field("param value"))?;
            response.params.push(parse_value(value)?);
        }

        debug!("Decoded response with {} params", response.params.len());
        Ok(response)
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_document(text: &str) -> Result<Element> {
    let mut reader = Reader::from_str(text);
    // Sentinel holding the document element
    let mut stack = vec![Element::default()];

    loop {
        let event = reader.read_event().map_err(|e| {
            ProtocolError::decoding(format!(
                "Malformed XML at position {}: {e}",
                reader.buffer_position()
            ))
        })?;

        match event {
            Event::Start(start) => {
                // The sentinel is not an element
                if stack.len() > MAX_NESTING_DEPTH {
                    return Err(ProtocolError::decoding("Response nested too deeply"));
                }
                let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
                stack.push(Element {
                    name,
                    ..Default::default()
                });
            }
            Event::Empty(empty) => {
                let name = String::from_utf8_lossy(empty.local_name().as_ref()).into_owned();
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(Element {
                        name,
                        ..Default::default()
                    });
                }
            }
            Event::End(_) => {
                if stack.len() < 2 {
                    return Err(ProtocolError::decoding("Unbalanced closing tag"));
                }
                if let (Some(element), Some(parent)) = (stack.pop(), stack.last_mut()) {
                    parent.children.push(element);
                }
            }
            Event::Text(content) => {
                let unescaped = content
                    .unescape()
                    .map_err(|e| ProtocolError::decoding(format!("Bad entity: {e}")))?;
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&unescaped);
                }
            }
            Event::CData(content) => {
                let raw = String::from_utf8_lossy(&content).into_owned();
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&raw);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if stack.len() != 1 {
        return Err(ProtocolError::decoding("Unexpected end of document"));
    }

    stack
        .pop()
        .and_then(|sentinel| sentinel.children.into_iter().next())
        .ok_or_else(|| ProtocolError::decoding("Empty document"))
}

fn parse_value(value: &Element) -> Result<RpcValue> {
    for typed in &value.children {
        match typed.name.as_str() {
            "string" => return Ok(RpcValue::String(typed.text_content())),
            "int" | "i4" => {
                let text = typed.text_content();
                return text
                    .trim()
                    .parse()
                    .map(RpcValue::Int)
                    .map_err(|_| ProtocolError::decoding(format!("Invalid int '{text}'")));
            }
            "double" => {
                let text = typed.text_content();
                return text
                    .trim()
                    .parse()
                    .map(RpcValue::Double)
                    .map_err(|_| ProtocolError::decoding(format!("Invalid double '{text}'")));
            }
            "boolean" => {
                let text = typed.text_content();
                return match text.trim() {
                    "1" | "true" => Ok(RpcValue::Boolean(true)),
                    "0" | "false" => Ok(RpcValue::Boolean(false)),
                    other => Err(ProtocolError::decoding(format!("Invalid boolean '{other}'"))),
                };
            }
            "struct" => return parse_struct(typed),
            "array" => return parse_array(typed),
            _ => {}
        }
    }

    // Untyped values and unknown shapes are read as strings
    Ok(RpcValue::String(value.text_content()))
}

fn parse_struct(element: &Element) -> Result<RpcValue> {
    let mut members = Vec::new();
    for member in element.children_named("member") {
        let name = member
            .child("name")
            .map(Element::text_content)
            .ok_or_else(|| ProtocolError::missing_field("member name"))?;
        let value = member
            .child("value")
            .ok_or_else(|| ProtocolError::missing_field("member value"))?;
        members.push(RpcMember {
            name,
            value: parse_value(value)?,
        });
    }
    Ok(RpcValue::Struct(members))
}

fn parse_array(element: &Element) -> Result<RpcValue> {
    let data = element
        .child("data")
        .ok_or_else(|| ProtocolError::missing_field("array data"))?;
    data.children_named("value")
        .map(parse_value)
        .collect::<Result<Vec<_>>>()
        .map(RpcValue::Array)
}
