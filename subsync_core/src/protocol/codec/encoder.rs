//! Method call encoder for the XML-RPC envelope
//!
//! Calls are written straight into a reusable buffer. Authenticated calls
//! carry the session token as the first param and pack the remaining
//! arguments into a single array param.

use crate::protocol::codec::value::{RpcMember, RpcValue};
use crate::protocol::error::{ProtocolError, Result};
use bytes::{BufMut, Bytes, BytesMut};
use log::{debug, trace};
use quick_xml::escape::escape;
use std::fmt;

/// Initial capacity of the encode buffer
const INITIAL_CAPACITY: usize = 1024;

/// One call argument; named arguments are packed into a struct
#[derive(Debug, Clone, PartialEq)]
pub struct RpcArg {
    pub key: Option<String>,
    pub value: RpcValue,
    /// Masked when the call is logged
    pub sensitive: bool,
}

/// A remote method invocation
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub name: String,
    pub args: Vec<RpcArg>,
}

impl MethodCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Append a positional argument
    pub fn arg(mut self, value: impl Into<RpcValue>) -> Self {
        self.args.push(RpcArg {
            key: None,
            value: value.into(),
            sensitive: false,
        });
        self
    }

    /// Append a positional argument that must never be logged
    pub fn secret_arg(mut self, value: impl Into<RpcValue>) -> Self {
        self.args.push(RpcArg {
            key: None,
            value: value.into(),
            sensitive: true,
        });
        self
    }

    /// Append a named argument
    pub fn named(mut self, key: impl Into<String>, value: impl Into<RpcValue>) -> Self {
        self.args.push(RpcArg {
            key: Some(key.into()),
            value: value.into(),
            sensitive: false,
        });
        self
    }

    fn has_named_args(&self) -> bool {
        self.args.iter().any(|arg| arg.key.is_some())
    }
}

impl fmt::Display for MethodCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if let Some(key) = &arg.key {
                write!(f, "{key}=")?;
            }
            if arg.sensitive {
                write!(f, "***")?;
            } else {
                write!(f, "{:?}", arg.value.to_string())?;
            }
        }
        write!(f, ")")
    }
}

/// Encoder for XML-RPC method calls
pub struct Encoder {
    /// Buffer for encoding
    buffer: BytesMut,
}

impl Encoder {
    /// Create a new encoder
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Encode a call, with the session token when one is given
    pub fn encode(&mut self, call: &MethodCall, token: Option<&str>) -> Result<Bytes> {
        trace!("Encoding call: {call}");
        self.buffer.clear();

        if call.name.trim().is_empty() {
            debug!("Attempted to encode call without method name");
            return Err(ProtocolError::encoding("Empty method name"));
        }

        self.put_str("<methodCall><methodName>");
        self.put_escaped(&call.name);
        self.put_str("</methodName><params>");

        match token.filter(|token| !token.is_empty()) {
            Some(token) => {
                self.put_str("<param>");
                self.put_value(&RpcValue::String(token.to_string()))?;
                self.put_str("</param>");

                if !call.args.is_empty() {
                    self.put_str("<param><value><array><data>");
                    if call.has_named_args() {
                        let members = call
                            .args
                            .iter()
                            .map(|arg| match &arg.key {
                                Some(key) => Ok(RpcMember::new(key.clone(), arg.value.clone())),
                                None => Err(ProtocolError::encoding(format!(
                                    "Call {} mixes named and positional arguments",
                                    call.name
                                ))),
                            })
                            .collect::<Result<Vec<_>>>()?;
                        self.put_value(&RpcValue::Struct(members))?;
                    } else {
                        for arg in &call.args {
                            self.put_value(&arg.value)?;
                        }
                    }
                    self.put_str("</data></array></value></param>");
                }
            }
            None => {
                for arg in &call.args {
                    self.put_str("<param>");
                    self.put_value(&arg.value)?;
                    self.put_str("</param>");
                }
            }
        }

        self.put_str("</params></methodCall>\n");

        let result = self.buffer.split().freeze();
        debug!("Encoded {} as {} bytes", call.name, result.len());
        Ok(result)
    }

    /// Get the current buffer capacity
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    fn put_value(&mut self, value: &RpcValue) -> Result<()> {
        self.put_str("<value>");
        match value {
            RpcValue::String(s) => {
                self.put_str("<string>");
                self.put_escaped(s);
                self.put_str("</string>");
            }
            RpcValue::Int(n) => self.put_scalar("int", &n.to_string()),
            RpcValue::Double(n) => {
                if !n.is_finite() {
                    return Err(ProtocolError::encoding(format!(
                        "Double {n} has no XML-RPC representation"
                    )));
                }
                self.put_scalar("double", &n.to_string());
            }
            RpcValue::Boolean(b) => self.put_scalar("boolean", if *b { "1" } else { "0" }),
            RpcValue::Struct(members) => {
                self.put_str("<struct>");
                for member in members {
                    self.put_str("<member><name>");
                    self.put_escaped(&member.name);
                    self.put_str("</name>");
                    self.put_value(&member.value)?;
                    self.put_str("</member>");
                }
                self.put_str("</struct>");
            }
            RpcValue::Array(items) => {
                self.put_str("<array><data>");
                for item in items {
                    self.put_value(item)?;
                }
                self.put_str("</data></array>");
            }
        }
        self.put_str("</value>");
        Ok(())
    }

    fn put_scalar(&mut self, tag: &str, text: &str) {
        self.buffer.put_u8(b'<');
        self.put_str(tag);
        self.buffer.put_u8(b'>');
        self.put_str(text);
        self.put_str("</");
        self.put_str(tag);
        self.buffer.put_u8(b'>');
    }

    fn put_escaped(&mut self, text: &str) {
        let escaped = escape(text);
        self.buffer.put(escaped.as_bytes());
    }

    fn put_str(&mut self, text: &str) {
        self.buffer.put(text.as_bytes());
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn encode(call: &MethodCall, token: Option<&str>) -> String {
        let mut encoder = Encoder::new();
        let bytes = encoder.encode(call, token).unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_encode_without_token_sends_each_param() {
        let call = MethodCall::new("LogIn")
            .arg("user")
            .secret_arg("pass")
            .arg("en")
            .arg("TemporaryUserAgent");

        assert_eq!(
            encode(&call, None),
            "<methodCall><methodName>LogIn</methodName><params>\
             <param><value><string>user</string></value></param>\
             <param><value><string>pass</string></value></param>\
             <param><value><string>en</string></value></param>\
             <param><value><string>TemporaryUserAgent</string></value></param>\
             </params></methodCall>\n"
        );
    }

    #[test]
    fn test_encode_with_token_packs_named_args_into_struct() {
        let call = MethodCall::new("SearchSubtitles")
            .named("query", "Show")
            .named("sublanguageid", "eng")
            .named("season", 1u32)
            .named("episode", 2u32);

        assert_eq!(
            encode(&call, Some("tok")),
            "<methodCall><methodName>SearchSubtitles</methodName><params>\
             <param><value><string>tok</string></value></param>\
             <param><value><array><data><value><struct>\
             <member><name>query</name><value><string>Show</string></value></member>\
             <member><name>sublanguageid</name><value><string>eng</string></value></member>\
             <member><name>season</name><value><int>1</int></value></member>\
             <member><name>episode</name><value><int>2</int></value></member>\
             </struct></value></data></array></value></param>\
             </params></methodCall>\n"
        );
    }

    #[test]
    fn test_encode_with_token_packs_positional_args_into_array() {
        let call = MethodCall::new("DownloadSubtitles").arg("1951976245");

        assert_eq!(
            encode(&call, Some("tok")),
            "<methodCall><methodName>DownloadSubtitles</methodName><params>\
             <param><value><string>tok</string></value></param>\
             <param><value><array><data>\
             <value><string>1951976245</string></value>\
             </data></array></value></param>\
             </params></methodCall>\n"
        );
    }

    #[test]
    fn test_encode_token_only_call() {
        let xml = encode(&MethodCall::new("NoOperation"), Some("tok"));
        assert_eq!(
            xml,
            "<methodCall><methodName>NoOperation</methodName><params>\
             <param><value><string>tok</string></value></param>\
             </params></methodCall>\n"
        );
    }

    #[test]
    fn test_empty_token_is_treated_as_anonymous() {
        let call = MethodCall::new("LogOut");
        assert_eq!(
            encode(&call, Some("")),
            "<methodCall><methodName>LogOut</methodName><params></params></methodCall>\n"
        );
    }

    #[test]
    fn test_encode_escapes_markup() {
        let call = MethodCall::new("SearchSubtitles").named("query", "Tom & Jerry <1940>");
        let xml = encode(&call, Some("tok"));
        assert!(xml.contains("<string>Tom &amp; Jerry &lt;1940&gt;</string>"));
    }

    #[test]
    fn test_encode_rejects_mixed_args_with_token() {
        let call = MethodCall::new("SearchSubtitles").named("query", "x").arg("y");
        let mut encoder = Encoder::new();
        let err = encoder.encode(&call, Some("tok")).unwrap_err();
        assert!(matches!(err, ProtocolError::Encoding { .. }));
    }

    #[test]
    fn test_encode_rejects_empty_method_and_nan() {
        let mut encoder = Encoder::new();
        assert!(encoder.encode(&MethodCall::new(" "), None).is_err());

        let call = MethodCall::new("Ping").arg(f64::NAN);
        assert!(matches!(
            encoder.encode(&call, None).unwrap_err(),
            ProtocolError::Encoding { .. }
        ));
    }

    #[test]
    fn test_buffer_reuse() {
        let mut encoder = Encoder::new();
        let first = encoder.encode(&MethodCall::new("A"), None).unwrap();
        let second = encoder.encode(&MethodCall::new("B"), None).unwrap();
        assert_ne!(first, second);
        assert!(second.starts_with(b"<methodCall><methodName>B<"));
    }

    #[test]
    fn test_display_masks_secrets() {
        let call = MethodCall::new("LogIn")
            .arg("alice")
            .secret_arg("hunter2")
            .arg("en");
        let shown = call.to_string();
        assert_eq!(shown, "LogIn(\"alice\", ***, \"en\")");
        assert!(!shown.contains("hunter2"));
    }

    proptest! {
        #[test]
        fn prop_escaped_strings_never_leak_markup(text in "[a-zA-Z0-9 <>&\"'.]{0,40}") {
            let call = MethodCall::new("SearchSubtitles").named("query", text.clone());
            let xml = encode(&call, Some("tok"));
            let start = xml.find("<string>").unwrap();
            let inner_start = xml[start + 8..].find("<string>").unwrap() + start + 16;
            let inner_end = xml[inner_start..].find("</string>").unwrap() + inner_start;
            let inner = &xml[inner_start..inner_end];
            prop_assert!(!inner.contains('<'));
            prop_assert!(!inner.contains('>'));
        }
    }
}
