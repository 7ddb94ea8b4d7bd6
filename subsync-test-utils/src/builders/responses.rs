//! XML-RPC response bodies as the subtitle service sends them

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use subsync_core::protocol::{HttpReply, RpcMember, RpcValue};

/// One row of a `SearchSubtitles` result
#[derive(Debug, Clone)]
pub struct SubtitleEntry {
    pub id: String,
    pub file_id: String,
    pub file_name: String,
    pub release_name: String,
    pub language: String,
}

impl SubtitleEntry {
    /// Entry with ids derived from `file_id` and English language
    pub fn new(file_id: &str, release_name: &str) -> Self {
        Self {
            id: format!("1{file_id}"),
            file_id: file_id.to_string(),
            file_name: format!("{release_name}.srt"),
            release_name: release_name.to_string(),
            language: "eng".to_string(),
        }
    }

    fn to_value(&self) -> RpcValue {
        RpcValue::Struct(vec![
            RpcMember::new("IDSubtitle", self.id.as_str()),
            RpcMember::new("IDSubtitleFile", self.file_id.as_str()),
            RpcMember::new("SubFileName", self.file_name.as_str()),
            RpcMember::new("MovieReleaseName", self.release_name.as_str()),
            RpcMember::new("SubLanguageID", self.language.as_str()),
            RpcMember::new("SubFormat", "srt"),
        ])
    }
}

/// Serialize `params` into a `methodResponse` document
pub fn method_response(params: &[RpcValue]) -> String {
    let mut xml =
        String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<methodResponse><params>");
    for param in params {
        xml.push_str("<param>");
        write_value(&mut xml, param);
        xml.push_str("</param>");
    }
    xml.push_str("</params></methodResponse>");
    xml
}

/// A fault document
pub fn fault(code: i64, message: &str) -> String {
    let mut xml = String::from("<?xml version=\"1.0\"?>\n<methodResponse><fault>");
    write_value(
        &mut xml,
        &RpcValue::Struct(vec![
            RpcMember::new("faultCode", code),
            RpcMember::new("faultString", message),
        ]),
    );
    xml.push_str("</fault></methodResponse>");
    xml
}

/// Struct with only a status line and timing
pub fn status(status: &str) -> String {
    method_response(&[RpcValue::Struct(vec![
        RpcMember::new("status", status),
        RpcMember::new("seconds", 0.004),
    ])])
}

/// Successful `LogIn`
pub fn login(token: &str) -> String {
    method_response(&[RpcValue::Struct(vec![
        RpcMember::new("token", token),
        RpcMember::new("status", "200 OK"),
        RpcMember::new("seconds", 0.006),
    ])])
}

/// `SearchSubtitles` result; no entries answers `data = false`
pub fn search(entries: &[SubtitleEntry]) -> String {
    let data = if entries.is_empty() {
        RpcValue::Boolean(false)
    } else {
        RpcValue::Array(entries.iter().map(SubtitleEntry::to_value).collect())
    };

    method_response(&[RpcValue::Struct(vec![
        RpcMember::new("status", "200 OK"),
        RpcMember { name: "data".to_string(), value: data },
        RpcMember::new("seconds", 0.15),
    ])])
}

/// `DownloadSubtitles` result carrying `content` gzipped and base64 encoded
pub fn download(file_id: &str, content: &[u8]) -> String {
    method_response(&[RpcValue::Struct(vec![
        RpcMember::new("status", "200 OK"),
        RpcMember {
            name: "data".to_string(),
            value: RpcValue::Array(vec![RpcValue::Struct(vec![
                RpcMember::new("idsubtitlefile", file_id),
                RpcMember::new("data", encode_payload(content)),
            ])]),
        },
        RpcMember::new("seconds", 0.05),
    ])])
}

/// Gzip then base64, as the service encodes subtitle files
pub fn encode_payload(content: &[u8]) -> String {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(content)
        .expect("writing to a Vec cannot fail");
    let compressed = encoder.finish().expect("writing to a Vec cannot fail");
    STANDARD.encode(compressed)
}

/// Wrap a document in a 200 reply
pub fn reply(body: String) -> HttpReply {
    HttpReply::ok(body)
}

fn write_value(xml: &mut String, value: &RpcValue) {
    xml.push_str("<value>");
    match value {
        RpcValue::String(s) => {
            xml.push_str("<string>");
            xml.push_str(&escape(s));
            xml.push_str("</string>");
        }
        RpcValue::Int(i) => xml.push_str(&format!("<int>{i}</int>")),
        RpcValue::Double(d) => xml.push_str(&format!("<double>{d}</double>")),
        RpcValue::Boolean(b) => xml.push_str(&format!("<boolean>{}</boolean>", u8::from(*b))),
        RpcValue::Struct(members) => {
            xml.push_str("<struct>");
            for member in members {
                xml.push_str("<member><name>");
                xml.push_str(&escape(&member.name));
                xml.push_str("</name>");
                write_value(xml, &member.value);
                xml.push_str("</member>");
            }
            xml.push_str("</struct>");
        }
        RpcValue::Array(items) => {
            xml.push_str("<array><data>");
            for item in items {
                write_value(xml, item);
            }
            xml.push_str("</data></array>");
        }
    }
    xml.push_str("</value>");
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use subsync_core::protocol::codec::Decoder;

    #[test]
    fn test_login_response_decodes() {
        let response = Decoder::new().decode(login("tok").as_bytes()).unwrap();
        assert_eq!(response.find("token").and_then(RpcValue::as_str), Some("tok"));
        assert!(response.status().unwrap().is_success());
    }

    #[test]
    fn test_empty_search_is_false() {
        let response = Decoder::new().decode(search(&[]).as_bytes()).unwrap();
        assert_eq!(response.find("data"), Some(&RpcValue::Boolean(false)));
    }

    #[test]
    fn test_fault_decodes_to_error() {
        assert!(Decoder::new().decode(fault(4, "Too many").as_bytes()).is_err());
    }
}
