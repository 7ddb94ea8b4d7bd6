//! XML-RPC encoding and decoding
//!
//! Requests and responses share one tagged value tree ([`RpcValue`]).
//! The encoder writes method calls into a reusable buffer; the decoder
//! parses method responses and turns faults into errors.

mod decoder;
mod encoder;
mod value;

pub use decoder::{Decoder, MAX_RESPONSE_SIZE, MethodResponse};
pub use encoder::{Encoder, MethodCall, RpcArg};
pub use value::{RpcMember, RpcValue};

use crate::protocol::error::Result;
use bytes::Bytes;
use log::{debug, trace};

/// Codec for XML-RPC method calls and responses
pub struct Codec {
    encoder: Encoder,
    decoder: Decoder,
}

impl Codec {
    /// Create a new codec instance
    pub fn new() -> Self {
        Self {
            encoder: Encoder::new(),
            decoder: Decoder::new(),
        }
    }

    /// Encode a call, packing arguments behind the token when one is given
    pub fn encode(&mut self, call: &MethodCall, token: Option<&str>) -> Result<Bytes> {
        debug!("Codec encoding {}", call.name);
        self.encoder.encode(call, token)
    }

    /// Decode a response body
    pub fn decode(&self, data: &[u8]) -> Result<MethodResponse> {
        debug!("Codec decoding {} bytes", data.len());
        let response = self.decoder.decode(data)?;
        trace!("Decoded params: {:?}", response.params);
        Ok(response)
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_encode_then_decode_reply() {
        let mut codec = Codec::new();

        let call = MethodCall::new("NoOperation");
        let encoded = codec.encode(&call, Some("tok")).unwrap();
        assert!(encoded.starts_with(b"<methodCall>"));

        let reply = b"<methodResponse><params><param><value><struct>\
            <member><name>status</name><value><string>200 OK</string></value></member>\
            </struct></value></param></params></methodResponse>";
        let decoded = codec.decode(reply).unwrap();
        assert_eq!(decoded.status().map(|s| s.code), Some(200));
    }
}
