//! Scripted XML-RPC transport

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use subsync_core::protocol::{HttpReply, ProtocolError, Result, RpcTransport};

/// One request seen by [`MockTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub url: String,
    pub method: String,
    pub body: String,
}

#[derive(Debug, Clone)]
enum Scripted {
    Reply(HttpReply),
    TransportError,
}

#[derive(Default)]
struct Script {
    queued: HashMap<String, VecDeque<Scripted>>,
    fallback: HashMap<String, Scripted>,
}

/// Transport answering per method name
///
/// Queued replies for a method are used first, then its `always` reply.
/// A method with neither answers with a transport error.
#[derive(Default)]
pub struct MockTransport {
    script: Mutex<Script>,
    requests: Mutex<Vec<RecordedRequest>>,
    delays: Mutex<HashMap<String, Duration>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the next `method` call with `reply`
    pub fn reply(&self, method: &str, reply: HttpReply) -> &Self {
        self.push(method, Scripted::Reply(reply))
    }

    /// Fail the next `method` call at the connection level
    pub fn fail(&self, method: &str) -> &Self {
        self.push(method, Scripted::TransportError)
    }

    /// Answer every unscripted `method` call with `reply`
    pub fn always(&self, method: &str, reply: HttpReply) -> &Self {
        self.script
            .lock()
            .expect("script lock poisoned")
            .fallback
            .insert(method.to_string(), Scripted::Reply(reply));
        self
    }

    /// Delay every `method` call
    pub fn delay(&self, method: &str, delay: Duration) -> &Self {
        self.delays
            .lock()
            .expect("delay lock poisoned")
            .insert(method.to_string(), delay);
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("request lock poisoned").clone()
    }

    /// Number of calls made to `method`
    pub fn count(&self, method: &str) -> usize {
        self.requests
            .lock()
            .expect("request lock poisoned")
            .iter()
            .filter(|request| request.method == method)
            .count()
    }

    /// Requests made to `method`, in order
    pub fn requests_for(&self, method: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.method == method)
            .collect()
    }

    fn push(&self, method: &str, scripted: Scripted) -> &Self {
        self.script
            .lock()
            .expect("script lock poisoned")
            .queued
            .entry(method.to_string())
            .or_default()
            .push_back(scripted);
        self
    }

    fn next(&self, method: &str) -> Option<Scripted> {
        let mut script = self.script.lock().expect("script lock poisoned");
        if let Some(scripted) = script.queued.get_mut(method).and_then(VecDeque::pop_front) {
            return Some(scripted);
        }
        script.fallback.get(method).cloned()
    }
}

fn method_name(body: &str) -> String {
    body.split_once("<methodName>")
        .and_then(|(_, rest)| rest.split_once("</methodName>"))
        .map(|(name, _)| name.to_string())
        .unwrap_or_default()
}

#[async_trait]
impl RpcTransport for MockTransport {
    async fn post(&self, url: &str, body: Bytes) -> Result<HttpReply> {
        let body = String::from_utf8_lossy(&body).into_owned();
        let method = method_name(&body);

        self.requests
            .lock()
            .expect("request lock poisoned")
            .push(RecordedRequest {
                url: url.to_string(),
                method: method.clone(),
                body,
            });

        let delay = self
            .delays
            .lock()
            .expect("delay lock poisoned")
            .get(&method)
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.next(&method) {
            Some(Scripted::Reply(reply)) => Ok(reply),
            Some(Scripted::TransportError) => {
                Err(ProtocolError::transport(format!("scripted failure for {method}")))
            }
            None => Err(ProtocolError::transport(format!("no reply scripted for {method}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_name() {
        assert_eq!(
            method_name("<methodCall><methodName>LogIn</methodName><params/></methodCall>"),
            "LogIn"
        );
        assert_eq!(method_name("garbage"), "");
    }

    #[tokio::test]
    async fn test_queued_then_fallback() {
        let transport = MockTransport::new();
        transport
            .reply("NoOperation", HttpReply::ok("first"))
            .always("NoOperation", HttpReply::ok("again"));

        let body =
            Bytes::from_static(b"<methodCall><methodName>NoOperation</methodName></methodCall>");
        let first = transport.post("u", body.clone()).await.unwrap();
        let second = transport.post("u", body.clone()).await.unwrap();
        assert_eq!(first.body, Bytes::from_static(b"first"));
        assert_eq!(second.body, Bytes::from_static(b"again"));
        assert_eq!(transport.count("NoOperation"), 2);

        let other = Bytes::from_static(b"<methodCall><methodName>LogOut</methodName></methodCall>");
        assert!(transport.post("u", other).await.is_err());
    }
}
