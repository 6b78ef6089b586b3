//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use http::HeaderMap;
use http_body_util::Full;
use lintel::{App, Config, Response, StubTokens, TokenError, TokenService, VerifiedToken, service};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// A token service that counts how often the handler asked for a token.
#[derive(Default)]
pub struct CountingTokens {
    pub signed: AtomicUsize,
}

impl CountingTokens {
    pub fn count(&self) -> usize {
        self.signed.load(Ordering::SeqCst)
    }
}

impl TokenService for CountingTokens {
    fn sign(&self) -> String {
        self.signed.fetch_add(1, Ordering::SeqCst);
        StubTokens.sign()
    }

    fn verify(&self, token: &str) -> Result<VerifiedToken, TokenError> {
        StubTokens.verify(token)
    }
}

pub async fn service_app(tokens: Arc<dyn TokenService>) -> App {
    service::build(&Config::default(), tokens).await.unwrap()
}

pub async fn call(app: &App, method: http::Method, path: &str, body: &str) -> Response {
    let body = Full::new(Bytes::copy_from_slice(body.as_bytes()));
    app.handle(&method, path, HeaderMap::new(), body).await
}

pub fn json(res: &Response) -> Value {
    serde_json::from_slice(res.body()).unwrap()
}

/// Writes `raw` to a fresh connection and reads until the server closes it.
pub async fn send_raw(addr: SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    String::from_utf8(buf).unwrap()
}

pub fn post_request(path: &str, body: &str) -> String {
    format!(
        "POST {path} HTTP/1.1\r\nhost: localhost\r\ncontent-type: application/json\r\n\
         content-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    )
}

pub fn get_request(path: &str) -> String {
    format!("GET {path} HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\n\r\n")
}
