//! # Project Test Harness
//!
//! A throwaway HTTP/1.1 server that plays back scripted streaming responses,
//! one per accepted connection, and remembers the request heads it received.
//!
//! ## Purpose:
//! Lets the integration tests drive `HttpStreamConnector` and `StreamSession`
//! end to end over a real socket without reaching the public endpoint.

#![doc(html_logo_url = "https://example.com/logo.png")] // Placeholder for consistency
#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// One scripted answer.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub reason: &'static str,
    pub body: String,
}

impl MockResponse {
    /// `200 OK` with the given NDJSON body.
    pub fn ok(body: impl Into<String>) -> Self {
        Self { status: 200, reason: "OK", body: body.into() }
    }

    /// Any status with a body.
    pub fn status(status: u16, reason: &'static str, body: impl Into<String>) -> Self {
        Self { status, reason, body: body.into() }
    }
}

/// # Mock Stream Server
///
/// Serves each scripted response on its own connection, closing the socket
/// after the body. Once the script runs out the listener is dropped and further
/// connects are refused.
pub struct MockStreamServer {
    url: String,
    requests: Arc<Mutex<Vec<String>>>,
    handle: Option<JoinHandle<()>>,
}

impl MockStreamServer {
    pub fn start(script: Vec<MockResponse>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind mock stream server");
        let addr = listener.local_addr().expect("mock server has no local address");
        let requests = Arc::new(Mutex::new(Vec::new()));

        let seen = Arc::clone(&requests);
        let handle = thread::spawn(move || {
            for response in script {
                let Ok((mut stream, _)) = listener.accept() else {
                    return;
                };
                let head = read_request_head(&mut stream);
                seen.lock().unwrap().push(head);
                write_response(&mut stream, &response);
            }
        });

        Self {
            url: format!("http://{}/2/tweets/sample/stream", addr),
            requests,
            handle: Some(handle),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Request heads received so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Waits until every scripted response has been served.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.join().expect("mock server thread panicked");
        }
    }
}

fn read_request_head(stream: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
    String::from_utf8_lossy(&head).into_owned()
}

fn write_response(stream: &mut TcpStream, response: &MockResponse) {
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n",
        response.status, response.reason
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(response.body.as_bytes());
    let _ = stream.flush();
    let _ = stream.shutdown(Shutdown::Both);
}

/// Value of header `name` in a raw request head, matched case-insensitively.
pub fn header_value(head: &str, name: &str) -> Option<String> {
    head.lines().skip(1).find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim().eq_ignore_ascii_case(name).then(|| value.trim().to_string())
    })
}

/// One success line of the stream.
pub fn tweet_line(id: u64, text: &str) -> String {
    let mut line = serde_json::json!({ "data": { "id": id.to_string(), "text": text } }).to_string();
    line.push_str("\r\n");
    line
}
