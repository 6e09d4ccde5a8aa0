//! A one-shot HTTP listener standing in for an OpenAI-compatible endpoint.

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    task::JoinHandle,
};

/// What the client sent to the stub.
#[derive(Debug)]
pub(crate) struct RecordedRequest {
    pub head: String,
    pub body: String,
}

impl RecordedRequest {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

fn header_end(raw: &[u8]) -> Option<usize> {
    raw.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

fn content_length(head: &str) -> usize {
    head.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}

/// Accepts a single connection, answers with `status` and `body`, and hands
/// back the request it received. Returns the base URL to point a client at.
pub(crate) async fn serve_once(
    status: u16,
    body: &str,
) -> (String, JoinHandle<RecordedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let response_body = body.to_string();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut chunk = [0u8; 4096];

        let head_len = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client closed the connection before the headers");
            raw.extend_from_slice(&chunk[..n]);
            if let Some(end) = header_end(&raw) {
                break end;
            }
        };
        let head = String::from_utf8_lossy(&raw[..head_len]).to_string();
        let total = head_len + content_length(&head);
        while raw.len() < total {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client closed the connection mid-body");
            raw.extend_from_slice(&chunk[..n]);
        }

        let response = format!(
            "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            response_body.len(),
            response_body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;

        RecordedRequest {
            head,
            body: String::from_utf8_lossy(&raw[head_len..total]).to_string(),
        }
    });

    (format!("http://{}/v1", addr), handle)
}
