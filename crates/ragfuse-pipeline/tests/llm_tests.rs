use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use ragfuse_core::config::LlmConfig;
use ragfuse_core::traits::Generator;
use ragfuse_core::Error;
use ragfuse_pipeline::OpenAiGenerator;

/// Read one HTTP request (headers plus `Content-Length` body).
async fn read_request(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 { return; }
        buf.extend_from_slice(&chunk[..n]);
        let Some(header_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else { continue };
        let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
        let body_len = headers
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if buf.len() >= header_end + 4 + body_len { return; }
    }
}

/// Serve `body` as a 200 JSON response to a single request; returns the base URL.
async fn serve_once(body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        read_request(&mut socket).await;
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
    });
    format!("http://{}/v1", addr)
}

fn generator(base_url: String) -> OpenAiGenerator {
    let cfg = LlmConfig { base_url, model: "stub".into(), api_key: Some("test".into()), max_retries: 1, timeout_secs: 5, ..LlmConfig::default() };
    OpenAiGenerator::new(&cfg).unwrap()
}

#[tokio::test]
async fn returns_first_choice_content() {
    let url = serve_once(r#"{"choices":[{"message":{"role":"assistant","content":"Collect rainwater from the roof."}}]}"#).await;
    let answer = generator(url).complete("how?").await.unwrap();
    assert_eq!(answer, "Collect rainwater from the roof.");
}

#[tokio::test]
async fn no_choices_is_a_generation_failure() {
    let url = serve_once(r#"{"choices":[]}"#).await;
    let err = generator(url).complete("how?").await.unwrap_err();
    assert!(matches!(err, Error::GenerationFailure(ref m) if m.contains("no choices")), "{err}");
}

#[tokio::test]
async fn blank_or_null_content_is_a_generation_failure() {
    let url = serve_once(r#"{"choices":[{"message":{"role":"assistant","content":"  "}}]}"#).await;
    assert!(matches!(generator(url).complete("how?").await, Err(Error::GenerationFailure(_))));

    let url = serve_once(r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#).await;
    assert!(matches!(generator(url).complete("how?").await, Err(Error::GenerationFailure(_))));
}
