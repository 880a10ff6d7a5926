#![cfg(feature = "provider-openai")]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::StreamExt;
use quill::{
    ApiProviderSettings, ChatMessage, CompletionOptions, ProviderSettings, SecretString,
    build_provider,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Serves one streamed chat completion, sleeping `gap` before each frame.
async fn serve_paced(frames: Vec<String>, gap: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        read_request(&mut socket).await;

        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\nconnection: close\r\n\r\n",
            )
            .await
            .expect("head");
        socket.flush().await.expect("flush");
        for frame in frames {
            tokio::time::sleep(gap).await;
            if socket.write_all(frame.as_bytes()).await.is_err() {
                return;
            }
            let _ = socket.flush().await;
        }
        let _ = socket.shutdown().await;
    });

    addr
}

async fn read_request(socket: &mut TcpStream) {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 4096];
    loop {
        let read = socket.read(&mut chunk).await.expect("read");
        if read == 0 {
            return;
        }
        buffer.extend_from_slice(&chunk[..read]);

        let Some(head_end) = buffer.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buffer[..head_end]).to_ascii_lowercase();
        let body_len = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if buffer.len() >= head_end + 4 + body_len {
            return;
        }
    }
}

fn delta_frames(words: usize) -> Vec<String> {
    let mut frames = (0..words)
        .map(|index| {
            format!(
                "data: {{\"choices\":[{{\"delta\":{{\"content\":\"w{index} \"}},\"finish_reason\":null}}]}}\n\n"
            )
        })
        .collect::<Vec<_>>();
    frames.push("data: [DONE]\n\n".to_string());
    frames
}

fn openai_settings(addr: SocketAddr) -> ProviderSettings {
    ProviderSettings::OpenAi(ApiProviderSettings {
        api_key: SecretString::new("sk-test"),
        model: "gpt-4o-mini".to_string(),
        base_url: Some(format!("http://{addr}/v1")),
    })
}

#[tokio::test]
async fn steady_stream_outlives_the_request_timeout() {
    let addr = serve_paced(delta_frames(5), Duration::from_millis(300)).await;
    let provider =
        build_provider(&openai_settings(addr), Duration::from_secs(1)).expect("provider");

    let items = provider
        .complete_stream(vec![ChatMessage::user("hi")], CompletionOptions::default())
        .await
        .expect("stream opens")
        .collect::<Vec<_>>()
        .await;

    let text = items
        .into_iter()
        .collect::<Result<String, _>>()
        .expect("every fragment arrives");
    assert_eq!(text, "w0 w1 w2 w3 w4 ");
}

#[tokio::test]
async fn stalled_stream_fails_after_the_request_timeout() {
    let addr = serve_paced(delta_frames(2), Duration::from_millis(1500)).await;
    let provider =
        build_provider(&openai_settings(addr), Duration::from_millis(300)).expect("provider");

    let result = provider
        .complete_stream(vec![ChatMessage::user("hi")], CompletionOptions::default())
        .await;

    let failed = match result {
        Err(_) => true,
        Ok(stream) => stream
            .collect::<Vec<_>>()
            .await
            .last()
            .is_some_and(|item| item.is_err()),
    };
    assert!(failed, "an idle backend must not hang the turn");
}
