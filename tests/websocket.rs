use base64::{ engine::general_purpose::STANDARD, Engine as _ };
use futures::{ SinkExt, StreamExt };
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{ AtomicUsize, Ordering };
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ ErrorResponse, Request, Response };
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_util::sync::CancellationToken;
use url::form_urlencoded;

use spark_chat::auth::signer::{ canonical_string, sign };
use spark_chat::config::SparkConfig;
use spark_chat::llm::retry::RetryPolicy;
use spark_chat::llm::{ SparkClient, StreamEvent };
use spark_chat::transport::ws::MAX_MESSAGE_SIZE;
use spark_chat::SparkError;

const API_KEY: &str = "loopback-key";
const API_SECRET: &str = "loopback-secret";

/// Checks the signed query the way the service does.
fn verify(req: &Request, secret: &str) -> Result<(), &'static str> {
    let qs = req.uri().query().unwrap_or("");
    let params: HashMap<String, String> = form_urlencoded
        ::parse(qs.as_bytes())
        .into_owned()
        .collect();
    let (auth, date, host) = match (params.get("authorization"), params.get("date"), params.get("host")) {
        (Some(a), Some(d), Some(h)) => (a, d, h),
        _ => {
            return Err("missing authorization/date/host");
        }
    };
    let decoded = STANDARD.decode(auth).map_err(|_| "authorization is not base64")?;
    let decoded = String::from_utf8(decoded).map_err(|_| "authorization is not UTF-8")?;
    if !decoded.contains(&format!("api_key=\"{}\"", API_KEY)) {
        return Err("unknown api key");
    }
    let expected = sign(secret, &canonical_string(host, date, req.uri().path())).map_err(|_| "bad secret")?;
    if decoded.ends_with(&format!("signature=\"{}\"", expected)) {
        Ok(())
    } else {
        Err("bad signature")
    }
}

fn frame(text: &str, status: i64) -> String {
    json!({
        "header": { "code": 0, "message": "Success", "status": status },
        "payload": { "choices": { "status": status, "text": [ { "content": text, "role": "assistant", "index": 0 } ] } }
    }).to_string()
}

/// Accepts connections forever, answering each request with `reply` frames.
async fn spawn_server(secret: &'static str, reply: Vec<String>) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handshakes = Arc::new(AtomicUsize::new(0));
    let counter = handshakes.clone();

    tokio::spawn(async move {
        loop {
            let (stream, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => {
                    return;
                }
            };
            counter.fetch_add(1, Ordering::SeqCst);
            let reply = reply.clone();
            tokio::spawn(async move {
                let auth_callback = |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
                    match verify(req, secret) {
                        Ok(()) => Ok(response),
                        Err(reason) => {
                            let res = Response::builder()
                                .status(401)
                                .body(Some(reason.into()))
                                .unwrap();
                            Err(ErrorResponse::from(res))
                        }
                    }
                };
                let mut ws = match accept_hdr_async(stream, auth_callback).await {
                    Ok(ws) => ws,
                    Err(_) => {
                        return;
                    }
                };

                let request = match ws.next().await {
                    Some(Ok(Message::Text(text))) => text,
                    _ => {
                        return;
                    }
                };
                let request: serde_json::Value = serde_json::from_str(&request).unwrap();
                assert_eq!(request["header"]["app_id"], "loopback-app");
                let last = request["payload"]["message"]["text"].as_array().unwrap().last().unwrap().clone();
                assert_eq!(last["role"], "user");

                for text in reply {
                    if ws.send(Message::Text(text)).await.is_err() {
                        return;
                    }
                }
                while let Some(Ok(msg)) = ws.next().await {
                    if msg.is_close() {
                        break;
                    }
                }
            });
        }
    });

    (format!("ws://{}/v3.5/chat", addr), handshakes)
}

fn hello() -> Vec<String> {
    vec![frame("He", 1), frame("llo", 2)]
}

fn config(url: &str, secret: &str) -> SparkConfig {
    SparkConfig::new("loopback-app", API_KEY, secret)
        .with_api_url(url)
        .with_retry(RetryPolicy::new(3, Duration::from_millis(10)))
        .with_pacing(Duration::ZERO)
}

#[tokio::test]
async fn signed_handshake_and_streamed_reply() {
    let (url, handshakes) = spawn_server(API_SECRET, hello()).await;
    let client = SparkClient::new(config(&url, API_SECRET)).unwrap();

    let mut stream = client.generate("hello?", &[], CancellationToken::new());
    let mut text = String::new();
    let mut completed = false;
    while let Some(item) = stream.next().await {
        match item.unwrap() {
            StreamEvent::Delta(d) => text.push_str(&d),
            StreamEvent::Restart { attempt } => panic!("unexpected restart {}", attempt),
            StreamEvent::Completed => completed = true,
        }
    }

    assert_eq!(text, "Hello");
    assert!(completed);
    assert_eq!(handshakes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rejected_signature_exhausts_retries() {
    let (url, handshakes) = spawn_server(API_SECRET, hello()).await;
    let client = SparkClient::new(config(&url, "wrong-secret")).unwrap();

    let mut stream = client.generate("hello?", &[], CancellationToken::new());
    let mut error = None;
    while let Some(item) = stream.next().await {
        if let Err(e) = item {
            error = Some(e);
        }
    }

    match error {
        Some(SparkError::RetryExhausted { attempts, source }) => {
            assert_eq!(attempts, 3);
            assert!(source.to_string().contains("401"));
        }
        other => panic!("expected RetryExhausted, got {:?}", other),
    }
    assert_eq!(handshakes.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn oversized_frame_is_refused_by_the_protocol_layer() {
    let (url, handshakes) = spawn_server(API_SECRET, vec![frame(&"x".repeat(MAX_MESSAGE_SIZE + 1), 2)]).await;
    let client = SparkClient::new(config(&url, API_SECRET)).unwrap();

    let mut stream = client.generate("hello?", &[], CancellationToken::new());
    let mut text = String::new();
    let mut error = None;
    while let Some(item) = stream.next().await {
        match item {
            Ok(StreamEvent::Delta(d)) => text.push_str(&d),
            Ok(_) => {}
            Err(e) => {
                error = Some(e);
            }
        }
    }

    assert!(text.is_empty());
    match error {
        Some(SparkError::RetryExhausted { attempts, source }) => {
            assert_eq!(attempts, 3);
            assert!(matches!(*source, SparkError::Transport(_)));
        }
        other => panic!("expected RetryExhausted, got {:?}", other),
    }
    assert_eq!(handshakes.load(Ordering::SeqCst), 3);
}
