#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{ AtomicUsize, Ordering };
use std::sync::{ Arc, Mutex };
use std::time::Duration;

use spark_chat::config::SparkConfig;
use spark_chat::llm::retry::RetryPolicy;
use spark_chat::transport::{ Connection, Connector };
use spark_chat::SparkError;

#[derive(Debug, Clone)]
pub enum Step {
    Frame(String),
    Fail(String),
    /// Peer closes without a final frame.
    Eof,
    /// Never produces another frame.
    Hang,
}

#[derive(Debug, Clone)]
pub enum Script {
    Refuse,
    Serve(Vec<Step>),
}

pub fn content(text: &str, status: i64) -> Step {
    Step::Frame(
        json!({
            "header": { "code": 0, "message": "Success", "sid": "cht000", "status": status },
            "payload": { "choices": { "status": status, "seq": 0, "text": [ { "content": text, "role": "assistant", "index": 0 } ] } }
        }).to_string()
    )
}

pub fn app_error(code: i64, message: &str) -> Step {
    Step::Frame(json!({ "header": { "code": code, "message": message, "status": 2 } }).to_string())
}

/// Test double counting opened and closed connections and recording every
/// request body sent.
#[derive(Default)]
pub struct ScriptedConnector {
    scripts: Mutex<VecDeque<Script>>,
    connects: AtomicUsize,
    opened: AtomicUsize,
    closes: Arc<AtomicUsize>,
    sent: Arc<Mutex<Vec<String>>>,
    urls: Mutex<Vec<String>>,
}

impl ScriptedConnector {
    pub fn new(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self { scripts: Mutex::new(scripts.into()), ..Self::default() })
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }

    pub fn sent(&self) -> Vec<serde_json::Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|s| serde_json::from_str(s).unwrap())
            .collect()
    }

    /// `payload.message.text` of every request sent, in order.
    pub fn sent_turns(&self) -> Vec<Vec<(String, String)>> {
        self.sent()
            .iter()
            .map(|req| {
                req["payload"]["message"]["text"]
                    .as_array()
                    .unwrap()
                    .iter()
                    .map(|t| {
                        (t["role"].as_str().unwrap().to_string(), t["content"].as_str().unwrap().to_string())
                    })
                    .collect()
            })
            .collect()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Connection>, SparkError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.to_string());
        let script = self.scripts.lock().unwrap().pop_front().unwrap_or(Script::Refuse);
        match script {
            Script::Refuse => Err(SparkError::Transport("connection refused".to_string())),
            Script::Serve(steps) => {
                self.opened.fetch_add(1, Ordering::SeqCst);
                Ok(
                    Box::new(ScriptedConnection {
                        steps: steps.into(),
                        closes: self.closes.clone(),
                        sent: self.sent.clone(),
                    })
                )
            }
        }
    }
}

struct ScriptedConnection {
    steps: VecDeque<Step>,
    closes: Arc<AtomicUsize>,
    sent: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Connection for ScriptedConnection {
    async fn send_text(&mut self, text: String) -> Result<(), SparkError> {
        self.sent.lock().unwrap().push(text);
        Ok(())
    }

    async fn next_text(&mut self) -> Option<Result<String, SparkError>> {
        match self.steps.pop_front() {
            Some(Step::Frame(raw)) => Some(Ok(raw)),
            Some(Step::Fail(msg)) => Some(Err(SparkError::Transport(msg))),
            Some(Step::Eof) | None => None,
            Some(Step::Hang) => {
                std::future::pending::<()>().await;
                None
            }
        }
    }

    async fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn test_config() -> SparkConfig {
    SparkConfig::new("app-id", "api-key", "api-secret")
        .with_retry(RetryPolicy::new(3, Duration::from_millis(5)))
        .with_pacing(Duration::ZERO)
}
