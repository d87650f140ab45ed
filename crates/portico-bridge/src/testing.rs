//! In-process executor — a handler registry standing in for the native side.
//!
//! Used by tests throughout the workspace and usable as a real executor when
//! the "native" implementations live in the same process.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use portico_core::error::{PorticoError, Result};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::{BridgeRequest, NativeExecutor};

type Handler = Box<dyn Fn(&BridgeRequest) -> Result<Value> + Send + Sync>;

/// A recorded call, for test assertions.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub target: String,
    pub action: String,
    pub args: Vec<Value>,
}

/// Executor backed by registered closures, keyed by `target.action`.
#[derive(Default)]
pub struct InProcessExecutor {
    handlers: Mutex<HashMap<String, Handler>>,
    channels: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<Value>>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl InProcessExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `target`/`action`. Re-registering replaces the
    /// previous handler.
    pub fn register(
        &self,
        target: &str,
        action: &str,
        handler: impl Fn(&BridgeRequest) -> Result<Value> + Send + Sync + 'static,
    ) {
        self.handlers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(format!("{target}.{action}"), Box::new(handler));
    }

    /// Push an unsolicited message to every channel open on `target`.
    pub fn push_message(&self, target: &str, message: Value) {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(senders) = channels.get_mut(target) {
            senders.retain(|tx| tx.send(message.clone()).is_ok());
        }
    }

    /// Calls seen so far (one-shot `execute` calls only).
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of channels currently open on `target`.
    pub fn open_channel_count(&self, target: &str) -> usize {
        self.channels
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(target)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl NativeExecutor for InProcessExecutor {
    async fn execute(&self, request: BridgeRequest) -> Result<Value> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedCall {
                target: request.target.clone(),
                action: request.action.clone(),
                args: request.args.clone(),
            });

        let key = format!("{}.{}", request.target, request.action);
        let handlers = self.handlers.lock().unwrap_or_else(|e| e.into_inner());
        match handlers.get(&key) {
            Some(handler) => handler(&request),
            None => Err(PorticoError::transport(format!(
                "no handler registered for {key}"
            ))),
        }
    }

    fn open_channel(
        &self,
        request: BridgeRequest,
        events: mpsc::UnboundedSender<Value>,
    ) -> Result<()> {
        self.channels
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(request.target)
            .or_default()
            .push(events);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_register_and_execute() {
        let executor = InProcessExecutor::new();
        executor.register("Svc", "ping", |_| Ok(json!("pong")));

        let result = executor.execute(BridgeRequest::new("Svc", "ping")).await.unwrap();
        assert_eq!(result, json!("pong"));
        assert_eq!(executor.calls().len(), 1);
        assert_eq!(executor.calls()[0].action, "ping");
    }

    #[tokio::test]
    async fn test_reregister_replaces_handler() {
        let executor = InProcessExecutor::new();
        executor.register("Svc", "v", |_| Ok(json!(1)));
        executor.register("Svc", "v", |_| Ok(json!(2)));

        let result = executor.execute(BridgeRequest::new("Svc", "v")).await.unwrap();
        assert_eq!(result, json!(2));
    }

    #[tokio::test]
    async fn test_push_message_skips_closed_channels() {
        let executor = InProcessExecutor::new();
        let (tx1, rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        executor
            .open_channel(BridgeRequest::new("T", "messageChannel"), tx1)
            .unwrap();
        executor
            .open_channel(BridgeRequest::new("T", "messageChannel"), tx2)
            .unwrap();

        drop(rx1);
        executor.push_message("T", json!(1));
        assert_eq!(rx2.recv().await.unwrap(), json!(1));
        assert_eq!(executor.open_channel_count("T"), 1);
    }
}
