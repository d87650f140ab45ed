//! # Portico Bridge
//! The request/response channel every API module uses to reach the native
//! side. A call names a target (native plugin), an action, and an ordered
//! argument list; exactly one of the success/failure continuations runs,
//! exactly once.
//!
//! The executor behind the channel is an opaque collaborator. Portico only
//! requires that it deliver arguments intact and resolve each call at most
//! once; it makes no ordering promise between two independent calls beyond
//! what the executor itself provides.

pub mod testing;

use std::sync::Arc;

use async_trait::async_trait;
use portico_core::error::{PorticoError, Result};
use serde_json::Value;
use tokio::sync::mpsc;

/// A single bridge call: target plugin, action name, JSON arguments, and an
/// out-of-band lane for binary payloads that must not be forced through the
/// JSON envelope.
#[derive(Debug, Clone)]
pub struct BridgeRequest {
    pub target: String,
    pub action: String,
    pub args: Vec<Value>,
    pub binary: Vec<Vec<u8>>,
}

impl BridgeRequest {
    pub fn new(target: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            action: action.into(),
            args: Vec::new(),
            binary: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn arg(mut self, value: Value) -> Self {
        self.args.push(value);
        self
    }

    /// Attach a binary payload. Binary lanes keep their own ordering,
    /// separate from the JSON args.
    pub fn with_binary(mut self, payload: Vec<u8>) -> Self {
        self.binary.push(payload);
        self
    }
}

/// The native side of the bridge.
///
/// `execute` resolves a one-shot call. `open_channel` installs a long-lived
/// message channel on which the native side may push unsolicited events at
/// any time (notification clicks, socket receives, ...).
#[async_trait]
pub trait NativeExecutor: Send + Sync {
    async fn execute(&self, request: BridgeRequest) -> Result<Value>;

    fn open_channel(
        &self,
        request: BridgeRequest,
        events: mpsc::UnboundedSender<Value>,
    ) -> Result<()>;
}

/// The caller-facing bridge channel.
#[derive(Clone)]
pub struct BridgeChannel {
    executor: Arc<dyn NativeExecutor>,
}

impl BridgeChannel {
    pub fn new(executor: Arc<dyn NativeExecutor>) -> Self {
        Self { executor }
    }

    /// Local argument checks. These fail synchronously, before anything is
    /// handed to the executor.
    fn validate(request: &BridgeRequest) -> Result<()> {
        if request.target.is_empty() {
            return Err(PorticoError::argument("bridge target must not be empty"));
        }
        if request.action.is_empty() {
            return Err(PorticoError::argument("bridge action must not be empty"));
        }
        Ok(())
    }

    /// Dispatch a call and run exactly one continuation with its outcome.
    ///
    /// Returns `Err(Argument)` synchronously for locally-detectable bad
    /// input, in which case neither continuation runs and nothing reaches
    /// the executor. Otherwise the call is spawned and resolves
    /// asynchronously relative to the caller; the single `match` on the
    /// executor result is what makes the at-most-once guarantee structural.
    pub fn call<S, F>(&self, request: BridgeRequest, on_success: S, on_failure: F) -> Result<()>
    where
        S: FnOnce(Value) + Send + 'static,
        F: FnOnce(PorticoError) + Send + 'static,
    {
        Self::validate(&request)?;
        let executor = Arc::clone(&self.executor);
        tokio::spawn(async move {
            match executor.execute(request).await {
                Ok(value) => on_success(value),
                Err(err) => on_failure(err),
            }
        });
        Ok(())
    }

    /// Async convenience used by the registries: same validation and
    /// dispatch as [`BridgeChannel::call`], awaited in place.
    pub async fn invoke(&self, request: BridgeRequest) -> Result<Value> {
        Self::validate(&request)?;
        self.executor.execute(request).await
    }

    /// Open a long-lived channel for native-originated messages on the given
    /// target. Messages arrive in the order the native side pushed them.
    pub fn open_channel(&self, request: BridgeRequest) -> Result<mpsc::UnboundedReceiver<Value>> {
        Self::validate(&request)?;
        tracing::debug!("opening message channel on {}", request.target);
        let (tx, rx) = mpsc::unbounded_channel();
        self.executor.open_channel(request, tx)?;
        Ok(rx)
    }
}
