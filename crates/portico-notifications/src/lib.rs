//! # Portico Notifications
//! Local mirror of native notification state.
//!
//! The registry keeps an id → options map, persisted write-through to the
//! store's internal area, and reconciles it against native-originated
//! events (click / close / button-click) pushed over the bridge's message
//! channel. Native events that arrive before the persisted snapshot has
//! loaded are buffered and replayed in arrival order once loading completes.

pub mod options;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use portico_bridge::{BridgeChannel, BridgeRequest};
use portico_core::error::{PorticoError, Result};
use portico_core::event::Event;
use portico_store::StoreArea;
use serde_json::{Value, json};

pub use options::{NotificationButton, NotificationItem, NotificationOptions, TemplateType};

const TARGET: &str = "Notifications";
const SNAPSHOT_KEY: &str = "notifications";

/// Outcome of `create`. The id always comes back (generated when the caller
/// passed an empty one); validation and bridge failures ride in the error
/// side-channel instead of suppressing the response.
#[derive(Debug)]
pub struct CreateResponse {
    pub id: String,
    pub error: Option<PorticoError>,
}

/// Outcome of `update`: whether the native side found and updated the
/// notification.
#[derive(Debug)]
pub struct UpdateResponse {
    pub updated: bool,
    pub error: Option<PorticoError>,
}

/// Outcome of `clear`: whether the native side actually had it.
#[derive(Debug)]
pub struct ClearResponse {
    pub cleared: bool,
    pub error: Option<PorticoError>,
}

struct RegistryState {
    notifications: HashMap<String, NotificationOptions>,
    /// Buffer for native messages until the persisted snapshot is loaded.
    /// `Some` while starting up, `None` once replay has completed.
    pending: Option<Vec<Value>>,
}

/// Process-wide notification registry.
pub struct NotificationRegistry {
    bridge: BridgeChannel,
    area: StoreArea,
    state: Mutex<RegistryState>,
    pub on_clicked: Event<String>,
    pub on_closed: Event<(String, bool)>,
    pub on_button_clicked: Event<(String, u32)>,
}

impl NotificationRegistry {
    pub fn new(bridge: BridgeChannel, area: StoreArea) -> Self {
        Self {
            bridge,
            area,
            state: Mutex::new(RegistryState {
                notifications: HashMap::new(),
                pending: Some(Vec::new()),
            }),
            on_clicked: Event::new("onClicked"),
            on_closed: Event::new("onClosed"),
            on_button_clicked: Event::new("onButtonClicked"),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn snapshot(state: &RegistryState) -> Value {
        serde_json::to_value(&state.notifications).unwrap_or_else(|_| json!({}))
    }

    async fn persist(&self, snapshot: Value) -> Result<()> {
        self.area.set_one(SNAPSHOT_KEY, snapshot).await
    }

    /// Create a notification. An empty id gets a freshly generated one. The
    /// registry entry is written and persisted before the bridge call is
    /// issued, so the mirror already knows the notification when native
    /// events about it start arriving.
    pub async fn create(&self, id: &str, options: NotificationOptions) -> CreateResponse {
        if let Err(err) = options.validate_create() {
            return CreateResponse {
                id: id.to_string(),
                error: Some(err),
            };
        }

        let id = if id.is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            id.to_string()
        };

        let snapshot = {
            let mut state = self.lock();
            state.notifications.insert(id.clone(), options.clone());
            Self::snapshot(&state)
        };
        if let Err(err) = self.persist(snapshot).await {
            return CreateResponse { id, error: Some(err) };
        }

        let request = BridgeRequest::new(TARGET, "create")
            .arg(json!(id))
            .arg(serde_json::to_value(&options).unwrap_or(Value::Null));
        match self.bridge.invoke(request).await {
            Ok(_) => CreateResponse { id, error: None },
            Err(err) => CreateResponse { id, error: Some(err) },
        }
    }

    /// Update a notification. The template type may be omitted and falls
    /// back to the stored entry's type. `updated` is the native side's
    /// answer; an unknown id reports `false`.
    pub async fn update(&self, id: &str, options: NotificationOptions) -> UpdateResponse {
        let existing = self.lock().notifications.get(id).and_then(|o| o.template_type);
        let template = match options.validate_update(existing) {
            Ok(template) => template,
            Err(err) => {
                return UpdateResponse {
                    updated: false,
                    error: Some(err),
                };
            }
        };
        let mut effective = options;
        effective.template_type = Some(template);

        let request = BridgeRequest::new(TARGET, "update")
            .arg(json!(id))
            .arg(serde_json::to_value(&effective).unwrap_or(Value::Null));
        match self.bridge.invoke(request).await {
            Ok(value) => {
                let updated = value.as_bool().unwrap_or(false);
                if updated {
                    let snapshot = {
                        let mut state = self.lock();
                        state.notifications.insert(id.to_string(), effective);
                        Self::snapshot(&state)
                    };
                    if let Err(err) = self.persist(snapshot).await {
                        return UpdateResponse {
                            updated: true,
                            error: Some(err),
                        };
                    }
                }
                UpdateResponse { updated, error: None }
            }
            Err(err) => UpdateResponse {
                updated: false,
                error: Some(err),
            },
        }
    }

    /// Clear a notification: the local entry goes away immediately
    /// (optimistic), then the native side reports whether it had one.
    pub async fn clear(&self, id: &str) -> ClearResponse {
        let snapshot = {
            let mut state = self.lock();
            state.notifications.remove(id);
            Self::snapshot(&state)
        };
        let persist_error = self.persist(snapshot).await.err();

        let request = BridgeRequest::new(TARGET, "clear").arg(json!(id));
        match self.bridge.invoke(request).await {
            Ok(value) => ClearResponse {
                cleared: value.as_bool().unwrap_or(false),
                error: persist_error,
            },
            Err(err) => ClearResponse {
                cleared: false,
                error: persist_error.or(Some(err)),
            },
        }
    }

    /// Snapshot of the current mirror.
    pub fn get_all(&self) -> HashMap<String, NotificationOptions> {
        self.lock().notifications.clone()
    }

    /// Open the native message channel and pump it into this registry.
    pub fn attach_channel(self: &Arc<Self>) -> Result<()> {
        let mut rx = self
            .bridge
            .open_channel(BridgeRequest::new(TARGET, "messageChannel"))?;
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                registry.handle_native_message(message).await;
            }
        });
        Ok(())
    }

    /// Feed one native-originated message into the registry. Buffered while
    /// the persisted snapshot is still loading.
    pub async fn handle_native_message(&self, message: Value) {
        {
            let mut state = self.lock();
            if let Some(buffer) = state.pending.as_mut() {
                buffer.push(message);
                return;
            }
        }
        if let Err(err) = self.process_message(&message).await {
            tracing::warn!("unhandled native notification message: {err}");
        }
    }

    /// Load the persisted snapshot, then replay buffered native messages in
    /// arrival order. Messages racing in during replay land in the buffer
    /// and are picked up before the buffer is retired.
    pub async fn complete_startup(&self) -> Result<()> {
        let stored = self.area.get_one(SNAPSHOT_KEY).await?;
        let notifications: HashMap<String, NotificationOptions> = match stored {
            Some(value) => serde_json::from_value(value)?,
            None => HashMap::new(),
        };
        self.lock().notifications = notifications;

        loop {
            let batch = {
                let mut state = self.lock();
                match state.pending.as_mut() {
                    Some(buffer) if buffer.is_empty() => {
                        state.pending = None;
                        break;
                    }
                    Some(buffer) => std::mem::take(buffer),
                    None => break,
                }
            };
            for message in batch {
                if let Err(err) = self.process_message(&message).await {
                    tracing::warn!("unhandled native notification message: {err}");
                }
            }
        }
        Ok(())
    }

    async fn process_message(&self, message: &Value) -> Result<()> {
        let action = message["action"]
            .as_str()
            .ok_or_else(|| PorticoError::argument("native message missing 'action'"))?;
        let id = message["id"]
            .as_str()
            .ok_or_else(|| PorticoError::argument("native message missing 'id'"))?
            .to_string();

        match action {
            "Click" => {
                self.on_clicked.fire(&id);
                Ok(())
            }
            "Close" => {
                let snapshot = {
                    let mut state = self.lock();
                    state.notifications.remove(&id);
                    Self::snapshot(&state)
                };
                self.persist(snapshot).await?;
                self.on_closed.fire(&(id, true));
                Ok(())
            }
            "ButtonClick" => {
                let index = message["buttonIndex"].as_u64().unwrap_or(0) as u32;
                self.on_button_clicked.fire(&(id, index));
                Ok(())
            }
            other => Err(PorticoError::Other(format!(
                "Unknown notification action: {other}"
            ))),
        }
    }
}
