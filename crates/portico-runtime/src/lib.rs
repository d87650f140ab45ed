//! # Portico Runtime
//! Wires the durable store, bridge channel, notification registry, and alarm
//! scheduler into one owned runtime, and runs the startup sequence that
//! reconciles persisted state with the native side.

use std::sync::Arc;

use portico_alarms::{AlarmScheduler, ScheduleMode};
use portico_bridge::{BridgeChannel, NativeExecutor};
use portico_core::PorticoConfig;
use portico_core::error::Result;
use portico_notifications::NotificationRegistry;
use portico_store::DurableStore;

/// One process's worth of Portico state. Everything hangs off this struct;
/// there are no module-level singletons, so tests can run several runtimes
/// side by side.
pub struct Runtime {
    config: PorticoConfig,
    bridge: BridgeChannel,
    store: DurableStore,
    notifications: Arc<NotificationRegistry>,
    alarms: Arc<AlarmScheduler>,
}

impl Runtime {
    pub fn new(config: PorticoConfig, executor: Arc<dyn NativeExecutor>) -> Result<Self> {
        let backend = DurableStore::create_backend(&config.store.backend, &config.store_path())?;
        let store = DurableStore::new(backend);
        let bridge = BridgeChannel::new(executor);

        let notifications = Arc::new(NotificationRegistry::new(
            bridge.clone(),
            store.internal(),
        ));
        let mode = ScheduleMode::for_platform(&config.platform);
        let alarms = Arc::new(AlarmScheduler::new(mode, bridge.clone(), store.internal()));

        Ok(Self {
            config,
            bridge,
            store,
            notifications,
            alarms,
        })
    }

    /// Bring the runtime up: open the native message channels first (so
    /// early native events land in the startup buffers), then load the
    /// persisted notification snapshot and replay, then catch up on alarms
    /// that came due while the process was down.
    pub async fn startup(&self) -> Result<()> {
        self.notifications.attach_channel()?;
        if self.alarms.mode() == ScheduleMode::Native {
            self.alarms.attach_channel()?;
        }

        self.notifications.complete_startup().await?;
        let caught_up = self.alarms.reregister_alarms().await?;

        tracing::info!(
            platform = %self.config.platform,
            caught_up,
            "portico runtime ready"
        );
        Ok(())
    }

    pub fn config(&self) -> &PorticoConfig {
        &self.config
    }

    pub fn bridge(&self) -> &BridgeChannel {
        &self.bridge
    }

    pub fn store(&self) -> &DurableStore {
        &self.store
    }

    pub fn notifications(&self) -> &Arc<NotificationRegistry> {
        &self.notifications
    }

    pub fn alarms(&self) -> &Arc<AlarmScheduler> {
        &self.alarms
    }
}
