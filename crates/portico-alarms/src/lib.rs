//! # Portico Alarms
//! Named, optionally-repeating scheduled callbacks.
//!
//! Alarms are persisted write-through, so a restarted process can catch up:
//! overdue alarms fire once immediately and repeating ones are rescheduled on
//! their original phase (whole-period increments from the stored time), not
//! from "now".
//!
//! Two scheduling strategies exist: `Native` hands the wakeup to the
//! platform's alarm service over the bridge, `Timer` keeps an in-process
//! tokio sleep per alarm.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use portico_bridge::{BridgeChannel, BridgeRequest};
use portico_core::error::{PorticoError, Result};
use portico_core::event::Event;
use portico_store::StoreArea;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

const TARGET: &str = "Alarms";
const SNAPSHOT_KEY: &str = "alarms";

/// Shortest allowed delay/period, in minutes (~250 ms). Smaller values are
/// clamped up, not rejected.
pub const MIN_PERIOD_MINUTES: f64 = 0.0042;

/// A scheduled alarm as callers see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alarm {
    pub name: String,
    /// Absolute fire time, epoch milliseconds.
    pub scheduled_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_in_minutes: Option<f64>,
}

/// Creation parameters. Exactly which of the three timing fields are set
/// determines the first fire time.
#[derive(Debug, Clone, Default)]
pub struct AlarmCreateInfo {
    pub when: Option<i64>,
    pub delay_in_minutes: Option<f64>,
    pub period_in_minutes: Option<f64>,
}

impl AlarmCreateInfo {
    /// Fire at an absolute epoch-millisecond time.
    pub fn at(when: i64) -> Self {
        Self {
            when: Some(when),
            ..Self::default()
        }
    }

    /// Fire after a delay.
    pub fn after_minutes(delay: f64) -> Self {
        Self {
            delay_in_minutes: Some(delay),
            ..Self::default()
        }
    }

    /// Repeat with the given period; first fire is one period from now.
    pub fn every_minutes(period: f64) -> Self {
        Self {
            period_in_minutes: Some(period),
            ..Self::default()
        }
    }

    pub fn repeating(mut self, period: f64) -> Self {
        self.period_in_minutes = Some(period);
        self
    }
}

/// How alarms get scheduled on this platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleMode {
    /// Platform alarm service over the bridge (survives process death).
    Native,
    /// In-process tokio timers.
    Timer,
}

impl ScheduleMode {
    pub fn for_platform(platform: &str) -> Self {
        match platform {
            "android" | "ios" => ScheduleMode::Native,
            _ => ScheduleMode::Timer,
        }
    }
}

struct AlarmEntry {
    alarm: Alarm,
    /// Timer-mode only: the pending sleep task, aborted on clear/replace.
    timer: Option<JoinHandle<()>>,
}

struct SchedulerState {
    alarms: HashMap<String, AlarmEntry>,
}

/// Process-wide alarm scheduler.
pub struct AlarmScheduler {
    mode: ScheduleMode,
    bridge: BridgeChannel,
    area: StoreArea,
    state: Mutex<SchedulerState>,
    pub on_alarm: Event<Alarm>,
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn period_ms(period_in_minutes: f64) -> i64 {
    (period_in_minutes * 60_000.0).round() as i64
}

fn clamp_minutes(minutes: f64) -> f64 {
    minutes.max(MIN_PERIOD_MINUTES)
}

impl AlarmScheduler {
    pub fn new(mode: ScheduleMode, bridge: BridgeChannel, area: StoreArea) -> Self {
        Self {
            mode,
            bridge,
            area,
            state: Mutex::new(SchedulerState {
                alarms: HashMap::new(),
            }),
            on_alarm: Event::new("onAlarm"),
        }
    }

    pub fn mode(&self) -> ScheduleMode {
        self.mode
    }

    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Resolve creation parameters into a first fire time and clamped
    /// period.
    fn normalize(info: &AlarmCreateInfo, now: i64) -> Result<(i64, Option<f64>)> {
        if info.when.is_some() && info.delay_in_minutes.is_some() {
            return Err(PorticoError::argument(
                "Cannot set both when and delayInMinutes",
            ));
        }
        let period = info.period_in_minutes.map(clamp_minutes);
        let scheduled_time = if let Some(when) = info.when {
            when
        } else if let Some(delay) = info.delay_in_minutes {
            now + period_ms(clamp_minutes(delay))
        } else if let Some(period) = period {
            now + period_ms(period)
        } else {
            return Err(PorticoError::argument(
                "Must set at least one of when, delayInMinutes, or periodInMinutes",
            ));
        };
        Ok((scheduled_time, period))
    }

    /// Create or replace the alarm `name`. Replacing cancels the previous
    /// schedule first so a name never fires twice per period.
    pub async fn create(self: &Arc<Self>, name: &str, info: AlarmCreateInfo) -> Result<()> {
        let (scheduled_time, period_in_minutes) = Self::normalize(&info, now_ms())?;

        let previous_timer = {
            let mut state = self.lock();
            state.alarms.remove(name).and_then(|entry| entry.timer)
        };
        if let Some(handle) = previous_timer {
            handle.abort();
        }

        let alarm = Alarm {
            name: name.to_string(),
            scheduled_time,
            period_in_minutes,
        };
        self.lock().alarms.insert(
            name.to_string(),
            AlarmEntry {
                alarm: alarm.clone(),
                timer: None,
            },
        );

        self.arm(&alarm).await?;
        self.persist().await
    }

    /// Install the wakeup for an alarm already present in the registry.
    //
    // Returns a boxed future so the `arm -> spawn -> trigger_alarm -> arm`
    // cycle has a concrete `Send` type to break auto-trait inference on;
    // `tokio::spawn` below otherwise cannot prove the spawned future `Send`.
    fn arm<'a>(
        self: &'a Arc<Self>,
        alarm: &'a Alarm,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
        match self.mode {
            ScheduleMode::Native => {
                // The native service replaces any pending wakeup with the
                // same name, so no separate cancel round-trip is needed.
                let request = BridgeRequest::new(TARGET, "create")
                    .arg(json!(alarm.name))
                    .arg(json!(alarm.scheduled_time))
                    .arg(match alarm.period_in_minutes {
                        Some(period) => json!(period),
                        None => Value::Null,
                    });
                self.bridge.invoke(request).await?;
            }
            ScheduleMode::Timer => {
                let scheduler = Arc::clone(self);
                let name = alarm.name.clone();
                let delay = (alarm.scheduled_time - now_ms()).max(0) as u64;
                let handle = tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    scheduler.trigger_alarm(&name).await;
                });

                let mut state = self.lock();
                match state.alarms.get_mut(&alarm.name) {
                    Some(entry) => {
                        if let Some(old) = entry.timer.replace(handle) {
                            old.abort();
                        }
                    }
                    // Cleared between insert and arm.
                    None => handle.abort(),
                }
            }
        }
        Ok(())
        })
    }

    /// Fire `name` now: emit `on_alarm`, then advance repeating alarms by
    /// one period or drop one-shots, and persist. A name cleared before the
    /// trigger lands is a no-op.
    pub async fn trigger_alarm(self: &Arc<Self>, name: &str) {
        let alarm = {
            let state = self.lock();
            state.alarms.get(name).map(|entry| entry.alarm.clone())
        };
        let Some(alarm) = alarm else {
            return;
        };

        self.on_alarm.fire(&alarm);

        match alarm.period_in_minutes {
            Some(period) => {
                let rearmed = {
                    let mut state = self.lock();
                    state.alarms.get_mut(name).map(|entry| {
                        entry.alarm.scheduled_time = alarm.scheduled_time + period_ms(period);
                        entry.alarm.clone()
                    })
                };
                // Native repeating wakeups re-fire on their own; only the
                // in-process timer needs a new sleep.
                if let Some(alarm) = rearmed {
                    if self.mode == ScheduleMode::Timer {
                        if let Err(err) = self.arm(&alarm).await {
                            tracing::warn!("failed to rearm alarm '{}': {err}", alarm.name);
                        }
                    }
                }
            }
            None => {
                self.lock().alarms.remove(name);
            }
        }

        if let Err(err) = self.persist().await {
            tracing::warn!("failed to persist alarms after trigger: {err}");
        }
    }

    pub fn get(&self, name: &str) -> Option<Alarm> {
        self.lock().alarms.get(name).map(|entry| entry.alarm.clone())
    }

    /// All live alarms, sorted by name for stable output.
    pub fn get_all(&self) -> Vec<Alarm> {
        let mut alarms: Vec<Alarm> = self
            .lock()
            .alarms
            .values()
            .map(|entry| entry.alarm.clone())
            .collect();
        alarms.sort_by(|a, b| a.name.cmp(&b.name));
        alarms
    }

    /// Remove an alarm and cancel its schedule. Unknown names are an error,
    /// not a silent no-op.
    pub async fn clear(&self, name: &str) -> Result<()> {
        let entry = self.lock().alarms.remove(name);
        let Some(entry) = entry else {
            return Err(PorticoError::not_found(format!(
                "No alarm named '{name}' exists"
            )));
        };
        if let Some(handle) = entry.timer {
            handle.abort();
        }
        if self.mode == ScheduleMode::Native {
            self.bridge
                .invoke(BridgeRequest::new(TARGET, "clear").arg(json!(name)))
                .await?;
        }
        self.persist().await
    }

    pub async fn clear_all(&self) -> Result<()> {
        let names: Vec<String> = self.lock().alarms.keys().cloned().collect();
        for name in names {
            self.clear(&name).await?;
        }
        Ok(())
    }

    /// Reload persisted alarms after a process restart and catch up on what
    /// was missed: every overdue alarm fires once immediately, then
    /// repeating ones advance in whole-period steps until their scheduled
    /// time is back in the future — keeping the original phase instead of
    /// restarting the cadence from now. Returns how many alarms fired.
    pub async fn reregister_alarms(self: &Arc<Self>) -> Result<usize> {
        self.reregister_at(now_ms()).await
    }

    async fn reregister_at(self: &Arc<Self>, now: i64) -> Result<usize> {
        let stored = self.area.get_one(SNAPSHOT_KEY).await?;
        let persisted: HashMap<String, Alarm> = match stored {
            Some(value) => serde_json::from_value(value)?,
            None => HashMap::new(),
        };

        let mut overdue: Vec<Alarm> = Vec::new();
        let mut live: Vec<Alarm> = Vec::new();
        for (_, mut alarm) in persisted {
            if alarm.scheduled_time <= now {
                overdue.push(alarm.clone());
                if let Some(period) = alarm.period_in_minutes {
                    let step = period_ms(period);
                    while alarm.scheduled_time <= now {
                        alarm.scheduled_time += step;
                    }
                    live.push(alarm);
                }
                // Overdue one-shots fire below and stay deleted.
            } else {
                live.push(alarm);
            }
        }

        {
            let mut state = self.lock();
            for alarm in &live {
                state.alarms.insert(
                    alarm.name.clone(),
                    AlarmEntry {
                        alarm: alarm.clone(),
                        timer: None,
                    },
                );
            }
        }

        // Catch-up fires carry the fire time they missed, earliest first.
        overdue.sort_by_key(|alarm| alarm.scheduled_time);
        for alarm in &overdue {
            self.on_alarm.fire(alarm);
        }

        for alarm in &live {
            self.arm(alarm).await?;
        }
        self.persist().await?;

        if !overdue.is_empty() {
            tracing::info!("caught up {} overdue alarm(s)", overdue.len());
        }
        Ok(overdue.len())
    }

    /// Read the persisted snapshot without arming anything. Useful for
    /// inspecting another process's alarms.
    pub async fn persisted(&self) -> Result<Vec<Alarm>> {
        let stored = self.area.get_one(SNAPSHOT_KEY).await?;
        let map: HashMap<String, Alarm> = match stored {
            Some(value) => serde_json::from_value(value)?,
            None => HashMap::new(),
        };
        let mut alarms: Vec<Alarm> = map.into_values().collect();
        alarms.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(alarms)
    }

    /// Open the native wakeup channel and route fire messages into
    /// `trigger_alarm`.
    pub fn attach_channel(self: &Arc<Self>) -> Result<()> {
        let mut rx = self
            .bridge
            .open_channel(BridgeRequest::new(TARGET, "messageChannel"))?;
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                match message["id"].as_str() {
                    Some(name) => {
                        let name = name.to_string();
                        scheduler.trigger_alarm(&name).await;
                    }
                    None => tracing::warn!("alarm message missing 'id': {message}"),
                }
            }
        });
        Ok(())
    }

    async fn persist(&self) -> Result<()> {
        let snapshot: HashMap<String, Alarm> = self
            .lock()
            .alarms
            .iter()
            .map(|(name, entry)| (name.clone(), entry.alarm.clone()))
            .collect();
        self.area
            .set_one(SNAPSHOT_KEY, serde_json::to_value(&snapshot)?)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portico_bridge::testing::InProcessExecutor;
    use portico_store::{DurableStore, MemoryBackend};
    use tokio::sync::mpsc;
    use tokio::time::{sleep, timeout};

    fn setup(mode: ScheduleMode) -> (Arc<InProcessExecutor>, DurableStore, Arc<AlarmScheduler>) {
        let executor = Arc::new(InProcessExecutor::new());
        let store = DurableStore::new(Arc::new(MemoryBackend::new()));
        let scheduler = Arc::new(AlarmScheduler::new(
            mode,
            BridgeChannel::new(Arc::clone(&executor) as Arc<dyn portico_bridge::NativeExecutor>),
            store.internal(),
        ));
        (executor, store, scheduler)
    }

    fn fires(scheduler: &Arc<AlarmScheduler>) -> mpsc::UnboundedReceiver<Alarm> {
        let (tx, rx) = mpsc::unbounded_channel();
        scheduler.on_alarm.add_listener(move |alarm: &Alarm| {
            tx.send(alarm.clone()).ok();
        });
        rx
    }

    async fn seed_snapshot(store: &DurableStore, alarms: &[Alarm]) {
        let map: HashMap<String, Alarm> =
            alarms.iter().map(|a| (a.name.clone(), a.clone())).collect();
        store
            .internal()
            .set_one(SNAPSHOT_KEY, serde_json::to_value(&map).unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_period_is_clamped_up() {
        let (_executor, _store, scheduler) = setup(ScheduleMode::Timer);
        scheduler
            .create("a", AlarmCreateInfo::at(now_ms() + 60_000).repeating(0.001))
            .await
            .unwrap();

        let alarm = scheduler.get("a").unwrap();
        assert_eq!(alarm.period_in_minutes, Some(MIN_PERIOD_MINUTES));
        scheduler.clear("a").await.unwrap();
    }

    #[tokio::test]
    async fn test_delay_is_clamped_up() {
        let (_executor, _store, scheduler) = setup(ScheduleMode::Timer);
        let before = now_ms();
        scheduler
            .create("d", AlarmCreateInfo::after_minutes(0.0001))
            .await
            .unwrap();

        // Clamped to the minimum delay (~252 ms), not honored as-is.
        let alarm = scheduler.get("d").unwrap();
        assert!(alarm.scheduled_time >= before + period_ms(MIN_PERIOD_MINUTES));
        scheduler.clear("d").await.unwrap();
    }

    #[tokio::test]
    async fn test_when_and_delay_are_mutually_exclusive() {
        let (_executor, _store, scheduler) = setup(ScheduleMode::Timer);
        let info = AlarmCreateInfo {
            when: Some(now_ms() + 60_000),
            delay_in_minutes: Some(1.0),
            period_in_minutes: None,
        };
        let err = scheduler.create("a", info).await.unwrap_err();
        assert!(matches!(err, PorticoError::Argument(_)));
        assert!(scheduler.get("a").is_none());
    }

    #[tokio::test]
    async fn test_some_timing_field_is_required() {
        let (_executor, _store, scheduler) = setup(ScheduleMode::Timer);
        let err = scheduler
            .create("a", AlarmCreateInfo::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PorticoError::Argument(_)));
    }

    #[tokio::test]
    async fn test_period_only_fires_one_period_from_now() {
        let (_executor, _store, scheduler) = setup(ScheduleMode::Timer);
        let before = now_ms();
        scheduler
            .create("p", AlarmCreateInfo::every_minutes(1.0))
            .await
            .unwrap();

        let alarm = scheduler.get("p").unwrap();
        assert!(alarm.scheduled_time >= before + 60_000);
        assert!(alarm.scheduled_time <= now_ms() + 60_000);
        scheduler.clear("p").await.unwrap();
    }

    #[tokio::test]
    async fn test_create_replaces_existing_name() {
        let (_executor, _store, scheduler) = setup(ScheduleMode::Timer);
        let far = now_ms() + 600_000;
        scheduler.create("x", AlarmCreateInfo::at(far)).await.unwrap();
        scheduler
            .create("x", AlarmCreateInfo::at(far + 1000))
            .await
            .unwrap();

        let all = scheduler.get_all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].scheduled_time, far + 1000);
    }

    #[tokio::test]
    async fn test_empty_name_is_a_valid_singleton() {
        let (_executor, _store, scheduler) = setup(ScheduleMode::Timer);
        scheduler
            .create("", AlarmCreateInfo::at(now_ms() + 600_000))
            .await
            .unwrap();
        assert!(scheduler.get("").is_some());
        scheduler.clear("").await.unwrap();
        assert!(scheduler.get("").is_none());
    }

    #[tokio::test]
    async fn test_clear_missing_name_is_not_found() {
        let (_executor, _store, scheduler) = setup(ScheduleMode::Timer);
        let err = scheduler.clear("ghost").await.unwrap_err();
        assert!(matches!(err, PorticoError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_one_shot_fires_and_is_removed() {
        let (_executor, _store, scheduler) = setup(ScheduleMode::Timer);
        let mut rx = fires(&scheduler);

        scheduler
            .create("fast", AlarmCreateInfo::at(now_ms() + 100))
            .await
            .unwrap();

        let fired = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("alarm did not fire")
            .unwrap();
        assert_eq!(fired.name, "fast");

        // Record removal races the persist in the trigger path; give it a tick.
        for _ in 0..50 {
            if scheduler.get("fast").is_none() {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        assert!(scheduler.get("fast").is_none());
    }

    #[tokio::test]
    async fn test_repeating_alarm_advances_by_one_period() {
        let (_executor, _store, scheduler) = setup(ScheduleMode::Timer);
        let mut rx = fires(&scheduler);

        // Minimum period (~252 ms), firing first in ~100 ms.
        scheduler
            .create(
                "tick",
                AlarmCreateInfo::at(now_ms() + 100).repeating(MIN_PERIOD_MINUTES),
            )
            .await
            .unwrap();

        let first = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("first fire missing")
            .unwrap();
        let second = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("second fire missing")
            .unwrap();

        assert_eq!(
            second.scheduled_time - first.scheduled_time,
            period_ms(MIN_PERIOD_MINUTES)
        );
        scheduler.clear("tick").await.unwrap();
    }

    #[tokio::test]
    async fn test_cleared_alarm_never_fires() {
        let (_executor, _store, scheduler) = setup(ScheduleMode::Timer);
        let mut rx = fires(&scheduler);

        scheduler
            .create("doomed", AlarmCreateInfo::at(now_ms() + 200))
            .await
            .unwrap();
        scheduler.clear("doomed").await.unwrap();

        sleep(Duration::from_millis(500)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_clear_all() {
        let (_executor, _store, scheduler) = setup(ScheduleMode::Timer);
        let far = now_ms() + 600_000;
        scheduler.create("a", AlarmCreateInfo::at(far)).await.unwrap();
        scheduler.create("b", AlarmCreateInfo::at(far)).await.unwrap();

        scheduler.clear_all().await.unwrap();
        assert!(scheduler.get_all().is_empty());
    }

    #[tokio::test]
    async fn test_catchup_keeps_original_phase() {
        let (_executor, store, scheduler) = setup(ScheduleMode::Timer);
        let mut rx = fires(&scheduler);

        // Created 2.5 periods ago with a 1-minute period: the restart must
        // fire it once and land the next fire on the 3rd boundary, not
        // "now + period".
        let t0 = now_ms() - 150_000;
        seed_snapshot(
            &store,
            &[Alarm {
                name: "phased".into(),
                scheduled_time: t0,
                period_in_minutes: Some(1.0),
            }],
        )
        .await;

        let fired = scheduler.reregister_alarms().await.unwrap();
        assert_eq!(fired, 1);

        let caught_up = rx.try_recv().unwrap();
        assert_eq!(caught_up.name, "phased");
        assert_eq!(caught_up.scheduled_time, t0);

        let rescheduled = scheduler.get("phased").unwrap();
        assert_eq!(rescheduled.scheduled_time, t0 + 180_000);
        scheduler.clear("phased").await.unwrap();
    }

    #[tokio::test]
    async fn test_catchup_overdue_one_shot_fires_once_and_goes_away() {
        let (_executor, store, scheduler) = setup(ScheduleMode::Timer);
        let mut rx = fires(&scheduler);

        seed_snapshot(
            &store,
            &[Alarm {
                name: "late".into(),
                scheduled_time: now_ms() - 5_000,
                period_in_minutes: None,
            }],
        )
        .await;

        assert_eq!(scheduler.reregister_alarms().await.unwrap(), 1);
        assert_eq!(rx.try_recv().unwrap().name, "late");
        assert!(scheduler.get("late").is_none());

        // The persisted snapshot dropped it too.
        let persisted = store.internal().get_one(SNAPSHOT_KEY).await.unwrap().unwrap();
        assert!(persisted.get("late").is_none());
    }

    #[tokio::test]
    async fn test_catchup_leaves_future_alarms_untouched() {
        let (_executor, store, scheduler) = setup(ScheduleMode::Timer);
        let mut rx = fires(&scheduler);

        let future = now_ms() + 600_000;
        seed_snapshot(
            &store,
            &[Alarm {
                name: "ahead".into(),
                scheduled_time: future,
                period_in_minutes: Some(5.0),
            }],
        )
        .await;

        assert_eq!(scheduler.reregister_alarms().await.unwrap(), 0);
        assert!(rx.try_recv().is_err());
        assert_eq!(scheduler.get("ahead").unwrap().scheduled_time, future);
        scheduler.clear("ahead").await.unwrap();
    }

    #[tokio::test]
    async fn test_catchup_fires_earliest_overdue_first() {
        let (_executor, store, scheduler) = setup(ScheduleMode::Timer);
        let mut rx = fires(&scheduler);

        let now = now_ms();
        seed_snapshot(
            &store,
            &[
                Alarm {
                    name: "newer".into(),
                    scheduled_time: now - 1_000,
                    period_in_minutes: None,
                },
                Alarm {
                    name: "older".into(),
                    scheduled_time: now - 9_000,
                    period_in_minutes: None,
                },
            ],
        )
        .await;

        assert_eq!(scheduler.reregister_alarms().await.unwrap(), 2);
        assert_eq!(rx.try_recv().unwrap().name, "older");
        assert_eq!(rx.try_recv().unwrap().name, "newer");
    }

    #[tokio::test]
    async fn test_native_mode_round_trips_create_and_clear() {
        let (executor, _store, scheduler) = setup(ScheduleMode::Native);
        executor.register(TARGET, "create", |_| Ok(Value::Null));
        executor.register(TARGET, "clear", |_| Ok(Value::Null));

        let when = now_ms() + 600_000;
        scheduler
            .create("native", AlarmCreateInfo::at(when).repeating(2.0))
            .await
            .unwrap();

        let calls = executor.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].action, "create");
        assert_eq!(calls[0].args, vec![json!("native"), json!(when), json!(2.0)]);

        scheduler.clear("native").await.unwrap();
        let calls = executor.calls();
        assert_eq!(calls[1].action, "clear");
        assert_eq!(calls[1].args, vec![json!("native")]);
    }

    #[tokio::test]
    async fn test_native_fire_messages_trigger_on_alarm() {
        let (executor, _store, scheduler) = setup(ScheduleMode::Native);
        executor.register(TARGET, "create", |_| Ok(Value::Null));
        scheduler.attach_channel().unwrap();

        let mut rx = fires(&scheduler);
        scheduler
            .create("wake", AlarmCreateInfo::at(now_ms() + 600_000))
            .await
            .unwrap();

        executor.push_message(TARGET, json!({ "id": "wake" }));

        let fired = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("native fire not delivered")
            .unwrap();
        assert_eq!(fired.name, "wake");

        // One-shot: gone after the native fire.
        for _ in 0..50 {
            if scheduler.get("wake").is_none() {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        assert!(scheduler.get("wake").is_none());
    }

    #[tokio::test]
    async fn test_persisted_snapshot_tracks_mutations() {
        let (_executor, store, scheduler) = setup(ScheduleMode::Timer);
        let far = now_ms() + 600_000;
        scheduler.create("a", AlarmCreateInfo::at(far)).await.unwrap();

        let persisted = store.internal().get_one(SNAPSHOT_KEY).await.unwrap().unwrap();
        assert!(persisted.get("a").is_some());

        scheduler.clear("a").await.unwrap();
        let persisted = store.internal().get_one(SNAPSHOT_KEY).await.unwrap().unwrap();
        assert!(persisted.get("a").is_none());
    }
}
