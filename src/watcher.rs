//! The filter watcher engine.
//!
//! One scheduler task owns the timers: a periodic poll plus a debounced check that is
//! armed on every (re)subscription to the change feed and re-armed by each change event.
//! Every check runs in its own task and remembers the sequence number it started under.
//! Only resets and restarts bump that number, so their effect always wins over checks
//! already in flight, while overlapping checks are each applied as they land.

use std::collections::{HashMap, HashSet};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior, Sleep};
use tracing::{debug, info, warn};

use crate::aggregate::{aggregate_growth, reset_ledger_entry, NotifiedLedger};
use crate::config::WatcherSettings;
use crate::cutoff::build_cutoff_map;
use crate::events::ChangeEvent;
use crate::filters::{TrackedConfiguration, WatcherResult};
use crate::sources::{
    get_json, set_json, ChangeFeed, KeyValueStore, NotificationService, StatsSource, Subscription,
    TimezoneSource, LAST_CHECK_KEY,
};

/// Timer and text settings for a [`FilterWatcher`]
#[derive(Debug, Clone)]
pub struct WatcherOptions {
    pub poll_interval: Duration,
    pub debounce: Duration,
    pub reset_grace: Duration,
    pub notification_title: String,
}

impl Default for WatcherOptions {
    fn default() -> Self {
        Self::from(&WatcherSettings::default())
    }
}

impl From<&WatcherSettings> for WatcherOptions {
    fn from(settings: &WatcherSettings) -> Self {
        Self {
            poll_interval: Duration::from_secs(settings.poll_interval_secs.max(1)),
            debounce: Duration::from_millis(settings.debounce_ms),
            reset_grace: Duration::from_secs(settings.reset_grace_secs),
            notification_title: settings.notification_title.clone(),
        }
    }
}

/// Collaborators the engine calls out to
#[derive(Clone)]
pub struct WatcherSources {
    pub stats: Arc<dyn StatsSource>,
    pub timezone: Arc<dyn TimezoneSource>,
    pub store: Arc<dyn KeyValueStore>,
    pub notifier: Arc<dyn NotificationService>,
    pub changes: Arc<dyn ChangeFeed>,
}

/// Observable watcher state
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WatcherSnapshot {
    pub is_watching: bool,
    pub results: IndexMap<String, WatcherResult>,
    pub last_check_time: Option<DateTime<Utc>>,
}

struct WatcherState {
    is_watching: bool,
    results: IndexMap<String, WatcherResult>,
    last_check_time: Option<DateTime<Utc>>,
    start_time: Option<DateTime<Utc>>,
    server_offset_minutes: Option<i32>,
    configurations: Vec<TrackedConfiguration>,
    overrides: HashMap<String, DateTime<Utc>>,
    ledger: NotifiedLedger,
    /// Bumped by reset, start and stop; a check applies only if it is unchanged
    sequence: u64,
    /// Bumped by start and stop only
    session: u64,
    /// Names whose reported new items are forced to zero until the server reports zero
    just_reset: HashSet<String>,
}

impl WatcherState {
    fn new(configurations: Vec<TrackedConfiguration>, now: DateTime<Utc>) -> Self {
        let just_reset = configurations.iter().map(|c| c.name.clone()).collect();
        Self {
            is_watching: true,
            results: IndexMap::new(),
            last_check_time: None,
            start_time: Some(now),
            server_offset_minutes: None,
            configurations,
            overrides: HashMap::new(),
            ledger: NotifiedLedger::new(),
            sequence: 0,
            session: 0,
            just_reset,
        }
    }

    fn snapshot(&self) -> WatcherSnapshot {
        WatcherSnapshot {
            is_watching: self.is_watching,
            results: self.results.clone(),
            last_check_time: self.last_check_time,
        }
    }

    fn tracked(&self) -> Vec<TrackedConfiguration> {
        self.configurations.iter().filter(|c| c.is_tracked()).cloned().collect()
    }

    fn should_poll(&self) -> bool {
        self.is_watching && self.start_time.is_some() && self.configurations.iter().any(|c| c.is_tracked())
    }

    fn restart(&mut self, now: DateTime<Utc>) {
        self.is_watching = true;
        self.start_time = Some(now);
        self.last_check_time = Some(now);
        self.results.clear();
        self.just_reset = self.configurations.iter().map(|c| c.name.clone()).collect();
        self.overrides.clear();
        self.ledger.clear();
        self.sequence += 1;
        self.session += 1;
    }

    fn halt(&mut self) {
        self.is_watching = false;
        self.start_time = None;
        self.last_check_time = None;
        self.results.clear();
        self.overrides.clear();
        self.ledger.clear();
        self.sequence += 1;
        self.session += 1;
    }
}

enum Control {
    Rearm,
    Shutdown,
}

struct Shared {
    sources: WatcherSources,
    options: WatcherOptions,
    state: Mutex<WatcherState>,
    snapshot: watch::Sender<WatcherSnapshot>,
    mounted: AtomicBool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, WatcherState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &WatcherState) {
        let next = state.snapshot();
        self.snapshot.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    fn request_permission(&self) {
        let notifier = Arc::clone(&self.sources.notifier);
        tokio::spawn(async move {
            if !notifier.request_permission().await {
                debug!("Notification permission not granted");
            }
        });
    }

    fn spawn_check(self: &Arc<Self>, trigger: &'static str) {
        tokio::spawn(Arc::clone(self).check_items(trigger));
    }

    async fn check_items(self: Arc<Self>, trigger: &'static str) {
        let (sequence, tracked, just_reset, cutoffs) = {
            let state = self.lock();
            if state.start_time.is_none() {
                return;
            }
            let tracked = state.tracked();
            if tracked.is_empty() {
                return;
            }
            let cutoffs = build_cutoff_map(
                &tracked,
                state.start_time,
                &state.overrides,
                state.server_offset_minutes,
            );
            (state.sequence, tracked, state.just_reset.clone(), cutoffs)
        };

        debug!(sequence, trigger, configs = cutoffs.len(), "Checking filter configurations");

        let stats = match self.sources.stats.watcher_stats(&cutoffs).await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(sequence, error = %e, "Watcher check failed, will retry on next tick");
                return;
            }
        };

        if !self.mounted.load(Ordering::SeqCst) {
            return;
        }

        let now = Utc::now();
        let notification = {
            let mut guard = self.lock();
            let state = &mut *guard;
            if state.sequence != sequence {
                debug!(sequence, latest = state.sequence, "Discarding stale watcher response");
                return;
            }

            for config in &tracked {
                let Some(reported) = config.id.and_then(|id| stats.get(&id)) else {
                    continue;
                };
                let new_items = if just_reset.contains(&config.name) {
                    if reported.new_items == 0 {
                        state.just_reset.remove(&config.name);
                    }
                    0
                } else {
                    reported.new_items
                };
                state.results.insert(
                    config.name.clone(),
                    WatcherResult { total: reported.total, new_items },
                );
            }
            state.last_check_time = Some(now);

            let notifying: Vec<TrackedConfiguration> =
                state.configurations.iter().filter(|c| c.notify).cloned().collect();
            let notification = aggregate_growth(
                &state.results,
                &notifying,
                &mut state.ledger,
                &self.options.notification_title,
            );
            self.publish(state);
            notification
        };

        self.persist_check_time(now);

        if let Some(notification) = notification {
            info!(body = %notification.body, "New matches for watched filters");
            if let Err(e) = self.sources.notifier.notify(&notification.title, &notification.body).await {
                warn!(error = %e, "Failed to deliver watcher notification");
            }
        }
    }

    fn persist_check_time(&self, at: DateTime<Utc>) {
        let store = Arc::clone(&self.sources.store);
        tokio::spawn(async move {
            if let Err(e) = set_json(store.as_ref(), LAST_CHECK_KEY, &at).await {
                warn!(error = %e, "Failed to persist last watcher check time");
            }
        });
    }

    /// Resume the window from the persisted last check and resolve the server clock
    async fn bootstrap(self: Arc<Self>, control: mpsc::UnboundedSender<Control>) {
        let session = self.lock().session;

        let (persisted, timezone) = tokio::join!(
            get_json::<DateTime<Utc>>(self.sources.store.as_ref(), LAST_CHECK_KEY),
            self.sources.timezone.system_timezone(),
        );

        let resumed = match persisted {
            Ok(at) => at,
            Err(e) => {
                warn!(error = %e, "Could not load last watcher check time, starting from now");
                None
            }
        };

        let rearm = {
            let mut state = self.lock();
            match timezone {
                Ok(tz) => state.server_offset_minutes = Some(tz.offset_minutes),
                Err(e) => warn!(error = %e, "Could not fetch server timezone, using local offset"),
            }
            match resumed {
                Some(at) if state.is_watching && state.session == session => {
                    debug!(resumed_from = %at, "Resuming watcher window");
                    state.start_time = Some(at);
                    state.last_check_time = Some(at);
                    self.publish(&state);
                    true
                }
                _ => false,
            }
        };

        if rearm {
            let _ = control.send(Control::Rearm);
        }
    }
}

#[derive(Default)]
struct Timers {
    interval: Option<Interval>,
    debounce: Option<Pin<Box<Sleep>>>,
    subscription: Option<Subscription>,
}

impl Timers {
    fn clear(&mut self) {
        self.interval = None;
        self.debounce = None;
        self.subscription = None;
    }

    fn arm(&mut self, shared: &Shared, events: &mpsc::UnboundedSender<()>) {
        self.clear();
        if !shared.lock().should_poll() {
            debug!("Watcher idle: not watching or nothing to poll");
            return;
        }

        let period = shared.options.poll_interval;
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);

        let events = events.clone();
        self.subscription = Some(shared.sources.changes.subscribe(Arc::new(move |_event: &ChangeEvent| {
            let _ = events.send(());
        })));
        self.schedule_debounced(shared.options.debounce);
    }

    fn schedule_debounced(&mut self, delay: Duration) {
        self.debounce = Some(Box::pin(tokio::time::sleep(delay)));
    }
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn debounce_elapsed(debounce: &mut Option<Pin<Box<Sleep>>>) {
    match debounce {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending::<()>().await,
    }
}

async fn run_scheduler(shared: Arc<Shared>, mut control: mpsc::UnboundedReceiver<Control>) {
    let (events_tx, mut events) = mpsc::unbounded_channel::<()>();
    let mut timers = Timers::default();
    timers.arm(&shared, &events_tx);

    loop {
        tokio::select! {
            message = control.recv() => match message {
                Some(Control::Rearm) => timers.arm(&shared, &events_tx),
                Some(Control::Shutdown) | None => break,
            },
            _ = next_tick(&mut timers.interval) => shared.spawn_check("interval"),
            _ = debounce_elapsed(&mut timers.debounce) => {
                timers.debounce = None;
                shared.spawn_check("debounce");
            }
            Some(()) = events.recv() => {
                if timers.subscription.is_some() {
                    timers.schedule_debounced(shared.options.debounce);
                }
            }
        }
    }

    timers.clear();
    debug!("Watcher scheduler stopped");
}

/// Handle to a running filter watcher. Dropping it stops all timers and discards any
/// responses still in flight.
pub struct FilterWatcher {
    shared: Arc<Shared>,
    control: mpsc::UnboundedSender<Control>,
}

impl FilterWatcher {
    /// Start watching `configs` immediately. Must be called inside a tokio runtime.
    pub fn spawn(configs: Vec<TrackedConfiguration>, sources: WatcherSources, options: WatcherOptions) -> Self {
        let state = WatcherState::new(configs, Utc::now());
        let (snapshot, _) = watch::channel(state.snapshot());
        let shared = Arc::new(Shared {
            sources,
            options,
            state: Mutex::new(state),
            snapshot,
            mounted: AtomicBool::new(true),
        });

        let (control, control_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_scheduler(Arc::clone(&shared), control_rx));
        tokio::spawn(Arc::clone(&shared).bootstrap(control.clone()));
        shared.request_permission();

        Self { shared, control }
    }

    /// Begin a fresh watch window at the current time
    pub fn start_watching(&self) {
        {
            let mut state = self.shared.lock();
            state.restart(Utc::now());
            self.shared.publish(&state);
        }
        info!("Filter watcher started");
        self.shared.request_permission();
        self.rearm();
    }

    pub fn stop_watching(&self) {
        {
            let mut state = self.shared.lock();
            state.halt();
            self.shared.publish(&state);
        }
        info!("Filter watcher stopped");
        self.rearm();
    }

    /// Mark everything currently matching `name` as seen.
    ///
    /// Local only: no request is made. Any check already in flight is invalidated.
    pub fn reset_watcher(&self, name: &str) {
        let grace = chrono::Duration::from_std(self.shared.options.reset_grace)
            .unwrap_or_else(|_| chrono::Duration::seconds(5));

        let mut state = self.shared.lock();
        state.overrides.insert(name.to_string(), Utc::now() + grace);
        reset_ledger_entry(&mut state.ledger, name);
        state.just_reset.insert(name.to_string());
        state.sequence += 1;
        if let Some(result) = state.results.get_mut(name) {
            result.new_items = 0;
        }
        self.shared.publish(&state);
        debug!(config = name, "Watcher reset");
    }

    /// Replace the configuration list. Accumulated results and ledgers are kept.
    pub fn set_configurations(&self, configs: Vec<TrackedConfiguration>) {
        self.shared.lock().configurations = configs;
        self.rearm();
    }

    pub fn configurations(&self) -> Vec<TrackedConfiguration> {
        self.shared.lock().configurations.clone()
    }

    pub fn snapshot(&self) -> WatcherSnapshot {
        self.shared.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WatcherSnapshot> {
        self.shared.snapshot.subscribe()
    }

    /// Stop the scheduler and ignore responses that arrive afterwards
    pub fn shutdown(&self) {
        self.shared.mounted.store(false, Ordering::SeqCst);
        let _ = self.control.send(Control::Shutdown);
    }

    fn rearm(&self) {
        let _ = self.control.send(Control::Rearm);
    }
}

impl Drop for FilterWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for FilterWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterWatcher")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}
