//! Background services: periodic session log trimming.
//!
//! The trimmer wakes up on a fixed interval, walks every stored session and
//! applies the eviction policy out of band. It shares the per-session lock
//! map with the orchestration loop and skips any session that is busy, so
//! a trim never overwrites entries appended by an in-flight exchange.

use std::sync::Arc;
use std::time::Duration;

use parley_agent::{CostModel, EvictionBudgets, SessionLocks, build_cost_model, evict};
use parley_config::AppConfig;
use parley_core::error::StorageError;
use parley_core::event::{DomainEvent, EventBus};
use parley_core::session::{SessionId, SessionStore};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Result of one pass over all sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrimReport {
    /// Sessions listed by the store
    pub scanned: usize,
    /// Sessions whose log was rewritten
    pub trimmed: usize,
    /// Entries removed across all sessions
    pub removed: usize,
    /// Sessions skipped because an exchange held the lock
    pub skipped_busy: usize,
    /// Sessions that could not be trimmed (malformed log, storage error)
    pub failed: usize,
}

/// Periodic, out-of-band eviction across every stored session.
pub struct TrimmerService {
    store: Arc<dyn SessionStore>,
    locks: SessionLocks,
    budgets: EvictionBudgets,
    cost: Arc<dyn CostModel>,
    interval: Duration,
    event_bus: Arc<EventBus>,
}

impl TrimmerService {
    pub fn new(
        store: Arc<dyn SessionStore>,
        locks: SessionLocks,
        budgets: EvictionBudgets,
        cost: Arc<dyn CostModel>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            store,
            locks,
            budgets,
            cost,
            interval: Duration::from_secs(10),
            event_bus,
        }
    }

    /// Build a trimmer from the application config.
    ///
    /// `locks` must be the same map the orchestration loop uses.
    pub fn from_config(
        config: &AppConfig,
        store: Arc<dyn SessionStore>,
        locks: SessionLocks,
        event_bus: Arc<EventBus>,
    ) -> Result<Self, parley_core::Error> {
        let cost = build_cost_model(config.eviction.cost_model)?;
        Ok(Self::new(
            store,
            locks,
            EvictionBudgets::from(&config.eviction),
            cost,
            event_bus,
        )
        .with_interval(config.trimmer.interval()))
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// One pass over every stored session.
    ///
    /// Only a failure to list sessions aborts the pass; per-session
    /// failures are counted in the report and logged.
    pub async fn run_once(&self) -> Result<TrimReport, StorageError> {
        let sessions = self.store.list().await?;
        let mut report = TrimReport {
            scanned: sessions.len(),
            ..TrimReport::default()
        };

        for id in &sessions {
            let Some(_guard) = self.locks.try_acquire(id).await else {
                debug!(session_id = %id, "Session busy, skipping trim");
                report.skipped_busy += 1;
                continue;
            };

            match self.trim_session(id).await {
                Ok(0) => {}
                Ok(removed) => {
                    report.trimmed += 1;
                    report.removed += removed;
                }
                Err(reason) => {
                    warn!(session_id = %id, %reason, "Trim failed");
                    self.event_bus.publish(DomainEvent::ErrorOccurred {
                        context: format!("trimmer:{id}"),
                        error_message: reason,
                        timestamp: chrono::Utc::now(),
                    });
                    report.failed += 1;
                }
            }
        }

        self.locks.prune().await;
        Ok(report)
    }

    /// Evict one session under its lock. Writes only when the log changed.
    async fn trim_session(&self, id: &SessionId) -> Result<usize, String> {
        let Some(log) = self.store.load(id).await.map_err(|e| e.to_string())? else {
            return Ok(0);
        };

        let outcome = evict(&log, &self.budgets, self.cost.as_ref()).map_err(|e| e.to_string())?;
        if !outcome.changed() {
            return Ok(0);
        }

        self.store
            .save(id, &outcome.log)
            .await
            .map_err(|e| e.to_string())?;

        debug!(
            session_id = %id,
            removed = outcome.removed(),
            remaining = outcome.log.len(),
            "Trimmed session log"
        );
        self.event_bus.publish(DomainEvent::LogTrimmed {
            session_id: id.to_string(),
            removed: outcome.removed(),
            remaining: outcome.log.len(),
            timestamp: chrono::Utc::now(),
        });

        Ok(outcome.removed())
    }

    /// Start the trimmer background loop.
    ///
    /// Runs a pass immediately, then every `interval`; ticks missed while a
    /// pass is running are skipped. Stops when `shutdown` flips to `true`
    /// or its sender is dropped.
    pub fn start(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(interval_secs = self.interval.as_secs(), "Trimmer started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => match self.run_once().await {
                        Ok(report) if report.trimmed > 0 || report.failed > 0 => info!(
                            scanned = report.scanned,
                            trimmed = report.trimmed,
                            removed = report.removed,
                            skipped_busy = report.skipped_busy,
                            failed = report.failed,
                            "Trim pass finished"
                        ),
                        Ok(report) => debug!(scanned = report.scanned, "Trim pass: nothing to do"),
                        Err(e) => warn!(error = %e, "Trim pass failed to list sessions"),
                    },
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("Trimmer stopping");
                            break;
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_agent::HeuristicCost;
    use parley_core::message::{Message, MessageLog};
    use parley_storage::InMemoryStore;

    fn trimmer(store: Arc<InMemoryStore>, locks: SessionLocks, budgets: EvictionBudgets) -> TrimmerService {
        TrimmerService::new(
            store,
            locks,
            budgets,
            Arc::new(HeuristicCost),
            Arc::new(EventBus::default()),
        )
    }

    fn chatty_log() -> MessageLog {
        MessageLog::from_messages(vec![
            Message::system("You are helpful."),
            Message::user("weather?"),
            Message::function("get_weather", r#"{"temp":1}"#),
            Message::function("get_weather", r#"{"temp":2}"#),
            Message::function("get_weather", r#"{"temp":3}"#),
            Message::assistant("Cold."),
        ])
    }

    fn cap(n: usize) -> EvictionBudgets {
        EvictionBudgets {
            max_function_entries: n,
            max_total_cost: 1_000_000,
        }
    }

    #[tokio::test]
    async fn trims_only_sessions_over_budget() {
        let store = Arc::new(InMemoryStore::new());
        store.save(&SessionId::from("big"), &chatty_log()).await.unwrap();
        store
            .save(&SessionId::from("small"), &MessageLog::seeded("p"))
            .await
            .unwrap();

        let report = trimmer(store.clone(), SessionLocks::new(), cap(1))
            .run_once()
            .await
            .unwrap();

        assert_eq!(
            report,
            TrimReport {
                scanned: 2,
                trimmed: 1,
                removed: 2,
                skipped_busy: 0,
                failed: 0,
            }
        );
        let big = store.load(&SessionId::from("big")).await.unwrap().unwrap();
        assert_eq!(big.function_count(), 1);
        assert_eq!(big[0].content.as_text(), "You are helpful.");
    }

    #[tokio::test]
    async fn second_pass_is_a_no_op() {
        let store = Arc::new(InMemoryStore::new());
        store.save(&SessionId::from("big"), &chatty_log()).await.unwrap();
        let trimmer = trimmer(store, SessionLocks::new(), cap(2));

        assert_eq!(trimmer.run_once().await.unwrap().trimmed, 1);
        assert_eq!(trimmer.run_once().await.unwrap().trimmed, 0);
    }

    #[tokio::test]
    async fn busy_sessions_are_skipped_untouched() {
        let store = Arc::new(InMemoryStore::new());
        let id = SessionId::from("busy");
        store.save(&id, &chatty_log()).await.unwrap();

        let locks = SessionLocks::new();
        let guard = locks.acquire(&id).await;
        let trimmer = trimmer(store.clone(), locks, cap(0));

        let report = trimmer.run_once().await.unwrap();
        assert_eq!(report.skipped_busy, 1);
        assert_eq!(store.load(&id).await.unwrap().unwrap(), chatty_log());

        drop(guard);
        assert_eq!(trimmer.run_once().await.unwrap().trimmed, 1);
    }

    #[tokio::test]
    async fn malformed_log_is_counted_and_left_alone() {
        let store = Arc::new(InMemoryStore::new());
        let id = SessionId::from("odd");
        let mut broken = Message::function("x", "1");
        broken.name = None;
        let log = MessageLog::from_messages(vec![Message::system("p"), broken]);
        store.save(&id, &log).await.unwrap();

        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let trimmer = TrimmerService::new(
            store.clone(),
            SessionLocks::new(),
            cap(0),
            Arc::new(HeuristicCost),
            bus,
        );

        let report = trimmer.run_once().await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(store.load(&id).await.unwrap().unwrap(), log);
        assert!(matches!(
            rx.recv().await.unwrap().as_ref(),
            DomainEvent::ErrorOccurred { .. }
        ));
    }

    #[tokio::test]
    async fn publishes_trim_events() {
        let store = Arc::new(InMemoryStore::new());
        store.save(&SessionId::from("big"), &chatty_log()).await.unwrap();

        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        TrimmerService::new(store, SessionLocks::new(), cap(0), Arc::new(HeuristicCost), bus)
            .run_once()
            .await
            .unwrap();

        match rx.recv().await.unwrap().as_ref() {
            DomainEvent::LogTrimmed {
                session_id,
                removed,
                remaining,
                ..
            } => {
                assert_eq!(session_id, "big");
                assert_eq!(*removed, 3);
                assert_eq!(*remaining, 3);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn from_config_uses_trimmer_interval() {
        let mut config = AppConfig::default();
        config.trimmer.interval_secs = 42;
        let trimmer = TrimmerService::from_config(
            &config,
            Arc::new(InMemoryStore::new()),
            SessionLocks::new(),
            Arc::new(EventBus::default()),
        )
        .unwrap();
        assert_eq!(trimmer.interval(), Duration::from_secs(42));
    }

    #[tokio::test(start_paused = true)]
    async fn background_loop_trims_and_stops() {
        let store = Arc::new(InMemoryStore::new());
        let id = SessionId::from("big");
        store.save(&id, &chatty_log()).await.unwrap();

        let service = Arc::new(
            trimmer(store.clone(), SessionLocks::new(), cap(0)).with_interval(Duration::from_secs(5)),
        );
        let (tx, rx) = watch::channel(false);
        let handle = service.start(rx);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(store.load(&id).await.unwrap().unwrap().function_count(), 0);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
