//! The orchestration loop.
//!
//! One exchange drives a bounded state machine:
//!
//! ```text
//! AwaitingModel ──tool calls──▶ HandlingTools ──terminate──▶ Terminated
//!      ▲    │                        │
//!      │    ├──text──▶ Done          │
//!      │    └──neither─▶ Failed      │
//!      └──────────── results ◀───────┘
//! ```
//!
//! Every transition back into `AwaitingModel` costs one round; exceeding
//! `max_iterations` rounds fails the exchange with `LoopExceeded`.

use std::sync::Arc;
use std::time::Duration;

use parley_config::AppConfig;
use parley_core::error::{ExchangeError, StorageError};
use parley_core::event::{DomainEvent, EventBus};
use parley_core::message::{Message, MessageLog};
use parley_core::provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
use parley_core::session::{SessionId, SessionStore};
use parley_core::tool::{ToolCall, ToolContext, ToolRegistry};
use tracing::{debug, info, warn};

use crate::cost::{CostModel, HeuristicCost, build_cost_model};
use crate::dispatcher::ToolDispatcher;
use crate::eviction::{EvictionBudgets, evict};
use crate::sessions::SessionLocks;

/// Successful terminal outcome of one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// The model answered with text (already appended to the log)
    Reply(String),

    /// A terminating tool ran; no further model text this round
    Terminated,
}

impl ExchangeOutcome {
    pub fn tag(&self) -> &'static str {
        match self {
            ExchangeOutcome::Reply(_) => "reply",
            ExchangeOutcome::Terminated => "terminated",
        }
    }

    pub fn reply(&self) -> Option<&str> {
        match self {
            ExchangeOutcome::Reply(text) => Some(text.as_str()),
            ExchangeOutcome::Terminated => None,
        }
    }
}

enum LoopState {
    AwaitingModel,
    HandlingTools(Vec<ToolCall>),
    Done(String),
    Terminated,
    Failed(ExchangeError),
}

/// The orchestration loop for one process: shared by every session.
pub struct AgentLoop {
    /// The model provider to use
    provider: Arc<dyn Provider>,

    /// The model to use
    model: String,

    /// Temperature setting
    temperature: f32,

    /// Max tokens per response
    max_tokens: Option<u32>,

    /// Resolves and runs tool calls
    dispatcher: ToolDispatcher,

    /// Where session logs live
    store: Arc<dyn SessionStore>,

    /// Per-session exclusion, shared with the trimmer
    locks: SessionLocks,

    /// Retention budgets applied when an exchange completes
    budgets: EvictionBudgets,

    cost: Arc<dyn CostModel>,

    /// Content of the anchor entry for new sessions
    system_prompt: String,

    /// Maximum model rounds per exchange
    max_iterations: u32,

    /// Time limit for one model call
    model_timeout: Duration,

    /// Event bus for domain events
    event_bus: Arc<EventBus>,
}

impl AgentLoop {
    /// Create a loop with default limits and the heuristic cost model.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
        store: Arc<dyn SessionStore>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            dispatcher: ToolDispatcher::new(tools, Duration::from_secs(30), event_bus.clone()),
            store,
            locks: SessionLocks::new(),
            budgets: EvictionBudgets::default(),
            cost: Arc::new(HeuristicCost),
            system_prompt: parley_config::IdentityConfig::default().system_prompt,
            max_iterations: 25,
            model_timeout: Duration::from_secs(120),
            event_bus,
        }
    }

    /// Build a loop from the application config.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
        store: Arc<dyn SessionStore>,
        event_bus: Arc<EventBus>,
    ) -> Result<Self, parley_core::Error> {
        let system_prompt = config
            .identity
            .resolve_system_prompt()
            .map_err(|e| parley_core::Error::Config {
                message: e.to_string(),
            })?;
        let cost = build_cost_model(config.eviction.cost_model)?;
        let orchestration = &config.orchestration;

        Ok(Self::new(provider, model, tools, store, event_bus)
            .with_temperature(config.default_temperature)
            .with_max_tokens(config.default_max_tokens)
            .with_max_iterations(orchestration.max_iterations)
            .with_model_timeout(orchestration.model_timeout())
            .with_tool_timeout(orchestration.tool_timeout())
            .with_budgets(EvictionBudgets::from(&config.eviction))
            .with_cost_model(cost)
            .with_system_prompt(system_prompt))
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the max tokens per model response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Set the maximum number of model rounds per exchange.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = timeout;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.dispatcher = ToolDispatcher::new(
            self.dispatcher.registry().clone(),
            timeout,
            self.event_bus.clone(),
        );
        self
    }

    pub fn with_budgets(mut self, budgets: EvictionBudgets) -> Self {
        self.budgets = budgets;
        self
    }

    pub fn with_cost_model(mut self, cost: Arc<dyn CostModel>) -> Self {
        self.cost = cost;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Share a lock map with other components (e.g. the trimmer).
    pub fn with_locks(mut self, locks: SessionLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn budgets(&self) -> EvictionBudgets {
        self.budgets
    }

    pub fn cost_model(&self) -> &Arc<dyn CostModel> {
        &self.cost
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn locks(&self) -> &SessionLocks {
        &self.locks
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        self.dispatcher.registry()
    }

    /// Run one exchange on an in-memory log.
    ///
    /// Appends the user entry, then alternates model calls and tool
    /// dispatch until the model answers with text, a terminating tool runs,
    /// or an error ends the exchange. On error the log keeps every entry
    /// appended so far. Nothing is persisted here; see [`AgentLoop::handle`].
    pub async fn run(
        &self,
        log: &mut MessageLog,
        user_text: &str,
        ctx: &ToolContext,
    ) -> Result<ExchangeOutcome, ExchangeError> {
        if user_text.trim().is_empty() {
            return Err(ExchangeError::EmptyInput);
        }

        info!(
            session_id = %ctx.session_id,
            entries = log.len(),
            "Processing exchange"
        );

        log.push(Message::user(user_text));

        let definitions = self.dispatcher.registry().definitions();
        let mut rounds: u32 = 0;
        let mut state = LoopState::AwaitingModel;

        let result = loop {
            state = match state {
                LoopState::AwaitingModel => {
                    if rounds >= self.max_iterations {
                        warn!(
                            session_id = %ctx.session_id,
                            limit = self.max_iterations,
                            "Max model rounds reached"
                        );
                        LoopState::Failed(ExchangeError::LoopExceeded {
                            limit: self.max_iterations,
                        })
                    } else {
                        rounds += 1;
                        debug!(session_id = %ctx.session_id, iteration = rounds, "Model round");
                        match self.call_model(log, &definitions, ctx).await {
                            Ok(response) => Self::classify(response),
                            Err(e) => LoopState::Failed(e),
                        }
                    }
                }
                LoopState::HandlingTools(calls) => {
                    debug!(tool_count = calls.len(), "Executing tool calls");
                    match self.dispatcher.dispatch(&calls, ctx).await {
                        Ok(outcome) => {
                            log.extend(outcome.entries);
                            if outcome.terminate {
                                LoopState::Terminated
                            } else {
                                LoopState::AwaitingModel
                            }
                        }
                        Err(e) => LoopState::Failed(e),
                    }
                }
                LoopState::Done(text) => {
                    log.push(Message::assistant(text.clone()));
                    break Ok(ExchangeOutcome::Reply(text));
                }
                LoopState::Terminated => break Ok(ExchangeOutcome::Terminated),
                LoopState::Failed(e) => break Err(e),
            };
        };

        let outcome_tag = match &result {
            Ok(outcome) => outcome.tag(),
            Err(e) => e.tag(),
        };
        self.event_bus.publish(DomainEvent::ExchangeFinished {
            session_id: ctx.session_id.to_string(),
            outcome: outcome_tag.into(),
            rounds,
            timestamp: chrono::Utc::now(),
        });

        result
    }

    /// Tool calls take precedence over text; neither means no content.
    fn classify(response: ProviderResponse) -> LoopState {
        if !response.tool_calls.is_empty() {
            return LoopState::HandlingTools(response.tool_calls);
        }
        match response.text_content() {
            Some(text) => LoopState::Done(text.to_string()),
            None => LoopState::Failed(ExchangeError::NoContent),
        }
    }

    async fn call_model(
        &self,
        log: &MessageLog,
        definitions: &[ToolDefinition],
        ctx: &ToolContext,
    ) -> Result<ProviderResponse, ExchangeError> {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages: log.messages().to_vec(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: definitions.to_vec(),
        };

        let response = tokio::time::timeout(self.model_timeout, self.provider.complete(request))
            .await
            .map_err(|_| ExchangeError::Timeout {
                stage: "model call".into(),
                secs: self.model_timeout.as_secs(),
            })??;

        if let Some(usage) = &response.usage {
            self.event_bus.publish(DomainEvent::ResponseGenerated {
                session_id: ctx.session_id.to_string(),
                model: response.model.clone(),
                tokens_used: usage.total_tokens,
                timestamp: chrono::Utc::now(),
            });
        }

        Ok(response)
    }

    /// Run one exchange for a stored session.
    ///
    /// Holds the session lock for the whole load → run → evict → save
    /// sequence. A session without a stored log starts from the anchor
    /// entry. Only successful outcomes are persisted, so a failed exchange
    /// leaves the stored log exactly as it was.
    pub async fn handle(
        &self,
        session_id: &SessionId,
        user_text: &str,
        ctx: Option<ToolContext>,
    ) -> Result<ExchangeOutcome, ExchangeError> {
        if user_text.trim().is_empty() {
            return Err(ExchangeError::EmptyInput);
        }

        let ctx = ctx.unwrap_or_else(|| ToolContext::new(session_id.clone()));
        let guard = self.locks.acquire(session_id).await;
        let result = self.handle_locked(session_id, user_text, &ctx).await;
        drop(guard);

        // Idle sessions should not pin a lock entry when no trimmer runs.
        self.locks.release(session_id).await;
        result
    }

    async fn handle_locked(
        &self,
        session_id: &SessionId,
        user_text: &str,
        ctx: &ToolContext,
    ) -> Result<ExchangeOutcome, ExchangeError> {
        let mut log = match self.store.load(session_id).await? {
            Some(log) if !log.is_empty() => log,
            _ => {
                debug!(%session_id, "Seeding new session");
                MessageLog::seeded(self.system_prompt.as_str())
            }
        };

        let outcome = match self.run(&mut log, user_text, ctx).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(%session_id, error = %e, "Exchange failed");
                self.event_bus.publish(DomainEvent::ErrorOccurred {
                    context: format!("exchange:{session_id}"),
                    error_message: e.to_string(),
                    timestamp: chrono::Utc::now(),
                });
                return Err(e);
            }
        };

        let retained = self.retain(session_id, log);
        self.store.save(session_id, &retained).await?;

        Ok(outcome)
    }

    /// Apply the eviction policy; a malformed log is kept as-is.
    fn retain(&self, session_id: &SessionId, log: MessageLog) -> MessageLog {
        match evict(&log, &self.budgets, self.cost.as_ref()) {
            Ok(outcome) => {
                if outcome.changed() {
                    debug!(
                        %session_id,
                        removed = outcome.removed(),
                        remaining = outcome.log.len(),
                        "Trimmed session log"
                    );
                    self.event_bus.publish(DomainEvent::LogTrimmed {
                        session_id: session_id.to_string(),
                        removed: outcome.removed(),
                        remaining: outcome.log.len(),
                        timestamp: chrono::Utc::now(),
                    });
                }
                outcome.log
            }
            Err(e) => {
                warn!(%session_id, error = %e, "Skipping eviction");
                self.event_bus.publish(DomainEvent::ErrorOccurred {
                    context: format!("eviction:{session_id}"),
                    error_message: e.to_string(),
                    timestamp: chrono::Utc::now(),
                });
                log
            }
        }
    }

    /// Replace the anchor content of every stored session with the
    /// configured system prompt. Returns how many logs changed.
    pub async fn refresh_system_prompt(&self) -> Result<usize, StorageError> {
        let mut updated = 0;
        for id in self.store.list().await? {
            let _guard = self.locks.acquire(&id).await;
            let Some(mut log) = self.store.load(&id).await? else {
                continue;
            };
            if log.replace_anchor_content(self.system_prompt.as_str()) {
                self.store.save(&id, &log).await?;
                updated += 1;
            }
        }
        self.locks.prune().await;
        info!(updated, "Refreshed system prompts");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use async_trait::async_trait;
    use parley_core::error::{ProviderError, ToolError};
    use parley_core::message::Role;
    use parley_core::tool::{Tool, ToolContract};
    use parley_storage::InMemoryStore;
    use serde_json::{Map, Value};

    struct LookupTool;

    #[async_trait]
    impl Tool for LookupTool {
        fn name(&self) -> &str {
            "lookup"
        }
        fn description(&self) -> &str {
            "Look something up"
        }
        fn parameters_schema(&self) -> Value {
            serde_json::json!({"type": "object", "properties": {"q": {"type": "string"}}})
        }
        async fn execute(
            &self,
            arguments: Map<String, Value>,
            _ctx: Option<&ToolContext>,
        ) -> Result<Value, ToolError> {
            let q = arguments.get("q").and_then(Value::as_str).unwrap_or("");
            Ok(serde_json::json!({ "answer": format!("about {q}") }))
        }
    }

    struct FinishTool;

    #[async_trait]
    impl Tool for FinishTool {
        fn name(&self) -> &str {
            "finish"
        }
        fn description(&self) -> &str {
            "Deliver the answer directly"
        }
        fn parameters_schema(&self) -> Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(
            &self,
            _arguments: Map<String, Value>,
            _ctx: Option<&ToolContext>,
        ) -> Result<Value, ToolError> {
            Ok(serde_json::json!({ "status": "sent" }))
        }
    }

    struct HangingProvider;

    #[async_trait]
    impl Provider for HangingProvider {
        fn name(&self) -> &str {
            "hanging"
        }
        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(ProviderResponse::default())
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        Arc::new(ToolRegistry::from_contracts([
            ToolContract::new(LookupTool),
            ToolContract::new(FinishTool).terminating(),
        ]))
    }

    fn agent(provider: Arc<dyn Provider>, store: Arc<InMemoryStore>) -> AgentLoop {
        AgentLoop::new(
            provider,
            "mock-model",
            registry(),
            store,
            Arc::new(EventBus::default()),
        )
        .with_system_prompt("You are helpful.")
    }

    fn ctx() -> ToolContext {
        ToolContext::new(SessionId::from("s1"))
    }

    #[tokio::test]
    async fn simple_text_response() {
        let provider = Arc::new(ScriptedProvider::single_text("Hello! How can I help?"));
        let agent = agent(provider.clone(), Arc::new(InMemoryStore::new()));

        let mut log = MessageLog::seeded("You are helpful.");
        let outcome = agent.run(&mut log, "Hello!", &ctx()).await.unwrap();

        assert_eq!(outcome, ExchangeOutcome::Reply("Hello! How can I help?".into()));
        // System + User + Assistant
        assert_eq!(log.len(), 3);
        assert_eq!(log[2].role, Role::Assistant);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn request_carries_log_and_catalog() {
        let provider = Arc::new(ScriptedProvider::single_text("ok"));
        let agent = agent(provider.clone(), Arc::new(InMemoryStore::new()));

        let mut log = MessageLog::seeded("You are helpful.");
        agent.run(&mut log, "hi", &ctx()).await.unwrap();

        let request = &provider.requests()[0];
        assert_eq!(request.model, "mock-model");
        assert_eq!(request.messages.len(), 2);
        let names: Vec<_> = request.tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["finish", "lookup"]);
    }

    #[tokio::test]
    async fn tool_round_then_answer() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            make_tool_call_response(vec![make_tool_call("lookup", serde_json::json!({"q": "rust"}))]),
            make_text_response("Rust is a language."),
        ]));
        let agent = agent(provider.clone(), Arc::new(InMemoryStore::new()));

        let mut log = MessageLog::seeded("You are helpful.");
        let outcome = agent.run(&mut log, "What is Rust?", &ctx()).await.unwrap();

        assert_eq!(outcome.reply(), Some("Rust is a language."));
        let roles: Vec<_> = log.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Function, Role::Assistant]
        );
        assert_eq!(log[2].name.as_deref(), Some("lookup"));
        assert_eq!(log[2].content.as_text(), r#"{"answer":"about rust"}"#);

        // Second round sees the function entry
        assert_eq!(provider.requests()[1].messages.len(), 3);
    }

    #[tokio::test]
    async fn terminating_tool_stops_without_another_round() {
        let provider = Arc::new(ScriptedProvider::new(vec![make_tool_call_response(vec![
            make_tool_call("lookup", serde_json::json!({"q": "cats"})),
            make_tool_call("finish", serde_json::json!({})),
        ])]));
        let agent = agent(provider.clone(), Arc::new(InMemoryStore::new()));

        let mut log = MessageLog::seeded("You are helpful.");
        let outcome = agent.run(&mut log, "Show me a cat", &ctx()).await.unwrap();

        assert_eq!(outcome, ExchangeOutcome::Terminated);
        assert_eq!(provider.call_count(), 1);
        assert_eq!(log.function_count(), 2);
        assert_eq!(log.len(), 4);
    }

    #[tokio::test]
    async fn no_content_leaves_only_user_entry() {
        let provider = Arc::new(ScriptedProvider::new(vec![make_empty_response()]));
        let agent = agent(provider, Arc::new(InMemoryStore::new()));

        let mut log = MessageLog::seeded("You are helpful.");
        let err = agent.run(&mut log, "hello?", &ctx()).await.unwrap_err();

        assert!(matches!(err, ExchangeError::NoContent));
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].role, Role::User);
    }

    #[tokio::test]
    async fn empty_text_counts_as_no_content() {
        let provider = Arc::new(ScriptedProvider::single_text(""));
        let agent = agent(provider, Arc::new(InMemoryStore::new()));

        let mut log = MessageLog::seeded("p");
        let err = agent.run(&mut log, "hello?", &ctx()).await.unwrap_err();
        assert!(matches!(err, ExchangeError::NoContent));
    }

    #[tokio::test]
    async fn loop_ceiling_is_enforced() {
        let call = || make_tool_call_response(vec![make_tool_call("lookup", serde_json::json!({}))]);
        let provider = Arc::new(ScriptedProvider::new(vec![call(), call(), call()]));
        let agent = agent(provider.clone(), Arc::new(InMemoryStore::new())).with_max_iterations(3);

        let mut log = MessageLog::seeded("p");
        let err = agent.run(&mut log, "loop forever", &ctx()).await.unwrap_err();

        assert!(matches!(err, ExchangeError::LoopExceeded { limit: 3 }));
        assert_eq!(provider.call_count(), 3);
        // Entries appended before the ceiling stay in the log
        assert_eq!(log.function_count(), 3);
    }

    #[tokio::test]
    async fn provider_error_is_terminal() {
        let provider = Arc::new(ScriptedProvider::with_results(vec![Err(
            ProviderError::Network("connection reset".into()),
        )]));
        let agent = agent(provider, Arc::new(InMemoryStore::new()));

        let mut log = MessageLog::seeded("p");
        let err = agent.run(&mut log, "hi", &ctx()).await.unwrap_err();
        assert_eq!(err.tag(), "provider_unavailable");
    }

    #[tokio::test(start_paused = true)]
    async fn model_timeout_is_terminal() {
        let agent = agent(Arc::new(HangingProvider), Arc::new(InMemoryStore::new()))
            .with_model_timeout(Duration::from_secs(2));

        let mut log = MessageLog::seeded("p");
        let err = agent.run(&mut log, "hi", &ctx()).await.unwrap_err();
        assert!(matches!(err, ExchangeError::Timeout { secs: 2, .. }));
    }

    #[tokio::test]
    async fn empty_input_is_rejected_before_any_call() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let agent = agent(provider.clone(), Arc::new(InMemoryStore::new()));

        let mut log = MessageLog::seeded("p");
        let err = agent.run(&mut log, "   ", &ctx()).await.unwrap_err();
        assert!(matches!(err, ExchangeError::EmptyInput));
        assert_eq!(log.len(), 1);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn handle_seeds_and_persists() {
        let store = Arc::new(InMemoryStore::new());
        let provider = Arc::new(ScriptedProvider::single_text("Hi there"));
        let agent = agent(provider, store.clone());
        let id = SessionId::from("alice");

        let outcome = agent.handle(&id, "Hello", None).await.unwrap();
        assert_eq!(outcome.reply(), Some("Hi there"));

        let stored = store.load(&id).await.unwrap().unwrap();
        assert_eq!(stored.len(), 3);
        assert_eq!(stored.anchor().unwrap().content.as_text(), "You are helpful.");
    }

    #[tokio::test]
    async fn handle_failure_does_not_persist() {
        let store = Arc::new(InMemoryStore::new());
        let id = SessionId::from("bob");
        let before = MessageLog::from_messages(vec![
            Message::system("You are helpful."),
            Message::user("earlier"),
            Message::assistant("reply"),
        ]);
        store.save(&id, &before).await.unwrap();

        let provider = Arc::new(ScriptedProvider::new(vec![make_empty_response()]));
        let agent = agent(provider, store.clone());

        let err = agent.handle(&id, "again", None).await.unwrap_err();
        assert!(matches!(err, ExchangeError::NoContent));
        assert_eq!(store.load(&id).await.unwrap().unwrap(), before);
    }

    #[tokio::test]
    async fn handle_leaves_no_idle_lock_entries() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            make_text_response("first"),
            make_empty_response(),
        ]));
        let agent = agent(provider, Arc::new(InMemoryStore::new()));

        agent.handle(&SessionId::from("a"), "hi", None).await.unwrap();
        agent.handle(&SessionId::from("b"), "hi", None).await.unwrap_err();
        assert_eq!(agent.locks().len().await, 0);
    }

    #[tokio::test]
    async fn handle_applies_eviction_before_saving() {
        let store = Arc::new(InMemoryStore::new());
        let provider = Arc::new(ScriptedProvider::new(vec![
            make_tool_call_response(vec![
                make_tool_call("lookup", serde_json::json!({"q": "a"})),
                make_tool_call("lookup", serde_json::json!({"q": "b"})),
                make_tool_call("lookup", serde_json::json!({"q": "c"})),
            ]),
            make_text_response("done"),
        ]));
        let agent = agent(provider, store.clone()).with_budgets(EvictionBudgets {
            max_function_entries: 1,
            max_total_cost: 10_000,
        });
        let id = SessionId::from("carol");

        agent.handle(&id, "look up three things", None).await.unwrap();

        let stored = store.load(&id).await.unwrap().unwrap();
        assert_eq!(stored.function_count(), 1);
        assert_eq!(stored[2].content.as_text(), r#"{"answer":"about c"}"#);
    }

    #[tokio::test]
    async fn inconsistent_log_is_saved_unevicted() {
        let store = Arc::new(InMemoryStore::new());
        let id = SessionId::from("dave");
        let mut odd = Message::user("named");
        odd.name = Some("lookup".into());
        store
            .save(&id, &MessageLog::from_messages(vec![Message::system("p"), odd]))
            .await
            .unwrap();

        let provider = Arc::new(ScriptedProvider::single_text("fine"));
        let agent = agent(provider, store.clone()).with_budgets(EvictionBudgets {
            max_function_entries: 0,
            max_total_cost: 1,
        });

        agent.handle(&id, "hi", None).await.unwrap();
        assert_eq!(store.load(&id).await.unwrap().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn refresh_replaces_every_anchor() {
        let store = Arc::new(InMemoryStore::new());
        store
            .save(&SessionId::from("a"), &MessageLog::seeded("old prompt"))
            .await
            .unwrap();
        store
            .save(
                &SessionId::from("b"),
                &MessageLog::from_messages(vec![Message::user("no anchor")]),
            )
            .await
            .unwrap();
        store
            .save(&SessionId::from("c"), &MessageLog::seeded("You are helpful."))
            .await
            .unwrap();

        let agent = agent(Arc::new(ScriptedProvider::new(vec![])), store.clone());
        let updated = agent.refresh_system_prompt().await.unwrap();

        assert_eq!(updated, 2);
        for id in ["a", "b", "c"] {
            let log = store.load(&SessionId::from(id)).await.unwrap().unwrap();
            assert_eq!(log.anchor().unwrap().content.as_text(), "You are helpful.");
        }
    }

    #[tokio::test]
    async fn exchange_finished_event_reports_rounds() {
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let provider = Arc::new(ScriptedProvider::new(vec![
            make_tool_call_response(vec![make_tool_call("lookup", serde_json::json!({}))]),
            make_text_response("ok"),
        ]));
        let agent = AgentLoop::new(
            provider,
            "mock-model",
            registry(),
            Arc::new(InMemoryStore::new()),
            bus,
        );

        let mut log = MessageLog::seeded("p");
        agent.run(&mut log, "hi", &ctx()).await.unwrap();

        let mut finished = None;
        while let Ok(event) = rx.try_recv() {
            if let DomainEvent::ExchangeFinished { outcome, rounds, .. } = event.as_ref() {
                finished = Some((outcome.clone(), *rounds));
            }
        }
        assert_eq!(finished, Some(("reply".to_string(), 2)));
    }
}
