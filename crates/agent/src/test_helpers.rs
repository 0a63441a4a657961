//! Shared test helpers for orchestration tests.

use parley_core::error::ProviderError;
use parley_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use parley_core::tool::ToolCall;
use std::sync::Mutex;

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue and
/// records the request it was given. Panics if more calls are made than
/// responses provided.
pub struct ScriptedProvider {
    responses: Mutex<Vec<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    pub fn with_results(responses: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A provider that answers once with plain text.
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![make_text_response(text)])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Requests seen so far, oldest first.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let mut responses = self.responses.lock().unwrap();

        if responses.is_empty() {
            panic!(
                "ScriptedProvider: no more responses (call #{})",
                requests.len() + 1
            );
        }

        requests.push(request);
        responses.remove(0)
    }
}

fn mock_usage() -> Option<Usage> {
    Some(Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    })
}

/// A text-only response.
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        text: Some(text.into()),
        usage: mock_usage(),
        model: "mock-model".into(),
        ..ProviderResponse::default()
    }
}

/// A response carrying tool calls only.
pub fn make_tool_call_response(tool_calls: Vec<ToolCall>) -> ProviderResponse {
    ProviderResponse {
        tool_calls,
        usage: mock_usage(),
        model: "mock-model".into(),
        ..ProviderResponse::default()
    }
}

/// A response with neither tool calls nor text.
pub fn make_empty_response() -> ProviderResponse {
    ProviderResponse {
        usage: mock_usage(),
        model: "mock-model".into(),
        ..ProviderResponse::default()
    }
}

/// Helper to create a tool call.
pub fn make_tool_call(name: &str, args: serde_json::Value) -> ToolCall {
    ToolCall::new(format!("call_{name}"), name, args.to_string())
}
