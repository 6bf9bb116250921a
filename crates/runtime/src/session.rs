//! Session management and the bounded tool-call loop.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::budget::{CallBudget, DEFAULT_CALL_BUDGET};
use crate::model::{
    Backend, Message, ModelRequest, Part, ToolCall, ToolOutcome, ToolResult, Usage,
};
use crate::tools::{ToolError, ToolHost};
use crate::Result;

/// Observation recorded for calls cut off by the budget.
const SKIPPED_OBSERVATION: &str = "skipped: tool call budget exhausted";

/// Stands in for an assistant turn that came back without any content.
const EMPTY_REPLY: &str = "(the model returned no content)";

/// Unique identifier of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the conversation keeps between two queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryPolicy {
    /// Every query starts from an empty conversation.
    #[default]
    PerQuery,
    /// Queries build on all previous turns.
    Session,
}

impl FromStr for HistoryPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "per_query" | "per-query" => Ok(Self::PerQuery),
            "session" => Ok(Self::Session),
            other => Err(format!(
                "unknown history policy '{other}' (expected per_query or session)"
            )),
        }
    }
}

impl fmt::Display for HistoryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PerQuery => write!(f, "per_query"),
            Self::Session => write!(f, "session"),
        }
    }
}

/// Session settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub call_budget: u32,
    pub history: HistoryPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            call_budget: DEFAULT_CALL_BUDGET,
            history: HistoryPolicy::default(),
        }
    }
}

/// A dispatched tool call and what came back.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRecord {
    pub call: ToolCall,
    pub outcome: ToolOutcome,
}

/// How a query ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The model answered without requesting more tools.
    Answer(String),
    /// The budget ran out while the model still wanted tools.
    BudgetExhausted { skipped: usize },
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Answer(text) => write!(f, "{text}"),
            Self::BudgetExhausted { skipped } => write!(
                f,
                "Tool call budget exhausted; {skipped} requested call(s) were not run."
            ),
        }
    }
}

/// Everything that happened while answering one query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub reply: Reply,
    /// Dispatched calls in order, with their observations.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Text the model produced alongside tool requests.
    pub notes: Vec<String>,
    /// Model round-trips made.
    pub model_calls: u32,
    pub usage: Usage,
}

/// A conversation with a model that can call tools.
///
/// The budget spans the whole session; the conversation spans either one
/// query or the whole session depending on [`HistoryPolicy`].
pub struct Session<B, H> {
    id: SessionId,
    backend: B,
    tools: H,
    config: SessionConfig,
    budget: CallBudget,
    messages: Vec<Message>,
}

impl<B: Backend, H: ToolHost> Session<B, H> {
    pub fn new(backend: B, tools: H, config: SessionConfig) -> Self {
        Self {
            id: SessionId::new(),
            backend,
            tools,
            budget: CallBudget::new(config.call_budget),
            config,
            messages: Vec::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn budget(&self) -> &CallBudget {
        &self.budget
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn tools(&self) -> &H {
        &self.tools
    }

    /// Answer a user query, calling tools until the model stops asking for
    /// them or the budget runs out.
    ///
    /// On error the conversation is rolled back to where it was before the
    /// query, so a later query starts from a well-formed history.
    #[tracing::instrument(skip_all, fields(session = %self.id))]
    pub async fn ask(&mut self, query: &str) -> Result<QueryOutcome> {
        if self.config.history == HistoryPolicy::PerQuery {
            self.messages.clear();
        }
        let checkpoint = self.messages.len();
        self.messages.push(Message::user(query));

        let result = self.run().await;
        match &result {
            Ok(outcome) => tracing::info!(
                tool_calls = outcome.tool_calls.len(),
                model_calls = outcome.model_calls,
                budget_remaining = self.budget.remaining(),
                "query finished"
            ),
            Err(e) => {
                tracing::warn!(error = %e, "query failed");
                self.messages.truncate(checkpoint);
            }
        }
        result
    }

    async fn run(&mut self) -> Result<QueryOutcome> {
        let mut tool_calls = Vec::new();
        let mut notes = Vec::new();
        let mut model_calls = 0;
        let mut usage = Usage::default();

        loop {
            let response = self
                .backend
                .call(ModelRequest {
                    messages: &self.messages,
                    tools: self.tools.specs(),
                })
                .await?;
            model_calls += 1;
            usage += response.usage;

            let mut message = response.message;
            if message.parts.is_empty() {
                // The API rejects empty assistant turns in later requests.
                tracing::warn!(finish_reason = ?response.finish_reason, "model returned no content");
                message.parts.push(Part::Text(EMPTY_REPLY.to_string()));
            }
            let calls: Vec<ToolCall> = message.tool_calls().into_iter().cloned().collect();
            let text = message.text();
            self.messages.push(message);

            if calls.is_empty() {
                return Ok(QueryOutcome {
                    reply: Reply::Answer(text),
                    tool_calls,
                    notes,
                    model_calls,
                    usage,
                });
            }
            if !text.is_empty() {
                notes.push(text);
            }

            let mut results = Vec::with_capacity(calls.len());
            let mut skipped = 0;
            for call in calls {
                if !self.budget.try_consume() {
                    tracing::debug!(tool = %call.name, "skipping tool call, budget exhausted");
                    results.push(ToolResult::error(&call.id, SKIPPED_OBSERVATION));
                    skipped += 1;
                    continue;
                }

                let outcome = self.dispatch(&call).await?;
                tracing::debug!(
                    tool = %call.name,
                    is_error = outcome.is_error(),
                    remaining = self.budget.remaining(),
                    "tool call dispatched"
                );
                results.push(ToolResult::new(&call.id, outcome.clone()));
                tool_calls.push(ToolCallRecord { call, outcome });
            }
            self.messages.push(Message::tool_results(results));

            if skipped > 0 {
                return Ok(QueryOutcome {
                    reply: Reply::BudgetExhausted { skipped },
                    tool_calls,
                    notes,
                    model_calls,
                    usage,
                });
            }
        }
    }

    /// Run one call. Schema drift and tool-level failures become error
    /// observations; only transport failures are returned as `Err`.
    async fn dispatch(&self, call: &ToolCall) -> Result<ToolOutcome> {
        if !self.tools.has_tool(&call.name) {
            let error = ToolError::NotFound(call.name.clone());
            return Ok(ToolOutcome::error(error.to_string()));
        }
        if !call.input.is_object() {
            return Ok(ToolOutcome::error(format!(
                "arguments for {} must be a JSON object",
                call.name
            )));
        }

        match self.tools.execute(call).await {
            Ok(outcome) => Ok(outcome),
            Err(e) if e.is_transport() => Err(e.into()),
            Err(e) => Ok(ToolOutcome::error(e.to_string())),
        }
    }

    /// Split the session into its backend and tool host, e.g. to shut the
    /// tool server down.
    pub fn into_parts(self) -> (B, H) {
        (self.backend, self.tools)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FinishReason, ModelError, ModelResponse, Role, ToolSpec};
    use crate::Error;
    use serde_json::{Value, json};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses and records how many messages each request
    /// carried.
    #[derive(Default)]
    struct ScriptedBackend {
        responses: Mutex<VecDeque<std::result::Result<ModelResponse, ModelError>>>,
        seen: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedBackend {
        fn new(responses: Vec<std::result::Result<ModelResponse, ModelError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                seen: Mutex::default(),
            }
        }

        fn requests(&self) -> Vec<Vec<Message>> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl Backend for ScriptedBackend {
        async fn call(
            &self,
            request: ModelRequest<'_>,
        ) -> std::result::Result<ModelResponse, ModelError> {
            self.seen.lock().unwrap().push(request.messages.to_vec());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(answer("out of script")))
        }
    }

    struct FakeTools {
        specs: Vec<ToolSpec>,
        calls: Mutex<Vec<ToolCall>>,
        failure: Option<ToolError>,
    }

    impl FakeTools {
        fn new() -> Self {
            let spec = |name: &str| ToolSpec {
                name: name.into(),
                description: format!("{name} tool"),
                input_schema: json!({"type": "object"}),
            };
            Self {
                specs: vec![spec("list_tables"), spec("execute_query")],
                calls: Mutex::default(),
                failure: None,
            }
        }

        fn failing(error: ToolError) -> Self {
            Self {
                failure: Some(error),
                ..Self::new()
            }
        }

        fn dispatched(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|c| c.name.clone()).collect()
        }
    }

    impl ToolHost for FakeTools {
        fn specs(&self) -> &[ToolSpec] {
            &self.specs
        }

        async fn execute(&self, call: &ToolCall) -> std::result::Result<ToolOutcome, ToolError> {
            self.calls.lock().unwrap().push(call.clone());
            if let Some(error) = &self.failure {
                return Err(error.clone());
            }
            match call.name.as_str() {
                "list_tables" => Ok(ToolOutcome::success(json!(["orders"]))),
                _ => Ok(ToolOutcome::success(json!({"row_count": 5}))),
            }
        }
    }

    fn answer(text: &str) -> ModelResponse {
        ModelResponse {
            message: Message::assistant(vec![Part::Text(text.into())]),
            usage: Usage {
                input_tokens: 10,
                output_tokens: 5,
            },
            finish_reason: FinishReason::Stop,
        }
    }

    fn call(id: &str, name: &str, input: Value) -> Part {
        Part::ToolCall(ToolCall {
            id: id.into(),
            name: name.into(),
            input,
        })
    }

    fn tool_turn(parts: Vec<Part>) -> ModelResponse {
        ModelResponse {
            message: Message::assistant(parts),
            usage: Usage {
                input_tokens: 10,
                output_tokens: 5,
            },
            finish_reason: FinishReason::ToolCalls,
        }
    }

    fn session(
        responses: Vec<std::result::Result<ModelResponse, ModelError>>,
        tools: FakeTools,
        call_budget: u32,
    ) -> Session<ScriptedBackend, FakeTools> {
        Session::new(
            ScriptedBackend::new(responses),
            tools,
            SessionConfig {
                call_budget,
                history: HistoryPolicy::PerQuery,
            },
        )
    }

    fn observations(message: &Message) -> Vec<&ToolResult> {
        message
            .parts
            .iter()
            .filter_map(|p| match p {
                Part::ToolResult(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn plain_answer_needs_one_round_trip() {
        let mut s = session(vec![Ok(answer("No tools needed."))], FakeTools::new(), 5);
        let outcome = s.ask("hello").await.unwrap();

        assert_eq!(outcome.reply, Reply::Answer("No tools needed.".into()));
        assert_eq!(outcome.model_calls, 1);
        assert!(outcome.tool_calls.is_empty());
        assert_eq!(s.budget().used(), 0);
    }

    #[tokio::test]
    async fn two_calls_then_answer_with_budget_two() {
        let responses = vec![
            Ok(tool_turn(vec![call("t1", "list_tables", json!({}))])),
            Ok(tool_turn(vec![call(
                "t2",
                "execute_query",
                json!({"query": "SELECT * FROM orders LIMIT 5"}),
            )])),
            Ok(answer("orders has 5 rows shown above")),
        ];
        let mut s = session(responses, FakeTools::new(), 2);
        let outcome = s
            .ask("list tables then show first 5 rows of orders")
            .await
            .unwrap();

        assert_eq!(outcome.reply, Reply::Answer("orders has 5 rows shown above".into()));
        assert_eq!(outcome.tool_calls.len(), 2);
        assert_eq!(outcome.model_calls, 3);
        assert_eq!(s.budget().remaining(), 0);
        assert_eq!(outcome.usage.input_tokens, 30);
        assert_eq!(s.tools().dispatched(), vec!["list_tables", "execute_query"]);
    }

    #[tokio::test]
    async fn observations_are_correlated_and_ordered() {
        let responses = vec![
            Ok(tool_turn(vec![
                Part::Text("Looking.".into()),
                call("a", "list_tables", json!({})),
                call("b", "execute_query", json!({"query": "SELECT 1"})),
            ])),
            Ok(answer("done")),
        ];
        let mut s = session(responses, FakeTools::new(), 5);
        let outcome = s.ask("q").await.unwrap();

        assert_eq!(outcome.notes, vec!["Looking."]);
        let requests = s.backend.requests();
        let second = &requests[1];
        // user, assistant with calls, tool results
        assert_eq!(second.len(), 3);
        assert_eq!(second[2].role, Role::User);
        let results = observations(&second[2]);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].tool_call_id, "a");
        assert_eq!(results[0].outcome, ToolOutcome::success(json!(["orders"])));
        assert_eq!(results[1].tool_call_id, "b");
    }

    #[tokio::test]
    async fn budget_cut_mid_turn_skips_the_rest() {
        let responses = vec![Ok(tool_turn(vec![
            call("a", "list_tables", json!({})),
            call("b", "execute_query", json!({"query": "SELECT 1"})),
            call("c", "execute_query", json!({"query": "SELECT 2"})),
        ]))];
        let mut s = session(responses, FakeTools::new(), 1);
        let outcome = s.ask("q").await.unwrap();

        assert_eq!(outcome.reply, Reply::BudgetExhausted { skipped: 2 });
        assert_eq!(outcome.tool_calls.len(), 1);
        assert_eq!(outcome.model_calls, 1);
        assert_eq!(s.tools().dispatched(), vec!["list_tables"]);
        assert_eq!(s.backend.requests().len(), 1);

        let last = s.messages().last().unwrap();
        let results = observations(last);
        assert_eq!(results.len(), 3);
        assert_eq!(results[2].outcome, ToolOutcome::error(SKIPPED_OBSERVATION));
    }

    #[tokio::test]
    async fn loop_terminates_within_budget_plus_one_round_trips() {
        let looping: Vec<_> = (0..10)
            .map(|i| Ok(tool_turn(vec![call(&format!("t{i}"), "list_tables", json!({}))])))
            .collect();
        let mut s = session(looping, FakeTools::new(), 3);
        let outcome = s.ask("q").await.unwrap();

        assert_eq!(outcome.reply, Reply::BudgetExhausted { skipped: 1 });
        assert_eq!(outcome.model_calls, 4);
        assert_eq!(outcome.tool_calls.len(), 3);
        assert_eq!(s.budget().used(), 3);
    }

    #[tokio::test]
    async fn unknown_tool_is_an_observation_and_costs_budget() {
        let responses = vec![
            Ok(tool_turn(vec![call("a", "drop_everything", json!({}))])),
            Ok(answer("sorry")),
        ];
        let mut s = session(responses, FakeTools::new(), 5);
        let outcome = s.ask("q").await.unwrap();

        assert_eq!(outcome.reply, Reply::Answer("sorry".into()));
        assert_eq!(
            outcome.tool_calls[0].outcome,
            ToolOutcome::error("tool not found: drop_everything")
        );
        assert!(s.tools().dispatched().is_empty());
        assert_eq!(s.budget().used(), 1);
    }

    #[tokio::test]
    async fn non_object_arguments_are_rejected_locally() {
        let responses = vec![
            Ok(tool_turn(vec![call("a", "execute_query", json!("SELECT 1"))])),
            Ok(answer("ok")),
        ];
        let mut s = session(responses, FakeTools::new(), 5);
        let outcome = s.ask("q").await.unwrap();

        assert!(outcome.tool_calls[0].outcome.is_error());
        assert!(s.tools().dispatched().is_empty());
    }

    #[tokio::test]
    async fn tool_level_errors_are_fed_back() {
        let responses = vec![
            Ok(tool_turn(vec![call("a", "list_tables", json!({}))])),
            Ok(answer("could not list")),
        ];
        let tools = FakeTools::failing(ToolError::InvalidInput("bad".into()));
        let mut s = session(responses, tools, 5);
        let outcome = s.ask("q").await.unwrap();

        assert_eq!(
            outcome.tool_calls[0].outcome,
            ToolOutcome::error("invalid input: bad")
        );
        assert_eq!(outcome.model_calls, 2);
    }

    #[tokio::test]
    async fn transport_failure_fails_the_query_and_rolls_back() {
        let responses = vec![Ok(tool_turn(vec![call("a", "list_tables", json!({}))]))];
        let tools = FakeTools::failing(ToolError::Transport("pipe closed".into()));
        let mut s = Session::new(
            ScriptedBackend::new(responses),
            tools,
            SessionConfig {
                call_budget: 5,
                history: HistoryPolicy::Session,
            },
        );

        let err = s.ask("q").await.unwrap_err();
        assert!(matches!(err, Error::Tool(ToolError::Transport(_))));
        assert!(s.messages().is_empty());
        assert_eq!(s.budget().used(), 1);
    }

    #[tokio::test]
    async fn session_recovers_after_tool_timeout() {
        let responses = vec![
            Ok(tool_turn(vec![call("a", "execute_query", json!({"query": "SELECT sleep(3)"}))])),
            Ok(answer("recovered")),
        ];
        let tools = FakeTools::failing(ToolError::Timeout(60_000));
        let mut s = session(responses, tools, 5);

        let err = s.ask("slow").await.unwrap_err();
        assert!(matches!(err, Error::Tool(ToolError::Timeout(60_000))));

        let outcome = s.ask("anything else?").await.unwrap();
        assert_eq!(outcome.reply, Reply::Answer("recovered".into()));
        assert_eq!(s.budget().used(), 1);
        let requests = s.backend.requests();
        assert_eq!(requests[1].len(), 1);
        assert_eq!(requests[1][0].text(), "anything else?");
    }

    #[tokio::test]
    async fn empty_assistant_turn_is_not_kept_empty() {
        let empty = ModelResponse {
            message: Message::assistant(vec![]),
            usage: Usage::default(),
            finish_reason: FinishReason::Unknown("refusal".into()),
        };
        let mut s = Session::new(
            ScriptedBackend::new(vec![Ok(empty), Ok(answer("two"))]),
            FakeTools::new(),
            SessionConfig {
                call_budget: 5,
                history: HistoryPolicy::Session,
            },
        );

        let first = s.ask("first").await.unwrap();
        assert_eq!(first.reply, Reply::Answer(EMPTY_REPLY.into()));
        s.ask("second").await.unwrap();

        let requests = s.backend.requests();
        let carried = &requests[1];
        assert_eq!(carried.len(), 3);
        assert_eq!(carried[1].role, Role::Assistant);
        assert!(!carried[1].parts.is_empty());
        assert!(requests.iter().flatten().all(|m| !m.parts.is_empty()));
    }

    #[tokio::test]
    async fn model_failure_is_returned() {
        let mut s = session(
            vec![Err(ModelError::Api("529: overloaded".into()))],
            FakeTools::new(),
            5,
        );
        let err = s.ask("q").await.unwrap_err();
        assert!(matches!(err, Error::Model(ModelError::Api(_))));
    }

    #[tokio::test]
    async fn per_query_history_starts_fresh() {
        let responses = vec![Ok(answer("one")), Ok(answer("two"))];
        let mut s = session(responses, FakeTools::new(), 5);
        s.ask("first").await.unwrap();
        s.ask("second").await.unwrap();

        let requests = s.backend.requests();
        assert_eq!(requests[1].len(), 1);
        assert_eq!(requests[1][0].text(), "second");
    }

    #[tokio::test]
    async fn session_history_accumulates() {
        let mut s = Session::new(
            ScriptedBackend::new(vec![Ok(answer("one")), Ok(answer("two"))]),
            FakeTools::new(),
            SessionConfig {
                call_budget: 5,
                history: HistoryPolicy::Session,
            },
        );
        s.ask("first").await.unwrap();
        s.ask("second").await.unwrap();

        let requests = s.backend.requests();
        assert_eq!(requests[1].len(), 3);
        assert_eq!(requests[1][0].text(), "first");
        assert_eq!(s.messages().len(), 4);
    }

    #[tokio::test]
    async fn budget_is_shared_across_queries() {
        let responses = vec![
            Ok(tool_turn(vec![call("a", "list_tables", json!({}))])),
            Ok(answer("one table")),
            Ok(tool_turn(vec![call("b", "list_tables", json!({}))])),
        ];
        let mut s = session(responses, FakeTools::new(), 1);
        s.ask("first").await.unwrap();
        assert!(s.budget().is_exhausted());

        let outcome = s.ask("second").await.unwrap();
        assert_eq!(outcome.reply, Reply::BudgetExhausted { skipped: 1 });
        assert_eq!(s.tools().dispatched().len(), 1);
    }

    #[test]
    fn history_policy_parses() {
        assert_eq!("per_query".parse::<HistoryPolicy>(), Ok(HistoryPolicy::PerQuery));
        assert_eq!("per-query".parse::<HistoryPolicy>(), Ok(HistoryPolicy::PerQuery));
        assert_eq!("session".parse::<HistoryPolicy>(), Ok(HistoryPolicy::Session));
        assert!("forever".parse::<HistoryPolicy>().is_err());
        assert_eq!(HistoryPolicy::Session.to_string(), "session");
    }

    #[test]
    fn reply_display() {
        assert_eq!(Reply::Answer("hi".into()).to_string(), "hi");
        assert!(
            Reply::BudgetExhausted { skipped: 2 }
                .to_string()
                .contains("2 requested call(s)")
        );
    }
}
