//! # Testing harness for the assistant engine
//!
//! Predictable stand-ins for the two nondeterministic edges of the system:
//! tool collaborators and the LLM transport. Both record their calls so
//! tests can assert on exactly what was invoked, with what, and how often.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use concierge_core::{InvocationErrorKind, InvocationOutcome, ToolCollaborator};
use concierge_engine::{LlmClient, LlmError, LlmRequest};

/// A collaborator that returns scripted outcomes and records every call.
///
/// Outcomes can be keyed to an exact argument object or pushed onto a
/// sequence that is consumed call by call. Keyed outcomes win over the
/// sequence; the default outcome serves anything left unmatched.
#[derive(Clone)]
pub struct MockCollaborator {
    keyed: HashMap<String, InvocationOutcome>,
    sequence: Arc<Mutex<VecDeque<InvocationOutcome>>>,
    default_outcome: InvocationOutcome,
    call_history: Arc<Mutex<Vec<Value>>>,
}

impl MockCollaborator {
    pub fn new() -> Self {
        Self {
            keyed: HashMap::new(),
            sequence: Arc::new(Mutex::new(VecDeque::new())),
            default_outcome: InvocationOutcome::success(Value::Null),
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Script a success payload for one exact argument object.
    pub fn with_outcome_for(mut self, args: Value, outcome: InvocationOutcome) -> Self {
        self.keyed.insert(args.to_string(), outcome);
        self
    }

    /// Push the next outcome onto the consumed-in-order sequence.
    pub fn with_next(self, outcome: InvocationOutcome) -> Self {
        self.sequence.lock().unwrap().push_back(outcome);
        self
    }

    /// Set the payload returned for any unmatched call.
    pub fn with_default_payload(mut self, payload: Value) -> Self {
        self.default_outcome = InvocationOutcome::success(payload);
        self
    }

    /// Make any unmatched call fail.
    pub fn with_default_failure(
        mut self,
        kind: InvocationErrorKind,
        message: impl Into<String>,
    ) -> Self {
        self.default_outcome = InvocationOutcome::failure(kind, message);
        self
    }

    /// How many times this collaborator was invoked.
    pub fn call_count(&self) -> usize {
        self.call_history.lock().unwrap().len()
    }

    /// Every argument object passed so far, in order.
    pub fn call_history(&self) -> Vec<Value> {
        self.call_history.lock().unwrap().clone()
    }

    /// Whether any call carried `field` set to `value`.
    pub fn was_called_with(&self, field: &str, value: &Value) -> bool {
        self.call_history
            .lock()
            .unwrap()
            .iter()
            .any(|args| args.get(field) == Some(value))
    }
}

impl Default for MockCollaborator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolCollaborator for MockCollaborator {
    async fn invoke(&self, args: Value) -> InvocationOutcome {
        self.call_history.lock().unwrap().push(args.clone());

        if let Some(outcome) = self.keyed.get(&args.to_string()) {
            return outcome.clone();
        }
        if let Some(outcome) = self.sequence.lock().unwrap().pop_front() {
            return outcome;
        }
        self.default_outcome.clone()
    }
}

/// What a [`ScriptedLlm`] returns for one call.
enum ScriptedReply {
    Completion(String),
    Unreachable(String),
}

/// An [`LlmClient`] that replays a fixed script instead of a network call.
///
/// Replies are consumed in order; the last reply repeats once the script
/// runs out. Prompts are recorded for assertions.
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<ScriptedReply>>,
    last: Mutex<Option<String>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            last: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Convenience for the single-reply case.
    pub fn replying(completion: impl Into<String>) -> Self {
        Self::new().with_completion(completion)
    }

    /// Push a completion onto the script.
    pub fn with_completion(self, completion: impl Into<String>) -> Self {
        let completion = completion.into();
        *self.last.lock().unwrap() = Some(completion.clone());
        self.replies
            .lock()
            .unwrap()
            .push_back(ScriptedReply::Completion(completion));
        self
    }

    /// Push a transport failure onto the script.
    pub fn with_unreachable(self, reason: impl Into<String>) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(ScriptedReply::Unreachable(reason.into()));
        self
    }

    /// Every request issued so far, in order.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Default for ScriptedLlm {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, request: LlmRequest) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(request);

        match self.replies.lock().unwrap().pop_front() {
            Some(ScriptedReply::Completion(text)) => Ok(text),
            Some(ScriptedReply::Unreachable(reason)) => Err(LlmError::Http(reason)),
            None => match self.last.lock().unwrap().clone() {
                Some(text) => Ok(text),
                None => Err(LlmError::Http("script exhausted".to_string())),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn keyed_outcome_wins_over_default() {
        let mock = MockCollaborator::new()
            .with_outcome_for(
                json!({"query": "standup"}),
                InvocationOutcome::success(json!([{"id": "evt-1"}])),
            )
            .with_default_payload(json!([]));

        let hit = mock.invoke(json!({"query": "standup"})).await;
        assert_eq!(hit.payload(), Some(&json!([{"id": "evt-1"}])));

        let miss = mock.invoke(json!({"query": "other"})).await;
        assert_eq!(miss.payload(), Some(&json!([])));
        assert_eq!(mock.call_count(), 2);
        assert!(mock.was_called_with("query", &json!("standup")));
    }

    #[tokio::test]
    async fn sequence_is_consumed_in_order() {
        let mock = MockCollaborator::new()
            .with_next(InvocationOutcome::success(json!(1)))
            .with_next(InvocationOutcome::failure(
                InvocationErrorKind::Transient,
                "flaky",
            ));

        assert!(mock.invoke(json!({})).await.is_success());
        assert!(!mock.invoke(json!({})).await.is_success());
        // Sequence exhausted, default kicks in.
        assert!(mock.invoke(json!({})).await.is_success());
    }

    #[tokio::test]
    async fn scripted_llm_replays_then_repeats_last() {
        let llm = ScriptedLlm::new()
            .with_completion(r#"{"answer": "one"}"#)
            .with_completion(r#"{"answer": "two"}"#);
        let request = LlmRequest {
            system: "s".to_string(),
            user: "u".to_string(),
            model: "m".to_string(),
            temperature: 0.0,
        };

        assert_eq!(llm.complete(request.clone()).await.unwrap(), r#"{"answer": "one"}"#);
        assert_eq!(llm.complete(request.clone()).await.unwrap(), r#"{"answer": "two"}"#);
        assert_eq!(llm.complete(request).await.unwrap(), r#"{"answer": "two"}"#);
        assert_eq!(llm.call_count(), 3);
    }

    #[tokio::test]
    async fn scripted_llm_reports_outages() {
        let llm = ScriptedLlm::new().with_unreachable("connection refused");
        let request = LlmRequest {
            system: String::new(),
            user: String::new(),
            model: String::new(),
            temperature: 0.0,
        };
        assert!(llm.complete(request).await.is_err());
    }
}
