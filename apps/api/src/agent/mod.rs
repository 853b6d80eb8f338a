//! Interruptible validation agent.
//!
//! The agent reviews a subject (a structured request or a draft) and either
//! finishes with an optional revision or asks a human. Asking does not block
//! in place: the agent hands back a [`SuspensionToken`] carrying everything
//! needed to continue later, so the conversation survives checkpointing and
//! process restarts. Each suspend/resume round is one cycle; the agent gives
//! up after `max_cycles` of them.

use std::sync::Arc;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::warn;

use crate::capability::StructuredOutputCapability;
use crate::errors::AppError;

// ────────────────────────────────────────────────────────────────────────────
// Wire shapes
// ────────────────────────────────────────────────────────────────────────────

/// What the model must return: either a terminal verdict or a request for
/// human input.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
#[serde(bound(deserialize = "T: serde::Deserialize<'de>"))]
enum AgentDecision<T> {
    RequestHumanInput {
        questions: Vec<String>,
    },
    Final {
        #[serde(default)]
        revised: Option<T>,
        #[serde(default)]
        reasoning: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TurnRole {
    Agent,
    Human,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct AgentTurn {
    role: TurnRole,
    content: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Suspension token
// ────────────────────────────────────────────────────────────────────────────

/// Self-contained resume point for a suspended review. Serializable so the
/// orchestrator can checkpoint it; resuming from a deserialized token is
/// indistinguishable from resuming in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspensionToken {
    pub thread_id: String,
    subject: String,
    transcript: Vec<AgentTurn>,
    pending_questions: Vec<String>,
    cycles: u32,
}

impl SuspensionToken {
    /// Deterministic session id for this suspension: thread id plus the
    /// cycle number, so each round of questions gets its own session.
    pub fn session_id(&self) -> String {
        format!("{}_fb{}", self.thread_id, self.cycles)
    }

    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    pub fn questions(&self) -> &[String] {
        &self.pending_questions
    }
}

/// Where a review step landed.
#[derive(Debug, PartialEq)]
pub enum AgentOutcome<T> {
    /// The agent is done. `revised` carries a replacement subject when the
    /// review changed anything.
    Completed { revised: Option<T>, reasoning: String },
    /// The agent needs a human. Park `token`, open a session for
    /// `questions`, and call [`ValidationAgent::resume`] with the answers.
    Suspended {
        token: SuspensionToken,
        questions: Vec<String>,
    },
    /// The agent could not reach a verdict (providers exhausted or cycle
    /// bound hit). Callers keep the subject unchanged.
    Failed { reason: String },
}

// ────────────────────────────────────────────────────────────────────────────
// Agent
// ────────────────────────────────────────────────────────────────────────────

pub struct ValidationAgent {
    capability: Arc<StructuredOutputCapability>,
    system_instruction: String,
    max_cycles: u32,
}

impl ValidationAgent {
    pub fn new(
        capability: Arc<StructuredOutputCapability>,
        system_instruction: impl Into<String>,
        max_cycles: u32,
    ) -> Self {
        ValidationAgent {
            capability,
            system_instruction: system_instruction.into(),
            max_cycles,
        }
    }

    /// Opens a review thread over `subject` and runs the first step.
    ///
    /// `Err` means the caller misused the agent (unserializable subject);
    /// model-side trouble comes back as `Ok(Failed)` so callers can degrade.
    pub async fn start<S: Serialize, T: DeserializeOwned>(
        &self,
        thread_id: &str,
        subject: &S,
    ) -> Result<AgentOutcome<T>, AppError> {
        let subject = serde_json::to_string_pretty(subject)
            .map_err(|e| AppError::Validation(format!("subject is not serializable: {e}")))?;

        let token = SuspensionToken {
            thread_id: thread_id.to_string(),
            subject,
            transcript: Vec::new(),
            pending_questions: Vec::new(),
            cycles: 0,
        };

        Ok(self.step(token).await)
    }

    /// Continues a suspended review with the human's answers. The token may
    /// have been through a checkpoint round trip in between.
    pub async fn resume<T: DeserializeOwned>(
        &self,
        mut token: SuspensionToken,
        answers: Vec<String>,
    ) -> Result<AgentOutcome<T>, AppError> {
        if answers.len() != token.pending_questions.len() {
            return Err(AppError::Validation(format!(
                "expected {} answers, received {}",
                token.pending_questions.len(),
                answers.len()
            )));
        }

        token.transcript.push(AgentTurn {
            role: TurnRole::Human,
            content: render_answer_turn(&token.pending_questions, &answers),
        });
        token.pending_questions.clear();

        Ok(self.step(token).await)
    }

    async fn step<T: DeserializeOwned>(&self, mut token: SuspensionToken) -> AgentOutcome<T> {
        let payload = render_payload(&token.subject, &token.transcript);

        let decision: AgentDecision<T> = match self
            .capability
            .generate(&self.system_instruction, &payload)
            .await
        {
            Ok(decision) => decision,
            Err(e) => {
                warn!(
                    "validation agent step failed on thread {}: {e}",
                    token.thread_id
                );
                return AgentOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        match decision {
            AgentDecision::Final { revised, reasoning } => {
                AgentOutcome::Completed { revised, reasoning }
            }
            AgentDecision::RequestHumanInput { questions } => {
                if token.cycles >= self.max_cycles {
                    return AgentOutcome::Failed {
                        reason: format!(
                            "human-feedback cycle bound ({}) exceeded on thread {}",
                            self.max_cycles, token.thread_id
                        ),
                    };
                }
                token.cycles += 1;
                token.transcript.push(AgentTurn {
                    role: TurnRole::Agent,
                    content: render_question_turn(&questions),
                });
                token.pending_questions = questions.clone();
                AgentOutcome::Suspended { token, questions }
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Rendering
// ────────────────────────────────────────────────────────────────────────────

/// Flattens the subject and conversation so far into one prompt payload.
/// Purely a function of the token, which is what makes resume-after-restart
/// equivalent to resume-in-place.
fn render_payload(subject: &str, transcript: &[AgentTurn]) -> String {
    let mut payload = format!("Subject under review:\n{subject}\n");
    for turn in transcript {
        let role = match turn.role {
            TurnRole::Agent => "agent",
            TurnRole::Human => "human",
        };
        payload.push_str(&format!("\n[{role}]\n{}\n", turn.content));
    }
    payload
}

fn render_question_turn(questions: &[String]) -> String {
    let mut text = String::from("Requested human input:");
    for (i, question) in questions.iter().enumerate() {
        text.push_str(&format!("\n{}. {question}", i + 1));
    }
    text
}

fn render_answer_turn(questions: &[String], answers: &[String]) -> String {
    let mut text = String::from("Human answers:");
    for (i, (question, answer)) in questions.iter().zip(answers).enumerate() {
        text.push_str(&format!("\nQ{}: {question}\nA{}: {answer}", i + 1, i + 1));
    }
    text
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Provider, ProviderError};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Subject {
        text: String,
    }

    /// Finishes immediately, optionally with a revision.
    struct FinishNow {
        revised: Option<Value>,
    }

    #[async_trait]
    impl Provider for FinishNow {
        fn name(&self) -> &str {
            "finish_now"
        }

        async fn generate(&self, _system: &str, _payload: &str) -> Result<Value, ProviderError> {
            Ok(json!({
                "action": "final",
                "revised": self.revised,
                "reasoning": "no concerns"
            }))
        }
    }

    /// Asks once, then finishes after it sees answers in the payload.
    struct AskOnce;

    #[async_trait]
    impl Provider for AskOnce {
        fn name(&self) -> &str {
            "ask_once"
        }

        async fn generate(&self, _system: &str, payload: &str) -> Result<Value, ProviderError> {
            if payload.contains("Human answers:") {
                Ok(json!({
                    "action": "final",
                    "revised": {"text": "revised per answers"},
                    "reasoning": "applied the human guidance"
                }))
            } else {
                Ok(json!({
                    "action": "request_human_input",
                    "questions": ["Keep this wording?"]
                }))
            }
        }
    }

    /// Never satisfied; always asks again.
    struct AlwaysAsk;

    #[async_trait]
    impl Provider for AlwaysAsk {
        fn name(&self) -> &str {
            "always_ask"
        }

        async fn generate(&self, _system: &str, _payload: &str) -> Result<Value, ProviderError> {
            Ok(json!({
                "action": "request_human_input",
                "questions": ["Still unsure, confirm?"]
            }))
        }
    }

    struct Broken;

    #[async_trait]
    impl Provider for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        async fn generate(&self, _system: &str, _payload: &str) -> Result<Value, ProviderError> {
            Err(ProviderError::EmptyContent)
        }
    }

    fn make_agent(provider: Arc<dyn Provider>, max_cycles: u32) -> ValidationAgent {
        ValidationAgent::new(
            Arc::new(StructuredOutputCapability::new(vec![provider])),
            "review the subject",
            max_cycles,
        )
    }

    fn make_subject() -> Subject {
        Subject {
            text: "original".to_string(),
        }
    }

    #[tokio::test]
    async fn test_completes_without_suspension() {
        let agent = make_agent(Arc::new(FinishNow { revised: None }), 5);
        let outcome: AgentOutcome<Subject> =
            agent.start("wf_1_sensitivity", &make_subject()).await.unwrap();
        assert_eq!(
            outcome,
            AgentOutcome::Completed {
                revised: None,
                reasoning: "no concerns".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_completed_revision_is_typed() {
        let agent = make_agent(
            Arc::new(FinishNow {
                revised: Some(json!({"text": "cleaned"})),
            }),
            5,
        );
        let outcome: AgentOutcome<Subject> =
            agent.start("wf_1_sensitivity", &make_subject()).await.unwrap();
        match outcome {
            AgentOutcome::Completed { revised, .. } => {
                assert_eq!(revised.unwrap().text, "cleaned");
            }
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_suspension_carries_questions_and_session_id() {
        let agent = make_agent(Arc::new(AskOnce), 5);
        let outcome: AgentOutcome<Subject> =
            agent.start("wf_1_sensitivity", &make_subject()).await.unwrap();
        match outcome {
            AgentOutcome::Suspended { token, questions } => {
                assert_eq!(questions, vec!["Keep this wording?".to_string()]);
                assert_eq!(token.session_id(), "wf_1_sensitivity_fb1");
                assert_eq!(token.cycles(), 1);
                assert_eq!(token.questions(), questions.as_slice());
            }
            other => panic!("expected Suspended, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_resume_after_token_round_trip_matches_in_place_resume() {
        let agent = make_agent(Arc::new(AskOnce), 5);
        let outcome: AgentOutcome<Subject> =
            agent.start("wf_1_sensitivity", &make_subject()).await.unwrap();
        let token = match outcome {
            AgentOutcome::Suspended { token, .. } => token,
            other => panic!("expected Suspended, got {other:?}"),
        };

        let persisted = serde_json::to_string(&token).unwrap();
        let restored: SuspensionToken = serde_json::from_str(&persisted).unwrap();
        assert_eq!(restored, token);

        let answers = vec!["no, drop it".to_string()];
        let in_place: AgentOutcome<Subject> =
            agent.resume(token, answers.clone()).await.unwrap();
        let from_checkpoint: AgentOutcome<Subject> =
            agent.resume(restored, answers).await.unwrap();
        assert_eq!(in_place, from_checkpoint);
        match from_checkpoint {
            AgentOutcome::Completed { revised, .. } => {
                assert_eq!(revised.unwrap().text, "revised per answers");
            }
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[test]
    fn test_payload_rendering_is_deterministic() {
        let transcript = vec![
            AgentTurn {
                role: TurnRole::Agent,
                content: render_question_turn(&["Keep this wording?".to_string()]),
            },
            AgentTurn {
                role: TurnRole::Human,
                content: render_answer_turn(
                    &["Keep this wording?".to_string()],
                    &["no, drop it".to_string()],
                ),
            },
        ];
        let payload = render_payload("{\"text\": \"original\"}", &transcript);
        assert_eq!(
            payload,
            "Subject under review:\n{\"text\": \"original\"}\n\n[agent]\nRequested human input:\n1. Keep this wording?\n\n[human]\nHuman answers:\nQ1: Keep this wording?\nA1: no, drop it\n"
        );
    }

    #[tokio::test]
    async fn test_resume_rejects_answer_count_mismatch() {
        let agent = make_agent(Arc::new(AskOnce), 5);
        let outcome: AgentOutcome<Subject> =
            agent.start("wf_1_sensitivity", &make_subject()).await.unwrap();
        let token = match outcome {
            AgentOutcome::Suspended { token, .. } => token,
            other => panic!("expected Suspended, got {other:?}"),
        };

        let result: Result<AgentOutcome<Subject>, AppError> = agent
            .resume(token, vec!["a".to_string(), "b".to_string()])
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_cycle_bound_allows_exactly_five_rounds() {
        let agent = make_agent(Arc::new(AlwaysAsk), 5);
        let mut outcome: AgentOutcome<Subject> =
            agent.start("wf_1_sensitivity", &make_subject()).await.unwrap();

        let mut suspensions = 0u32;
        loop {
            match outcome {
                AgentOutcome::Suspended { token, questions } => {
                    suspensions += 1;
                    assert_eq!(
                        token.session_id(),
                        format!("wf_1_sensitivity_fb{suspensions}")
                    );
                    let answers = vec!["confirmed".to_string(); questions.len()];
                    outcome = agent.resume(token, answers).await.unwrap();
                }
                AgentOutcome::Failed { reason } => {
                    assert!(reason.contains("cycle bound (5)"));
                    break;
                }
                AgentOutcome::Completed { .. } => panic!("agent should not complete"),
            }
        }
        assert_eq!(suspensions, 5);
    }

    #[tokio::test]
    async fn test_provider_exhaustion_is_failed_not_err() {
        let agent = make_agent(Arc::new(Broken), 5);
        let outcome: AgentOutcome<Subject> =
            agent.start("wf_1_sensitivity", &make_subject()).await.unwrap();
        match outcome {
            AgentOutcome::Failed { reason } => assert!(reason.contains("broken")),
            other => panic!("expected Failed, got {other:?}"),
        }
    }
}
