use std::sync::Arc;

use tracing::Instrument;

use crate::agent_engine::history::{default_transcript_path, ConversationState, ObservationRef};
use crate::agent_engine::prompt::PromptBuilder;
use crate::agent_engine::state::{StepOutcome, StepSignal, StepState};
use crate::config::AppConfig;
use crate::executor::actions::GroundedCommand;
use crate::executor::app_tools::tool_for_app;
use crate::executor::grounder::ActionGrounder;
use crate::llm::provider::ModelClient;
use crate::llm::response_parser::parse_code_from_string;
use crate::perception::types::{CoordinateMode, Observation};

/// Drives one perception-to-action step at a time.
///
/// The coordinate mode is taken from the config at construction and cannot
/// change for the lifetime of the engine.
pub struct AgentEngine {
    config: AppConfig,
    session_id: String,
    model: Arc<dyn ModelClient>,
    grounder: ActionGrounder,
    prompt: PromptBuilder,
    history: ConversationState,
    state: StepState,
}

impl AgentEngine {
    pub fn new(config: AppConfig, model: Arc<dyn ModelClient>) -> Self {
        let session_id = uuid::Uuid::new_v4().to_string();
        let grounder = ActionGrounder::new(config.agent.coordinate_mode());
        let prompt = PromptBuilder::new(&config, grounder.registry());
        let history = if config.agent.save_transcript {
            ConversationState::with_transcript(default_transcript_path(&session_id))
        } else {
            ConversationState::new()
        };
        tracing::info!(
            session_id = %session_id,
            model = model.name(),
            mode = ?grounder.mode(),
            platform = ?config.agent.platform,
            "agent engine created"
        );
        Self {
            config,
            session_id,
            model,
            grounder,
            prompt,
            history,
            state: StepState::AwaitingObservation,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn coordinate_mode(&self) -> CoordinateMode {
        self.grounder.mode()
    }

    pub fn state(&self) -> StepState {
        self.state
    }

    pub fn history(&self) -> &ConversationState {
        &self.history
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run one step: build the prompt, ask the model, parse its reply, ground
    /// the first action and record the turn.
    ///
    /// Never fails. A transport error or a reply without actions is recorded
    /// as a parse error and reported through [`StepSignal::ParseError`].
    pub async fn predict(&mut self, instruction: &str, obs: &Observation) -> StepOutcome {
        let span = tracing::info_span!(
            "step",
            session_id = %self.session_id,
            turn = self.history.len()
        );
        self.step(instruction, obs).instrument(span).await
    }

    async fn step(&mut self, instruction: &str, obs: &Observation) -> StepOutcome {
        if self.state != StepState::AwaitingObservation {
            self.advance(StepState::AwaitingObservation);
        }

        let last_result = match obs.exe_result.as_deref() {
            Some(result) => {
                self.history.backfill(result);
                result
            }
            None => "",
        };

        let tool = tool_for_app(&obs.cur_app);
        let history = self.history.format_history(self.config.agent.history_turns);
        let messages = self.prompt.build(instruction, obs, history, last_result, tool);
        self.advance(StepState::PromptBuilt);

        let response = match self.model.generate(messages).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(model = self.model.name(), error = %e, "model call failed");
                String::new()
            }
        };

        let actions = if response.trim().is_empty() {
            Vec::new()
        } else {
            self.advance(StepState::ResponseReceived);
            parse_code_from_string(&response)
        };

        let Some(first) = actions.first() else {
            tracing::warn!(response_len = response.len(), "no action in model response");
            return self.finish(instruction, obs, response, actions, None, StepSignal::ParseError);
        };
        self.advance(StepState::ActionParsed);

        let command = self.grounder.ground_code(first, &obs.cur_app);
        self.advance(StepState::ActionGrounded);

        let signal = command.keyword().map(StepSignal::from).unwrap_or(StepSignal::Continue);
        tracing::info!(signal = ?signal, actions = actions.len(), "action grounded");
        self.finish(instruction, obs, response, actions, Some(command), signal)
    }

    fn finish(
        &mut self,
        instruction: &str,
        obs: &Observation,
        response: String,
        actions: Vec<String>,
        command: Option<GroundedCommand>,
        signal: StepSignal,
    ) -> StepOutcome {
        let turn = self.history.record(
            instruction,
            ObservationRef::from(obs),
            &response,
            command.as_ref().map(GroundedCommand::render),
        );
        let turn_index = turn.index;
        self.advance(StepState::Recorded);
        self.advance(StepState::AwaitingObservation);
        StepOutcome {
            turn_index,
            response,
            actions,
            command,
            signal,
        }
    }

    fn advance(&mut self, next: StepState) {
        if !self.state.can_advance_to(next) {
            tracing::warn!(from = ?self.state, to = ?next, "unexpected step transition");
        }
        tracing::debug!(from = ?self.state, to = ?next, "step transition");
        self.state = next;
    }

    /// Forget every recorded turn. The session id and coordinate mode stay.
    pub fn reset(&mut self) {
        tracing::info!(session_id = %self.session_id, turns = self.history.len(), "engine reset");
        self.history.reset();
        self.state = StepState::AwaitingObservation;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{DeskGroundError, DeskGroundResult};
    use crate::llm::types::ChatMessage;
    use std::sync::Mutex;

    struct Scripted {
        replies: Mutex<Vec<DeskGroundResult<String>>>,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl Scripted {
        fn new(replies: Vec<DeskGroundResult<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into_iter().rev().collect()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl ModelClient for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, messages: Vec<ChatMessage>) -> DeskGroundResult<String> {
            self.seen.lock().unwrap().push(messages);
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok("WAIT".into()))
        }
    }

    fn engine(model: Arc<Scripted>) -> AgentEngine {
        let mut config = AppConfig::default();
        config.prompt.with_image = false;
        AgentEngine::new(config, model)
    }

    #[tokio::test]
    async fn test_wait_keyword_reply() {
        let mut engine = engine(Scripted::new(vec![Ok("WAIT".into())]));
        let outcome = engine.predict("task", &Observation::default()).await;
        assert_eq!(outcome.signal, StepSignal::Wait);
        assert_eq!(outcome.actions, vec!["WAIT".to_string()]);
        assert_eq!(engine.history().turns()[0].action, "WAIT");
        assert_eq!(engine.state(), StepState::AwaitingObservation);
    }

    #[tokio::test]
    async fn test_transport_error_records_parse_error() {
        let model = Scripted::new(vec![Err(DeskGroundError::Transport("timeout".into()))]);
        let mut engine = engine(model);
        let outcome = engine.predict("task", &Observation::default()).await;
        assert_eq!(outcome.signal, StepSignal::ParseError);
        assert!(outcome.command.is_none());
        assert_eq!(engine.history().turns()[0].action, "Parse error");
    }

    #[tokio::test]
    async fn test_reset_keeps_session() {
        let mut engine = engine(Scripted::new(vec![]));
        let id = engine.session_id().to_string();
        engine.predict("task", &Observation::default()).await;
        engine.reset();
        assert!(engine.history().is_empty());
        assert_eq!(engine.session_id(), id);
        assert_eq!(engine.coordinate_mode(), CoordinateMode::Relative);
    }
}
