use serde::{Deserialize, Serialize};

use crate::executor::actions::{GroundedCommand, TerminalKeyword};

/// Phases of one perception-to-action step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    #[default]
    AwaitingObservation,
    PromptBuilt,
    ResponseReceived,
    ActionParsed,
    ActionGrounded,
    Recorded,
}

impl StepState {
    /// Legal successors. A failed or empty response jumps straight to
    /// `Recorded`, skipping parsing and grounding.
    pub fn can_advance_to(self, next: StepState) -> bool {
        use StepState::*;
        matches!(
            (self, next),
            (AwaitingObservation, PromptBuilt)
                | (PromptBuilt, ResponseReceived)
                | (PromptBuilt, Recorded)
                | (ResponseReceived, ActionParsed)
                | (ResponseReceived, Recorded)
                | (ActionParsed, ActionGrounded)
                | (ActionGrounded, Recorded)
                | (Recorded, AwaitingObservation)
        )
    }
}

/// What the caller should do after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepSignal {
    /// Execute the command and observe again.
    Continue,
    /// Delay, then observe again.
    Wait,
    /// The task is finished.
    Done,
    /// The model gave up.
    Fail,
    /// Nothing usable came back; observe again.
    ParseError,
}

impl From<TerminalKeyword> for StepSignal {
    fn from(keyword: TerminalKeyword) -> Self {
        match keyword {
            TerminalKeyword::Wait => StepSignal::Wait,
            TerminalKeyword::Done => StepSignal::Done,
            TerminalKeyword::Fail => StepSignal::Fail,
        }
    }
}

impl StepSignal {
    pub fn is_terminal(self) -> bool {
        matches!(self, StepSignal::Done | StepSignal::Fail)
    }
}

/// Result of one step.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub turn_index: usize,
    pub response: String,
    /// Every action extracted from the reply, in order.
    pub actions: Vec<String>,
    /// Grounded form of the first action; `None` on a parse error.
    pub command: Option<GroundedCommand>,
    pub signal: StepSignal,
}
