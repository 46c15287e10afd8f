use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DeskGroundResult;
use crate::llm::types::ChatMessage;
use crate::perception::types::Observation;

/// Stand-in for an observation in replayed history; screenshots and trees of
/// past turns are never resent.
pub const ENV_PLACEHOLDER: &str = "**Environment State (Omitted)**";
pub const PARSE_ERROR_MARKER: &str = "Parse error";
pub const INVALID_ACTION_RESULT: &str = "Invalid action";

const ENV_MAX_CHARS: usize = 2000;
const RESPONSE_MAX_CHARS: usize = 1500;

/// What a turn saw, without the heavy payloads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationRef {
    pub cur_app: String,
    pub cur_window_id: String,
    pub has_screenshot: bool,
    pub has_tree: bool,
}

impl From<&Observation> for ObservationRef {
    fn from(obs: &Observation) -> Self {
        Self {
            cur_app: obs.cur_app.clone(),
            cur_window_id: obs.cur_window_id.clone(),
            has_screenshot: obs.screenshot.is_some(),
            has_tree: obs.accessibility_tree.is_some(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub index: usize,
    pub instruction: String,
    pub timestamp: DateTime<Utc>,
    pub observation: ObservationRef,
    pub response: String,
    /// Rendered first grounded action, or [`PARSE_ERROR_MARKER`].
    pub action: String,
    pub exe_result: String,
}

/// Keep the first `max` characters; append `...` when anything was cut.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((byte, _)) => format!("{}...", &s[..byte]),
        None => s.to_string(),
    }
}

/// Ordered record of every step of the current task.
#[derive(Debug, Default)]
pub struct ConversationState {
    turns: Vec<ConversationTurn>,
    transcript: Option<PathBuf>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also append each recorded turn to a JSONL file.
    pub fn with_transcript(path: impl Into<PathBuf>) -> Self {
        Self {
            turns: Vec::new(),
            transcript: Some(path.into()),
        }
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn transcript_path(&self) -> Option<&Path> {
        self.transcript.as_deref()
    }

    /// Append a turn. `action` is `None` when nothing could be parsed, which
    /// records the parse-error marker and an invalid-action result.
    pub fn record(
        &mut self,
        instruction: &str,
        observation: ObservationRef,
        response: &str,
        action: Option<String>,
    ) -> &ConversationTurn {
        let (action, exe_result) = match action {
            Some(a) => (a, String::new()),
            None => (PARSE_ERROR_MARKER.to_string(), INVALID_ACTION_RESULT.to_string()),
        };
        self.turns.push(ConversationTurn {
            index: self.turns.len(),
            instruction: instruction.to_string(),
            timestamp: Utc::now(),
            observation,
            response: response.to_string(),
            action,
            exe_result,
        });

        if let Err(e) = self.flush() {
            tracing::warn!(error = %e, "failed to append turn to transcript");
        }
        &self.turns[self.turns.len() - 1]
    }

    /// Store the execution result of the most recent turn. Returns `false`
    /// when there is no turn yet.
    pub fn backfill(&mut self, exe_result: &str) -> bool {
        match self.turns.last_mut() {
            Some(last) => {
                last.exe_result = exe_result.to_string();
                true
            }
            None => false,
        }
    }

    /// Replayed history for the next prompt: one placeholder/response pair
    /// per turn, most recent `max_turns` pairs only.
    pub fn format_history(&self, max_turns: usize) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.turns.len() * 2);
        for (ix, turn) in self.turns.iter().enumerate() {
            let env = if ix == 0 {
                ENV_PLACEHOLDER.to_string()
            } else {
                format!(
                    "{ENV_PLACEHOLDER}\nPrevious Action Result: {}",
                    self.turns[ix - 1].exe_result
                )
            };
            messages.push(ChatMessage::user_text(truncate_chars(&env, ENV_MAX_CHARS)));
            messages.push(ChatMessage::assistant_text(truncate_chars(
                &turn.response,
                RESPONSE_MAX_CHARS,
            )));
        }
        let keep = max_turns.saturating_mul(2);
        if messages.len() > keep {
            messages.drain(..messages.len() - keep);
        }
        messages
    }

    pub fn reset(&mut self) {
        tracing::debug!(turns = self.turns.len(), "conversation reset");
        self.turns.clear();
    }

    fn flush(&self) -> DeskGroundResult<()> {
        let (Some(path), Some(last)) = (&self.transcript, self.turns.last()) else {
            return Ok(());
        };
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let line = serde_json::to_string(last)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        writeln!(file, "{line}")?;
        tracing::debug!(path = %path.display(), index = last.index, "turn appended to transcript");
        Ok(())
    }
}

/// Default transcript location: `<data dir>/deskground/sessions/session_<id>.jsonl`,
/// falling back to the working directory.
pub fn default_transcript_path(session_id: &str) -> PathBuf {
    let base = dirs::data_local_dir()
        .map(|d| d.join("deskground").join("sessions"))
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));
    base.join(format!("session_{session_id}.jsonl"))
}
