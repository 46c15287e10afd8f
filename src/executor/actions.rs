use serde::{Deserialize, Serialize};

use crate::errors::{DeskGroundError, DeskGroundResult};
use crate::executor::snippet::py_str_list;

/// Bare keywords that end or pause a step instead of touching the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TerminalKeyword {
    Wait,
    Done,
    Fail,
}

impl TerminalKeyword {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "WAIT" => Some(TerminalKeyword::Wait),
            "DONE" => Some(TerminalKeyword::Done),
            "FAIL" => Some(TerminalKeyword::Fail),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TerminalKeyword::Wait => "WAIT",
            TerminalKeyword::Done => "DONE",
            TerminalKeyword::Fail => "FAIL",
        }
    }
}

/// `[x, y]` in the unit system of the active coordinate mode.
pub type Point = [f64; 2];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

impl MouseButton {
    pub fn parse(s: &str) -> DeskGroundResult<Self> {
        match s {
            "left" => Ok(MouseButton::Left),
            "middle" => Ok(MouseButton::Middle),
            "right" => Ok(MouseButton::Right),
            other => Err(DeskGroundError::Grounding(format!("unknown mouse button '{other}'"))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MouseButton::Left => "left",
            MouseButton::Middle => "middle",
            MouseButton::Right => "right",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDirection {
    Up,
    Down,
}

impl ScrollDirection {
    pub fn parse(s: &str) -> DeskGroundResult<Self> {
        match s {
            "up" => Ok(ScrollDirection::Up),
            "down" => Ok(ScrollDirection::Down),
            other => Err(DeskGroundError::Grounding(format!("unknown scroll direction '{other}'"))),
        }
    }
}

/// A model action after its arguments have been checked against the
/// registry's parameter schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SymbolicAction {
    Click {
        coordinates: Point,
        num_clicks: u32,
        button: MouseButton,
    },
    Type {
        coordinates: Option<Point>,
        text: String,
        overwrite: bool,
        enter: bool,
    },
    DragAndDrop {
        from: Point,
        to: Point,
    },
    Scroll {
        coordinates: Point,
        direction: ScrollDirection,
    },
    OpenApp {
        app_name: String,
    },
    SwitchWindow {
        window_id: String,
    },
    Hotkey {
        keys: Vec<String>,
    },
    Quote {
        content: String,
    },
    Wait,
    Exit {
        success: bool,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DescriptorKind {
    #[serde(rename = "OPEN_APP")]
    OpenApp,
}

/// An action the execution side has to interpret itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub action_type: DescriptorKind,
    pub parameters: serde_json::Value,
}

/// What the execution collaborator receives for one step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GroundedCommand {
    /// `WAIT`, `DONE` or `FAIL`, optionally preceded by a snippet that prints
    /// a closing message.
    Terminal {
        keyword: TerminalKeyword,
        preamble: Option<String>,
    },
    /// Automation code executed verbatim.
    Snippet { code: String },
    Descriptor(ActionDescriptor),
}

impl GroundedCommand {
    pub fn snippet(code: impl Into<String>) -> Self {
        GroundedCommand::Snippet { code: code.into() }
    }

    pub fn terminal(keyword: TerminalKeyword) -> Self {
        GroundedCommand::Terminal {
            keyword,
            preamble: None,
        }
    }

    pub fn keyword(&self) -> Option<TerminalKeyword> {
        match self {
            GroundedCommand::Terminal { keyword, .. } => Some(*keyword),
            _ => None,
        }
    }

    /// Single-string form as recorded in the conversation history.
    pub fn render(&self) -> String {
        match self {
            GroundedCommand::Terminal {
                keyword,
                preamble: Some(pre),
            } => format!("{pre}; {}", keyword.as_str()),
            GroundedCommand::Terminal { keyword, preamble: None } => keyword.as_str().to_string(),
            GroundedCommand::Snippet { code } => code.clone(),
            GroundedCommand::Descriptor(d) => serde_json::to_string(d).unwrap_or_default(),
        }
    }
}

/// How a key chord is pressed: the primary path drives `xdotool` with
/// explicit key-down/up events, the fallback hands the chord to `pyautogui`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotkeyPlan {
    primary_keys: Vec<String>,
    fallback_keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HotkeyStrategy {
    /// Full `xdotool` argv.
    Primary(Vec<String>),
    /// Key names for `pyautogui.hotkey`.
    Fallback(Vec<String>),
}

impl HotkeyStrategy {
    /// The Python statement that presses the chord this way.
    pub fn statement(&self) -> String {
        match self {
            HotkeyStrategy::Primary(argv) => format!(
                "subprocess.run({}, capture_output=True, text=True, timeout=5)",
                py_str_list(argv)
            ),
            HotkeyStrategy::Fallback(keys) => format!("pyautogui.hotkey(*{})", py_str_list(keys)),
        }
    }
}

impl HotkeyPlan {
    pub fn new(keys: &[String]) -> DeskGroundResult<Self> {
        if keys.is_empty() {
            return Err(DeskGroundError::Grounding("hotkey needs at least one key".into()));
        }
        let primary_keys = keys
            .iter()
            .map(|k| {
                let lower = k.trim().to_lowercase();
                match lower.as_str() {
                    "super" | "win" | "windows" => "super".to_string(),
                    "ctrl" | "control" => "ctrl".to_string(),
                    _ => lower,
                }
            })
            .collect();
        let fallback_keys = keys
            .iter()
            .map(|k| match k.trim().to_lowercase().as_str() {
                "super" | "win" | "windows" => "win".to_string(),
                _ => k.trim().to_string(),
            })
            .collect();
        Ok(Self {
            primary_keys,
            fallback_keys,
        })
    }

    pub fn primary_keys(&self) -> &[String] {
        &self.primary_keys
    }

    pub fn fallback_keys(&self) -> &[String] {
        &self.fallback_keys
    }

    /// Hold every key but the last, tap the last, release in reverse order.
    pub fn primary_command(&self) -> Vec<String> {
        let (last, held) = self
            .primary_keys
            .split_last()
            .expect("HotkeyPlan always holds at least one key");
        let mut cmd = vec!["xdotool".to_string()];
        for key in held {
            cmd.push("keydown".into());
            cmd.push(key.clone());
        }
        cmd.push("key".into());
        cmd.push(last.clone());
        for key in held.iter().rev() {
            cmd.push("keyup".into());
            cmd.push(key.clone());
        }
        cmd
    }

    /// Strategy used at execution time depending on whether `xdotool` exists.
    pub fn strategy(&self, primary_available: bool) -> HotkeyStrategy {
        if primary_available {
            HotkeyStrategy::Primary(self.primary_command())
        } else {
            HotkeyStrategy::Fallback(self.fallback_keys.clone())
        }
    }
}
