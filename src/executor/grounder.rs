//! Grounding: turns the model's symbolic action into something the execution
//! side can run.
//!
//! Dispatch goes by namespace. `Agent.*` calls are bound against the action
//! registry and rendered by a typed handler; calls on a tool class are wrapped
//! for the focused application's tool module; a bare `WAIT`/`DONE`/`FAIL`
//! becomes a terminal command; anything else is handed through untouched.

use crate::errors::{DeskGroundError, DeskGroundResult};
use crate::executor::actions::{
    ActionDescriptor, DescriptorKind, GroundedCommand, HotkeyPlan, MouseButton, Point,
    ScrollDirection, SymbolicAction, TerminalKeyword,
};
use crate::executor::app_tools::{is_tool_class, launch_command, tool_command, tool_for_app};
use crate::executor::call_parser::parse_call;
use crate::executor::registry::{ActionRegistry, AGENT_NAMESPACE};
use crate::executor::snippet::{py_float, py_str};
use crate::perception::types::CoordinateMode;

/// Scroll distance in wheel clicks.
pub const SCROLL_AMOUNT: i32 = 100;

#[derive(Debug)]
pub struct ActionGrounder {
    mode: CoordinateMode,
    registry: ActionRegistry,
}

impl ActionGrounder {
    pub fn new(mode: CoordinateMode) -> Self {
        Self {
            mode,
            registry: ActionRegistry::builtin(),
        }
    }

    pub fn mode(&self) -> CoordinateMode {
        self.mode
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Ground one action string. Never fails: a call that cannot be grounded
    /// becomes a snippet printing what went wrong.
    pub fn ground_code(&self, code: &str, cur_app: &str) -> GroundedCommand {
        match self.try_ground_code(code, cur_app) {
            Ok(cmd) => cmd,
            Err(e) => {
                tracing::warn!(error = %e, code, "action could not be grounded");
                diagnostic(&e.to_string())
            }
        }
    }

    pub fn try_ground_code(&self, code: &str, cur_app: &str) -> DeskGroundResult<GroundedCommand> {
        let code = code.trim();
        if let Some(keyword) = TerminalKeyword::parse(code) {
            return Ok(GroundedCommand::terminal(keyword));
        }

        let head = code.split('(').next().unwrap_or_default();
        let namespace = head.rsplit_once('.').map(|(ns, _)| ns.trim()).unwrap_or_default();

        if namespace == AGENT_NAMESPACE {
            let call = parse_call(code)?;
            let action = self.registry.bind(&call)?;
            tracing::debug!(method = %call.method, "grounding base action");
            return self.ground(&action);
        }

        if is_tool_class(namespace) {
            return match tool_for_app(cur_app) {
                Some((tool_name, class)) if class == namespace => {
                    parse_call(code)?;
                    tool_command(code, tool_name).ok_or_else(|| {
                        DeskGroundError::Grounding(format!("no tool module for {tool_name}"))
                    })
                    .map(GroundedCommand::snippet)
                }
                _ => Err(DeskGroundError::Grounding(format!(
                    "{namespace} is not available while '{cur_app}' is focused"
                ))),
            };
        }

        tracing::debug!("passing snippet through");
        Ok(GroundedCommand::snippet(code))
    }

    /// Render a typed action.
    pub fn ground(&self, action: &SymbolicAction) -> DeskGroundResult<GroundedCommand> {
        match action {
            SymbolicAction::Click {
                coordinates,
                num_clicks,
                button,
            } => self.click(*coordinates, *num_clicks, *button),
            SymbolicAction::Type {
                coordinates,
                text,
                overwrite,
                enter,
            } => self.type_text(*coordinates, text, *overwrite, *enter),
            SymbolicAction::DragAndDrop { from, to } => self.drag_and_drop(*from, *to),
            SymbolicAction::Scroll {
                coordinates,
                direction,
            } => self.scroll(*coordinates, *direction),
            SymbolicAction::OpenApp { app_name } => Ok(open_app(app_name)),
            SymbolicAction::SwitchWindow { window_id } => Ok(switch_window(window_id)),
            SymbolicAction::Hotkey { keys } => hotkey(keys),
            SymbolicAction::Quote { content } => {
                Ok(GroundedCommand::snippet(format!("print({})", py_str(content))))
            }
            SymbolicAction::Wait => Ok(GroundedCommand::terminal(TerminalKeyword::Wait)),
            SymbolicAction::Exit { success, message } => Ok(GroundedCommand::Terminal {
                keyword: if *success {
                    TerminalKeyword::Done
                } else {
                    TerminalKeyword::Fail
                },
                preamble: (!message.is_empty()).then(|| format!("print({})", py_str(message))),
            }),
        }
    }

    fn click(&self, p: Point, num_clicks: u32, button: MouseButton) -> DeskGroundResult<GroundedCommand> {
        let mut s = SnippetBuilder::new(self.mode);
        let (x, y) = s.locate(p, "")?;
        s.line(format!(
            "pyautogui.click({x}, {y}, clicks={num_clicks}, button={})",
            py_str(button.as_str())
        ));
        s.success("Click Success", p);
        Ok(s.finish())
    }

    fn type_text(
        &self,
        p: Option<Point>,
        text: &str,
        overwrite: bool,
        enter: bool,
    ) -> DeskGroundResult<GroundedCommand> {
        let mut s = SnippetBuilder::new(self.mode);
        if let Some(p) = p {
            let (x, y) = s.locate(p, "")?;
            s.line(format!("pyautogui.click({x}, {y})"));
        }
        if overwrite {
            s.line("pyautogui.hotkey('ctrl', 'a')");
            s.line("pyautogui.press('backspace')");
        }
        s.line(format!("pyautogui.write({})", py_str(text)));
        if enter {
            s.line("pyautogui.press('enter')");
        }
        s.line("print('Type Success')");
        Ok(s.finish())
    }

    fn drag_and_drop(&self, from: Point, to: Point) -> DeskGroundResult<GroundedCommand> {
        let mut s = SnippetBuilder::new(self.mode);
        let (x1, y1) = s.locate(from, "1")?;
        let (x2, y2) = s.locate(to, "2")?;
        s.line(format!("pyautogui.moveTo({x1}, {y1})"));
        s.line(format!("pyautogui.dragTo({x2}, {y2}, duration=1.0)"));
        s.line("pyautogui.mouseUp()");
        s.line("print('Drag and Drop Success')");
        Ok(s.finish())
    }

    fn scroll(&self, p: Point, direction: ScrollDirection) -> DeskGroundResult<GroundedCommand> {
        let amount = match direction {
            ScrollDirection::Up => SCROLL_AMOUNT,
            ScrollDirection::Down => -SCROLL_AMOUNT,
        };
        let mut s = SnippetBuilder::new(self.mode);
        let (x, y) = s.locate(p, "")?;
        s.line(format!("pyautogui.moveTo({x}, {y})"));
        s.line(format!("pyautogui.scroll({amount})"));
        s.success("Scroll Success", p);
        Ok(s.finish())
    }
}

/// A snippet that only reports `message`.
pub fn diagnostic(message: &str) -> GroundedCommand {
    GroundedCommand::snippet(format!("print({})", py_str(message)))
}

fn open_app(app_name: &str) -> GroundedCommand {
    let name = app_name.trim().to_lowercase();
    match launch_command(&name) {
        Some(cmd) => GroundedCommand::Descriptor(ActionDescriptor {
            action_type: DescriptorKind::OpenApp,
            parameters: serde_json::json!({
                "launch_app_command": cmd,
                "app_name": name,
            }),
        }),
        None => {
            tracing::warn!(app = %name, "unknown application");
            diagnostic(&format!("{name} is not supported or recognized"))
        }
    }
}

fn switch_window(window_id: &str) -> GroundedCommand {
    let id = py_str(window_id);
    let lines = [
        "import subprocess".to_string(),
        "import time".to_string(),
        "import pyautogui".to_string(),
        "pyautogui.press('escape')".to_string(),
        "time.sleep(0.5)".to_string(),
        format!("subprocess.run(['wmctrl', '-ia', {id}])"),
        format!("subprocess.run(['wmctrl', '-ir', {id}, '-b', 'add,maximized_vert,maximized_horz'])"),
        format!("print({})", py_str(&format!("Switch to {window_id}"))),
    ];
    GroundedCommand::snippet(lines.join("; "))
}

/// Tries the `xdotool` chord first and falls back to `pyautogui.hotkey` when
/// the binary is missing at execution time.
fn hotkey(keys: &[String]) -> DeskGroundResult<GroundedCommand> {
    let plan = HotkeyPlan::new(keys)?;
    let combo = py_str(&keys.join("+"));
    let code = format!(
        "import subprocess
import time
print('Attempting hotkey combination: ' + {combo})
try:
    result = {primary}
    if result.returncode == 0:
        print('xdotool hotkey executed successfully')
        time.sleep(0.5)
    else:
        print('xdotool failed: ' + result.stderr)
except FileNotFoundError:
    print('xdotool not available, falling back to pyautogui...')
    try:
        import pyautogui
        {fallback}
        time.sleep(0.5)
        print('PyAutoGUI fallback executed')
    except Exception as fallback_error:
        print(f'Both xdotool and pyautogui failed: {{fallback_error}}')
except Exception as e:
    print(f'Hotkey execution failed: {{e}}')
print('Hotkey attempt completed')",
        primary = plan.strategy(true).statement(),
        fallback = plan.strategy(false).statement(),
    );
    Ok(GroundedCommand::snippet(code))
}

/// Accumulates the statements of a one-line snippet. In relative mode the first located point reads
/// the live screen size; absolute points are written as pixels.
struct SnippetBuilder {
    mode: CoordinateMode,
    lines: Vec<String>,
    size_read: bool,
}

impl SnippetBuilder {
    fn new(mode: CoordinateMode) -> Self {
        Self {
            mode,
            lines: vec!["import pyautogui".to_string()],
            size_read: false,
        }
    }

    fn line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// Expressions for the pixel position of `p`.
    fn locate(&mut self, p: Point, suffix: &str) -> DeskGroundResult<(String, String)> {
        let [x, y] = p;
        if !x.is_finite() || !y.is_finite() {
            return Err(DeskGroundError::Grounding("coordinates must be finite".into()));
        }
        match self.mode {
            CoordinateMode::Relative => {
                if !(0.0..=1.0).contains(&x) || !(0.0..=1.0).contains(&y) {
                    return Err(DeskGroundError::Grounding(format!(
                        "relative coordinates must lie in [0, 1], got [{}, {}]",
                        py_float(x),
                        py_float(y)
                    )));
                }
                if !self.size_read {
                    self.line("screen_width, screen_height = pyautogui.size()");
                    self.size_read = true;
                }
                self.line(format!("abs_x{suffix} = int({} * screen_width)", py_float(x)));
                self.line(format!("abs_y{suffix} = int({} * screen_height)", py_float(y)));
                Ok((format!("abs_x{suffix}"), format!("abs_y{suffix}")))
            }
            CoordinateMode::Absolute => {
                if x < 0.0 || y < 0.0 {
                    return Err(DeskGroundError::Grounding(format!(
                        "pixel coordinates must not be negative, got [{x}, {y}]"
                    )));
                }
                Ok(((x.round() as i64).to_string(), (y.round() as i64).to_string()))
            }
        }
    }

    /// Success line; relative mode also reports the resolved pixels.
    fn success(&mut self, label: &str, [x, y]: Point) {
        match self.mode {
            CoordinateMode::Relative => self.line(format!(
                "print(f'{label} at relative ({}, {}) -> absolute ({{abs_x}}, {{abs_y}})')",
                py_float(x),
                py_float(y)
            )),
            CoordinateMode::Absolute => self.line(format!("print({})", py_str(label))),
        }
    }

    fn finish(self) -> GroundedCommand {
        GroundedCommand::snippet(self.lines.join("; "))
    }
}
