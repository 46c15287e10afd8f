//! The closed set of base actions the model may call as `Agent.<name>(…)`.
//!
//! Each entry carries its parameter schema and documentation, which feed both
//! argument binding and the capability definitions in the system prompt.

use std::collections::HashMap;

use serde_json::Value;

use crate::errors::{DeskGroundError, DeskGroundResult};
use crate::executor::actions::{MouseButton, Point, ScrollDirection, SymbolicAction};
use crate::executor::call_parser::ActionCall;
use crate::perception::types::CoordinateMode;

/// Namespace of the base actions.
pub const AGENT_NAMESPACE: &str = "Agent";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// `[x, y]` in the active coordinate mode.
    Coordinates,
    Int,
    Str,
    Bool,
    StrList,
}

impl ParamKind {
    fn type_name(self) -> &'static str {
        match self {
            ParamKind::Coordinates | ParamKind::StrList => "List",
            ParamKind::Int => "int",
            ParamKind::Str => "str",
            ParamKind::Bool => "bool",
        }
    }
}

#[derive(Debug)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    /// Python literal shown in the signature; `None` marks a required parameter.
    pub default: Option<&'static str>,
    pub description: &'static str,
}

pub struct ActionSpec {
    pub name: &'static str,
    pub summary: &'static str,
    /// Extra docstring paragraph, empty when there is none.
    pub details: &'static str,
    pub params: &'static [ParamSpec],
    pub build: fn(&BoundArgs) -> DeskGroundResult<SymbolicAction>,
}

impl std::fmt::Debug for ActionSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionSpec").field("name", &self.name).finish_non_exhaustive()
    }
}

static BUILTIN_ACTIONS: &[ActionSpec] = &[
    ActionSpec {
        name: "click",
        summary: "Click on the element.",
        details: "",
        params: &[
            ParamSpec {
                name: "coordinates",
                kind: ParamKind::Coordinates,
                default: None,
                description: "[x, y] Coordinates of the element to click on",
            },
            ParamSpec {
                name: "num_clicks",
                kind: ParamKind::Int,
                default: Some("1"),
                description: "number of times to click the element",
            },
            ParamSpec {
                name: "button_type",
                kind: ParamKind::Str,
                default: Some("'left'"),
                description: "which mouse button to press can be \"left\", \"middle\", or \"right\"",
            },
        ],
        build: |a| {
            let num_clicks = a.int_or("num_clicks", 1)?;
            let num_clicks = u32::try_from(num_clicks)
                .ok()
                .filter(|n| *n >= 1)
                .ok_or_else(|| {
                    DeskGroundError::Grounding(format!("num_clicks must be between 1 and {}, got {num_clicks}", u32::MAX))
                })?;
            Ok(SymbolicAction::Click {
                coordinates: a.point("coordinates")?,
                num_clicks,
                button: MouseButton::parse(&a.str_or("button_type", "left")?)?,
            })
        },
    },
    ActionSpec {
        name: "type",
        summary: "Type text into the element.",
        details: "",
        params: &[
            ParamSpec {
                name: "coordinates",
                kind: ParamKind::Coordinates,
                default: Some("None"),
                description: "[x, y] Coordinates of the element to type into. If not provided, typing will start at the current cursor location.",
            },
            ParamSpec {
                name: "text",
                kind: ParamKind::Str,
                default: Some("''"),
                description: "the text to type",
            },
            ParamSpec {
                name: "overwrite",
                kind: ParamKind::Bool,
                default: Some("False"),
                description: "Assign it to True if the text should overwrite the existing text, otherwise assign it to False. Using this argument clears all text in an element.",
            },
            ParamSpec {
                name: "enter",
                kind: ParamKind::Bool,
                default: Some("False"),
                description: "Assign it to True if the enter key should be pressed after typing the text, otherwise assign it to False.",
            },
        ],
        build: |a| {
            Ok(SymbolicAction::Type {
                coordinates: a.opt_point("coordinates")?,
                text: a.str_or("text", "")?,
                overwrite: a.bool_or("overwrite", false)?,
                enter: a.bool_or("enter", false)?,
            })
        },
    },
    ActionSpec {
        name: "drag_and_drop",
        summary: "Drag element1 and drop it on element2.",
        details: "",
        params: &[
            ParamSpec {
                name: "drag_from_coordinates",
                kind: ParamKind::Coordinates,
                default: None,
                description: "[x, y] Coordinates of element to drag",
            },
            ParamSpec {
                name: "drop_on_coordinates",
                kind: ParamKind::Coordinates,
                default: None,
                description: "[x, y] Coordinates of element to drop on",
            },
        ],
        build: |a| {
            Ok(SymbolicAction::DragAndDrop {
                from: a.point("drag_from_coordinates")?,
                to: a.point("drop_on_coordinates")?,
            })
        },
    },
    ActionSpec {
        name: "scroll",
        summary: "Scroll the element in the specified direction.",
        details: "",
        params: &[
            ParamSpec {
                name: "coordinates",
                kind: ParamKind::Coordinates,
                default: None,
                description: "[x, y] Coordinates of the element to scroll in",
            },
            ParamSpec {
                name: "direction",
                kind: ParamKind::Str,
                default: None,
                description: "the direction to scroll can be \"up\" or \"down\".",
            },
        ],
        build: |a| {
            Ok(SymbolicAction::Scroll {
                coordinates: a.point("coordinates")?,
                direction: ScrollDirection::parse(&a.string("direction")?)?,
            })
        },
    },
    ActionSpec {
        name: "open_app",
        summary: "Open a specified application.",
        details: "App List:\n- chrome\n- files\n- terminal\n- gedit\n- libreoffice writer\n- libreoffice calc\n- libreoffice impress\n- vs code\n- vlc\n- gimp\n- settings\n- thunderbird",
        params: &[ParamSpec {
            name: "app_name",
            kind: ParamKind::Str,
            default: None,
            description: "Name of the application to open",
        }],
        build: |a| {
            Ok(SymbolicAction::OpenApp {
                app_name: a.string("app_name")?,
            })
        },
    },
    ActionSpec {
        name: "switch_window",
        summary: "Switch to the window with the given window id.",
        details: "",
        params: &[ParamSpec {
            name: "window_id",
            kind: ParamKind::Str,
            default: None,
            description: "the window id to switch to from the provided list of open windows",
        }],
        build: |a| {
            Ok(SymbolicAction::SwitchWindow {
                window_id: a.string("window_id")?,
            })
        },
    },
    ActionSpec {
        name: "hotkey",
        summary: "Press a hotkey combination.",
        details: "",
        params: &[ParamSpec {
            name: "keys",
            kind: ParamKind::StrList,
            default: None,
            description: "the keys to press in combination in a list format\n    Common combinations:\n    - ['ctrl', 'c'] for copy\n    - ['ctrl', 'v'] for paste\n    - ['alt', 'f2'] for run dialog (GNOME)\n    - ['super', 'r'] for run dialog (awesome/other WMs)\n    - ['ctrl', 'alt', 't'] for terminal\n    - ['prtsc'] for screenshot",
        }],
        build: |a| {
            Ok(SymbolicAction::Hotkey {
                keys: a.str_list("keys")?,
            })
        },
    },
    ActionSpec {
        name: "quote",
        summary: "Quoting information from the current page for memory. Only you can see the quoted content.",
        details: "",
        params: &[ParamSpec {
            name: "content",
            kind: ParamKind::Str,
            default: None,
            description: "text summarized or copied from the page for later operation.",
        }],
        build: |a| {
            Ok(SymbolicAction::Quote {
                content: a.string("content")?,
            })
        },
    },
    ActionSpec {
        name: "wait",
        summary: "Wait for a while.",
        details: "",
        params: &[],
        build: |_| Ok(SymbolicAction::Wait),
    },
    ActionSpec {
        name: "exit",
        summary: "End the current task.",
        details: "",
        params: &[
            ParamSpec {
                name: "success",
                kind: ParamKind::Bool,
                default: None,
                description: "True if successfully finish a task, otherwise set it False",
            },
            ParamSpec {
                name: "message",
                kind: ParamKind::Str,
                default: Some("''"),
                description: "Optional message to log when exiting",
            },
        ],
        build: |a| {
            Ok(SymbolicAction::Exit {
                success: a.bool("success")?,
                message: a.str_or("message", "")?,
            })
        },
    },
];

/// Argument values bound to parameter names for one call.
#[derive(Debug, Default)]
pub struct BoundArgs {
    action: &'static str,
    values: HashMap<&'static str, Value>,
}

impl BoundArgs {
    fn err(&self, msg: String) -> DeskGroundError {
        DeskGroundError::Grounding(format!("{}: {msg}", self.action))
    }

    fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name).filter(|v| !v.is_null())
    }

    fn require(&self, name: &str) -> DeskGroundResult<&Value> {
        self.get(name).ok_or_else(|| self.err(format!("missing argument '{name}'")))
    }

    fn to_point(&self, name: &str, v: &Value) -> DeskGroundResult<Point> {
        match v.as_array().map(Vec::as_slice) {
            Some([x, y]) => match (x.as_f64(), y.as_f64()) {
                (Some(x), Some(y)) => Ok([x, y]),
                _ => Err(self.err(format!("'{name}' must hold two numbers"))),
            },
            _ => Err(self.err(format!("'{name}' must be [x, y]"))),
        }
    }

    pub fn point(&self, name: &str) -> DeskGroundResult<Point> {
        self.to_point(name, self.require(name)?)
    }

    pub fn opt_point(&self, name: &str) -> DeskGroundResult<Option<Point>> {
        self.get(name).map(|v| self.to_point(name, v)).transpose()
    }

    /// Strings; numbers are accepted and rendered as written.
    pub fn string(&self, name: &str) -> DeskGroundResult<String> {
        match self.require(name)? {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            _ => Err(self.err(format!("'{name}' must be a string"))),
        }
    }

    pub fn str_or(&self, name: &str, default: &str) -> DeskGroundResult<String> {
        if self.get(name).is_none() {
            return Ok(default.to_string());
        }
        self.string(name)
    }

    pub fn bool(&self, name: &str) -> DeskGroundResult<bool> {
        self.require(name)?
            .as_bool()
            .ok_or_else(|| self.err(format!("'{name}' must be True or False")))
    }

    pub fn bool_or(&self, name: &str, default: bool) -> DeskGroundResult<bool> {
        if self.get(name).is_none() {
            return Ok(default);
        }
        self.bool(name)
    }

    pub fn int_or(&self, name: &str, default: i64) -> DeskGroundResult<i64> {
        let Some(v) = self.get(name) else {
            return Ok(default);
        };
        v.as_i64()
            .or_else(|| v.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .ok_or_else(|| self.err(format!("'{name}' must be an integer")))
    }

    pub fn str_list(&self, name: &str) -> DeskGroundResult<Vec<String>> {
        let items = self
            .require(name)?
            .as_array()
            .ok_or_else(|| self.err(format!("'{name}' must be a list")))?;
        items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| self.err(format!("'{name}' must hold strings")))
            })
            .collect()
    }
}

/// Lookup table over the built-in actions, keyed by method name.
#[derive(Debug)]
pub struct ActionRegistry {
    specs: &'static [ActionSpec],
    by_name: HashMap<&'static str, usize>,
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ActionRegistry {
    pub fn builtin() -> Self {
        let by_name = BUILTIN_ACTIONS
            .iter()
            .enumerate()
            .map(|(i, spec)| (spec.name, i))
            .collect();
        Self {
            specs: BUILTIN_ACTIONS,
            by_name,
        }
    }

    pub fn get(&self, name: &str) -> Option<&'static ActionSpec> {
        self.by_name.get(name).map(|&i| &self.specs[i])
    }

    pub fn specs(&self) -> &'static [ActionSpec] {
        self.specs
    }

    /// Match a call's arguments against the action's schema and build the
    /// typed action. Unknown names, surplus arguments and type mismatches are
    /// all `Grounding` errors.
    pub fn bind(&self, call: &ActionCall) -> DeskGroundResult<SymbolicAction> {
        let spec = self.get(&call.method).ok_or_else(|| {
            DeskGroundError::Grounding(format!("unknown action '{}'", call.qualified_name()))
        })?;

        if call.args.len() > spec.params.len() {
            return Err(DeskGroundError::Grounding(format!(
                "{} takes at most {} arguments, got {}",
                spec.name,
                spec.params.len(),
                call.args.len()
            )));
        }

        let mut bound = BoundArgs {
            action: spec.name,
            values: HashMap::new(),
        };
        for (param, value) in spec.params.iter().zip(&call.args) {
            bound.values.insert(param.name, value.clone());
        }
        for (key, value) in &call.kwargs {
            let param = spec
                .params
                .iter()
                .find(|p| p.name == key.as_str())
                .ok_or_else(|| bound.err(format!("unexpected keyword argument '{key}'")))?;
            if bound.values.insert(param.name, value.clone()).is_some() {
                return Err(bound.err(format!("argument '{key}' given twice")));
            }
        }

        (spec.build)(&bound)
    }

    /// Python-style class listing used as the capability definitions in the
    /// system prompt.
    pub fn render_class(&self, mode: CoordinateMode) -> String {
        let coord_note = match mode {
            CoordinateMode::Relative => "[0.0-1.0, 0.0-1.0] (relative to screen size)",
            CoordinateMode::Absolute => "[pixel_x, pixel_y] (absolute pixels)",
        };

        let mut out = format!("Class {AGENT_NAMESPACE}:");
        for spec in self.specs {
            let mut signature = vec!["cls".to_string()];
            for p in spec.params {
                match p.default {
                    Some(d) => signature.push(format!("{}={d}", p.name)),
                    None => signature.push(p.name.to_string()),
                }
            }

            out.push_str(&format!("\n    def {}({}):\n", spec.name, signature.join(", ")));
            out.push_str("        '''\n");
            out.push_str(&format!("        {}\n", spec.summary));
            if !spec.details.is_empty() {
                out.push('\n');
                for line in spec.details.lines() {
                    out.push_str(&format!("        {line}\n"));
                }
            }
            if !spec.params.is_empty() {
                out.push_str("\n        Args:\n");
            }
            for p in spec.params {
                let mut lines = p.description.lines();
                out.push_str(&format!(
                    "            {} ({}): {}\n",
                    p.name,
                    p.kind.type_name(),
                    lines.next().unwrap_or_default()
                ));
                for line in lines {
                    out.push_str(&format!("            {line}\n"));
                }
                if p.kind == ParamKind::Coordinates {
                    out.push_str(&format!("                - {coord_note}\n"));
                }
            }
            out.push_str("        '''\n");
        }
        out.trim_end().to_string()
    }
}
