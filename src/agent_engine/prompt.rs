//! Prompt assembly for one step: system message, replayed history and the
//! observation message with optional screenshots.

use base64::Engine as _;

use crate::agent_engine::history::truncate_chars;
use crate::config::AppConfig;
use crate::errors::{DeskGroundError, DeskGroundResult};
use crate::executor::registry::ActionRegistry;
use crate::llm::types::{ChatMessage, ContentPart};
use crate::perception::pipeline::{linearize_accessibility_tree, LinearizeOptions};
use crate::perception::trim::trim_accessibility_tree;
use crate::perception::types::{CoordinateMode, Observation, ScreenSize};

const SETUP_PROMPT: &str = include_str!("../../prompts/system/setup.md");
const NOTE_TEMPLATE: &str = include_str!("../../prompts/system/note.md");
const COORDINATES_RELATIVE: &str = include_str!("../../prompts/system/coordinates_relative.md");
const COORDINATES_ABSOLUTE: &str = include_str!("../../prompts/system/coordinates_absolute.md");

const APPS_HEADER: &str = "Window ID    App Name    Title";
const APPS_SEPARATOR: &str = "    ";
const NONE: &str = "None";

pub struct PromptBuilder {
    mode: CoordinateMode,
    tree_options: LinearizeOptions,
    image_size: ScreenSize,
    with_image: bool,
    with_atree: bool,
    tool_in_sys_msg: bool,
    max_items: usize,
    app_info_max_chars: usize,
    result_max_chars: usize,
    client_password: String,
    agent_class: String,
}

impl PromptBuilder {
    pub fn new(config: &AppConfig, registry: &ActionRegistry) -> Self {
        let mode = config.agent.coordinate_mode();
        Self {
            mode,
            tree_options: LinearizeOptions {
                platform: config.agent.platform,
                mode,
                screen: config.agent.screen_size,
                check_image: config.a11y.check_image,
            },
            image_size: config.agent.image_size,
            with_image: config.prompt.with_image,
            with_atree: config.a11y.with_atree,
            tool_in_sys_msg: config.prompt.tool_in_sys_msg,
            max_items: config.a11y.max_items,
            app_info_max_chars: config.prompt.app_info_max_chars,
            result_max_chars: config.prompt.result_max_chars,
            client_password: config.agent.client_password.clone(),
            agent_class: registry.render_class(mode),
        }
    }

    /// Capability definitions. `tool` is the focused application's
    /// `(tool_name, ToolClass)` when it has one.
    pub fn function_definitions(&self, tool: Option<(&str, &str)>) -> String {
        match tool {
            Some((app_name, class)) => format!(
                "You will be provided access to the following methods to interact with the UI:\n    \
                 1. class Agent, a grounding agent which provides basic action space to interact with desktop.\n    \
                 2. class {class}, which provides tools to interact with the current application {app_name}.\n\n\
                 Here are the definition of the classes:\n```python\n{}\n```",
                self.agent_class
            ),
            None => format!(
                "You will be provided access to the following methods to interact with the UI:\n\n```python\n{}\n```",
                self.agent_class
            ),
        }
    }

    pub fn note_prompt(&self) -> String {
        let coordinates = match self.mode {
            CoordinateMode::Relative => COORDINATES_RELATIVE,
            CoordinateMode::Absolute => COORDINATES_ABSOLUTE,
        };
        NOTE_TEMPLATE
            .replace("{client_password}", &self.client_password)
            .replace("{coordinate_info}", coordinates.trim_end())
            .trim_end()
            .to_string()
    }

    pub fn system_message(&self, instruction: &str, tool: Option<(&str, &str)>) -> String {
        let mut parts = vec![SETUP_PROMPT.trim_end().to_string()];
        if self.tool_in_sys_msg {
            parts.push(self.function_definitions(tool));
        }
        parts.push(self.note_prompt());
        format!(
            "{}\n\n**IMPORTANT** You are asked to complete the following task: {instruction}",
            parts.join("\n\n")
        )
    }

    /// Linearized and trimmed tree of the observation, empty when absent or
    /// unusable.
    pub fn tree_text(&self, obs: &Observation) -> String {
        match obs.accessibility_tree.as_deref() {
            Some(xml) if !xml.trim().is_empty() => trim_accessibility_tree(
                &linearize_accessibility_tree(xml, &self.tree_options),
                self.max_items,
            ),
            _ => String::new(),
        }
    }

    pub fn observation_text(&self, obs: &Observation, last_result: &str, tool: Option<(&str, &str)>) -> String {
        let apps = if obs.apps.is_empty() {
            NONE.to_string()
        } else {
            let mut table = String::from(APPS_HEADER);
            for (window_id, app) in &obs.apps {
                table.push('\n');
                table.push_str(&[window_id.as_str(), app.app_name.as_str(), app.title.as_str()].join(APPS_SEPARATOR));
            }
            table.trim().to_string()
        };

        let window_id = obs.cur_window_id.trim();
        let current = if !window_id.is_empty() && apps.contains(window_id) {
            window_id
        } else {
            NONE
        };

        let tree = if self.with_atree {
            format!("\n\n* A11y Tree: {}", self.tree_text(obs).trim())
        } else {
            String::new()
        };

        let text = format!(
            "* Apps: {apps}\n\n* Current App: {current}{tree}\n\n* App Info: {}\n\n* Previous Action Result: {}",
            or_none(&obs.app_info, self.app_info_max_chars),
            or_none(last_result, self.result_max_chars),
        );
        if self.tool_in_sys_msg {
            text
        } else {
            format!("{text}\n\n{}", self.function_definitions(tool))
        }
    }

    /// Screenshots (previous first) followed by the observation text.
    pub fn observation_message(&self, obs: &Observation, last_result: &str, tool: Option<(&str, &str)>) -> ChatMessage {
        let mut parts = Vec::new();
        if self.with_image {
            if let Some(current) = obs.screenshot.as_deref() {
                for (label, bytes) in [("previous", obs.previous_screenshot.as_deref()), ("current", Some(current))] {
                    let Some(bytes) = bytes else { continue };
                    match encode_screenshot(bytes, self.image_size) {
                        Ok(b64) => parts.push(ContentPart::png_image(&b64)),
                        Err(e) => tracing::warn!(screenshot = label, error = %e, "screenshot dropped from prompt"),
                    }
                }
            }
        }
        parts.push(ContentPart::text(self.observation_text(obs, last_result, tool)));
        ChatMessage::user_parts(parts)
    }

    /// Full message list for one model call.
    pub fn build(
        &self,
        instruction: &str,
        obs: &Observation,
        history: Vec<ChatMessage>,
        last_result: &str,
        tool: Option<(&str, &str)>,
    ) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(self.system_message(instruction, tool)));
        messages.extend(history);
        messages.push(self.observation_message(obs, last_result, tool));
        messages
    }
}

fn or_none(s: &str, max: usize) -> String {
    let s = s.trim();
    if s.is_empty() {
        NONE.to_string()
    } else {
        truncate_chars(s, max)
    }
}

/// Resize a screenshot to `size` and return it as base64 PNG.
pub fn encode_screenshot(bytes: &[u8], size: ScreenSize) -> DeskGroundResult<String> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| DeskGroundError::Image(format!("screenshot load: {e}")))?;
    let img = if img.width() != size.width || img.height() != size.height {
        img.resize_exact(size.width, size.height, image::imageops::FilterType::Lanczos3)
    } else {
        img
    };

    let mut png_bytes = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut png_bytes), image::ImageFormat::Png)
        .map_err(|e| DeskGroundError::Image(format!("screenshot PNG encode: {e}")))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(&png_bytes))
}
