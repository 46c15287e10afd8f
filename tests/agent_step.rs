use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use deskground::agent_engine::history::{ENV_PLACEHOLDER, INVALID_ACTION_RESULT, PARSE_ERROR_MARKER};
use deskground::executor::actions::{DescriptorKind, TerminalKeyword};
use deskground::llm::types::ChatMessage;
use deskground::perception::types::AppWindow;
use deskground::{
    AgentEngine, AppConfig, DeskGroundError, DeskGroundResult, GroundedCommand, ModelClient,
    Observation, StepSignal,
};

/// Replays canned replies in order and keeps every prompt it was sent.
struct ScriptedModel {
    replies: Mutex<Vec<DeskGroundResult<String>>>,
    prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    fn new(replies: Vec<DeskGroundResult<String>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().rev().collect()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompt(&self, call: usize) -> Vec<ChatMessage> {
        self.prompts.lock().unwrap()[call].clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, messages: Vec<ChatMessage>) -> DeskGroundResult<String> {
        self.prompts.lock().unwrap().push(messages);
        self.replies
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Ok("WAIT".into()))
    }
}

fn reply(code: &str) -> DeskGroundResult<String> {
    Ok(format!("<think>\nLooking at the screen.\n</think>\n```python\n{code}\n```"))
}

fn config(relative: bool) -> AppConfig {
    let mut config = AppConfig::default();
    config.agent.relative_coordinate = relative;
    config.prompt.with_image = false;
    config
}

fn observation(app: &str) -> Observation {
    let mut obs = Observation {
        cur_window_id: "0x03a00004".into(),
        cur_app: app.into(),
        ..Default::default()
    };
    obs.apps.insert(
        "0x03a00004".into(),
        AppWindow {
            app_name: app.into(),
            title: "Untitled".into(),
        },
    );
    obs
}

#[tokio::test]
async fn relative_click_defers_screen_size() {
    let model = ScriptedModel::new(vec![reply("Agent.click([0.5, 0.25])")]);
    let mut engine = AgentEngine::new(config(true), model.clone());

    let outcome = engine.predict("click the button", &observation("gedit")).await;

    assert_eq!(outcome.signal, StepSignal::Continue);
    assert_eq!(outcome.actions, vec!["Agent.click([0.5, 0.25])".to_string()]);
    let Some(GroundedCommand::Snippet { code }) = &outcome.command else {
        panic!("expected snippet, got {:?}", outcome.command);
    };
    assert!(code.contains("pyautogui.size()"));
    assert!(code.contains("pyautogui.click("));
    assert_eq!(engine.history().turns()[0].action, *code);
}

#[tokio::test]
async fn absolute_click_is_exact() {
    let model = ScriptedModel::new(vec![reply("Agent.click([960, 540], num_clicks=2)")]);
    let mut engine = AgentEngine::new(config(false), model);

    let outcome = engine.predict("double click", &observation("gedit")).await;

    assert_eq!(
        outcome.command.map(|c| c.render()).as_deref(),
        Some("import pyautogui; pyautogui.click(960, 540, clicks=2, button='left'); print('Click Success')")
    );
}

#[tokio::test]
async fn exit_maps_to_done_and_fail() {
    let model = ScriptedModel::new(vec![
        reply("Agent.exit(success=True)"),
        reply("Agent.exit(success=False, message=\"no access\")"),
        Ok("DONE".into()),
    ]);
    let mut engine = AgentEngine::new(config(true), model);
    let obs = observation("gedit");

    let done = engine.predict("task", &obs).await;
    assert_eq!(done.signal, StepSignal::Done);
    assert!(done.signal.is_terminal());

    let fail = engine.predict("task", &obs).await;
    assert_eq!(fail.signal, StepSignal::Fail);
    assert_eq!(
        fail.command.as_ref().map(GroundedCommand::render).as_deref(),
        Some("print('no access'); FAIL")
    );

    let bare = engine.predict("task", &obs).await;
    assert_eq!(bare.command.and_then(|c| c.keyword()), Some(TerminalKeyword::Done));
}

#[tokio::test]
async fn transport_error_and_empty_reply_are_parse_errors() {
    let model = ScriptedModel::new(vec![
        Err(DeskGroundError::Transport("connection reset".into())),
        Ok("I am not sure what to do.".into()),
    ]);
    let mut engine = AgentEngine::new(config(true), model);
    let obs = observation("gedit");

    let first = engine.predict("task", &obs).await;
    let second = engine.predict("task", &obs).await;

    for outcome in [&first, &second] {
        assert_eq!(outcome.signal, StepSignal::ParseError);
        assert!(outcome.actions.is_empty());
        assert!(outcome.command.is_none());
    }
    let turns = engine.history().turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].action, PARSE_ERROR_MARKER);
    assert_eq!(turns[0].exe_result, INVALID_ACTION_RESULT);
    assert_eq!(turns[1].response, "I am not sure what to do.");
}

#[tokio::test]
async fn execution_result_is_backfilled_and_replayed() {
    let model = ScriptedModel::new(vec![reply("Agent.click([0.1, 0.1])"), Ok("WAIT".into())]);
    let mut engine = AgentEngine::new(config(true), model.clone());

    engine.predict("task", &observation("gedit")).await;
    let mut next = observation("gedit");
    next.exe_result = Some("Click Success".into());
    engine.predict("task", &next).await;
    engine.predict("task", &observation("gedit")).await;

    assert_eq!(engine.history().turns()[0].exe_result, "Click Success");

    let second = model.prompt(1);
    assert!(second
        .last()
        .unwrap()
        .text()
        .ends_with("* Previous Action Result: Click Success"));

    let third = model.prompt(2);
    assert_eq!(third[1].text(), ENV_PLACEHOLDER);
    assert_eq!(
        third[3].text(),
        format!("{ENV_PLACEHOLDER}\nPrevious Action Result: Click Success")
    );
}

#[tokio::test]
async fn history_window_is_bounded() {
    let mut cfg = config(true);
    cfg.agent.history_turns = 2;
    let model = ScriptedModel::new(vec![]);
    let mut engine = AgentEngine::new(cfg, model.clone());
    let obs = observation("gedit");

    for _ in 0..5 {
        engine.predict("task", &obs).await;
    }

    // system + two replayed turns + current observation
    let last = model.prompt(4);
    assert_eq!(last.len(), 6);
    assert_eq!(last[0].role, "system");
    assert!(last[0].text().ends_with("following task: task"));
    assert_eq!(engine.history().len(), 5);
}

#[tokio::test]
async fn tool_call_is_scoped_to_focused_app() {
    let code = "CalcTools.set_cell_value(\"A1\", 3)";
    let model = ScriptedModel::new(vec![reply(code), reply(code)]);
    let mut engine = AgentEngine::new(config(true), model.clone());

    let in_calc = engine.predict("fill A1", &observation("libreoffice-calc")).await;
    assert_eq!(
        in_calc.command.map(|c| c.render()).as_deref(),
        Some("from libreoffice_calc import *; CalcTools.set_cell_value(\"A1\", 3); CalcTools.print_result()")
    );
    assert!(model.prompt(0)[0]
        .text()
        .contains("2. class CalcTools, which provides tools to interact with the current application libreoffice_calc."));

    let in_gedit = engine.predict("fill A1", &observation("gedit")).await;
    let rendered = in_gedit.command.map(|c| c.render()).unwrap_or_default();
    assert!(rendered.starts_with("print("));
    assert!(rendered.contains("CalcTools"));
    assert_eq!(in_gedit.signal, StepSignal::Continue);
}

#[tokio::test]
async fn open_app_yields_descriptor() {
    let model = ScriptedModel::new(vec![reply("Agent.open_app(\"Terminal\")")]);
    let mut engine = AgentEngine::new(config(true), model);

    let outcome = engine.predict("open a terminal", &observation("gedit")).await;

    let Some(GroundedCommand::Descriptor(descriptor)) = outcome.command else {
        panic!("expected descriptor");
    };
    assert_eq!(descriptor.action_type, DescriptorKind::OpenApp);
    assert_eq!(descriptor.parameters["app_name"], "terminal");
    assert!(descriptor.parameters["launch_app_command"]
        .as_str()
        .unwrap()
        .ends_with("gnome-terminal"));
}

#[tokio::test]
async fn unknown_agent_method_degrades_to_diagnostic() {
    let model = ScriptedModel::new(vec![reply("Agent.teleport([0.5, 0.5])")]);
    let mut engine = AgentEngine::new(config(true), model);

    let outcome = engine.predict("task", &observation("gedit")).await;

    let rendered = outcome.command.map(|c| c.render()).unwrap_or_default();
    assert!(rendered.starts_with("print("));
    assert!(rendered.contains("teleport"));
    assert_eq!(outcome.signal, StepSignal::Continue);
}

#[tokio::test]
async fn reset_clears_history_between_tasks() {
    let model = ScriptedModel::new(vec![reply("Agent.wait()"), Ok("WAIT".into())]);
    let mut engine = AgentEngine::new(config(true), model.clone());

    let waited = engine.predict("first task", &observation("gedit")).await;
    assert_eq!(waited.signal, StepSignal::Wait);
    engine.reset();
    engine.predict("second task", &observation("gedit")).await;

    assert_eq!(engine.history().len(), 1);
    assert_eq!(model.prompt(1).len(), 2);
}
