pub mod actions;
pub mod app_tools;
pub mod call_parser;
pub mod grounder;
pub mod registry;
pub mod snippet;
