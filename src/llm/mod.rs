pub mod provider;
pub mod response_parser;
pub mod types;
