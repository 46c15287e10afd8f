pub mod a11y_tree;
pub mod dedup;
pub mod filter;
pub mod linearize;
pub mod pipeline;
pub mod trim;
pub mod types;
