pub mod common;
pub mod completions;
pub mod files;
pub mod members;
pub mod messages;
pub mod queue;
pub mod status;
pub mod sync;
