//! Premium-tier tools: shell access and multi-file write/read.

pub mod command;
pub mod files;

pub use command::TerminalTool;
pub use files::{CreateOrUpdateFilesTool, ReadFilesTool};

pub const TOOL_TERMINAL: &str = "terminal";
pub const TOOL_CREATE_OR_UPDATE_FILES: &str = "createOrUpdateFiles";
pub const TOOL_READ_FILES: &str = "readFiles";
