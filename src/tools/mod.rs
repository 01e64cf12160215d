//! Tool Dispatcher implementation (§4.B) — the fixed catalog of tools the
//! Agentic Loop can invoke, plus the registry that validates and routes
//! calls to them.
//!
//! ## Built-in tools
//!
//! - **read_file** / **write_file** / **list_directory** / **search_files**:
//!   workspace-scoped filesystem access.
//! - **run_command**: sandboxed shell execution with process-group kill.
//! - **web_search**: credential-gated external search.
//! - **recall_memory_search** / **core_memory_read** / **core_memory_append**
//!   / **archival_memory_search** / **archival_memory_insert**: thin
//!   pass-throughs onto an external `MemoryBackend`.
//!
//! Add a new tool by implementing `Tool`, declaring its module here, and
//! registering an instance with a `ToolRegistry`.

mod traits;
mod registry;
mod catalog;
mod read_file;
mod write_file;
mod list_directory;
mod search_files;
mod run_command;
mod web_search;
mod memory;
mod pid_registry;

pub use traits::Tool;
pub use registry::ToolRegistry;
pub use catalog::{ToolName, CATALOG_NAMES};

pub use read_file::ReadFileTool;
pub use write_file::WriteFileTool;
pub use list_directory::ListDirectoryTool;
pub use search_files::SearchFilesTool;
pub use run_command::RunCommandTool;
pub use web_search::WebSearchTool;
pub use memory::{
    ArchivalMemoryInsertTool, ArchivalMemorySearchTool, CoreMemoryAppendTool, CoreMemoryReadTool,
    MemoryBackend, RecallMemorySearchTool,
};
pub use pid_registry::{NoOpPidRegistry, PidRegistry};
