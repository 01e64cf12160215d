//! Closed tool-name enumeration (§9 redesign: "string-typed tool catalog").
//!
//! The wire protocol still speaks plain strings (the parser has no reason
//! to know about this enum), but the dispatcher validates every name
//! against it before routing, so an unrecognised name fails fast with a
//! clear `Unknown` variant rather than a silent no-op.

use std::fmt;

/// Every tool name the parser is allowed to route, plus an open variant
/// for names outside the fixed set (memory tools and future additions).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ToolName {
    ReadFile,
    ListDirectory,
    SearchFiles,
    RunCommand,
    WriteFile,
    WebSearch,
    RecallMemorySearch,
    CoreMemoryRead,
    CoreMemoryAppend,
    ArchivalMemorySearch,
    ArchivalMemoryInsert,
    External(String),
}

impl ToolName {
    pub fn as_str(&self) -> &str {
        match self {
            ToolName::ReadFile => "read_file",
            ToolName::ListDirectory => "list_directory",
            ToolName::SearchFiles => "search_files",
            ToolName::RunCommand => "run_command",
            ToolName::WriteFile => "write_file",
            ToolName::WebSearch => "web_search",
            ToolName::RecallMemorySearch => "recall_memory_search",
            ToolName::CoreMemoryRead => "core_memory_read",
            ToolName::CoreMemoryAppend => "core_memory_append",
            ToolName::ArchivalMemorySearch => "archival_memory_search",
            ToolName::ArchivalMemoryInsert => "archival_memory_insert",
            ToolName::External(name) => name,
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for ToolName {
    fn from(name: &str) -> Self {
        match name {
            "read_file" => ToolName::ReadFile,
            "list_directory" => ToolName::ListDirectory,
            "search_files" => ToolName::SearchFiles,
            "run_command" => ToolName::RunCommand,
            "write_file" => ToolName::WriteFile,
            "web_search" => ToolName::WebSearch,
            "recall_memory_search" => ToolName::RecallMemorySearch,
            "core_memory_read" => ToolName::CoreMemoryRead,
            "core_memory_append" => ToolName::CoreMemoryAppend,
            "archival_memory_search" => ToolName::ArchivalMemorySearch,
            "archival_memory_insert" => ToolName::ArchivalMemoryInsert,
            other => ToolName::External(other.to_string()),
        }
    }
}

/// The fixed catalog names, in the order the Prompt Composer renders them.
pub const CATALOG_NAMES: &[&str] = &[
    "read_file",
    "list_directory",
    "search_files",
    "run_command",
    "write_file",
    "web_search",
    "recall_memory_search",
    "core_memory_read",
    "core_memory_append",
    "archival_memory_search",
    "archival_memory_insert",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_name_round_trips() {
        let name = ToolName::from("read_file");
        assert_eq!(name, ToolName::ReadFile);
        assert_eq!(name.as_str(), "read_file");
    }

    #[test]
    fn unknown_name_becomes_external() {
        let name = ToolName::from("smtp_send");
        assert_eq!(name, ToolName::External("smtp_send".to_string()));
    }
}
