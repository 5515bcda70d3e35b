// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
pub mod builtin;
pub mod capability;
pub mod registry;
pub mod sanitize;
pub mod tool;

pub use capability::CapabilitySet;
pub use registry::{RegisterError, ToolRegistry, ToolSchema, MAX_TOOLS};
pub use tool::{Tool, ToolCall, ToolOutput};

pub use builtin::calculate::CalculateTool;
pub use builtin::get_time::GetTimeTool;
pub use builtin::http_get::HttpGetTool;
pub use builtin::list_dir::ListDirTool;
pub use builtin::read_file::ReadFileTool;
pub use builtin::read_pdf::ReadPdfTool;
pub use builtin::search_files::SearchFilesTool;
pub use builtin::shell::ShellTool;
pub use builtin::write_file::WriteFileTool;
