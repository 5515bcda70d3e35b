// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
pub mod calculate;
pub mod get_time;
pub mod http_get;
pub mod list_dir;
pub mod read_file;
pub mod read_pdf;
pub mod search_files;
pub mod shell;
pub mod write_file;

use std::sync::Arc;

use crate::Tool;

/// The built-in tool set in registration order.  `register_defaults` filters
/// this list by the granted capability mask.
pub fn default_tools() -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(shell::ShellTool::default()),
        Arc::new(read_file::ReadFileTool),
        Arc::new(write_file::WriteFileTool),
        Arc::new(list_dir::ListDirTool),
        Arc::new(search_files::SearchFilesTool),
        Arc::new(read_pdf::ReadPdfTool),
        Arc::new(http_get::HttpGetTool),
        Arc::new(calculate::CalculateTool),
        Arc::new(get_time::GetTimeTool),
    ]
}
