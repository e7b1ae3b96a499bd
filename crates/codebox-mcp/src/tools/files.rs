//! File tools.

use crate::config::MAX_INPUT_SIZE_BYTES;
use crate::server::{CodeboxServer, ToolArgs};
use crate::types::*;
use rmcp::model::CallToolResult;

/// Join an upload directory and file name into an absolute sandbox path.
fn upload_path(destination: &str, file_name: &str) -> Result<String, String> {
    if file_name.is_empty() || file_name == "." || file_name == ".." {
        return Err(format!("Invalid file name: '{file_name}'"));
    }
    if file_name.contains('/') || file_name.contains('\0') {
        return Err(format!("File name must not contain a path: '{file_name}'"));
    }

    let dir = destination.trim_end_matches('/');
    let joined = format!("{dir}/{file_name}");
    Ok(if joined.starts_with('/') {
        joined
    } else {
        format!("/{joined}")
    })
}

impl CodeboxServer {
    pub(crate) async fn handle_list_files(&self, args: ToolArgs) -> CallToolResult {
        let params: ListFilesParams = match Self::parse_params(args, "session_id") {
            Ok(p) => p,
            Err(e) => return e,
        };

        let sandbox = match self.sandbox(&params.session_id).await {
            Ok(s) => s,
            Err(e) => return e,
        };

        match sandbox.files().list(&params.path).await {
            Ok(files) => Self::json_result(&ListFilesResult {
                path: params.path,
                files,
            }),
            Err(e) => {
                tracing::error!(session_id = %params.session_id, error = %e, "Error listing files");
                Self::error_result(format!("Error listing files: {e}"))
            }
        }
    }

    pub(crate) async fn handle_read_file(&self, args: ToolArgs) -> CallToolResult {
        let params: FilePathParams = match Self::parse_params(args, "session_id, file_path") {
            Ok(p) => p,
            Err(e) => return e,
        };

        let sandbox = match self.sandbox(&params.session_id).await {
            Ok(s) => s,
            Err(e) => return e,
        };

        match sandbox.files().read(&params.file_path).await {
            Ok(content) => Self::json_result(&ReadFileResult {
                path: params.file_path,
                content,
            }),
            Err(e) => {
                tracing::error!(session_id = %params.session_id, error = %e, "Error reading file");
                Self::error_result(format!("Error reading file: {e}"))
            }
        }
    }

    pub(crate) async fn handle_write_file(&self, args: ToolArgs) -> CallToolResult {
        let params: WriteFileParams =
            match Self::parse_params(args, "session_id, file_path, content") {
                Ok(p) => p,
                Err(e) => return e,
            };

        if let Err(e) = Self::validate_size(&params.content, MAX_INPUT_SIZE_BYTES, "content") {
            return e;
        }

        let sandbox = match self.sandbox(&params.session_id).await {
            Ok(s) => s,
            Err(e) => return e,
        };

        tracing::info!(
            session_id = %params.session_id,
            path = %params.file_path,
            bytes = params.content.len(),
            "Writing file"
        );

        match sandbox.files().write(&params.file_path, &params.content).await {
            Ok(()) => Self::json_result(&FileOpResult {
                path: params.file_path,
                message: "File written successfully".into(),
            }),
            Err(e) => {
                tracing::error!(session_id = %params.session_id, error = %e, "Error writing file");
                Self::error_result(format!("Error writing file: {e}"))
            }
        }
    }

    pub(crate) async fn handle_upload_file(&self, args: ToolArgs) -> CallToolResult {
        let params: UploadFileParams =
            match Self::parse_params(args, "session_id, file_name, file_content") {
                Ok(p) => p,
                Err(e) => return e,
            };

        if let Err(e) =
            Self::validate_size(&params.file_content, MAX_INPUT_SIZE_BYTES, "file_content")
        {
            return e;
        }

        let path = match upload_path(&params.destination_path, &params.file_name) {
            Ok(p) => p,
            Err(e) => return Self::error_result(e),
        };

        let sandbox = match self.sandbox(&params.session_id).await {
            Ok(s) => s,
            Err(e) => return e,
        };

        tracing::info!(
            session_id = %params.session_id,
            path = %path,
            bytes = params.file_content.len(),
            "Uploading file"
        );

        match sandbox.files().write(&path, &params.file_content).await {
            Ok(()) => Self::json_result(&FileOpResult {
                path,
                message: "File uploaded successfully".into(),
            }),
            Err(e) => {
                tracing::error!(session_id = %params.session_id, error = %e, "Error uploading file");
                Self::error_result(format!("Error uploading file: {e}"))
            }
        }
    }

    pub(crate) async fn handle_delete_file(&self, args: ToolArgs) -> CallToolResult {
        let params: FilePathParams = match Self::parse_params(args, "session_id, file_path") {
            Ok(p) => p,
            Err(e) => return e,
        };

        let sandbox = match self.sandbox(&params.session_id).await {
            Ok(s) => s,
            Err(e) => return e,
        };

        tracing::info!(session_id = %params.session_id, path = %params.file_path, "Deleting file");

        match sandbox.files().delete(&params.file_path).await {
            Ok(()) => Self::json_result(&FileOpResult {
                path: params.file_path,
                message: "File deleted successfully".into(),
            }),
            Err(e) => {
                tracing::error!(session_id = %params.session_id, error = %e, "Error deleting file");
                Self::error_result(format!("Error deleting file: {e}"))
            }
        }
    }

    pub(crate) async fn handle_get_file_metadata(&self, args: ToolArgs) -> CallToolResult {
        let params: FilePathParams = match Self::parse_params(args, "session_id, file_path") {
            Ok(p) => p,
            Err(e) => return e,
        };

        let sandbox = match self.sandbox(&params.session_id).await {
            Ok(s) => s,
            Err(e) => return e,
        };

        match sandbox.files().stat(&params.file_path).await {
            Ok(metadata) => Self::json_result(&metadata),
            Err(e) => Self::error_result(format!("Error getting file metadata: {e}")),
        }
    }
}
