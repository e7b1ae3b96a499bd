//! Tool-level tests for codebox-mcp.
//!
//! Sandboxes use the local interpreter rooted in a temp directory, so these
//! run without network access (they need `sh` on the host).

use codebox_core::InterpreterKind;
use codebox_mcp::{http, CodeboxConfig, CodeboxServer};
use rmcp::model::CallToolResult;
use serde_json::{json, Value};
use std::path::Path;
use tower::ServiceExt;

fn local_server(root: &Path) -> CodeboxServer {
    CodeboxServer::new(CodeboxConfig {
        interpreter: InterpreterKind::Local,
        local_root: root.to_path_buf(),
        max_sandboxes: 4,
        ..Default::default()
    })
}

fn args(value: Value) -> Option<serde_json::Map<String, Value>> {
    value.as_object().cloned()
}

fn is_error(result: &CallToolResult) -> bool {
    result.is_error == Some(true)
}

/// Text of the first content item.
fn text(result: &CallToolResult) -> String {
    let value = serde_json::to_value(result).unwrap();
    value["content"][0]["text"].as_str().unwrap().to_string()
}

/// First content item parsed as the JSON body of a successful tool call.
fn body(result: &CallToolResult) -> Value {
    assert!(!is_error(result), "tool failed: {}", text(result));
    serde_json::from_str(&text(result)).unwrap()
}

#[test]
fn test_tool_list_is_complete() {
    let names: Vec<String> = CodeboxServer::tools()
        .iter()
        .map(|t| t.name.to_string())
        .collect();

    for expected in [
        "create_sandbox",
        "close_sandbox",
        "get_sandbox_status",
        "execute_code",
        "install_package",
        "create_run_close",
        "list_files",
        "read_file",
        "write_file",
        "upload_file",
        "delete_file",
        "get_file_metadata",
        "connect",
        "send_command",
        "disconnect",
        "list_connections",
        "generate_line_chart",
        "generate_bar_chart",
        "generate_scatter_plot",
        "generate_heatmap",
        "generate_interactive_chart",
    ] {
        assert!(names.iter().any(|n| n == expected), "missing tool {expected}");
    }
    assert_eq!(names.len(), 21);
}

#[tokio::test]
async fn test_unknown_session_message() {
    let dir = tempfile::tempdir().unwrap();
    let server = local_server(dir.path());

    let result = server
        .dispatch("read_file", args(json!({"session_id": "ghost", "file_path": "/a"})))
        .await;
    assert!(is_error(&result));
    assert_eq!(
        text(&result),
        "No sandbox found with session ID: ghost. Create a sandbox first."
    );
}

#[tokio::test]
async fn test_unknown_tool_and_missing_params() {
    let dir = tempfile::tempdir().unwrap();
    let server = local_server(dir.path());

    let result = server.dispatch("rm_rf", None).await;
    assert!(is_error(&result));
    assert_eq!(text(&result), "Unknown tool: rm_rf");

    let result = server.dispatch("execute_code", None).await;
    assert!(is_error(&result));
    assert!(text(&result).contains("session_id, code"));
}

#[tokio::test]
async fn test_sandbox_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let server = local_server(dir.path());

    let created = body(
        &server
            .dispatch("create_sandbox", args(json!({"session_id": "work"})))
            .await,
    );
    assert_eq!(created["session_id"], "work");
    assert_eq!(created["interpreter"], "local");

    let written = body(
        &server
            .dispatch(
                "upload_file",
                args(json!({
                    "session_id": "work",
                    "file_name": "notes.txt",
                    "file_content": "alpha\nbeta\n",
                    "destination_path": "data"
                })),
            )
            .await,
    );
    assert_eq!(written["path"], "/data/notes.txt");

    let read = body(
        &server
            .dispatch(
                "read_file",
                args(json!({"session_id": "work", "file_path": "/data/notes.txt"})),
            )
            .await,
    );
    assert_eq!(read["content"], "alpha\nbeta\n");

    let listed = body(
        &server
            .dispatch("list_files", args(json!({"session_id": "work", "path": "/data"})))
            .await,
    );
    assert_eq!(listed["files"][0]["name"], "notes.txt");

    let meta = body(
        &server
            .dispatch(
                "get_file_metadata",
                args(json!({"session_id": "work", "file_path": "/data/notes.txt"})),
            )
            .await,
    );
    assert_eq!(meta["size"], 11);
    assert_eq!(meta["is_dir"], false);

    let executed = body(
        &server
            .dispatch(
                "execute_code",
                args(json!({
                    "session_id": "work",
                    "code": "wc -l < data/notes.txt",
                    "language": "sh"
                })),
            )
            .await,
    );
    assert_eq!(executed["exit_code"], 0);
    assert_eq!(executed["stdout"].as_str().unwrap().trim(), "2");

    body(
        &server
            .dispatch(
                "delete_file",
                args(json!({"session_id": "work", "file_path": "/data/notes.txt"})),
            )
            .await,
    );
    let result = server
        .dispatch(
            "read_file",
            args(json!({"session_id": "work", "file_path": "/data/notes.txt"})),
        )
        .await;
    assert!(is_error(&result));

    let status = body(&server.dispatch("get_sandbox_status", None).await);
    assert_eq!(status["count"], 1);
    assert_eq!(status["sandboxes"][0]["status"], "running");

    body(
        &server
            .dispatch("close_sandbox", args(json!({"session_id": "work"})))
            .await,
    );
    assert_eq!(server.manager().count().await, 0);
}

#[tokio::test]
async fn test_duplicate_session_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let server = local_server(dir.path());

    body(
        &server
            .dispatch("create_sandbox", args(json!({"session_id": "dup"})))
            .await,
    );
    let result = server
        .dispatch("create_sandbox", args(json!({"session_id": "dup"})))
        .await;
    assert!(is_error(&result));
    assert!(text(&result).contains("already exists"));

    server.shutdown().await;
    assert_eq!(server.manager().count().await, 0);
}

#[tokio::test]
async fn test_sandbox_tools_reject_malformed_arguments() {
    let dir = tempfile::tempdir().unwrap();
    let server = local_server(dir.path());

    let result = server
        .dispatch("create_sandbox", args(json!({"session_id": 42})))
        .await;
    assert!(is_error(&result));
    assert!(text(&result).starts_with("Invalid parameters"));
    assert_eq!(server.manager().count().await, 0);

    body(
        &server
            .dispatch("create_sandbox", args(json!({"session_id": "kept"})))
            .await,
    );
    let result = server
        .dispatch("get_sandbox_status", args(json!({"session_id": ["x"]})))
        .await;
    assert!(is_error(&result));
    assert!(text(&result).starts_with("Invalid parameters"));

    // No arguments still means defaults.
    let status = body(&server.dispatch("get_sandbox_status", None).await);
    assert_eq!(status["count"], 1);
    server.shutdown().await;
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlinked_paths_stay_in_sandbox() {
    let outside = tempfile::tempdir().unwrap();
    std::fs::write(outside.path().join("secret.txt"), "host-secret").unwrap();

    let dir = tempfile::tempdir().unwrap();
    let server = local_server(dir.path());
    body(
        &server
            .dispatch("create_sandbox", args(json!({"session_id": "jail"})))
            .await,
    );

    let linked = body(
        &server
            .dispatch(
                "execute_code",
                args(json!({
                    "session_id": "jail",
                    "code": format!("ln -s '{}' link", outside.path().display()),
                    "language": "sh"
                })),
            )
            .await,
    );
    assert_eq!(linked["exit_code"], 0);

    let result = server
        .dispatch(
            "read_file",
            args(json!({"session_id": "jail", "file_path": "/link/secret.txt"})),
        )
        .await;
    assert!(is_error(&result));
    assert!(!text(&result).contains("host-secret"));

    let result = server
        .dispatch(
            "write_file",
            args(json!({"session_id": "jail", "file_path": "/link/planted.txt", "content": "x"})),
        )
        .await;
    assert!(is_error(&result));
    assert!(!outside.path().join("planted.txt").exists());
    server.shutdown().await;
}

#[tokio::test]
async fn test_upload_rejects_path_in_file_name() {
    let dir = tempfile::tempdir().unwrap();
    let server = local_server(dir.path());
    body(
        &server
            .dispatch("create_sandbox", args(json!({"session_id": "up"})))
            .await,
    );

    let result = server
        .dispatch(
            "upload_file",
            args(json!({
                "session_id": "up",
                "file_name": "../escape.txt",
                "file_content": "x"
            })),
        )
        .await;
    assert!(is_error(&result));
    server.shutdown().await;
}

#[tokio::test]
async fn test_install_package_rejects_injection() {
    let dir = tempfile::tempdir().unwrap();
    let server = local_server(dir.path());
    body(
        &server
            .dispatch("create_sandbox", args(json!({"session_id": "pip"})))
            .await,
    );

    let result = server
        .dispatch(
            "install_package",
            args(json!({"session_id": "pip", "package_name": "requests; touch /tmp/pwned"})),
        )
        .await;
    assert!(is_error(&result));
    assert!(text(&result).starts_with("Invalid package name"));
    server.shutdown().await;
}

#[tokio::test]
async fn test_create_run_close_leaves_no_session() {
    let dir = tempfile::tempdir().unwrap();
    let server = local_server(dir.path());

    let result = body(
        &server
            .dispatch(
                "create_run_close",
                args(json!({"code": "echo once", "language": "sh"})),
            )
            .await,
    );
    assert_eq!(result["stdout"].as_str().unwrap().trim(), "once");
    assert_eq!(server.manager().count().await, 0);
}

#[tokio::test]
async fn test_chart_validation_error() {
    let dir = tempfile::tempdir().unwrap();
    let server = local_server(dir.path());

    let result = server
        .dispatch(
            "generate_line_chart",
            args(json!({
                "session_id": "any",
                "title": "broken",
                "series": [{"x": [1.0, 2.0], "y": [1.0]}]
            })),
        )
        .await;
    assert!(is_error(&result));
    assert!(text(&result).contains("invalid chart request"));
}

#[tokio::test]
async fn test_telnet_tools_without_connections() {
    let dir = tempfile::tempdir().unwrap();
    let server = local_server(dir.path());

    let listed = body(&server.dispatch("list_connections", None).await);
    assert_eq!(listed["count"], 0);

    let result = server
        .dispatch(
            "send_command",
            args(json!({
                "connection_id": "550e8400-e29b-41d4-a716-446655440000",
                "command": "ls"
            })),
        )
        .await;
    assert!(is_error(&result));
}

#[tokio::test]
async fn test_telnet_round_trip_against_local_listener() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        socket.write_all(b"welcome\r\n$ ").await.unwrap();
        let mut buf = [0u8; 64];
        let n = socket.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"whoami\r\n");
        socket.write_all(b"root\r\n$ ").await.unwrap();
        // Keep the socket open until the client disconnects
        let _ = socket.read(&mut buf).await;
    });

    let dir = tempfile::tempdir().unwrap();
    let server = local_server(dir.path());

    let connected = body(
        &server
            .dispatch("connect", args(json!({"host": "127.0.0.1", "port": port})))
            .await,
    );
    assert!(connected["banner"].as_str().unwrap().contains("welcome"));
    let id = connected["connection_id"].as_str().unwrap().to_string();

    let output = body(
        &server
            .dispatch(
                "send_command",
                args(json!({"connection_id": id, "command": "whoami", "expect": "$ "})),
            )
            .await,
    );
    assert!(output["output"].as_str().unwrap().contains("root"));

    let listed = body(&server.dispatch("list_connections", None).await);
    assert_eq!(listed["count"], 1);
    assert_eq!(listed["connections"][0]["commands_sent"], 1);

    body(
        &server
            .dispatch("disconnect", args(json!({"connection_id": id})))
            .await,
    );
    assert_eq!(server.telnet().count().await, 0);
}

#[tokio::test]
async fn test_http_health() {
    let dir = tempfile::tempdir().unwrap();
    let router = http::build_router(local_server(dir.path()));

    let response = router
        .oneshot(
            axum::http::Request::builder()
                .uri("/health")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let health: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["service"], "codebox-mcp");
}
