//! Integration tests for codebox-core.
//!
//! The local-backend tests only need `sh` on the host. The e2b tests talk
//! to the hosted service and need `E2B_API_KEY`.
//!
//! Run the e2b tests with: `cargo test -p codebox-core -- --ignored`

use codebox_core::{
    ChartData, ChartKind, ChartRequest, CoreError, InterpreterConfig, InterpreterKind, Language,
    ManagerConfig, PlotStyle, SandboxManager, SandboxStatus, Series, SessionId,
};
use std::path::Path;
use std::time::Duration;

fn local_manager(root: &Path) -> SandboxManager {
    let interpreter = InterpreterConfig::builder()
        .kind(InterpreterKind::Local)
        .local_root(root)
        .exec_timeout(Duration::from_secs(10))
        .build()
        .expect("valid local config");
    SandboxManager::new(ManagerConfig::new(interpreter))
}

/// Test full sandbox lifecycle on the local backend: create -> use -> close
#[tokio::test]
async fn test_local_sandbox_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let manager = local_manager(dir.path());

    let id = manager
        .create(Some(SessionId::parse("lifecycle").unwrap()))
        .await
        .expect("Failed to create sandbox");
    let sandbox = manager.get(&id).await.unwrap();

    sandbox
        .files()
        .write("/work/numbers.txt", "1\n2\n3\n")
        .await
        .unwrap();
    let result = sandbox.run_command("wc -l < work/numbers.txt").await.unwrap();
    assert!(result.success());
    assert_eq!(result.stdout.trim(), "3");

    let entries = sandbox.files().list("/work").await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].path, "/work/numbers.txt");

    let meta = sandbox.files().stat("/work/numbers.txt").await.unwrap();
    assert_eq!(meta.size, 6);
    assert!(!meta.is_dir);

    sandbox.files().delete("/work/numbers.txt").await.unwrap();
    assert!(sandbox.files().read("/work/numbers.txt").await.is_err());

    let summary = manager.status(&id).await.unwrap();
    assert_eq!(summary.status, SandboxStatus::Running);
    assert!(summary.last_activity >= summary.created_at);

    manager.close(&id).await.unwrap();
    assert!(!sandbox.is_alive().await);
    assert!(matches!(manager.get(&id).await, Err(CoreError::NotFound(_))));
}

/// Paths can never leave the sandbox directory.
#[tokio::test]
async fn test_local_path_escape_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let manager = local_manager(dir.path());
    let id = manager.create(None).await.unwrap();
    let sandbox = manager.get(&id).await.unwrap();

    for path in ["/../outside.txt", "../../etc/passwd", "/a/../../b"] {
        let err = sandbox.files().write(path, "x").await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidPath(_)), "{path}: {err}");
    }
    assert!(!dir.path().join("outside.txt").exists());

    manager.close_all().await;
}

/// Sessions do not see each other's files.
#[tokio::test]
async fn test_local_sessions_are_separate() {
    let dir = tempfile::tempdir().unwrap();
    let manager = local_manager(dir.path());
    let a = manager.get(&manager.create(None).await.unwrap()).await.unwrap();
    let b = manager.get(&manager.create(None).await.unwrap()).await.unwrap();

    a.files().write("/secret.txt", "only a").await.unwrap();
    assert!(b.files().read("/secret.txt").await.is_err());

    assert_eq!(manager.close_all().await, 2);
}

/// Timeouts kill the process and report exit code 124.
#[tokio::test]
async fn test_local_exec_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let interpreter = InterpreterConfig::builder()
        .kind(InterpreterKind::Local)
        .local_root(dir.path())
        .exec_timeout(Duration::from_millis(300))
        .build()
        .unwrap();
    let manager = SandboxManager::new(ManagerConfig::new(interpreter));

    let result = manager
        .run_ephemeral("sleep 10", Language::Sh)
        .await
        .unwrap();
    assert_eq!(result.exit_code, 124);
    assert_eq!(manager.count().await, 0);
}

/// Test code execution and file round trip on a live e2b sandbox
#[tokio::test]
#[ignore = "requires E2B_API_KEY and network access"]
async fn test_e2b_lifecycle() {
    let Ok(api_key) = std::env::var("E2B_API_KEY") else {
        eprintln!("Skipping test: E2B_API_KEY not set");
        return;
    };

    let interpreter = InterpreterConfig::builder()
        .kind(InterpreterKind::E2b)
        .api_key(api_key)
        .sandbox_timeout(Duration::from_secs(120))
        .build()
        .expect("valid e2b config");
    let manager = SandboxManager::new(ManagerConfig::new(interpreter));

    let id = manager.create(None).await.expect("Failed to create sandbox");
    let sandbox = manager.get(&id).await.unwrap();

    let result = sandbox
        .run_code("x = 6 * 7\nprint(x)", Language::Python)
        .await
        .unwrap();
    assert!(result.success(), "{result:?}");
    assert_eq!(result.stdout.trim(), "42");

    let result = sandbox.run_code("1 / 0", Language::Python).await.unwrap();
    assert_eq!(result.exit_code, 1);
    assert_eq!(result.error.unwrap().name, "ZeroDivisionError");

    sandbox
        .files()
        .write("/home/user/hello.txt", "Hello, World!")
        .await
        .unwrap();
    assert_eq!(
        sandbox.files().read("/home/user/hello.txt").await.unwrap(),
        "Hello, World!"
    );
    let meta = sandbox.files().stat("/home/user/hello.txt").await.unwrap();
    assert_eq!(meta.size, 13);
    sandbox.files().delete("/home/user/hello.txt").await.unwrap();

    manager.close(&id).await.expect("Failed to close sandbox");
}

/// Test chart rendering on a live e2b sandbox (matplotlib is preinstalled)
#[tokio::test]
#[ignore = "requires E2B_API_KEY and network access"]
async fn test_e2b_chart() {
    let Ok(api_key) = std::env::var("E2B_API_KEY") else {
        eprintln!("Skipping test: E2B_API_KEY not set");
        return;
    };

    let interpreter = InterpreterConfig::builder()
        .kind(InterpreterKind::E2b)
        .api_key(api_key)
        .build()
        .unwrap();
    let manager = SandboxManager::new(ManagerConfig::new(interpreter));

    let request = ChartRequest {
        kind: ChartKind::Line,
        title: "Squares".into(),
        x_label: Some("n".into()),
        y_label: Some("n^2".into()),
        data: ChartData::Series(vec![Series {
            name: None,
            x: vec![1.0, 2.0, 3.0, 4.0],
            y: vec![1.0, 4.0, 9.0, 16.0],
        }]),
        style: PlotStyle::default(),
    };
    let script = request.script().unwrap();
    let result = manager
        .run_ephemeral(&script.code, Language::Python)
        .await
        .unwrap();
    let image = script.extract(&result.stdout).unwrap();
    assert_eq!(image.mime_type, "image/png");
    assert!(image.size > 0);
}
