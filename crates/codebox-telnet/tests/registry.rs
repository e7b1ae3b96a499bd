//! Integration tests for codebox-telnet against a scripted TCP server.

use codebox_telnet::protocol::{option, DO, IAC, WILL};
use codebox_telnet::{CommandOptions, ConnectionRegistry, TelnetError};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

/// Spawn a one-connection server that offers to echo, greets the client and
/// answers `echo <text>` with `<text>` followed by a `> ` prompt.
async fn spawn_server() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        write_half
            .write_all(&[IAC, WILL, option::ECHO])
            .await
            .unwrap();
        write_half.write_all(b"Welcome\r\n> ").await.unwrap();

        let mut reply = [0u8; 3];
        reader.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply, [IAC, DO, option::ECHO]);

        loop {
            let mut line = Vec::new();
            if reader.read_until(b'\n', &mut line).await.unwrap() == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&line).trim_end().to_string();
            if line == "quit" {
                break;
            }
            let answer = line.strip_prefix("echo ").unwrap_or("?");
            write_half
                .write_all(format!("{answer}\r\n> ").as_bytes())
                .await
                .unwrap();
        }
    });

    port
}

#[tokio::test]
async fn test_connect_command_disconnect() {
    let port = spawn_server().await;
    let registry = ConnectionRegistry::new(4);

    let (id, banner) = registry
        .connect("127.0.0.1", port, Duration::from_secs(2))
        .await
        .expect("connect");
    assert!(banner.contains("Welcome"));
    assert_eq!(registry.count().await, 1);

    let opts = CommandOptions {
        expect: Some("> ".into()),
        timeout: Duration::from_secs(2),
        ..Default::default()
    };
    let output = registry
        .send_command(id, "echo hello", opts)
        .await
        .expect("command");
    assert_eq!(output, "hello\n> ");

    let infos = registry.list().await;
    assert_eq!(infos.len(), 1);
    assert_eq!(infos[0].port, port);
    assert_eq!(infos[0].commands_sent, 1);

    registry.disconnect(id).await.expect("disconnect");
    assert_eq!(registry.count().await, 0);
}

#[tokio::test]
async fn test_peer_close_removes_connection() {
    let port = spawn_server().await;
    let registry = ConnectionRegistry::new(4);

    let (id, _) = registry
        .connect("127.0.0.1", port, Duration::from_secs(2))
        .await
        .expect("connect");

    let opts = CommandOptions {
        quiet: Duration::from_millis(200),
        timeout: Duration::from_secs(2),
        ..Default::default()
    };
    let err = registry.send_command(id, "quit", opts).await.unwrap_err();
    assert!(matches!(err, TelnetError::Closed));
    assert_eq!(registry.count().await, 0);
}

#[tokio::test]
async fn test_connection_limit() {
    let port = spawn_server().await;
    let registry = ConnectionRegistry::new(1);

    registry
        .connect("127.0.0.1", port, Duration::from_secs(2))
        .await
        .expect("connect");

    let err = registry
        .connect("127.0.0.1", port, Duration::from_secs(2))
        .await
        .unwrap_err();
    assert!(matches!(err, TelnetError::LimitReached(1)));
}

#[tokio::test]
async fn test_connect_refused() {
    // Bind then drop to get a port with nothing listening.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let registry = ConnectionRegistry::new(4);
    let err = registry
        .connect("127.0.0.1", port, Duration::from_secs(2))
        .await
        .unwrap_err();
    assert!(matches!(err, TelnetError::Connect { .. }));
}
