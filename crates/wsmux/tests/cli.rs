#![cfg(all(unix, feature = "cli"))]

use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::net::UnixListener;
use wsmux::transport::{Connection, StreamConnection};

fn unique_socket(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/wsmuxcli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir.join("hub.sock")
}

/// Accept one connection and answer every request with `respond`.
fn spawn_hub<F>(path: &PathBuf, token: Option<&'static str>, respond: F)
where
    F: Fn(&Value) -> Vec<Value> + Send + 'static,
{
    let listener = UnixListener::bind(path).expect("hub should bind");
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("hub should accept");
        let conn = StreamConnection::from_unix(stream);

        if let Some(expected) = token {
            send(&conn, json!({"type": "auth_required", "ha_version": "2024.6.0"})).await;
            let auth: Value = recv(&conn).await.expect("auth frame");
            if auth["access_token"] == expected {
                send(&conn, json!({"type": "auth_ok", "ha_version": "2024.6.0"})).await;
            } else {
                send(&conn, json!({"type": "auth_invalid", "message": "Invalid access token"})).await;
                return;
            }
        }

        while let Some(request) = recv(&conn).await {
            for reply in respond(&request) {
                send(&conn, reply).await;
            }
        }
    });
}

async fn send<C: Connection>(conn: &C, value: Value) {
    let _ = conn.send_frame(value.to_string()).await;
}

async fn recv<C: Connection>(conn: &C) -> Option<Value> {
    let frame = conn.recv_frame().await.ok()?;
    serde_json::from_str(&frame).ok()
}

async fn run_cli(args: Vec<String>) -> Output {
    tokio::task::spawn_blocking(move || {
        Command::new(env!("CARGO_BIN_EXE_wsmux"))
            .env_remove("WSMUX_URL")
            .env_remove("WSMUX_TOKEN")
            .args(["--log-level", "error", "--format", "json"])
            .args(args)
            .output()
            .expect("wsmux should run")
    })
    .await
    .expect("cli task should finish")
}

fn url(path: &PathBuf) -> String {
    format!("unix:{}", path.display())
}

fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn ping_prints_pong() {
    let path = unique_socket("ping");
    spawn_hub(&path, None, |request| {
        vec![json!({"id": request["id"], "type": "pong"})]
    });

    let output = run_cli(args(&["--url", &url(&path), "ping"])).await;

    assert_eq!(output.status.code(), Some(0), "{output:?}");
    let printed: Value =
        serde_json::from_slice(&output.stdout).expect("ping output should be JSON");
    assert_eq!(printed["pong"], true);
}

#[tokio::test(flavor = "multi_thread")]
async fn call_prints_result_after_auth() {
    let path = unique_socket("call");
    spawn_hub(&path, Some("letmein"), |request| {
        vec![json!({
            "id": request["id"],
            "type": "result",
            "success": true,
            "result": {"echo": request["type"], "domain": request["domain"]}
        })]
    });

    let output = run_cli(args(&[
        "--url",
        &url(&path),
        "--token",
        "letmein",
        "call",
        "call_service",
        "--json",
        r#"{"domain":"light"}"#,
    ]))
    .await;

    assert_eq!(output.status.code(), Some(0), "{output:?}");
    let printed: Value =
        serde_json::from_slice(&output.stdout).expect("call output should be JSON");
    assert_eq!(printed, json!({"echo": "call_service", "domain": "light"}));
}

#[tokio::test(flavor = "multi_thread")]
async fn api_error_exits_with_failure() {
    let path = unique_socket("api-error");
    spawn_hub(&path, None, |request| {
        vec![json!({
            "id": request["id"],
            "type": "result",
            "success": false,
            "error": {"code": "not_found", "message": "Entity not found"}
        })]
    });

    let output = run_cli(args(&["--url", &url(&path), "call", "get_thing"])).await;

    assert_eq!(output.status.code(), Some(1), "{output:?}");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not_found"), "stderr: {stderr}");
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_token_exits_with_permission_denied() {
    let path = unique_socket("auth");
    spawn_hub(&path, Some("right"), |_request| Vec::new());

    let output = run_cli(args(&["--url", &url(&path), "--token", "wrong", "ping"])).await;

    assert_eq!(output.status.code(), Some(50), "{output:?}");
}

#[tokio::test(flavor = "multi_thread")]
async fn subscribe_stops_after_count() {
    let path = unique_socket("subscribe");
    spawn_hub(&path, None, |request| {
        let id = request["id"].clone();
        vec![
            json!({"id": id, "type": "result", "success": true, "result": null}),
            json!({"id": id, "type": "event", "event": {"n": 1}}),
            json!({"id": id, "type": "event", "event": {"n": 2}}),
            json!({"id": id, "type": "event", "event": {"n": 3}}),
        ]
    });

    let output = run_cli(args(&[
        "--url",
        &url(&path),
        "subscribe",
        "subscribe_events",
        "--count",
        "2",
        "--register-early",
    ]))
    .await;

    assert_eq!(output.status.code(), Some(0), "{output:?}");
    let lines: Vec<Value> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("event line should be JSON"))
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["event"], json!({"n": 1}));
    assert_eq!(lines[1]["event"], json!({"n": 2}));
}

#[tokio::test(flavor = "multi_thread")]
async fn call_timeout_exits_124() {
    let path = unique_socket("timeout");
    spawn_hub(&path, None, |_request| Vec::new());

    let output = run_cli(args(&[
        "--url",
        &url(&path),
        "call",
        "slow",
        "--timeout",
        "200ms",
    ]))
    .await;

    assert_eq!(output.status.code(), Some(124), "{output:?}");
}

#[tokio::test(flavor = "multi_thread")]
async fn bad_url_and_missing_socket() {
    let output = run_cli(args(&["--url", "http://nope", "ping"])).await;
    assert_eq!(output.status.code(), Some(64), "{output:?}");

    let missing = unique_socket("missing");
    let output = run_cli(args(&["--url", &url(&missing), "ping"])).await;
    assert_eq!(output.status.code(), Some(3), "{output:?}");
}

#[tokio::test(flavor = "multi_thread")]
async fn interrupt_releases_slow_ping() {
    let path = unique_socket("interrupt");
    let (seen_tx, mut seen_rx) = tokio::sync::mpsc::unbounded_channel();
    spawn_hub(&path, None, move |request| {
        let _ = seen_tx.send(request["type"].clone());
        Vec::new()
    });

    let child = Command::new(env!("CARGO_BIN_EXE_wsmux"))
        .env_remove("WSMUX_URL")
        .env_remove("WSMUX_TOKEN")
        .args(["--log-level", "error", "--url", &url(&path), "ping", "--timeout", "30s"])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("wsmux should start");

    assert_eq!(seen_rx.recv().await, Some(json!("ping")));
    // Let the signal listener install its handlers.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let status = Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .expect("kill should run");
    assert!(status.success());

    let output = tokio::time::timeout(
        Duration::from_secs(10),
        tokio::task::spawn_blocking(move || child.wait_with_output()),
    )
    .await
    .expect("ping should stop promptly after SIGINT")
    .expect("wait task should finish")
    .expect("wsmux should exit");

    assert_eq!(output.status.code(), Some(1), "{output:?}");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ping failed"), "stderr: {stderr}");
}
