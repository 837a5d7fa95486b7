use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use serde_json::Value;
use wsmux::frame::Request;
use wsmux::shutdown::Coordinator;
use wsmux::Client;

use crate::connect::{connect, AnyConnection};
use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod call;
pub mod ping;
pub mod subscribe;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one request and print its result.
    Call(CallArgs),
    /// Check that the peer answers.
    Ping(PingArgs),
    /// Subscribe and print events as they arrive.
    Subscribe(SubscribeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub async fn run(command: Command, target: ConnectArgs, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Call(args) => call::run(args, &target, format).await,
        Command::Ping(args) => ping::run(args, &target, format).await,
        Command::Subscribe(args) => subscribe::run(args, &target, format).await,
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct ConnectArgs {
    /// Peer to connect to: ws://, wss:// or unix:<path>.
    #[arg(long, env = "WSMUX_URL", global = true)]
    pub url: Option<String>,
    /// Access token; when set the auth handshake runs before any request.
    #[arg(long, env = "WSMUX_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Request kind, sent as `type`.
    pub kind: String,
    /// Extra request fields as a JSON object.
    #[arg(long)]
    pub json: Option<String>,
    /// Maximum time to wait for the result (e.g. 5s, 500ms).
    #[arg(long, default_value = "10s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct PingArgs {
    /// Maximum time to wait for the pong (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct SubscribeArgs {
    /// Subscription kind, e.g. subscribe_events or render_template.
    pub kind: String,
    /// Extra request fields as a JSON object.
    #[arg(long)]
    pub json: Option<String>,
    /// Remove the subscription after this long (e.g. 30s).
    #[arg(long)]
    pub expiry: Option<String>,
    /// Exit after receiving N events.
    #[arg(long)]
    pub count: Option<usize>,
    /// Register the callback before the request is written.
    #[arg(long)]
    pub register_early: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// A connected multiplexer plus the coordinator that will close it.
pub struct Session {
    pub client: Client<AnyConnection>,
    pub coordinator: Arc<Coordinator>,
}

impl Session {
    pub async fn open(target: &ConnectArgs) -> CliResult<Self> {
        let conn = connect(target).await?;
        let client = Client::start(conn);
        let coordinator = Arc::new(Coordinator::default());

        let closing = client.clone();
        coordinator.register("close multiplexer", move || async move { closing.close().await });
        Ok(Self {
            client,
            coordinator,
        })
    }

    /// Run cleanups; the multiplexer is closed on every exit path.
    pub async fn finish(self, reason: &str) {
        self.coordinator.shutdown(reason);
        let report = self.coordinator.run_cleanups().await;
        if !report.is_clean() {
            tracing::warn!(?report, "cleanup incomplete");
        }
    }
}

pub fn build_request(kind: &str, json: Option<&str>) -> CliResult<Request> {
    let fields = match json {
        Some(text) => serde_json::from_str::<Value>(text)
            .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))?,
        None => Value::Null,
    };
    Request::from_value(kind, fields).map_err(|err| CliError::new(USAGE, format!("--json: {err}")))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn build_request_requires_object() {
        let request = build_request("call_service", Some(r#"{"domain":"light"}"#)).unwrap();
        assert_eq!(request.kind(), "call_service");
        assert_eq!(request.fields()["domain"], "light");

        assert_eq!(build_request("x", Some("[1]")).unwrap_err().code, USAGE);
        assert_eq!(build_request("x", Some("{oops")).unwrap_err().code, USAGE);
        assert!(build_request("ping", None).unwrap().fields().is_empty());
    }
}
