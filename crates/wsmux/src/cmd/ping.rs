use std::time::Instant;

use serde_json::json;
use wsmux::client::CallOptions;

use crate::cmd::{parse_duration, ConnectArgs, PingArgs, Session};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_result, OutputFormat};

pub async fn run(args: PingArgs, target: &ConnectArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let session = Session::open(target).await?;

    let options = CallOptions {
        timeout: Some(timeout),
        cancel: Some(session.coordinator.token()),
    };
    session.coordinator.listen_for_signals();
    let started = Instant::now();
    let result = session.client.ping(options).await;
    let elapsed = started.elapsed();
    session.finish("ping finished").await;

    result.map_err(|err| client_error("ping failed", err))?;
    print_result(
        &json!({"pong": true, "latency_ms": elapsed.as_secs_f64() * 1000.0}),
        format,
    );
    Ok(SUCCESS)
}
