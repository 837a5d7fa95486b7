use wsmux::client::CallOptions;

use crate::cmd::{build_request, parse_duration, CallArgs, ConnectArgs, Session};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_result, OutputFormat};

pub async fn run(args: CallArgs, target: &ConnectArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let request = build_request(&args.kind, args.json.as_deref())?;

    let session = Session::open(target).await?;
    let options = CallOptions {
        timeout: Some(timeout),
        cancel: Some(session.coordinator.token()),
    };
    session.coordinator.listen_for_signals();
    let result = session.client.call_with(request, options).await;
    session.finish("call finished").await;

    let value = result.map_err(|err| client_error("call failed", err))?;
    print_result(&value, format);
    Ok(SUCCESS)
}
