use tokio::sync::mpsc;
use wsmux::client::{ClientError, Event, RegistrationOrder, SubscribeOptions};

use crate::cmd::{build_request, parse_duration, ConnectArgs, Session, SubscribeArgs};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_event, OutputFormat};

pub async fn run(args: SubscribeArgs, target: &ConnectArgs, format: OutputFormat) -> CliResult<i32> {
    let request = build_request(&args.kind, args.json.as_deref())?;
    let mut options = SubscribeOptions::default();
    if let Some(expiry) = &args.expiry {
        options.expiry = Some(parse_duration(expiry)?);
    }
    if args.register_early {
        options.registration = Some(RegistrationOrder::BeforeSend);
    }

    let session = Session::open(target).await?;
    let shutdown = session.coordinator.token();
    options.cancel = Some(shutdown.clone());
    session.coordinator.listen_for_signals();

    // Events are printed here rather than on the reader task.
    let (tx, mut events) = mpsc::unbounded_channel::<Event>();
    let subscription = match session
        .client
        .subscribe(
            request,
            move |event| {
                let _ = tx.send(event);
            },
            options,
        )
        .await
    {
        Ok(subscription) => subscription,
        Err(err) => {
            session.finish("subscribe failed").await;
            return Err(client_error("subscribe failed", err));
        }
    };
    tracing::info!(id = subscription.id(), kind = %args.kind, "subscribed");

    let mut received = 0usize;
    let reason = loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break "event stream ended" };
                print_event(&event, format);
                received += 1;
                if args.count.is_some_and(|count| received >= count) {
                    break "event count reached";
                }
            }
            _ = subscription.removed() => break "subscription removed",
            _ = session.client.closed() => break "connection closed",
        }
    };

    subscription.cleanup();
    // Set only if the reader stopped before we closed the session.
    let lost = session.client.terminal_reason();
    session.finish(reason).await;
    tracing::info!(received, reason, "subscription finished");

    match lost {
        Some(terminal) => Err(client_error(
            "subscription ended",
            ClientError::ConnectionClosed(terminal),
        )),
        None => Ok(SUCCESS),
    }
}
