use std::time::Duration;

use wsmux::client::CallOptions;
use wsmux::frame::Request;
use wsmux::shutdown::Coordinator;
use wsmux::transport::{Connection, MemoryConnection};
use wsmux::Client;

#[tokio::test]
async fn registered_close_releases_in_flight_calls() {
    let (local, remote) = MemoryConnection::pair();
    let client = Client::start(local);
    let coordinator = Coordinator::new(Duration::from_secs(1));

    let closing = client.clone();
    coordinator.register("close multiplexer", move || async move { closing.close().await });

    let call = {
        let client = client.clone();
        let cancel = coordinator.token();
        tokio::spawn(async move {
            client
                .call_with(
                    Request::new("slow"),
                    CallOptions {
                        timeout: None,
                        cancel: Some(cancel),
                    },
                )
                .await
        })
    };
    remote.recv_frame().await.expect("request should reach the peer");

    assert!(coordinator.shutdown("test finished"));
    let report = coordinator.run_cleanups().await;

    assert!(report.is_clean(), "{report:?}");
    let err = call.await.unwrap().unwrap_err();
    assert!(err.is_cancelled() || err.is_connection_closed(), "{err}");
    client.closed().await;
    assert!(client.is_terminated());
    assert_eq!(client.pending_count(), 0);
}
