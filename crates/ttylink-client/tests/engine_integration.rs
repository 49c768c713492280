//! Integration tests for the protocol engine against an in-process gateway.

mod common;

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use ttylink_client::error::{ClientError, ConnectError, LifecycleError};
use ttylink_client::infrastructure::engine::{ClientPorts, TtyClient};
use ttylink_core::protocol::messages::ResizeTerminalDto;

use common::{expect_auth, next_frame, send, ServerConn, TestGateway, WAIT};

/// Dials the gateway, consumes the auth frame and starts the epoch.
async fn connected(
    gateway: &mut TestGateway,
    watchdog_secs: u64,
) -> (
    Arc<TtyClient>,
    ClientPorts,
    ServerConn,
    tokio::task::JoinHandle<Result<(), ClientError>>,
) {
    let (client, ports) = TtyClient::dial_and_auth(&gateway.url, "token")
        .await
        .expect("dial must succeed");
    let mut conn = gateway.accept().await;
    assert_eq!(expect_auth(&mut conn).await, "token");
    let client = Arc::new(client);
    let run = {
        let client = client.clone();
        tokio::spawn(async move { client.run(watchdog_secs).await })
    };
    (client, ports, conn, run)
}

async fn next_output(ports: &mut ClientPorts) -> Vec<u8> {
    tokio::time::timeout(WAIT, ports.output.recv())
        .await
        .expect("output in time")
        .expect("output port open")
}

#[tokio::test]
async fn test_auth_frame_is_sent_first_with_token() {
    // Arrange
    let mut gateway = TestGateway::start().await;

    // Act
    let (client, _ports) = TtyClient::dial_and_auth(&gateway.url, "s3cret")
        .await
        .expect("dial");
    let mut conn = gateway.accept().await;

    // Assert
    assert_eq!(expect_auth(&mut conn).await, "s3cret");
    assert!(!client.is_shutdown());
    assert!(client.remote_addr().is_some());
}

#[tokio::test]
async fn test_dial_to_closed_port_fails_with_connect_error() {
    // Arrange: grab a free port and release it again.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    // Act
    let result = TtyClient::dial_and_auth(&format!("ws://{addr}/ws"), "").await;

    // Assert
    assert!(matches!(
        result,
        Err(ClientError::Connect(ConnectError::Handshake(_)))
    ));
}

#[tokio::test]
async fn test_resize_and_input_are_sent_as_tagged_frames() {
    // Arrange
    let mut gateway = TestGateway::start().await;
    let (client, _ports, mut conn, _run) = connected(&mut gateway, 0).await;

    // Act
    client.resize_terminal(80, 24);
    let resize = next_frame(&mut conn).await;
    client.input().send(b"ls\r".to_vec()).await.unwrap();
    let input = next_frame(&mut conn).await;

    // Assert
    assert_eq!(resize[0], b'1');
    let dto: ResizeTerminalDto = serde_json::from_slice(&resize[1..]).unwrap();
    assert_eq!(dto, ResizeTerminalDto { columns: 80, rows: 24 });
    assert_eq!(input, b"0ls\r");
}

#[tokio::test]
async fn test_input_order_is_preserved_and_empty_chunks_skipped() {
    let mut gateway = TestGateway::start().await;
    let (client, _ports, mut conn, _run) = connected(&mut gateway, 0).await;
    let input = client.input();

    input.send(b"a".to_vec()).await.unwrap();
    input.send(Vec::new()).await.unwrap();
    input.send(b"b".to_vec()).await.unwrap();

    assert_eq!(next_frame(&mut conn).await, b"0a");
    assert_eq!(next_frame(&mut conn).await, b"0b");
}

#[tokio::test]
async fn test_control_operations_use_their_tags() {
    let mut gateway = TestGateway::start().await;
    let (client, _ports, mut conn, _run) = connected(&mut gateway, 0).await;

    client.pause();
    assert_eq!(next_frame(&mut conn).await, b"2");
    client.resume();
    assert_eq!(next_frame(&mut conn).await, b"3");
    client.request_baudrate_detection();
    assert_eq!(next_frame(&mut conn).await, b"B");
    client.send_json(serde_json::json!({"cmd": "noop"}));
    let json = next_frame(&mut conn).await;
    assert_eq!(json[0], b'{');
    let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
    assert_eq!(value["cmd"], "noop");
}

#[tokio::test]
async fn test_server_output_is_delivered_in_order() {
    // Arrange
    let mut gateway = TestGateway::start().await;
    let (_client, mut ports, mut conn, _run) = connected(&mut gateway, 0).await;

    // Act
    send(&mut conn, b"0hello ").await;
    send(&mut conn, b"2{\"fontSize\":12}").await;
    send(&mut conn, b"Xunknown").await;
    send(&mut conn, b"0world").await;

    // Assert: preferences and unknown tags are dropped silently.
    assert_eq!(next_output(&mut ports).await, b"hello ");
    assert_eq!(next_output(&mut ports).await, b"world");
}

#[tokio::test]
async fn test_window_title_keeps_only_latest_unseen_value() {
    // Arrange
    let mut gateway = TestGateway::start().await;
    let (_client, mut ports, mut conn, _run) = connected(&mut gateway, 0).await;

    // Act: three titles, then an output marker that is processed after them.
    send(&mut conn, b"1first").await;
    send(&mut conn, b"1second").await;
    send(&mut conn, b"1third").await;
    send(&mut conn, b"0marker").await;
    assert_eq!(next_output(&mut ports).await, b"marker");

    // Assert
    assert!(ports.window_title.has_changed().unwrap());
    let title = ports.window_title.borrow_and_update().clone();
    assert_eq!(title, Some(b"third".to_vec()));
}

#[tokio::test]
async fn test_detected_baudrate_is_published() {
    let mut gateway = TestGateway::start().await;
    let (_client, mut ports, mut conn, _run) = connected(&mut gateway, 0).await;

    send(&mut conn, b"B115200,114942").await;
    send(&mut conn, b"0marker").await;
    assert_eq!(next_output(&mut ports).await, b"marker");

    let report = ports
        .detected_baudrate
        .borrow()
        .clone()
        .expect("report published")
        .expect("report parsed");
    assert_eq!(report.approx, 115_200);
    assert_eq!(report.measured, Some(114_942));
}

#[tokio::test]
async fn test_malformed_baudrate_and_empty_frames_keep_epoch_alive() {
    // Arrange
    let mut gateway = TestGateway::start().await;
    let (client, mut ports, mut conn, _run) = connected(&mut gateway, 0).await;

    // Act
    send(&mut conn, b"Bgarbage").await;
    send(&mut conn, b"").await;
    send(&mut conn, b"0ok").await;

    // Assert
    assert_eq!(next_output(&mut ports).await, b"ok");
    assert!(!client.is_shutdown());
    assert!(ports.errors.try_recv().is_err());
    let update = ports.detected_baudrate.borrow().clone();
    assert_eq!(update, Some(Err("garbage".to_string())));

    // The connection still carries input.
    client.input().send(b"x".to_vec()).await.unwrap();
    assert_eq!(next_frame(&mut conn).await, b"0x");
}

#[tokio::test]
async fn test_server_pause_holds_input_until_resume() {
    // Arrange
    let mut gateway = TestGateway::start().await;
    let (client, mut ports, mut conn, _run) = connected(&mut gateway, 0).await;
    send(&mut conn, b"S").await;
    send(&mut conn, b"0paused").await;
    assert_eq!(next_output(&mut ports).await, b"paused");

    // Act: input while paused must not reach the server.
    client.input().send(b"held".to_vec()).await.unwrap();
    let early = tokio::time::timeout(Duration::from_millis(300), conn.next()).await;
    assert!(early.is_err(), "no frame may arrive while paused");

    // Output keeps flowing while paused.
    send(&mut conn, b"0still").await;
    assert_eq!(next_output(&mut ports).await, b"still");

    send(&mut conn, b"Q").await;

    // Assert
    assert_eq!(next_frame(&mut conn).await, b"0held");
}

#[tokio::test]
async fn test_server_close_reports_connection_closed_once() {
    // Arrange
    let mut gateway = TestGateway::start().await;
    let (client, mut ports, mut conn, run) = connected(&mut gateway, 0).await;

    // Act
    conn.close(None).await.unwrap();

    // Assert
    let err = tokio::time::timeout(WAIT, ports.errors.recv())
        .await
        .expect("error in time")
        .expect("error port open");
    assert!(matches!(err, ClientError::ConnectionClosed));
    run.await.unwrap().expect("run ends cleanly");
    assert!(client.is_shutdown());
    assert!(!client.is_closed());
    assert!(ports.errors.try_recv().is_err());
}

#[tokio::test]
async fn test_redial_after_shutdown_reuses_ports() {
    // Arrange: first epoch ends with a server close.
    let mut gateway = TestGateway::start().await;
    let (client, mut ports, mut conn, run) = connected(&mut gateway, 0).await;
    conn.close(None).await.unwrap();
    let _ = tokio::time::timeout(WAIT, ports.errors.recv()).await;
    run.await.unwrap().unwrap();

    // Act
    client.redial(&gateway.url, "second").await.expect("redial");
    let mut conn = gateway.accept().await;
    assert_eq!(expect_auth(&mut conn).await, "second");
    let run = {
        let client = client.clone();
        tokio::spawn(async move { client.run(0).await })
    };
    send(&mut conn, b"0again").await;

    // Assert
    assert_eq!(next_output(&mut ports).await, b"again");
    client.input().send(b"x".to_vec()).await.unwrap();
    assert_eq!(next_frame(&mut conn).await, b"0x");

    client.close().await.unwrap();
    run.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_second_run_while_running_is_not_connected() {
    // Arrange: prove the first run owns the connection.
    let mut gateway = TestGateway::start().await;
    let (client, _ports, mut conn, _run) = connected(&mut gateway, 0).await;
    client.input().send(b"x".to_vec()).await.unwrap();
    assert_eq!(next_frame(&mut conn).await, b"0x");

    // Act
    let second = client.run(0).await;

    // Assert
    assert!(matches!(
        second,
        Err(ClientError::Lifecycle(LifecycleError::NotConnected))
    ));
}

#[tokio::test]
async fn test_redial_while_live_is_refused() {
    let mut gateway = TestGateway::start().await;
    let (client, _ports, _conn, _run) = connected(&mut gateway, 0).await;

    let result = client.redial(&gateway.url, "").await;

    assert!(matches!(
        result,
        Err(ClientError::Lifecycle(LifecycleError::NotShutDown))
    ));
}

#[tokio::test]
async fn test_close_while_running_is_idempotent_and_closes_ports() {
    // Arrange
    let mut gateway = TestGateway::start().await;
    let (client, mut ports, _conn, run) = connected(&mut gateway, 0).await;

    // Act
    client.close().await.expect("first close");
    client.close().await.expect("second close");

    // Assert
    run.await.unwrap().expect("run ends cleanly");
    assert!(client.is_closed());
    assert!(client.close_signal().is_cancelled());
    assert!(ports.output.recv().await.is_none());
    let errors_end = tokio::time::timeout(WAIT, ports.errors.recv())
        .await
        .expect("error port must end after close");
    assert!(errors_end.is_none());
    assert!(matches!(
        client.redial(&gateway.url, "").await,
        Err(ClientError::Lifecycle(LifecycleError::Closed))
    ));
}

#[tokio::test]
async fn test_watchdog_times_out_when_server_never_answers() {
    // Arrange: the server never reads, so pings are never answered.
    let mut gateway = TestGateway::start().await;
    let (client, mut ports, _silent_conn, run) = connected(&mut gateway, 1).await;

    // Act
    let err = tokio::time::timeout(Duration::from_secs(6), ports.errors.recv())
        .await
        .expect("watchdog must fire within 6s")
        .expect("error port open");

    // Assert
    assert!(matches!(
        err,
        ClientError::WatchdogTimeout { interval } if interval == Duration::from_secs(1)
    ));
    run.await.unwrap().unwrap();
    assert!(client.is_shutdown());
    assert!(ports.errors.try_recv().is_err());
}

#[tokio::test]
async fn test_watchdog_stays_quiet_while_server_answers_pings() {
    // Arrange: reading on the server side answers pings automatically.
    let mut gateway = TestGateway::start().await;
    let (client, mut ports, mut conn, _run) = connected(&mut gateway, 1).await;
    let reader = tokio::spawn(async move { while conn.next().await.is_some() {} });

    // Act
    tokio::time::sleep(Duration::from_millis(4500)).await;

    // Assert
    assert!(ports.errors.try_recv().is_err());
    assert!(!client.is_shutdown());
    reader.abort();
}
