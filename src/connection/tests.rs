//! Connection tests over scripted and in-memory sources

use super::*;
use crate::cursor::ReaderCursor;
use crate::test_utils::{ScriptedCursor, Step, TempLog, noisy_stream, sample_frame};
use futures::StreamExt;
use std::io::Cursor;
use std::time::Duration;

fn connect(bytes: Vec<u8>, variant: ProtocolVariant) -> TelemetryConnection {
    TelemetryConnection::from_cursor(
        ReaderCursor::new(Cursor::new(bytes)),
        variant,
        BacklogPolicy::Retain,
        DriverConfig::default(),
        62.5,
    )
    .expect("connection")
}

#[tokio::test]
async fn next_frame_delivers_in_order_then_ends() {
    let variant = ProtocolVariant::ToneIndexed;
    let mut connection = connect(noisy_stream(8, 5, variant), variant);

    let mut ids = Vec::new();
    while let Some(frame) = connection.next_frame().await {
        ids.push(frame.id);
    }
    assert_eq!(ids, (0..8).collect::<Vec<_>>());
    assert_eq!(connection.stats().frames, 8);

    let outcome = connection.join().await;
    assert!(outcome.is_err_and(|e| e.is_closed()));
}

#[tokio::test]
async fn native_subscription_yields_every_frame() {
    let variant = ProtocolVariant::Basic;
    let mut connection = connect(noisy_stream(20, 3, variant), variant);

    let frames: Vec<Frame> =
        connection.subscribe(UpdateRate::Native).expect("subscribe").collect().await;
    assert_eq!(frames.len(), 20);
    assert!(frames.iter().all(|f| f.tone_index.is_none()));
}

#[tokio::test]
async fn second_subscription_is_rejected() {
    let variant = ProtocolVariant::Basic;
    let mut connection = connect(noisy_stream(2, 0, variant), variant);

    let _stream = connection.subscribe(UpdateRate::Native).expect("first subscription");
    assert!(matches!(
        connection.subscribe(UpdateRate::Max(10)),
        Err(TelemetryError::AlreadySubscribed)
    ));
    assert!(connection.next_frame().await.is_none());
}

#[tokio::test]
async fn throttled_subscription_keeps_latest_frame() {
    let variant = ProtocolVariant::ToneIndexed;
    let mut connection = connect(noisy_stream(30, 0, variant), variant);

    let frames: Vec<Frame> =
        connection.subscribe(UpdateRate::Max(5)).expect("subscribe").collect().await;
    assert!(!frames.is_empty());
    assert!(frames.len() <= 30);
    assert_eq!(frames.last().map(|f| f.id), Some(29));
    assert!(frames.windows(2).all(|w| w[0].id < w[1].id));
}

#[tokio::test]
async fn unbounded_source_rate_still_subscribes() {
    let variant = ProtocolVariant::Basic;
    let mut connection = TelemetryConnection::from_cursor(
        ReaderCursor::new(Cursor::new(noisy_stream(4, 2, variant))),
        variant,
        BacklogPolicy::Retain,
        DriverConfig::default(),
        f64::INFINITY,
    )
    .expect("connection");

    let frames: Vec<Frame> =
        connection.subscribe(UpdateRate::Max(u32::MAX)).expect("subscribe").collect().await;
    assert_eq!(frames.last().map(|f| f.id), Some(3));
}

#[tokio::test]
async fn close_stops_a_followed_log() {
    let variant = ProtocolVariant::ToneIndexed;
    let log = TempLog::with_contents("follow-close", &sample_frame(4, variant).to_bytes(variant));
    let cursor = crate::cursor::FileCursor::open(log.path())
        .expect("open log")
        .follow(true)
        .poll_interval(Duration::from_millis(5));

    let mut connection = TelemetryConnection::from_cursor(
        cursor,
        variant,
        BacklogPolicy::Retain,
        DriverConfig::default(),
        62.5,
    )
    .expect("connection");

    assert_eq!(connection.next_frame().await.map(|f| f.id), Some(4));
    assert!(!connection.is_finished());

    connection.close();
    assert!(connection.join().await.is_ok());
}

#[tokio::test]
async fn scripted_errors_surface_through_join() {
    let variant = ProtocolVariant::Basic;
    let mut steps: Vec<Step> =
        sample_frame(1, variant).to_bytes(variant).into_iter().map(Step::Byte).collect();
    steps.push(Step::Fail);

    let mut connection = TelemetryConnection::from_cursor(
        ScriptedCursor::new(steps),
        variant,
        BacklogPolicy::Retain,
        DriverConfig::default(),
        62.5,
    )
    .expect("connection");

    assert_eq!(connection.next_frame().await.map(|f| f.id), Some(1));
    assert!(connection.next_frame().await.is_none());
    assert!(matches!(connection.join().await, Err(TelemetryError::Io { .. })));
}
