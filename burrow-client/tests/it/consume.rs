use super::helper::{self, to_client_error, BrokerState, HangUp};
use anyhow::Result;
use burrow_client::{ChannelState, ConsumeOptions, ConsumerSignal, ErrorKind, Message};
use burrow_codec::frame;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

fn broker_with(bodies: &[&[u8]], fragment_size: usize, hang_up: Option<HangUp>) -> BrokerState {
    let mut queues = HashMap::new();
    queues.insert("q".to_string(), bodies.iter().map(|b| b.to_vec()).collect());

    BrokerState {
        queues,
        fragment_size,
        hang_up,
        ..Default::default()
    }
}

#[tokio::test]
async fn consumer_reassembles_fragmented_bodies() -> Result<()> {
    let big: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    let (conn, _broker) = helper::start_with(broker_with(&[b"hello", b"", &big], 7, None));

    let mut ch = conn.channel_open(1).await?;
    let mut queue = ch.queue_declare("q").await?;
    let mut consumer = ch.start_consuming(&mut queue, ConsumeOptions::default()).await?;

    let mut bodies = vec![];

    for _ in 0..3 {
        match consumer.next().await? {
            ConsumerSignal::Delivered(m) => bodies.push(m.into_body().to_vec()),
            ConsumerSignal::Stopped => panic!("Stopped too early"),
        }
    }

    assert_eq!(bodies, vec![b"hello".to_vec(), vec![], big]);

    consumer.cancel().await?;

    assert!(queue.consumer_tag().is_empty());
    assert_eq!(ch.state(), ChannelState::Open);

    ch.close().await?;

    Ok(())
}

#[tokio::test]
async fn basic_consume_returns_when_the_connection_drops_mid_body() -> Result<()> {
    let (conn, _broker) = helper::start_with(broker_with(&[b"one", b"two", b"three"], 2, Some(HangUp::MidBody)));

    let mut ch = conn.channel_open(1).await?;
    let mut queue = ch.queue_declare("q").await?;

    let seen = Arc::new(Mutex::new(vec![]));
    let s = seen.clone();
    queue.subscribe(move |m: &Message| s.lock().unwrap().push(m.body().to_vec()));

    ch.basic_consume(&mut queue).await?;

    assert_eq!(
        *seen.lock().unwrap(),
        vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()]
    );
    assert!(queue.consumer_tag().starts_with("burrow-"));

    Ok(())
}

#[tokio::test]
async fn connection_drop_between_deliveries_is_an_error() -> Result<()> {
    let (conn, _broker) = helper::start_with(broker_with(&[b"only"], 0, Some(HangUp::BetweenDeliveries)));

    let mut ch = conn.channel_open(1).await?;
    let mut queue = ch.queue_declare("q").await?;

    let received = Arc::new(Mutex::new(0));
    let r = received.clone();
    queue.subscribe(move |_: &Message| *r.lock().unwrap() += 1);

    let err = to_client_error(ch.basic_consume(&mut queue).await);

    assert_eq!(err.kind, ErrorKind::Transport);
    assert_eq!(err.message, "Error in header frame");
    assert_eq!(*received.lock().unwrap(), 1);

    let err = to_client_error(ch.queue_declare("q").await);

    assert_eq!(err.kind, ErrorKind::Protocol);
    assert!(err.message.contains("Connection closed by the peer"));

    Ok(())
}

#[tokio::test]
async fn broker_closing_the_channel_ends_the_consume() -> Result<()> {
    let mut state = broker_with(&[b"only"], 0, None);
    state.close_after_consume = Some((404, "NOT_FOUND - queue 'q' in vhost '/' deleted".to_string()));

    let (conn, broker) = helper::start_with(state);

    let mut ch = conn.channel_open(1).await?;
    let mut queue = ch.queue_declare("q").await?;

    let received = Arc::new(Mutex::new(0));
    let r = received.clone();
    queue.subscribe(move |_: &Message| *r.lock().unwrap() += 1);

    let err = to_client_error(ch.basic_consume(&mut queue).await);

    assert_eq!(err.kind, ErrorKind::Protocol);
    assert_eq!(err.code, 404);
    assert!(err.message.contains("NOT_FOUND - queue 'q' in vhost '/' deleted"));
    assert_eq!(*received.lock().unwrap(), 1);

    assert_eq!(ch.state(), ChannelState::Closed);
    assert!(conn.open_channels().is_empty());

    let err = to_client_error(ch.queue_declare("q").await);
    assert_eq!(err.kind, ErrorKind::Validation);

    ch.close().await?;

    assert!(!broker.lock().unwrap().received.contains(&frame::CHANNEL_CLOSE));

    let ch = conn.channel_open(1).await?;
    ch.close().await?;

    Ok(())
}

#[tokio::test]
async fn dropped_consumer_is_cancelled_and_the_channel_goes_on() -> Result<()> {
    let (conn, broker) = helper::start_with(broker_with(&[b"one", b"two", b"three"], 0, None));

    let mut ch = conn.channel_open(1).await?;
    let mut queue = ch.queue_declare("q").await?;

    {
        let mut consumer = ch.start_consuming(&mut queue, ConsumeOptions::default()).await?;

        assert!(matches!(consumer.next().await?, ConsumerSignal::Delivered(_)));
    }

    assert_eq!(ch.state(), ChannelState::Open);

    let other = ch.queue_declare("other").await?;
    assert_eq!(other.name(), "other");

    assert!(broker.lock().unwrap().received.contains(&frame::BASIC_CANCEL));

    ch.close().await?;

    Ok(())
}
