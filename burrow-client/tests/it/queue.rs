use super::helper::{self, to_client_error, BrokerState};
use anyhow::Result;
use burrow_client::{ChannelState, ErrorKind, QueueDeclareOptions, QueueDeleteOptions};
use burrow_codec::frame;
use std::collections::HashMap;

#[tokio::test]
async fn bind_then_unbind_leaves_no_binding() -> Result<()> {
    let (conn, broker) = helper::start();
    let ch = conn.channel_open(1).await?;

    let queue = ch.queue_declare("price-queue").await?;
    assert_eq!(queue.name(), "price-queue");

    let triples = [("price-queue", "prices", ""), ("price-queue", "prices", "eur.*"), ("price-queue", "amq.topic", "#")];

    for (q, x, k) in triples {
        ch.queue_bind(q, x, k).await?;
    }

    assert_eq!(broker.lock().unwrap().bindings.len(), 3);

    for (q, x, k) in triples {
        ch.queue_unbind(q, x, k).await?;
    }

    assert!(broker.lock().unwrap().bindings.is_empty());

    ch.close().await?;

    assert!(conn.open_channels().is_empty());

    Ok(())
}

#[tokio::test]
async fn bind_to_missing_queue_names_everything() -> Result<()> {
    let (conn, _broker) = helper::start();
    let ch = conn.channel_open(2).await?;

    let err = to_client_error(ch.queue_bind("nope", "prices", "eur").await);

    assert_eq!(err.kind, ErrorKind::Protocol);
    assert_eq!(err.channel, Some(2));
    assert_eq!(err.code, 404);
    assert!(err.message.contains("NOT_FOUND - no queue 'nope' in vhost '/'"));
    assert!(err.message.contains("\"nope\""));
    assert!(err.message.contains("\"prices\""));
    assert!(err.message.contains("\"eur\""));

    assert_eq!(ch.state(), ChannelState::Closed);

    let err = to_client_error(ch.queue_declare("other").await);
    assert_eq!(err.kind, ErrorKind::Validation);

    // the broker closed it already
    ch.close().await?;

    let ch = conn.channel_open(2).await?;
    ch.close().await?;

    Ok(())
}

#[tokio::test]
async fn passive_declare_of_missing_queue_fails() -> Result<()> {
    let (conn, _broker) = helper::start();
    let ch = conn.channel_open(1).await?;

    let err = to_client_error(
        ch.queue_declare_with_options("missing", QueueDeclareOptions::default().passive(true))
            .await,
    );

    assert_eq!(err.kind, ErrorKind::Protocol);
    assert!(err.message.contains("NOT_FOUND"));

    Ok(())
}

#[tokio::test]
async fn empty_name_never_reaches_the_broker() -> Result<()> {
    let (conn, broker) = helper::start();
    let ch = conn.channel_open(1).await?;

    let err = to_client_error(ch.queue_declare("").await);

    assert_eq!(err.kind, ErrorKind::Validation);
    assert!(!broker.lock().unwrap().received.contains(&frame::QUEUE_DECLARE));

    let queue = ch.queue_declare_anonymous(QueueDeclareOptions::default().exclusive(true)).await?;

    assert!(queue.name().starts_with("amq.gen-"));

    ch.close().await?;

    Ok(())
}

#[tokio::test]
async fn delete_reports_messages_and_honors_if_empty() -> Result<()> {
    let mut queues = HashMap::new();
    queues.insert("orders".to_string(), vec![b"a".to_vec(), b"b".to_vec()]);

    let (conn, broker) = helper::start_with(BrokerState {
        queues,
        ..Default::default()
    });

    let ch = conn.channel_open(1).await?;
    let queue = ch.queue_declare("orders").await?;
    ch.queue_bind("orders", "x", "k").await?;

    let err = to_client_error(
        ch.queue_delete_with_options(&queue, QueueDeleteOptions::default().if_empty(true))
            .await,
    );
    assert_eq!(err.code, 406);

    let ch = conn.channel_open(3).await?;
    assert_eq!(ch.queue_delete(&queue).await?, 2);

    assert!(broker.lock().unwrap().queues.is_empty());
    assert!(broker.lock().unwrap().bindings.is_empty());

    ch.close().await?;

    Ok(())
}

#[tokio::test]
async fn channels_share_the_connection() -> Result<()> {
    let (conn, _broker) = helper::start();

    let ch1 = conn.channel_open(1).await?;
    let ch2 = conn.channel_open(2).await?;

    let (q1, q2) = tokio::join!(ch1.queue_declare("one"), ch2.queue_declare("two"));

    assert_eq!(q1?.name(), "one");
    assert_eq!(q2?.name(), "two");
    assert_eq!(conn.open_channels(), vec![1, 2]);

    ch1.close().await?;
    ch2.close().await?;

    Ok(())
}

#[tokio::test]
async fn dropped_channel_number_can_be_opened_again() -> Result<()> {
    let (conn, broker) = helper::start();

    let ch = conn.channel_open(1).await?;
    ch.queue_declare("first").await?;
    drop(ch);

    assert!(conn.open_channels().is_empty());

    let ch = conn.channel_open(1).await?;
    let queue = ch.queue_declare("second").await?;

    assert_eq!(queue.name(), "second");

    ch.close().await?;

    assert_eq!(
        broker.lock().unwrap().received,
        vec![
            frame::CHANNEL_OPEN,
            frame::QUEUE_DECLARE,
            frame::CHANNEL_CLOSE,
            frame::CHANNEL_OPEN,
            frame::QUEUE_DECLARE,
            frame::CHANNEL_CLOSE,
        ]
    );

    Ok(())
}
