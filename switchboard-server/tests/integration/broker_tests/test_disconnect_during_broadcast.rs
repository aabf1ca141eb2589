use switchboard_server::SessionState;

use crate::integration::{create_test_broker, init_tracing};
use crate::utils::{MESSAGE_TIMEOUT_MS, join_group, wait_for_removal, wait_for_subscribers};

#[tokio::test]
async fn test_disconnect_during_broadcast() {
    init_tracing();

    let (broker, connector) = create_test_broker();

    let a = join_group(&broker, &connector, "A", "alpha").await;
    let b = join_group(&broker, &connector, "B", "alpha").await;
    let c = join_group(&broker, &connector, "C", "alpha").await;

    let sender = {
        let link = a.link.clone();
        tokio::spawn(async move {
            for i in 0..20 {
                link.receive_text(&format!("burst {i}")).await;
            }
        })
    };
    b.link.close_channel("data").await;
    sender.await.unwrap();

    assert!(wait_for_removal(&broker, &b.stream_id).await);
    assert!(wait_for_subscribers(&broker, "alpha", 2).await);

    a.link.receive_text("after").await;

    let a_texts = a.channel.wait_for_messages(21, MESSAGE_TIMEOUT_MS).await;
    let c_texts = c.channel.wait_for_messages(21, MESSAGE_TIMEOUT_MS).await;
    assert_eq!(a_texts.last().map(String::as_str), Some("after"));
    assert_eq!(c_texts.last().map(String::as_str), Some("after"));
    assert_eq!(a_texts.len(), 21);
    assert_eq!(c_texts.len(), 21);

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert!(!b.channel.texts().await.contains(&"after".to_string()));

    assert_eq!(
        broker.sessions().state(&a.stream_id),
        Some(SessionState::Subscribed)
    );
    assert_eq!(
        broker.sessions().state(&c.stream_id),
        Some(SessionState::Subscribed)
    );
}
