use switchboard_server::LinkState;

use crate::integration::{create_test_broker, init_tracing};
use crate::utils::{join_group, wait_for_removal, wait_for_subscribers};

#[tokio::test]
async fn test_repeated_close_signals_are_harmless() {
    init_tracing();

    let (broker, connector) = create_test_broker();
    let a = join_group(&broker, &connector, "A", "alpha").await;
    let b = join_group(&broker, &connector, "B", "alpha").await;

    a.link.close_channel("data").await;
    a.link.set_state(LinkState::Disconnected).await;
    a.link.set_state(LinkState::Closed).await;
    a.link.close_channel("data").await;

    assert!(wait_for_removal(&broker, &a.stream_id).await);
    assert!(wait_for_subscribers(&broker, "alpha", 1).await);

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(a.link.close_count(), 1);
    assert!(broker.sessions().contains(&b.stream_id));
}

#[tokio::test]
async fn test_failed_link_tears_down() {
    init_tracing();

    let (broker, connector) = create_test_broker();
    let a = join_group(&broker, &connector, "A", "alpha").await;

    a.link.set_state(LinkState::Connected).await;
    a.link.set_state(LinkState::Failed).await;

    assert!(wait_for_removal(&broker, &a.stream_id).await);
    assert!(wait_for_subscribers(&broker, "alpha", 0).await);
    assert!(broker.sessions().state(&a.stream_id).is_none());
}

#[tokio::test]
async fn test_session_closed_before_channel_opens() {
    init_tracing();

    let (broker, connector) = create_test_broker();
    let response = broker
        .handle_offer(crate::utils::offer_request("A", "alpha"))
        .await
        .unwrap();
    let link = connector.last_link().await;

    link.set_state(LinkState::Failed).await;

    assert!(wait_for_removal(&broker, &response.stream_id).await);
    assert!(wait_for_subscribers(&broker, "alpha", 0).await);
    assert_eq!(link.close_count(), 1);
}
