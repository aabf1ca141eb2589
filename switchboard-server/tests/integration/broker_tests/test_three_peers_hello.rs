use crate::integration::{create_test_broker, init_tracing};
use crate::utils::{MESSAGE_TIMEOUT_MS, join_group};

#[tokio::test]
async fn test_three_peers_hello() {
    init_tracing();

    let (broker, connector) = create_test_broker();

    let a = join_group(&broker, &connector, "A", "alpha").await;
    let b = join_group(&broker, &connector, "B", "alpha").await;
    let c = join_group(&broker, &connector, "C", "alpha").await;

    assert_eq!(broker.groups().len(), 1);
    assert_eq!(broker.sessions().len(), 3);

    a.link.receive_text("hello").await;

    for peer in [&a, &b, &c] {
        let texts = peer.channel.wait_for_messages(1, MESSAGE_TIMEOUT_MS).await;
        assert_eq!(texts, vec!["hello"]);
    }

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    for peer in [&a, &b, &c] {
        assert_eq!(
            peer.channel.texts().await.len(),
            1,
            "each peer gets exactly one copy"
        );
    }
}

#[tokio::test]
async fn test_groups_are_isolated() {
    init_tracing();

    let (broker, connector) = create_test_broker();

    let a = join_group(&broker, &connector, "A", "alpha").await;
    let z = join_group(&broker, &connector, "Z", "omega").await;

    a.link.receive_text("only alpha").await;

    assert_eq!(
        a.channel.wait_for_messages(1, MESSAGE_TIMEOUT_MS).await,
        vec!["only alpha"]
    );
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert!(z.channel.texts().await.is_empty());
    assert_eq!(broker.groups().len(), 2);
}
