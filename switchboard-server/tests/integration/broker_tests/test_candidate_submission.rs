use std::time::Duration;
use switchboard_core::model::{CandidateSubmission, StreamId};
use switchboard_server::{BrokerError, LinkState};

use crate::integration::{create_test_broker, init_tracing};
use crate::utils::{join_group, wait_for_removal};

const CANDIDATE: &str = r#"{"candidate":"candidate:1 1 udp 2130706431 127.0.0.1 50000 typ host","sdpMid":"0","sdpMLineIndex":0}"#;

#[tokio::test]
async fn test_candidate_reaches_link() {
    init_tracing();

    let (broker, connector) = create_test_broker();
    let a = join_group(&broker, &connector, "A", "alpha").await;

    broker
        .submit_candidate(CandidateSubmission {
            stream_id: a.stream_id,
            candidate: CANDIDATE.to_string(),
        })
        .unwrap();

    let start = std::time::Instant::now();
    while a.link.candidates().await.is_empty() && start.elapsed() < Duration::from_secs(2) {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(a.link.candidates().await, vec![CANDIDATE.to_string()]);
}

#[tokio::test]
async fn test_bad_candidate_keeps_session() {
    init_tracing();

    let (broker, connector) = create_test_broker();
    let a = join_group(&broker, &connector, "A", "alpha").await;

    broker
        .submit_candidate(CandidateSubmission {
            stream_id: a.stream_id,
            candidate: "bad".to_string(),
        })
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(broker.sessions().contains(&a.stream_id));
    assert!(a.link.candidates().await.is_empty());
}

#[tokio::test]
async fn test_unknown_and_closed_streams() {
    init_tracing();

    let (broker, connector) = create_test_broker();

    let missing = StreamId::new();
    let err = broker
        .submit_candidate(CandidateSubmission {
            stream_id: missing,
            candidate: CANDIDATE.to_string(),
        })
        .unwrap_err();
    assert!(matches!(err, BrokerError::UnknownStream(id) if id == missing));

    let a = join_group(&broker, &connector, "A", "alpha").await;
    a.link.set_state(LinkState::Closed).await;
    assert!(wait_for_removal(&broker, &a.stream_id).await);

    let err = broker
        .submit_candidate(CandidateSubmission {
            stream_id: a.stream_id,
            candidate: CANDIDATE.to_string(),
        })
        .unwrap_err();
    assert!(matches!(err, BrokerError::UnknownStream(_)));
}

#[tokio::test]
async fn test_empty_candidate_is_malformed() {
    init_tracing();

    let (broker, connector) = create_test_broker();
    let a = join_group(&broker, &connector, "A", "alpha").await;

    let err = broker
        .submit_candidate(CandidateSubmission {
            stream_id: a.stream_id,
            candidate: "  ".to_string(),
        })
        .unwrap_err();
    assert!(matches!(err, BrokerError::MalformedRequest(_)));
}
