use crate::error::{BrokerError, BrokerResult};
use crate::signaling::Broker;
use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::routing::{get, post};
use serde_json::{Value, json};
use switchboard_core::model::{CandidateSubmission, NegotiationRequest, NegotiationResponse};
use tracing::{info, warn};

pub fn router(broker: Broker) -> Router {
    Router::new()
        .route("/offer", post(offer_handler))
        .route("/candidate", post(candidate_handler))
        .route("/health", get(health_handler))
        .with_state(broker)
}

async fn offer_handler(
    State(broker): State<Broker>,
    payload: Result<Json<NegotiationRequest>, JsonRejection>,
) -> BrokerResult<Json<NegotiationResponse>> {
    let Json(request) = payload.map_err(rejected)?;
    info!(client = %request.client_id, group = %request.group_key, "Offer received");

    broker.handle_offer(request).await.map(Json)
}

async fn candidate_handler(
    State(broker): State<Broker>,
    payload: Result<Json<CandidateSubmission>, JsonRejection>,
) -> BrokerResult<StatusCode> {
    let Json(submission) = payload.map_err(rejected)?;

    broker.submit_candidate(submission)?;
    Ok(StatusCode::ACCEPTED)
}

async fn health_handler(State(broker): State<Broker>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "groups": broker.groups().len(),
        "sessions": broker.sessions().len(),
    }))
}

fn rejected(rejection: JsonRejection) -> BrokerError {
    warn!("Rejected request body: {}", rejection.body_text());
    BrokerError::MalformedRequest(rejection.body_text())
}
