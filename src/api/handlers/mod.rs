use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::db::Database;
use crate::domains::MessageStore;
use crate::models::{Message, NewMessage};
use crate::store::snapshot_key;

// ============================================================
// Error Handling
// ============================================================

/// Log an internal error and return a sanitized response to the client.
/// The full error is logged server-side for debugging, but clients only
/// see a generic message to avoid leaking internal details.
fn internal_error(e: impl std::fmt::Display) -> (StatusCode, String) {
    tracing::error!("Internal error: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

fn bad_request(msg: impl Into<String>) -> (StatusCode, String) {
    let msg = msg.into();
    tracing::warn!("Validation error: {}", msg);
    (StatusCode::BAD_REQUEST, msg)
}

/// Collection names are snake_case identifiers.
fn validate_collection_name(name: &str) -> Result<(), (StatusCode, String)> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(bad_request(format!("Invalid collection name: {}", name)))
    }
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Collections
// ============================================================

/// Every record of a collection; `[]` if nothing was ever stored.
pub async fn get_collection(
    State(db): State<Database>,
    Path(name): Path<String>,
) -> Result<Json<Vec<Value>>, (StatusCode, String)> {
    validate_collection_name(&name)?;

    let records: Vec<Value> = match db.get(&snapshot_key(&name)).map_err(internal_error)? {
        Some(json) => serde_json::from_str(&json).map_err(internal_error)?,
        None => Vec::new(),
    };
    Ok(Json(records))
}

pub async fn replace_collection(
    State(db): State<Database>,
    Path(name): Path<String>,
    Json(records): Json<Vec<Value>>,
) -> Result<StatusCode, (StatusCode, String)> {
    validate_collection_name(&name)?;

    let json = serde_json::to_string(&records).map_err(internal_error)?;
    db.put(&snapshot_key(&name), &json)
        .map_err(internal_error)?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================
// Messages
// ============================================================

pub async fn send_message(
    State(db): State<Database>,
    Json(input): Json<NewMessage>,
) -> Result<(StatusCode, Json<Message>), (StatusCode, String)> {
    if input.sender.trim().is_empty() || input.receiver.trim().is_empty() {
        return Err(bad_request("sender and receiver are required"));
    }
    if input.content.trim().is_empty() {
        return Err(bad_request("content is required"));
    }

    let message = Message {
        id: Uuid::new_v4().to_string(),
        sender: input.sender,
        receiver: input.receiver,
        content: input.content,
        sent_at: Utc::now(),
    };

    db.modify(&snapshot_key(MessageStore::COLLECTION), |current| {
        let mut messages: Vec<Message> = match current {
            Some(json) => serde_json::from_str(&json)?,
            None => Vec::new(),
        };
        messages.push(message.clone());
        Ok(serde_json::to_string(&messages)?)
    })
    .map_err(internal_error)?;

    Ok((StatusCode::CREATED, Json(message)))
}
