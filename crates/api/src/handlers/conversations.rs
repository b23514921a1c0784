use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use slotsync_core::{
    errors::SyncError,
    models::message::{Message, MessageDraft},
};
use slotsync_sync::conversation::{ConversationKey, ConversationSession};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::{ApiState, middleware::error_handling::AppError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenConversationRequest {
    pub conversation_id: String,
    pub user_id: String,
    pub peer_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResponse {
    pub id: Uuid,
    pub conversation_id: String,
    pub messages: Vec<Message>,
    pub typing: Vec<String>,
    pub offline: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_error: Option<String>,
}

impl ConversationResponse {
    fn snapshot(id: Uuid, session: &ConversationSession) -> Self {
        Self {
            id,
            conversation_id: session.key().conversation_id.clone(),
            messages: session.messages(),
            typing: session.typing_peers(),
            offline: session.is_offline(),
            load_error: session.load_error(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TypingResponse {
    pub emitted: bool,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub added: usize,
    #[serde(flatten)]
    pub conversation: ConversationResponse,
}

/// Open a conversation view and load its latest history page.
pub async fn open(
    State(state): State<Arc<ApiState>>,
    Json(payload): Json<OpenConversationRequest>,
) -> Result<(StatusCode, Json<ConversationResponse>), AppError> {
    if payload.conversation_id.trim().is_empty() {
        return Err(SyncError::validation("conversationId must not be empty").into());
    }
    let session = ConversationSession::open(
        state.ctx.clone(),
        ConversationKey {
            conversation_id: payload.conversation_id,
            user_id: payload.user_id,
            peer_id: payload.peer_id,
        },
    )
    .await;

    let id = Uuid::new_v4();
    state.conversations.write().await.insert(id, session.clone());
    info!(view_id = %id, conversation_id = %session.key().conversation_id, "conversation view opened");
    Ok((
        StatusCode::CREATED,
        Json(ConversationResponse::snapshot(id, &session)),
    ))
}

pub async fn get(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ConversationResponse>, AppError> {
    let session = state.conversation(id).await?;
    Ok(Json(ConversationResponse::snapshot(id, &session)))
}

pub async fn close(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let session = state
        .conversations
        .write()
        .await
        .remove(&id)
        .ok_or_else(|| SyncError::NotFound(format!("Conversation view with ID {id} not found")))?;
    session.close();
    info!(view_id = %id, "conversation view closed");
    Ok(StatusCode::NO_CONTENT)
}

/// Send a message. On failure the entry stays in the view marked failed.
pub async fn send(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
    Json(draft): Json<MessageDraft>,
) -> Result<(StatusCode, Json<Message>), AppError> {
    let session = state.conversation(id).await?;
    let message = session.send(&draft).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn retry(
    State(state): State<Arc<ApiState>>,
    Path((id, message_id)): Path<(Uuid, String)>,
) -> Result<(StatusCode, Json<Message>), AppError> {
    let session = state.conversation(id).await?;
    let message = session.retry(&message_id).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn typing(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<TypingResponse>, AppError> {
    let session = state.conversation(id).await?;
    let emitted = session.notify_typing()?;
    Ok(Json(TypingResponse { emitted }))
}

/// Load the next page of older messages.
pub async fn load_older(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<HistoryResponse>, AppError> {
    let session = state.conversation(id).await?;
    let added = session.load_older().await;
    Ok(Json(HistoryResponse {
        added,
        conversation: ConversationResponse::snapshot(id, &session),
    }))
}
