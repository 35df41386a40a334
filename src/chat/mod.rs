//! Chat surface: message send/list, optimistic reconciliation, typing
//! presence. Client sends on an assistant-handled ticket trigger a Jey turn.

pub mod reconcile;
pub mod typing;

use crate::assistant;
use crate::notify::{dispatch, NotificationEvent};
use crate::shared::error::DeskError;
use crate::shared::models::{
    ActorIdentity, ActorRole, ChatMessage, MessagePayload, TicketStatus,
};
use crate::shared::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub use reconcile::{reconcile, DEFAULT_RECONCILE_WINDOW_SECS};
pub use typing::set_typing;

pub fn configure_chat_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/tickets/{ticket_id}/messages",
            post(send_message).get(list_messages),
        )
        .route("/api/tickets/{ticket_id}/typing", post(update_typing))
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub sender: ActorIdentity,
    pub text: String,
    #[serde(default)]
    pub payload: Option<MessagePayload>,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub message: ChatMessage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assistant_reply: Option<ChatMessage>,
    pub escalated: bool,
}

async fn send_message(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<Uuid>,
    Json(request): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, DeskError> {
    let confirmed = append_message(
        &state,
        ticket_id,
        &request.sender,
        request.text,
        request.payload.unwrap_or(MessagePayload::Text),
    )
    .await?;

    // Client input on an assistant-handled ticket drives one Jey turn.
    let mut assistant_reply = None;
    let mut escalated = false;
    if request.sender.role == ActorRole::Client {
        let outcome = assistant::run_turn(&state, ticket_id, &confirmed).await?;
        assistant_reply = outcome.reply;
        escalated = outcome.escalated;
    }

    Ok((
        StatusCode::CREATED,
        Json(SendMessageResponse {
            message: confirmed,
            assistant_reply,
            escalated,
        }),
    ))
}

/// Confirm one message into the ticket's log and refresh the conversation
/// mirror, under the ticket's serialization lock.
pub async fn append_message(
    state: &Arc<AppState>,
    ticket_id: Uuid,
    sender: &ActorIdentity,
    text: String,
    payload: MessagePayload,
) -> Result<ChatMessage, DeskError> {
    let confirmed = {
        let _guard = state.ticket_lock(ticket_id).await;

        let ticket = state.tickets.get(ticket_id).await?;
        if ticket.status == TicketStatus::Terminated {
            return Err(DeskError::Validation(
                "cannot send a message to a terminated ticket".to_string(),
            ));
        }

        let confirmed = state
            .messages
            .append(ChatMessage::new(ticket_id, sender, text, payload))
            .await?;

        let mut conversation = state.tickets.get_conversation(ticket_id).await?;
        conversation.last_message_preview = Some(confirmed.text.clone());
        // The sender is no longer typing once the message lands.
        conversation.typing_users.remove(&sender.id);
        conversation.updated_at = confirmed.created_at;
        state.tickets.update(ticket, conversation).await?;
        confirmed
    };

    info!("ticket {}: message from {}", ticket_id, sender.id);
    dispatch(
        state.notifier.as_ref(),
        NotificationEvent::MessageSent {
            ticket_id,
            sender_name: sender.name.clone(),
            preview: confirmed.text.chars().take(80).collect(),
        },
    )
    .await;

    Ok(confirmed)
}

async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<Uuid>,
) -> Result<impl IntoResponse, DeskError> {
    let log = state.messages.list(ticket_id).await?;
    Ok((StatusCode::OK, Json(log)))
}

#[derive(Debug, Deserialize)]
pub struct TypingRequest {
    pub actor_id: String,
    pub actor_name: String,
    pub typing: bool,
}

async fn update_typing(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<Uuid>,
    Json(request): Json<TypingRequest>,
) -> Result<impl IntoResponse, DeskError> {
    set_typing(
        &state,
        ticket_id,
        &request.actor_id,
        &request.actor_name,
        request.typing,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{Conversation, Ticket};

    fn client() -> ActorIdentity {
        ActorIdentity {
            id: "u-1".into(),
            name: "Amira".into(),
            role: ActorRole::Client,
        }
    }

    #[tokio::test]
    async fn append_updates_preview_and_clears_typing() {
        let state = Arc::new(AppState::for_tests());
        let ticket = Ticket::new("Spa".into(), &client(), None);
        let id = ticket.id;
        let mut conv = Conversation::for_ticket(&ticket);
        conv.typing_users.insert("u-1".into(), "Amira".into());
        state.tickets.insert(ticket, conv).await.unwrap();

        append_message(&state, id, &client(), "bonjour".into(), MessagePayload::Text)
            .await
            .unwrap();

        let conv = state.tickets.get_conversation(id).await.unwrap();
        assert_eq!(conv.last_message_preview.as_deref(), Some("bonjour"));
        assert!(conv.typing_users.is_empty());
    }

    #[tokio::test]
    async fn append_to_terminated_ticket_is_rejected() {
        let state = Arc::new(AppState::for_tests());
        let mut ticket = Ticket::new("Spa".into(), &client(), None);
        ticket.status = TicketStatus::Terminated;
        let id = ticket.id;
        let conv = Conversation::for_ticket(&ticket);
        state.tickets.insert(ticket, conv).await.unwrap();

        let err = append_message(&state, id, &client(), "allo ?".into(), MessagePayload::Text)
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::Validation(_)));
    }
}
