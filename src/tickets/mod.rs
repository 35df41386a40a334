//! Ticket lifecycle surface: creation, listing, the state-machine
//! transitions, and the archival endpoint.

pub mod archive;
pub mod state_machine;

use crate::assistant;
use crate::chat::append_message;
use crate::notify::{dispatch, NotificationEvent};
use crate::shared::error::DeskError;
use crate::shared::models::{
    ActorIdentity, ActorRole, ChatMessage, Conversation, MessagePayload, Ticket, TicketStatus,
};
use crate::shared::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub use archive::archive_ticket;
pub use state_machine::{apply, transition, TicketCommand};

pub fn configure_ticket_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tickets", post(create_ticket).get(list_tickets))
        .route("/api/tickets/{ticket_id}", get(get_ticket))
        .route("/api/tickets/{ticket_id}/conversation", get(get_conversation))
        .route("/api/tickets/{ticket_id}/assign", post(assign_ticket))
        .route("/api/tickets/{ticket_id}/request-agent", post(request_agent))
        .route("/api/tickets/{ticket_id}/escalate", post(escalate_ticket))
        .route("/api/tickets/{ticket_id}/terminate", post(terminate_ticket))
        .route("/api/tickets/{ticket_id}/close", post(close_ticket))
        .route("/api/tickets/{ticket_id}/archive", post(run_archival))
}

#[derive(Debug, Deserialize)]
pub struct CreateTicketRequest {
    pub category: String,
    pub client: ActorIdentity,
    pub phone: Option<String>,
    /// First client message, answered by Jey in the same call when present.
    pub initial_message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateTicketResponse {
    pub ticket: Ticket,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assistant_reply: Option<ChatMessage>,
}

async fn create_ticket(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateTicketRequest>,
) -> Result<impl IntoResponse, DeskError> {
    let ticket = Ticket::new(request.category, &request.client, request.phone);
    let ticket_id = ticket.id;
    let conversation = Conversation::for_ticket(&ticket);
    state.tickets.insert(ticket.clone(), conversation).await?;
    info!("ticket {} created for {}", ticket_id, request.client.id);

    state
        .messages
        .append(ChatMessage::system(
            ticket_id,
            format!("Ticket ouvert par {}.", request.client.name),
        ))
        .await?;

    dispatch(
        state.notifier.as_ref(),
        NotificationEvent::TicketCreated {
            ticket_id,
            client_name: request.client.name.clone(),
        },
    )
    .await;

    let mut assistant_reply = None;
    if let Some(text) = request.initial_message {
        let confirmed = append_message(
            &state,
            ticket_id,
            &request.client,
            text,
            MessagePayload::Text,
        )
        .await?;
        assistant_reply = assistant::run_turn(&state, ticket_id, &confirmed).await?.reply;
    }

    let ticket = state.tickets.get(ticket_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateTicketResponse {
            ticket,
            assistant_reply,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct TicketFilters {
    pub status: Option<TicketStatus>,
    pub assigned_to: Option<String>,
    /// When true, keep only tickets still in an agent's active queue
    /// (human-closed tickets drop out).
    #[serde(default)]
    pub active: bool,
}

async fn list_tickets(
    State(state): State<Arc<AppState>>,
    Query(filters): Query<TicketFilters>,
) -> Result<impl IntoResponse, DeskError> {
    let mut tickets = state.tickets.list().await?;
    if let Some(status) = filters.status {
        tickets.retain(|t| t.status == status);
    }
    if let Some(agent) = &filters.assigned_to {
        tickets.retain(|t| t.assigned_agent_id.as_deref() == Some(agent.as_str()));
    }
    if filters.active {
        tickets.retain(Ticket::in_active_queue);
    }
    Ok((StatusCode::OK, Json(tickets)))
}

async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<Uuid>,
) -> Result<impl IntoResponse, DeskError> {
    let ticket = state.tickets.get(ticket_id).await?;
    Ok((StatusCode::OK, Json(ticket)))
}

async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<Uuid>,
) -> Result<impl IntoResponse, DeskError> {
    let conversation = state.tickets.get_conversation(ticket_id).await?;
    Ok((StatusCode::OK, Json(conversation)))
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub agent_id: String,
    pub agent_name: String,
}

async fn assign_ticket(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<Uuid>,
    Json(request): Json<AssignRequest>,
) -> Result<impl IntoResponse, DeskError> {
    let ticket = transition(
        &state,
        ticket_id,
        TicketCommand::Assign {
            agent_id: request.agent_id,
            agent_name: request.agent_name,
        },
    )
    .await?;
    Ok((StatusCode::OK, Json(ticket)))
}

async fn request_agent(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<Uuid>,
) -> Result<impl IntoResponse, DeskError> {
    let ticket = transition(&state, ticket_id, TicketCommand::RequestAgent).await?;
    Ok((StatusCode::OK, Json(ticket)))
}

#[derive(Debug, Deserialize)]
pub struct EscalateRequest {
    pub reason: String,
}

async fn escalate_ticket(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<Uuid>,
    Json(request): Json<EscalateRequest>,
) -> Result<impl IntoResponse, DeskError> {
    let ticket = transition(
        &state,
        ticket_id,
        TicketCommand::Escalate {
            reason: request.reason,
        },
    )
    .await?;
    Ok((StatusCode::OK, Json(ticket)))
}

#[derive(Debug, Deserialize)]
pub struct TerminateRequest {
    pub by: ActorRole,
}

async fn terminate_ticket(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<Uuid>,
    Json(request): Json<TerminateRequest>,
) -> Result<impl IntoResponse, DeskError> {
    let ticket = transition(
        &state,
        ticket_id,
        TicketCommand::Terminate { by: request.by },
    )
    .await?;
    Ok((StatusCode::OK, Json(ticket)))
}

#[derive(Debug, Deserialize)]
pub struct CloseRequest {
    pub agent_id: String,
}

async fn close_ticket(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<Uuid>,
    Json(request): Json<CloseRequest>,
) -> Result<impl IntoResponse, DeskError> {
    let ticket = transition(
        &state,
        ticket_id,
        TicketCommand::CloseManually {
            agent_id: request.agent_id,
        },
    )
    .await?;
    Ok((StatusCode::OK, Json(ticket)))
}

async fn run_archival(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<Uuid>,
) -> Result<impl IntoResponse, DeskError> {
    let record = archive_ticket(&state, ticket_id).await?;
    Ok((StatusCode::OK, Json(record)))
}
