//! End-to-end lifecycle: a ticket opened in the Spa category travels through
//! the assistant, escalation, agent assignment, booking, termination and
//! archival, exercising the orchestration layer the way the HTTP surface
//! does.

use deskserver::assistant;
use deskserver::booking::{self, BookAppointmentRequest};
use deskserver::chat::append_message;
use deskserver::partners::StaticPartnerDirectory;
use deskserver::shared::models::{
    ActorIdentity, ActorRole, ChatMessage, Conversation, MessagePayload, Partner, Ticket,
    TicketStatus,
};
use deskserver::shared::state::AppState;
use deskserver::storage::GLOBAL_TERMINATED_COUNTER;
use deskserver::tickets::{archive_ticket, transition, TicketCommand};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

fn client() -> ActorIdentity {
    ActorIdentity {
        id: "client-1".into(),
        name: "Amira".into(),
        role: ActorRole::Client,
    }
}

fn spa_directory() -> Vec<Partner> {
    vec![
        Partner {
            id: "p-a".into(),
            name: "Aqua Spa".into(),
            category: "Spa".into(),
            rating: 4.0,
            promoted: false,
            promotion_ends: None,
        },
        Partner {
            id: "p-b".into(),
            name: "Le Spa".into(),
            category: "Spa".into(),
            rating: 3.0,
            promoted: true,
            promotion_ends: None,
        },
    ]
}

async fn open_ticket(state: &Arc<AppState>) -> Uuid {
    let ticket = Ticket::new("Spa".into(), &client(), Some("+216 20 000 000".into()));
    let id = ticket.id;
    let conversation = Conversation::for_ticket(&ticket);
    state.tickets.insert(ticket, conversation).await.unwrap();
    id
}

fn test_state() -> Arc<AppState> {
    let mut base = AppState::for_tests();
    base.partners = Arc::new(StaticPartnerDirectory::new(spa_directory()));
    Arc::new(base)
}

#[tokio::test]
async fn booking_request_gets_appointment_prompt() {
    let state = test_state();
    let ticket_id = open_ticket(&state).await;

    let inbound = append_message(
        &state,
        ticket_id,
        &client(),
        "je veux un rendez-vous".into(),
        MessagePayload::Text,
    )
    .await
    .unwrap();
    let outcome = assistant::run_turn(&state, ticket_id, &inbound).await.unwrap();

    assert_eq!(
        outcome.reply.unwrap().payload,
        MessagePayload::AppointmentRequestPrompt
    );
    assert_eq!(
        state.tickets.get(ticket_id).await.unwrap().status,
        TicketStatus::AssistantHandling
    );
}

#[tokio::test]
async fn agent_request_escalates_and_agent_takes_over() {
    let state = test_state();
    let ticket_id = open_ticket(&state).await;

    let inbound = append_message(
        &state,
        ticket_id,
        &client(),
        "un agent s'il vous plait".into(),
        MessagePayload::Text,
    )
    .await
    .unwrap();
    assistant::run_turn(&state, ticket_id, &inbound).await.unwrap();

    let ticket = state.tickets.get(ticket_id).await.unwrap();
    assert_eq!(ticket.status, TicketStatus::Escalated);
    assert_eq!(ticket.escalation_reason.as_deref(), Some("Demande Agent"));

    let ticket = transition(
        &state,
        ticket_id,
        TicketCommand::Assign {
            agent_id: "agent-1".into(),
            agent_name: "Karim".into(),
        },
    )
    .await
    .unwrap();
    assert_eq!(ticket.status, TicketStatus::InProgress);
    assert!(ticket.assigned_agent_id.is_some());

    // A second agent cannot steal the ticket.
    let err = transition(
        &state,
        ticket_id,
        TicketCommand::Assign {
            agent_id: "agent-2".into(),
            agent_name: "Lina".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        deskserver::shared::error::DeskError::InvalidTransition(_)
    ));
}

#[tokio::test]
async fn suggestion_list_orders_promoted_first() {
    let state = test_state();
    let ticket_id = open_ticket(&state).await;

    let inbound = append_message(
        &state,
        ticket_id,
        &client(),
        "une suggestion de prestataire ?".into(),
        MessagePayload::Text,
    )
    .await
    .unwrap();
    let outcome = assistant::run_turn(&state, ticket_id, &inbound).await.unwrap();

    match outcome.reply.unwrap().payload {
        MessagePayload::PartnerSuggestionList { partners } => {
            assert_eq!(partners[0].id, "p-b");
            assert_eq!(partners[1].id, "p-a");
        }
        other => panic!("unexpected payload: {:?}", other),
    }
}

#[tokio::test]
async fn full_lifecycle_terminate_close_archive() {
    let state = test_state();
    let ticket_id = open_ticket(&state).await;

    append_message(
        &state,
        ticket_id,
        &client(),
        "bonjour".into(),
        MessagePayload::Text,
    )
    .await
    .unwrap();

    booking::book_appointment(
        &state,
        BookAppointmentRequest {
            ticket_id: Some(ticket_id),
            client: client(),
            client_contact: None,
            partner_id: "p-b".into(),
            scheduled_for: Utc::now(),
            participants: vec!["Amira".into()],
            description: None,
            proof_image_url: None,
            booked_by_agent_id: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(state.tickets.get(ticket_id).await.unwrap().appointments.len(), 1);

    transition(
        &state,
        ticket_id,
        TicketCommand::Terminate {
            by: ActorRole::Assistant,
        },
    )
    .await
    .unwrap();
    let ticket = state.tickets.get(ticket_id).await.unwrap();
    assert!(ticket.pending_human_closure);
    assert!(ticket.in_active_queue());

    // Pending-closure ticket can still be closed twice by the same agent
    // with a single observable effect.
    transition(
        &state,
        ticket_id,
        TicketCommand::CloseManually {
            agent_id: "agent-1".into(),
        },
    )
    .await
    .unwrap();
    let once = state.tickets.get(ticket_id).await.unwrap();
    transition(
        &state,
        ticket_id,
        TicketCommand::CloseManually {
            agent_id: "agent-1".into(),
        },
    )
    .await
    .unwrap();
    let twice = state.tickets.get(ticket_id).await.unwrap();
    assert_eq!(once.pending_human_closure, twice.pending_human_closure);
    assert_eq!(once.closed_by_agent_id, twice.closed_by_agent_id);
    assert!(!twice.in_active_queue());

    let record = archive_ticket(&state, ticket_id).await.unwrap();
    assert!(record.messages.iter().any(|m: &ChatMessage| m.text == "bonjour"));
    assert!(state.messages.list(ticket_id).await.unwrap().is_empty());
    assert_eq!(state.counters.get(GLOBAL_TERMINATED_COUNTER).await.unwrap(), 1);

    // Late assistant output for a terminated ticket is discarded.
    let ticket = state.tickets.get(ticket_id).await.unwrap();
    let stale = ChatMessage::new(
        ticket_id,
        &client(),
        "encore là ?".into(),
        MessagePayload::Text,
    );
    let outcome = assistant::run_turn(&state, ticket_id, &stale).await.unwrap();
    assert!(outcome.reply.is_none());
    assert_eq!(ticket.status, TicketStatus::Terminated);
}
