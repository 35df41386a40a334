//! Ticket lifecycle state machine. Status and assignment fields are mutated
//! only here; every accepted transition updates the conversation mirror and
//! appends a system message in the same logical operation.

use crate::notify::{dispatch, NotificationEvent};
use crate::shared::error::DeskError;
use crate::shared::models::{ActorRole, ChatMessage, Conversation, Ticket, TicketStatus};
use crate::shared::state::AppState;
use chrono::Utc;
use log::{error, info};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub enum TicketCommand {
    RequestAgent,
    Escalate { reason: String },
    Assign { agent_id: String, agent_name: String },
    Terminate { by: ActorRole },
    CloseManually { agent_id: String },
}

/// Apply a command to a ticket in place. Returns the system-message text
/// describing the transition. On rejection the ticket is left untouched.
///
/// Precedence note: an agent request and an escalation can both become true
/// during one conversation; escalation wins. `Escalate` moves the status and
/// leaves `is_agent_requested` as informational metadata.
pub fn apply(ticket: &mut Ticket, command: &TicketCommand) -> Result<String, DeskError> {
    let text = match command {
        TicketCommand::RequestAgent => {
            if ticket.status != TicketStatus::AssistantHandling {
                return Err(DeskError::InvalidTransition(format!(
                    "cannot request an agent while ticket is {:?}",
                    ticket.status
                )));
            }
            ticket.is_agent_requested = true;
            format!("{} a demandé un agent.", ticket.client_name)
        }
        TicketCommand::Escalate { reason } => {
            if ticket.status != TicketStatus::AssistantHandling {
                return Err(DeskError::InvalidTransition(format!(
                    "cannot escalate a ticket that is {:?}",
                    ticket.status
                )));
            }
            ticket.status = TicketStatus::Escalated;
            ticket.escalation_reason = Some(reason.clone());
            format!("Ticket escaladé : {}", reason)
        }
        TicketCommand::Assign { agent_id, agent_name } => {
            if let Some(current) = &ticket.assigned_agent_id {
                if current == agent_id {
                    // Re-assign by the same agent is a no-op.
                    return Ok(format!("{} gère déjà ce ticket.", agent_name));
                }
                return Err(DeskError::InvalidTransition(format!(
                    "ticket already assigned to agent {}",
                    current
                )));
            }
            let assignable = matches!(
                ticket.status,
                TicketStatus::New | TicketStatus::Escalated
            ) || (ticket.status == TicketStatus::AssistantHandling
                && ticket.is_agent_requested);
            if !assignable {
                return Err(DeskError::InvalidTransition(format!(
                    "cannot assign a ticket that is {:?} without an agent request",
                    ticket.status
                )));
            }
            ticket.status = TicketStatus::InProgress;
            ticket.assigned_agent_id = Some(agent_id.clone());
            ticket.assigned_agent_name = Some(agent_name.clone());
            ticket.is_agent_requested = false;
            format!("{} a pris en charge le ticket.", agent_name)
        }
        TicketCommand::Terminate { by } => {
            if ticket.status == TicketStatus::Terminated {
                return Err(DeskError::InvalidTransition(
                    "ticket is already terminated".to_string(),
                ));
            }
            ticket.status = TicketStatus::Terminated;
            ticket.terminated_by = Some(*by);
            ticket.terminated_at = Some(Utc::now());
            ticket.pending_human_closure = *by != ActorRole::Agent;
            match by {
                ActorRole::Agent => "Ticket clôturé par un agent.".to_string(),
                ActorRole::Assistant => {
                    "Ticket terminé par Jey, en attente de clôture par un agent.".to_string()
                }
                _ => "Ticket terminé par le client, en attente de clôture par un agent."
                    .to_string(),
            }
        }
        TicketCommand::CloseManually { agent_id } => {
            if ticket.status != TicketStatus::Terminated {
                return Err(DeskError::InvalidTransition(
                    "only a terminated ticket can be closed".to_string(),
                ));
            }
            if !ticket.pending_human_closure {
                // Same agent closing again is idempotent; anyone else is
                // rejected.
                return match &ticket.closed_by_agent_id {
                    Some(closer) if closer == agent_id => {
                        Ok("Ticket déjà clôturé.".to_string())
                    }
                    _ => Err(DeskError::InvalidTransition(
                        "ticket is not pending human closure".to_string(),
                    )),
                };
            }
            ticket.pending_human_closure = false;
            ticket.closed_by_agent_id = Some(agent_id.clone());
            "Ticket clôturé définitivement.".to_string()
        }
    };
    ticket.last_updated_at = Utc::now();
    Ok(text)
}

/// Run one transition end to end under the ticket's serialization lock:
/// load, apply, persist ticket + mirror atomically, append the system
/// message, fire the notification.
pub async fn transition(
    state: &Arc<AppState>,
    ticket_id: Uuid,
    command: TicketCommand,
) -> Result<Ticket, DeskError> {
    let _guard = state.ticket_lock(ticket_id).await;
    transition_locked(state, ticket_id, command).await
}

/// Same as [`transition`] for callers already holding the ticket lock.
pub async fn transition_locked(
    state: &Arc<AppState>,
    ticket_id: Uuid,
    command: TicketCommand,
) -> Result<Ticket, DeskError> {
    let mut ticket = state.tickets.get(ticket_id).await?;

    let system_text = apply(&mut ticket, &command)?;
    info!("ticket {} transition: {}", ticket_id, system_text);

    if ticket.archived {
        // Live chat state was already purged by archival: persist the ticket
        // stub alone, and do not resurrect the message log. Covers the manual
        // close of a ticket archived while pending human closure.
        state.tickets.update_ticket(ticket.clone()).await?;
    } else {
        let mut conversation = match state.tickets.get_conversation(ticket_id).await {
            Ok(c) => c,
            // Mirror lost to a partial purge; rebuild it from the ticket.
            Err(DeskError::NotFound(_)) => Conversation::for_ticket(&ticket),
            Err(e) => return Err(e),
        };
        conversation.sync_from(&ticket);
        conversation.last_message_preview = Some(system_text.clone());
        state.tickets.update(ticket.clone(), conversation).await?;

        // The transition is committed; the system message is part of the same
        // logical operation but a failed append must not roll the status back.
        if let Err(e) = state
            .messages
            .append(ChatMessage::system(ticket_id, system_text))
            .await
        {
            error!("failed to append transition message for {}: {}", ticket_id, e);
        }
    }

    match &command {
        TicketCommand::Assign { agent_name, .. } => {
            dispatch(
                state.notifier.as_ref(),
                NotificationEvent::TicketAssigned {
                    ticket_id,
                    agent_name: agent_name.clone(),
                },
            )
            .await;
        }
        TicketCommand::Escalate { reason } => {
            dispatch(
                state.notifier.as_ref(),
                NotificationEvent::TicketEscalated {
                    ticket_id,
                    reason: reason.clone(),
                },
            )
            .await;
        }
        _ => {}
    }

    Ok(ticket)
}
