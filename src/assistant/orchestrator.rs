//! The Jey turn loop. One turn per inbound client message: classify intent,
//! emit exactly one outcome (an assistant message and/or a state-machine
//! call), and never answer the same tail message twice.

use super::intent::{
    detect_intent, response_triggers_escalation, Command, FollowUpReply, Intent,
    AGENT_REQUEST_REASON,
};
use super::prompt::{build_history, build_system_prompt};
use crate::notify::{dispatch, NotificationEvent};
use crate::partners::{rank_partners, RankingOutcome, RankingQuery};
use crate::shared::error::DeskError;
use crate::shared::models::{
    ActorIdentity, ActorRole, ChatMessage, MessagePayload, TicketStatus,
};
use crate::shared::state::AppState;
use crate::tickets::state_machine::{transition_locked, TicketCommand};
use chrono::Utc;
use log::{error, info, warn};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct TurnOutcome {
    /// Assistant message appended this turn, if any.
    pub reply: Option<ChatMessage>,
    /// True when the turn escalated the ticket to a human.
    pub escalated: bool,
}

impl TurnOutcome {
    fn none() -> Self {
        Self::default()
    }

    fn reply(message: ChatMessage) -> Self {
        Self {
            reply: Some(message),
            escalated: false,
        }
    }
}

/// Run one assistant turn for an inbound message. Serialized per ticket; the
/// fallback completion call runs outside the ticket lock so the ticket can
/// still be terminated while the service is slow, in which case the late
/// output is discarded.
pub async fn run_turn(
    state: &Arc<AppState>,
    ticket_id: Uuid,
    inbound: &ChatMessage,
) -> Result<TurnOutcome, DeskError> {
    let guard = state.ticket_lock(ticket_id).await;

    let ticket = state.tickets.get(ticket_id).await?;
    if ticket.status != TicketStatus::AssistantHandling {
        return Ok(TurnOutcome::none());
    }
    if ticket.last_assistant_reply_to == Some(inbound.id) {
        info!("ticket {}: already answered message {}", ticket_id, inbound.id);
        return Ok(TurnOutcome::none());
    }

    let intent = detect_intent(&ticket, inbound);
    info!("ticket {}: intent {:?}", ticket_id, intent);

    match intent {
        Intent::Fallback => {
            drop(guard);
            run_fallback(state, ticket_id, inbound).await
        }
        other => run_deterministic(state, ticket_id, inbound, other).await,
    }
}

async fn run_deterministic(
    state: &Arc<AppState>,
    ticket_id: Uuid,
    inbound: &ChatMessage,
    intent: Intent,
) -> Result<TurnOutcome, DeskError> {
    match intent {
        Intent::ExplicitCommand(Command::SelectPartner(n)) => {
            select_partner(state, ticket_id, inbound, n).await
        }
        Intent::ExplicitCommand(Command::ConfirmBooking(true))
        | Intent::ExplicitCommand(Command::ShowAppointmentForm) => {
            let reply = commit_reply(
                state,
                ticket_id,
                inbound.id,
                "Très bien ! Remplissez le formulaire de rendez-vous pour continuer.".to_string(),
                MessagePayload::AppointmentRequestPrompt,
            )
            .await?;
            Ok(TurnOutcome::reply(reply))
        }
        Intent::ExplicitCommand(Command::ConfirmBooking(false)) => {
            let reply = commit_reply(
                state,
                ticket_id,
                inbound.id,
                "Pas de souci. Que puis-je faire d'autre pour vous ?".to_string(),
                MessagePayload::Text,
            )
            .await?;
            Ok(TurnOutcome::reply(reply))
        }
        Intent::PendingFollowUp(reply_kind) => {
            terminate_follow_up(state, ticket_id, inbound, reply_kind).await
        }
        Intent::AgentRequest => {
            transition_locked(state, ticket_id, TicketCommand::RequestAgent).await?;
            transition_locked(
                state,
                ticket_id,
                TicketCommand::Escalate {
                    reason: AGENT_REQUEST_REASON.to_string(),
                },
            )
            .await?;
            let reply = commit_reply(
                state,
                ticket_id,
                inbound.id,
                "Bien sûr, je vous mets en relation avec un agent. Un instant."
                    .to_string(),
                MessagePayload::Text,
            )
            .await?;
            Ok(TurnOutcome {
                reply: Some(reply),
                escalated: true,
            })
        }
        Intent::TerminationIntent => {
            let mut ticket = state.tickets.get(ticket_id).await?;
            ticket.jey_asked_to_terminate = true;
            ticket.last_updated_at = Utc::now();
            let mut conv = state.tickets.get_conversation(ticket_id).await?;
            conv.sync_from(&ticket);
            state.tickets.update(ticket, conv).await?;

            let reply = commit_reply(
                state,
                ticket_id,
                inbound.id,
                "Souhaitez-vous clôturer ce ticket ? (oui/non)".to_string(),
                MessagePayload::TerminationConfirmationRequest,
            )
            .await?;
            Ok(TurnOutcome::reply(reply))
        }
        Intent::BookingIntent => {
            let reply = commit_reply(
                state,
                ticket_id,
                inbound.id,
                "Très bien ! Remplissez le formulaire de rendez-vous pour continuer.".to_string(),
                MessagePayload::AppointmentRequestPrompt,
            )
            .await?;
            Ok(TurnOutcome::reply(reply))
        }
        Intent::PartnerRequest => suggest_partners(state, ticket_id, inbound).await,
        Intent::Fallback => unreachable!("fallback handled by caller"),
    }
}

async fn select_partner(
    state: &Arc<AppState>,
    ticket_id: Uuid,
    inbound: &ChatMessage,
    index: usize,
) -> Result<TurnOutcome, DeskError> {
    // Resolve against the same ordered list that was shown last.
    let log = state.messages.list(ticket_id).await?;
    let last_list = log.iter().rev().find_map(|m| match &m.payload {
        MessagePayload::PartnerSuggestionList { partners } => Some(partners.clone()),
        _ => None,
    });

    let (text, payload) = match last_list.as_ref().and_then(|l| l.get(index.wrapping_sub(1))) {
        Some(partner) => (
            format!(
                "Confirmez-vous la réservation avec {} ? (oui/non)",
                partner.name
            ),
            MessagePayload::BookingConfirmationRequest {
                partner_id: partner.id.clone(),
                partner_name: partner.name.clone(),
            },
        ),
        None => (
            "Je n'ai pas retrouvé ce choix. Demandez-moi d'abord des suggestions de partenaires."
                .to_string(),
            MessagePayload::Text,
        ),
    };

    let reply = commit_reply(state, ticket_id, inbound.id, text, payload).await?;
    Ok(TurnOutcome::reply(reply))
}

async fn suggest_partners(
    state: &Arc<AppState>,
    ticket_id: Uuid,
    inbound: &ChatMessage,
) -> Result<TurnOutcome, DeskError> {
    let ticket = state.tickets.get(ticket_id).await?;
    let directory = state.partners.list().await?;
    let category = if ticket.category.trim().is_empty() {
        None
    } else {
        Some(ticket.category.clone())
    };
    let outcome = rank_partners(
        &directory,
        &RankingQuery {
            category,
            free_text: inbound.text.clone(),
            all_categories: false,
        },
    );

    let (text, payload) = match outcome {
        RankingOutcome::Suggestions { list_text, partners } => (
            format!(
                "Voici mes suggestions :\n{}\nRépondez avec le numéro de votre choix.",
                list_text
            ),
            MessagePayload::PartnerSuggestionList { partners },
        ),
        RankingOutcome::NeedMoreInfo => (
            "Pouvez-vous préciser ce que vous recherchez ?".to_string(),
            MessagePayload::Text,
        ),
    };

    let reply = commit_reply(state, ticket_id, inbound.id, text, payload).await?;
    Ok(TurnOutcome::reply(reply))
}

async fn terminate_follow_up(
    state: &Arc<AppState>,
    ticket_id: Uuid,
    inbound: &ChatMessage,
    reply_kind: FollowUpReply,
) -> Result<TurnOutcome, DeskError> {
    // The pending question is consumed whatever the answer was.
    let mut ticket = state.tickets.get(ticket_id).await?;
    ticket.jey_asked_to_terminate = reply_kind == FollowUpReply::Ambiguous;
    ticket.last_updated_at = Utc::now();
    let mut conv = state.tickets.get_conversation(ticket_id).await?;
    conv.sync_from(&ticket);
    state.tickets.update(ticket, conv).await?;

    match reply_kind {
        FollowUpReply::Confirm => {
            let reply = commit_reply(
                state,
                ticket_id,
                inbound.id,
                "Merci de votre visite, je clôture le ticket. À bientôt !".to_string(),
                MessagePayload::Text,
            )
            .await?;
            transition_locked(
                state,
                ticket_id,
                TicketCommand::Terminate {
                    by: ActorRole::Assistant,
                },
            )
            .await?;
            Ok(TurnOutcome::reply(reply))
        }
        FollowUpReply::Refuse => {
            let reply = commit_reply(
                state,
                ticket_id,
                inbound.id,
                "D'accord, on continue. Que puis-je faire pour vous ?".to_string(),
                MessagePayload::Text,
            )
            .await?;
            Ok(TurnOutcome::reply(reply))
        }
        FollowUpReply::Ambiguous => {
            let reply = commit_reply(
                state,
                ticket_id,
                inbound.id,
                "Je n'ai pas compris : souhaitez-vous clôturer ce ticket ? (oui/non)".to_string(),
                MessagePayload::TerminationConfirmationRequest,
            )
            .await?;
            Ok(TurnOutcome::reply(reply))
        }
    }
}

async fn run_fallback(
    state: &Arc<AppState>,
    ticket_id: Uuid,
    inbound: &ChatMessage,
) -> Result<TurnOutcome, DeskError> {
    let log = state.messages.list(ticket_id).await?;
    let directory = state.partners.list().await?;
    let system_prompt = build_system_prompt(&directory);
    let history = build_history(&log);

    // No ticket lock across the completion call.
    let completion = state.completion.complete(&system_prompt, &history).await;

    let _guard = state.ticket_lock(ticket_id).await;
    let ticket = state.tickets.get(ticket_id).await?;
    if ticket.status != TicketStatus::AssistantHandling
        || ticket.last_assistant_reply_to == Some(inbound.id)
    {
        warn!(
            "ticket {}: discarding late assistant output for message {}",
            ticket_id, inbound.id
        );
        return Ok(TurnOutcome::none());
    }

    match completion {
        Ok(text) => {
            let escalate = response_triggers_escalation(&text);
            let reply =
                commit_reply(state, ticket_id, inbound.id, text, MessagePayload::Text).await?;
            if escalate {
                transition_locked(
                    state,
                    ticket_id,
                    TicketCommand::Escalate {
                        reason: AGENT_REQUEST_REASON.to_string(),
                    },
                )
                .await?;
            }
            Ok(TurnOutcome {
                reply: Some(reply),
                escalated: escalate,
            })
        }
        Err(e) => {
            // Never fail silently: leave a visible hand-off trace and get the
            // ticket to a human.
            error!("ticket {}: completion service failed: {}", ticket_id, e);
            if let Err(append_err) = state
                .messages
                .append(ChatMessage::system(
                    ticket_id,
                    "Jey est momentanément indisponible. Un agent va prendre le relais."
                        .to_string(),
                ))
                .await
            {
                error!(
                    "ticket {}: failed to append degraded-service message: {}",
                    ticket_id, append_err
                );
            }
            let mut ticket = ticket;
            ticket.last_assistant_reply_to = Some(inbound.id);
            state.tickets.update_ticket(ticket).await?;
            transition_locked(
                state,
                ticket_id,
                TicketCommand::Escalate {
                    reason: "assistant-unavailable".to_string(),
                },
            )
            .await?;
            Ok(TurnOutcome {
                reply: None,
                escalated: true,
            })
        }
    }
}

/// Append the assistant's message and stamp the inbound id it answers, all
/// while the caller holds the ticket lock.
async fn commit_reply(
    state: &Arc<AppState>,
    ticket_id: Uuid,
    inbound_id: Uuid,
    text: String,
    payload: MessagePayload,
) -> Result<ChatMessage, DeskError> {
    let confirmed = state
        .messages
        .append(ChatMessage::new(
            ticket_id,
            &ActorIdentity::assistant(),
            text,
            payload,
        ))
        .await?;

    let mut ticket = state.tickets.get(ticket_id).await?;
    ticket.last_assistant_reply_to = Some(inbound_id);
    ticket.last_updated_at = Utc::now();
    let mut conv = state.tickets.get_conversation(ticket_id).await?;
    conv.sync_from(&ticket);
    conv.last_message_preview = Some(confirmed.text.clone());
    state.tickets.update(ticket, conv).await?;

    dispatch(
        state.notifier.as_ref(),
        NotificationEvent::MessageSent {
            ticket_id,
            sender_name: confirmed.sender_name.clone(),
            preview: confirmed.text.chars().take(80).collect(),
        },
    )
    .await;

    Ok(confirmed)
}
