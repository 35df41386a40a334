//! Archival transaction. Snapshots a terminated ticket into cold storage and
//! purges the live chat state. The snapshot write always comes first: live
//! data is never deleted without a durable archive record.

use crate::shared::error::DeskError;
use crate::shared::models::{ActorRole, ArchivedTicket, Conversation, TicketStatus};
use crate::shared::state::AppState;
use crate::storage::{agent_terminated_counter, GLOBAL_TERMINATED_COUNTER};
use chrono::Utc;
use log::{error, info, warn};
use std::sync::Arc;
use uuid::Uuid;

pub async fn archive_ticket(
    state: &Arc<AppState>,
    ticket_id: Uuid,
) -> Result<ArchivedTicket, DeskError> {
    let record = archive_under_lock(state, ticket_id).await?;
    // The ticket is cold now; stop tracking its serialization lock.
    state.release_ticket_lock(ticket_id).await;
    Ok(record)
}

async fn archive_under_lock(
    state: &Arc<AppState>,
    ticket_id: Uuid,
) -> Result<ArchivedTicket, DeskError> {
    let _guard = state.ticket_lock(ticket_id).await;

    let mut ticket = state.tickets.get(ticket_id).await?;
    if ticket.status != TicketStatus::Terminated {
        return Err(DeskError::InvalidTransition(format!(
            "cannot archive a ticket that is {:?}",
            ticket.status
        )));
    }

    // Idempotency marker: a retried archival only re-runs the purge, it
    // never writes a second snapshot or bumps the counters again.
    if ticket.archived {
        let existing = state
            .archive
            .get(ticket_id)
            .await?
            .ok_or_else(|| DeskError::ArchivalTransactionFailed(
                "ticket is marked archived but no snapshot exists".to_string(),
            ))?;
        warn!("ticket {} already archived, retrying purge only", ticket_id);
        purge_live_state(state, ticket_id).await;
        return Ok(existing);
    }

    let conversation = match state.tickets.get_conversation(ticket_id).await {
        Ok(c) => c,
        // Mirror already gone from an earlier partial purge.
        Err(DeskError::NotFound(_)) => Conversation::for_ticket(&ticket),
        Err(e) => return Err(e),
    };
    let messages = state.messages.list(ticket_id).await?;

    let record = ArchivedTicket {
        ticket: ticket.clone(),
        conversation,
        messages,
        terminated_by: ticket.terminated_by,
        archived_at: Utc::now(),
    };

    // Step 1: snapshot. Any failure aborts before deletion.
    state
        .archive
        .write(record.clone())
        .await
        .map_err(|e| DeskError::ArchivalTransactionFailed(e.to_string()))?;

    ticket.archived = true;
    state.tickets.update_ticket(ticket.clone()).await?;
    info!("ticket {} archived", ticket_id);

    // Step 2: purge. The snapshot is durable; a partial purge is retried on
    // the next archival call.
    purge_live_state(state, ticket_id).await;

    // Step 3: counters.
    if ticket.terminated_by == Some(ActorRole::Agent) {
        if let Some(agent_id) = &ticket.assigned_agent_id {
            if let Err(e) = state
                .counters
                .increment(&agent_terminated_counter(agent_id))
                .await
            {
                error!("failed to bump terminated counter for {}: {}", agent_id, e);
            }
        }
    }
    if let Err(e) = state.counters.increment(GLOBAL_TERMINATED_COUNTER).await {
        error!("failed to bump global terminated counter: {}", e);
    }

    Ok(record)
}

async fn purge_live_state(state: &Arc<AppState>, ticket_id: Uuid) {
    if let Err(e) = state.messages.purge(ticket_id).await {
        error!("failed to purge messages for {}: {}", ticket_id, e);
    }
    if let Err(e) = state.tickets.delete_conversation(ticket_id).await {
        error!("failed to delete conversation for {}: {}", ticket_id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{
        ActorIdentity, ActorRole, ChatMessage, Ticket,
    };
    use crate::storage::ArchiveStore;
    use crate::tickets::state_machine::{transition, TicketCommand};
    use async_trait::async_trait;

    fn client() -> ActorIdentity {
        ActorIdentity {
            id: "u-1".into(),
            name: "Amira".into(),
            role: ActorRole::Client,
        }
    }

    async fn seeded_state() -> (Arc<AppState>, Uuid) {
        let state = Arc::new(AppState::for_tests());
        let ticket = Ticket::new("Spa".into(), &client(), None);
        let id = ticket.id;
        let conv = Conversation::for_ticket(&ticket);
        state.tickets.insert(ticket, conv).await.unwrap();
        state
            .messages
            .append(ChatMessage::new(
                id,
                &client(),
                "bonjour".into(),
                crate::shared::models::MessagePayload::Text,
            ))
            .await
            .unwrap();
        (state, id)
    }

    #[tokio::test]
    async fn archive_requires_terminated_status() {
        let (state, id) = seeded_state().await;
        let err = archive_ticket(&state, id).await.unwrap_err();
        assert!(matches!(err, DeskError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn archive_snapshots_then_purges_and_counts() {
        let (state, id) = seeded_state().await;
        transition(&state, id, TicketCommand::Terminate { by: ActorRole::Client })
            .await
            .unwrap();

        let record = archive_ticket(&state, id).await.unwrap();
        assert_eq!(record.ticket.id, id);
        assert!(!record.messages.is_empty());

        assert!(state.messages.list(id).await.unwrap().is_empty());
        assert!(state.tickets.get_conversation(id).await.is_err());
        assert_eq!(
            state.counters.get(GLOBAL_TERMINATED_COUNTER).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn second_archive_call_does_not_double_count() {
        let (state, id) = seeded_state().await;
        transition(&state, id, TicketCommand::Terminate { by: ActorRole::Client })
            .await
            .unwrap();

        archive_ticket(&state, id).await.unwrap();
        archive_ticket(&state, id).await.unwrap();
        assert_eq!(
            state.counters.get(GLOBAL_TERMINATED_COUNTER).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn archived_pending_ticket_can_still_be_closed() {
        let (state, id) = seeded_state().await;
        transition(&state, id, TicketCommand::Terminate { by: ActorRole::Assistant })
            .await
            .unwrap();
        archive_ticket(&state, id).await.unwrap();

        // The purge removed the conversation mirror; the manual close must
        // still land on the surviving ticket stub.
        let ticket = transition(
            &state,
            id,
            TicketCommand::CloseManually { agent_id: "a1".into() },
        )
        .await
        .unwrap();
        assert!(!ticket.pending_human_closure);
        assert_eq!(ticket.closed_by_agent_id.as_deref(), Some("a1"));
        assert!(!ticket.in_active_queue());

        // Closing must not resurrect the purged message log.
        assert!(state.messages.list(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn archival_drops_the_ticket_lock_entry() {
        let (state, id) = seeded_state().await;
        transition(&state, id, TicketCommand::Terminate { by: ActorRole::Client })
            .await
            .unwrap();
        assert!(state.ticket_lock_count().await > 0);

        archive_ticket(&state, id).await.unwrap();
        assert_eq!(state.ticket_lock_count().await, 0);
    }

    #[tokio::test]
    async fn agent_termination_bumps_agent_counter() {
        let (state, id) = seeded_state().await;
        transition(
            &state,
            id,
            TicketCommand::Escalate { reason: "Demande Agent".into() },
        )
        .await
        .unwrap();
        transition(
            &state,
            id,
            TicketCommand::Assign { agent_id: "a1".into(), agent_name: "Karim".into() },
        )
        .await
        .unwrap();
        transition(&state, id, TicketCommand::Terminate { by: ActorRole::Agent })
            .await
            .unwrap();

        archive_ticket(&state, id).await.unwrap();
        assert_eq!(
            state
                .counters
                .get(&agent_terminated_counter("a1"))
                .await
                .unwrap(),
            1
        );
    }

    struct FailingArchive;

    #[async_trait]
    impl ArchiveStore for FailingArchive {
        async fn write(&self, _record: ArchivedTicket) -> Result<(), DeskError> {
            Err(DeskError::Storage("disk full".to_string()))
        }
        async fn get(&self, _ticket_id: Uuid) -> Result<Option<ArchivedTicket>, DeskError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn failed_snapshot_leaves_live_data_untouched() {
        let mut base = AppState::for_tests();
        base.archive = Arc::new(FailingArchive);
        let state = Arc::new(base);

        let ticket = Ticket::new("Spa".into(), &client(), None);
        let id = ticket.id;
        let conv = Conversation::for_ticket(&ticket);
        state.tickets.insert(ticket, conv).await.unwrap();
        state
            .messages
            .append(ChatMessage::new(
                id,
                &client(),
                "bonjour".into(),
                crate::shared::models::MessagePayload::Text,
            ))
            .await
            .unwrap();
        transition(&state, id, TicketCommand::Terminate { by: ActorRole::Client })
            .await
            .unwrap();

        let err = archive_ticket(&state, id).await.unwrap_err();
        assert!(matches!(err, DeskError::ArchivalTransactionFailed(_)));

        // Live chat state survives and the ticket stays retry-eligible.
        assert!(!state.messages.list(id).await.unwrap().is_empty());
        assert!(state.tickets.get_conversation(id).await.is_ok());
        assert!(!state.tickets.get(id).await.unwrap().archived);
    }
}
