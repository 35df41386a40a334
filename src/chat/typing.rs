//! Typing presence. Entries are advisory: the store holds no TTL, the actor
//! that stops typing (or loses eligibility) is responsible for the cleanup,
//! and clients treat entries older than the configured idle timeout as stale.

use crate::shared::error::DeskError;
use crate::shared::state::AppState;
use log::debug;
use std::sync::Arc;
use uuid::Uuid;

/// Set or clear an actor's typing entry for a ticket.
///
/// Setting is only allowed while the ticket is in a state where human typing
/// is meaningful; for a terminated ticket any existing entry for the actor is
/// proactively cleared instead.
pub async fn set_typing(
    state: &Arc<AppState>,
    ticket_id: Uuid,
    actor_id: &str,
    actor_name: &str,
    typing: bool,
) -> Result<(), DeskError> {
    let _guard = state.ticket_lock(ticket_id).await;

    let ticket = state.tickets.get(ticket_id).await?;
    let mut conversation = state.tickets.get_conversation(ticket_id).await?;

    let eligible = ticket.status.allows_typing();
    if typing && eligible {
        conversation
            .typing_users
            .insert(actor_id.to_string(), actor_name.to_string());
    } else {
        if typing && !eligible {
            debug!(
                "typing ignored for {} on ticket {} (status {:?})",
                actor_id, ticket_id, ticket.status
            );
        }
        conversation.typing_users.remove(actor_id);
    }

    state.tickets.update(ticket, conversation).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{ActorIdentity, ActorRole, TicketStatus};
    use crate::shared::state::AppState;

    fn client() -> ActorIdentity {
        ActorIdentity {
            id: "u-1".into(),
            name: "Amira".into(),
            role: ActorRole::Client,
        }
    }

    #[tokio::test]
    async fn typing_set_and_cleared_on_live_ticket() {
        let state = Arc::new(AppState::for_tests());
        let ticket = crate::shared::models::Ticket::new("Spa".into(), &client(), None);
        let conv = crate::shared::models::Conversation::for_ticket(&ticket);
        let id = ticket.id;
        state.tickets.insert(ticket, conv).await.unwrap();

        set_typing(&state, id, "u-1", "Amira", true).await.unwrap();
        let conv = state.tickets.get_conversation(id).await.unwrap();
        assert_eq!(conv.typing_users.get("u-1").map(String::as_str), Some("Amira"));

        set_typing(&state, id, "u-1", "Amira", false).await.unwrap();
        let conv = state.tickets.get_conversation(id).await.unwrap();
        assert!(conv.typing_users.is_empty());
    }

    #[tokio::test]
    async fn typing_on_terminated_ticket_clears_entry() {
        let state = Arc::new(AppState::for_tests());
        let mut ticket = crate::shared::models::Ticket::new("Spa".into(), &client(), None);
        ticket.status = TicketStatus::Terminated;
        let mut conv = crate::shared::models::Conversation::for_ticket(&ticket);
        conv.typing_users.insert("u-1".into(), "Amira".into());
        let id = ticket.id;
        state.tickets.insert(ticket, conv).await.unwrap();

        set_typing(&state, id, "u-1", "Amira", true).await.unwrap();
        let conv = state.tickets.get_conversation(id).await.unwrap();
        assert!(conv.typing_users.is_empty());
    }
}
