//! Storage contract for the orchestrator. The concrete technology is out of
//! scope; these traits pin down the entity shapes and the atomicity
//! boundaries the transactions in `booking` and `tickets::archive` rely on.

pub mod memory;

use crate::shared::error::DeskError;
use crate::shared::models::{
    Appointment, ArchivedTicket, ChatMessage, Conversation, Ticket,
};
use async_trait::async_trait;
use uuid::Uuid;

pub use memory::{
    MemoryAppointmentStore, MemoryArchiveStore, MemoryCounterStore, MemoryMessageStore,
    MemoryTicketStore,
};

/// Ticket + Conversation pair storage. The pair is written together: the
/// mirror must never lag the ticket.
#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn insert(&self, ticket: Ticket, conversation: Conversation) -> Result<(), DeskError>;
    async fn get(&self, id: Uuid) -> Result<Ticket, DeskError>;
    async fn get_conversation(&self, id: Uuid) -> Result<Conversation, DeskError>;
    /// Atomically replace the ticket and its conversation mirror.
    async fn update(&self, ticket: Ticket, conversation: Conversation) -> Result<(), DeskError>;
    /// Replace the ticket alone, leaving whatever mirror state exists. Used
    /// by archival, where the mirror is about to be purged.
    async fn update_ticket(&self, ticket: Ticket) -> Result<(), DeskError>;
    async fn list(&self) -> Result<Vec<Ticket>, DeskError>;
    /// Remove only the conversation mirror (archival step 2). The ticket
    /// itself survives as the terminated/archived stub.
    async fn delete_conversation(&self, id: Uuid) -> Result<(), DeskError>;
}

/// Append-only, time-ordered message log per ticket.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Confirm a message: assigns the server id and timestamp and returns the
    /// confirmed copy. The input's client-generated id is discarded.
    async fn append(&self, message: ChatMessage) -> Result<ChatMessage, DeskError>;
    /// Full log for a ticket, sorted ascending by creation time.
    async fn list(&self, ticket_id: Uuid) -> Result<Vec<ChatMessage>, DeskError>;
    async fn purge(&self, ticket_id: Uuid) -> Result<(), DeskError>;
}

/// Appointment record plus its partner-scoped mirror. Both rows always refer
/// to the same logical appointment: created, updated and deleted together.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Write record and mirror in one step. `previous_partner_id` is the
    /// partner the stored record referenced before an edit; when it differs
    /// from the new partner the old mirror is removed in the same step.
    async fn upsert(
        &self,
        appointment: Appointment,
        previous_partner_id: Option<String>,
    ) -> Result<(), DeskError>;
    async fn get(&self, id: Uuid) -> Result<Appointment, DeskError>;
    /// Paired delete of record and mirror.
    async fn delete(&self, id: Uuid) -> Result<(), DeskError>;
    async fn list_for_partner(&self, partner_id: &str) -> Result<Vec<Appointment>, DeskError>;
}

/// Cold storage for terminated tickets.
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    async fn write(&self, record: ArchivedTicket) -> Result<(), DeskError>;
    async fn get(&self, ticket_id: Uuid) -> Result<Option<ArchivedTicket>, DeskError>;
}

/// Keyed counters with increment-or-initialize semantics, safe under
/// concurrent callers.
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn increment(&self, key: &str) -> Result<u64, DeskError>;
    async fn get(&self, key: &str) -> Result<u64, DeskError>;
}

/// Counter key for an agent's lifetime bookings.
pub fn agent_booking_counter(agent_id: &str) -> String {
    format!("agent:{}:bookings", agent_id)
}

/// Counter key for an agent's terminated tickets.
pub fn agent_terminated_counter(agent_id: &str) -> String {
    format!("agent:{}:terminated", agent_id)
}

/// Global terminated-ticket counter key.
pub const GLOBAL_TERMINATED_COUNTER: &str = "tickets:terminated";
