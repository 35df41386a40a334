//! Process-local stores backed by `tokio::sync::RwLock` maps. Each store
//! guards one collection (or one pair that must move together) behind a
//! single lock, which is what gives the upsert/delete operations their
//! all-or-nothing behavior.

use super::{AppointmentStore, ArchiveStore, CounterStore, MessageStore, TicketStore};
use crate::shared::error::DeskError;
use crate::shared::models::{
    Appointment, ArchivedTicket, ChatMessage, Conversation, Ticket,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryTicketStore {
    inner: RwLock<HashMap<Uuid, (Ticket, Option<Conversation>)>>,
}

impl MemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TicketStore for MemoryTicketStore {
    async fn insert(&self, ticket: Ticket, conversation: Conversation) -> Result<(), DeskError> {
        let mut inner = self.inner.write().await;
        inner.insert(ticket.id, (ticket, Some(conversation)));
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Ticket, DeskError> {
        let inner = self.inner.read().await;
        inner
            .get(&id)
            .map(|(t, _)| t.clone())
            .ok_or_else(|| DeskError::NotFound(format!("ticket {}", id)))
    }

    async fn get_conversation(&self, id: Uuid) -> Result<Conversation, DeskError> {
        let inner = self.inner.read().await;
        inner
            .get(&id)
            .and_then(|(_, c)| c.clone())
            .ok_or_else(|| DeskError::NotFound(format!("conversation for ticket {}", id)))
    }

    async fn update(&self, ticket: Ticket, conversation: Conversation) -> Result<(), DeskError> {
        let mut inner = self.inner.write().await;
        let entry = inner
            .get_mut(&ticket.id)
            .ok_or_else(|| DeskError::NotFound(format!("ticket {}", ticket.id)))?;
        *entry = (ticket, Some(conversation));
        Ok(())
    }

    async fn update_ticket(&self, ticket: Ticket) -> Result<(), DeskError> {
        let mut inner = self.inner.write().await;
        let entry = inner
            .get_mut(&ticket.id)
            .ok_or_else(|| DeskError::NotFound(format!("ticket {}", ticket.id)))?;
        entry.0 = ticket;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Ticket>, DeskError> {
        let inner = self.inner.read().await;
        let mut tickets: Vec<Ticket> = inner.values().map(|(t, _)| t.clone()).collect();
        tickets.sort_by_key(|t| t.created_at);
        Ok(tickets)
    }

    async fn delete_conversation(&self, id: Uuid) -> Result<(), DeskError> {
        let mut inner = self.inner.write().await;
        if let Some(entry) = inner.get_mut(&id) {
            entry.1 = None;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryMessageStore {
    inner: RwLock<HashMap<Uuid, Vec<ChatMessage>>>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn append(&self, mut message: ChatMessage) -> Result<ChatMessage, DeskError> {
        message.id = Uuid::new_v4();
        message.created_at = Utc::now();
        message.pending = false;

        let mut inner = self.inner.write().await;
        let log = inner.entry(message.ticket_id).or_default();
        log.push(message.clone());
        // Order is recomputed on every mutation, never trusted from arrival.
        log.sort_by_key(|m| m.created_at);
        Ok(message)
    }

    async fn list(&self, ticket_id: Uuid) -> Result<Vec<ChatMessage>, DeskError> {
        let inner = self.inner.read().await;
        let mut log = inner.get(&ticket_id).cloned().unwrap_or_default();
        log.sort_by_key(|m| m.created_at);
        Ok(log)
    }

    async fn purge(&self, ticket_id: Uuid) -> Result<(), DeskError> {
        let mut inner = self.inner.write().await;
        inner.remove(&ticket_id);
        Ok(())
    }
}

#[derive(Default)]
struct AppointmentTables {
    records: HashMap<Uuid, Appointment>,
    /// partner id -> appointment id -> mirror copy
    mirrors: HashMap<String, HashMap<Uuid, Appointment>>,
}

#[derive(Default)]
pub struct MemoryAppointmentStore {
    inner: RwLock<AppointmentTables>,
}

impl MemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AppointmentStore for MemoryAppointmentStore {
    async fn upsert(
        &self,
        appointment: Appointment,
        previous_partner_id: Option<String>,
    ) -> Result<(), DeskError> {
        let mut inner = self.inner.write().await;
        // Partner changed on edit: drop the stale mirror first so one
        // appointment never owns two mirrors.
        if let Some(previous) = previous_partner_id {
            if previous != appointment.partner_id {
                if let Some(old) = inner.mirrors.get_mut(&previous) {
                    old.remove(&appointment.id);
                }
            }
        }
        inner
            .mirrors
            .entry(appointment.partner_id.clone())
            .or_default()
            .insert(appointment.id, appointment.clone());
        inner.records.insert(appointment.id, appointment);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Appointment, DeskError> {
        let inner = self.inner.read().await;
        inner
            .records
            .get(&id)
            .cloned()
            .ok_or_else(|| DeskError::NotFound(format!("appointment {}", id)))
    }

    async fn delete(&self, id: Uuid) -> Result<(), DeskError> {
        let mut inner = self.inner.write().await;
        let record = inner
            .records
            .remove(&id)
            .ok_or_else(|| DeskError::NotFound(format!("appointment {}", id)))?;
        if let Some(mirror) = inner.mirrors.get_mut(&record.partner_id) {
            mirror.remove(&id);
        }
        Ok(())
    }

    async fn list_for_partner(&self, partner_id: &str) -> Result<Vec<Appointment>, DeskError> {
        let inner = self.inner.read().await;
        let mut list: Vec<Appointment> = inner
            .mirrors
            .get(partner_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default();
        list.sort_by_key(|a| a.scheduled_for);
        Ok(list)
    }
}

#[derive(Default)]
pub struct MemoryArchiveStore {
    inner: RwLock<HashMap<Uuid, ArchivedTicket>>,
}

impl MemoryArchiveStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArchiveStore for MemoryArchiveStore {
    async fn write(&self, record: ArchivedTicket) -> Result<(), DeskError> {
        let mut inner = self.inner.write().await;
        inner.insert(record.ticket.id, record);
        Ok(())
    }

    async fn get(&self, ticket_id: Uuid) -> Result<Option<ArchivedTicket>, DeskError> {
        let inner = self.inner.read().await;
        Ok(inner.get(&ticket_id).cloned())
    }
}

#[derive(Default)]
pub struct MemoryCounterStore {
    inner: RwLock<HashMap<String, u64>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment(&self, key: &str) -> Result<u64, DeskError> {
        let mut inner = self.inner.write().await;
        let value = inner.entry(key.to_string()).or_insert(0);
        *value += 1;
        Ok(*value)
    }

    async fn get(&self, key: &str) -> Result<u64, DeskError> {
        let inner = self.inner.read().await;
        Ok(inner.get(key).copied().unwrap_or(0))
    }
}
