use crate::config::AppConfig;
use crate::llm::{CompletionProvider, UnconfiguredCompletion};
use crate::notify::{LogNotifier, Notifier};
use crate::partners::{PartnerDirectory, StaticPartnerDirectory};
use crate::storage::{
    AppointmentStore, ArchiveStore, CounterStore, MemoryAppointmentStore, MemoryArchiveStore,
    MemoryCounterStore, MemoryMessageStore, MemoryTicketStore, MessageStore, TicketStore,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

pub struct AppState {
    pub config: AppConfig,
    pub tickets: Arc<dyn TicketStore>,
    pub messages: Arc<dyn MessageStore>,
    pub appointments: Arc<dyn AppointmentStore>,
    pub archive: Arc<dyn ArchiveStore>,
    pub counters: Arc<dyn CounterStore>,
    pub partners: Arc<dyn PartnerDirectory>,
    pub completion: Arc<dyn CompletionProvider>,
    pub notifier: Arc<dyn Notifier>,
    /// One mutex per ticket: all transitions and orchestrator turns for a
    /// ticket are serialized; different tickets proceed in parallel.
    ticket_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        partners: Arc<dyn PartnerDirectory>,
        completion: Arc<dyn CompletionProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            tickets: Arc::new(MemoryTicketStore::new()),
            messages: Arc::new(MemoryMessageStore::new()),
            appointments: Arc::new(MemoryAppointmentStore::new()),
            archive: Arc::new(MemoryArchiveStore::new()),
            counters: Arc::new(MemoryCounterStore::new()),
            partners,
            completion,
            notifier,
            ticket_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the serialization lock for one ticket. Hold the guard across
    /// the whole logical operation (transition or orchestrator turn).
    pub async fn ticket_lock(&self, ticket_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.ticket_locks.lock().await;
            locks
                .entry(ticket_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Drop a ticket's lock entry once its lifecycle is over. A no-op while a
    /// guard is held or a waiter still references the mutex, so a late caller
    /// can never race a fresh lock against an old one.
    pub async fn release_ticket_lock(&self, ticket_id: Uuid) {
        let mut locks = self.ticket_locks.lock().await;
        if let Some(entry) = locks.get(&ticket_id) {
            if Arc::strong_count(entry) == 1 {
                locks.remove(&ticket_id);
            }
        }
    }

    #[cfg(test)]
    pub(crate) async fn ticket_lock_count(&self) -> usize {
        self.ticket_locks.lock().await.len()
    }

    /// State with in-memory stores, an empty partner directory and no
    /// completion service. Test and local-dev convenience.
    pub fn for_tests() -> Self {
        Self::new(
            test_config(),
            Arc::new(StaticPartnerDirectory::new(Vec::new())),
            Arc::new(UnconfiguredCompletion),
            Arc::new(LogNotifier),
        )
    }
}

fn test_config() -> AppConfig {
    use crate::config::{ChatConfig, CompletionConfig, PartnerConfig, ServerConfig};
    AppConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        completion: CompletionConfig {
            base_url: String::new(),
            api_key: String::new(),
            model: String::new(),
        },
        chat: ChatConfig::default(),
        partners: PartnerConfig {
            directory_path: None,
        },
    }
}
