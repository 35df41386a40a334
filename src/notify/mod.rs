//! Fire-and-forget notification dispatch. Delivery failures are logged and
//! never propagated as orchestration failures.

use async_trait::async_trait;
use log::{debug, error};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NotificationEvent {
    TicketCreated { ticket_id: Uuid, client_name: String },
    TicketAssigned { ticket_id: Uuid, agent_name: String },
    TicketEscalated { ticket_id: Uuid, reason: String },
    MessageSent { ticket_id: Uuid, sender_name: String, preview: String },
    AppointmentBooked { appointment_id: Uuid, partner_name: String, booking_code: String },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: NotificationEvent) -> anyhow::Result<()>;
}

/// Dispatch an event without letting any failure escape.
pub async fn dispatch(notifier: &dyn Notifier, event: NotificationEvent) {
    if let Err(e) = notifier.notify(event).await {
        error!("notification delivery failed: {}", e);
    }
}

/// Default notifier: logs the event and succeeds. Stands in for a push
/// transport, which is outside this service.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: NotificationEvent) -> anyhow::Result<()> {
        debug!("notification: {}", serde_json::to_string(&event)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingNotifier(AtomicUsize);

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn notify(&self, _event: NotificationEvent) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("push transport down")
        }
    }

    #[tokio::test]
    async fn dispatch_swallows_failures() {
        let notifier = FailingNotifier(AtomicUsize::new(0));
        dispatch(
            &notifier,
            NotificationEvent::TicketCreated {
                ticket_id: Uuid::new_v4(),
                client_name: "Amira".into(),
            },
        )
        .await;
        assert_eq!(notifier.0.load(Ordering::SeqCst), 1);
    }
}
