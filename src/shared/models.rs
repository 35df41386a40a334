use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Sender id used for messages emitted by the platform itself.
pub const SYSTEM_SENDER_ID: &str = "system";
/// Sender id used for messages emitted by the Jey assistant.
pub const ASSISTANT_SENDER_ID: &str = "jey-ai";
/// Display name of the assistant.
pub const ASSISTANT_NAME: &str = "Jey";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Client,
    Agent,
    Assistant,
    System,
}

/// Acting identity as supplied by the identity provider. Trusted as given.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorIdentity {
    pub id: String,
    pub name: String,
    pub role: ActorRole,
}

impl ActorIdentity {
    pub fn assistant() -> Self {
        Self {
            id: ASSISTANT_SENDER_ID.to_string(),
            name: ASSISTANT_NAME.to_string(),
            role: ActorRole::Assistant,
        }
    }

    pub fn system() -> Self {
        Self {
            id: SYSTEM_SENDER_ID.to_string(),
            name: "System".to_string(),
            role: ActorRole::System,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    New,
    AssistantHandling,
    Escalated,
    InProgress,
    Terminated,
}

impl TicketStatus {
    /// Statuses in which human typing is meaningful (presence may be set).
    pub fn allows_typing(&self) -> bool {
        !matches!(self, TicketStatus::Terminated)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: Uuid,
    pub category: String,
    pub client_id: String,
    pub client_name: String,
    pub client_phone: Option<String>,
    pub status: TicketStatus,
    pub assigned_agent_id: Option<String>,
    pub assigned_agent_name: Option<String>,
    pub is_agent_requested: bool,
    pub jey_asked_to_terminate: bool,
    pub escalation_reason: Option<String>,
    /// Denormalized summaries of appointments booked from this ticket.
    pub appointments: Vec<AppointmentSummary>,
    /// Who moved the ticket to `Terminated`, if anyone.
    pub terminated_by: Option<ActorRole>,
    /// Set when terminated by the assistant or the client: the ticket still
    /// needs an explicit human close before it leaves the agent queue.
    pub pending_human_closure: bool,
    pub closed_by_agent_id: Option<String>,
    /// Idempotency marker: set once the archival transaction has snapshotted
    /// this ticket, so a retried archival never re-archives.
    pub archived: bool,
    /// Last inbound message id the assistant already responded to.
    pub last_assistant_reply_to: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    pub terminated_at: Option<DateTime<Utc>>,
}

impl Ticket {
    pub fn new(category: String, client: &ActorIdentity, phone: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            category,
            client_id: client.id.clone(),
            client_name: client.name.clone(),
            client_phone: phone,
            status: TicketStatus::AssistantHandling,
            assigned_agent_id: None,
            assigned_agent_name: None,
            is_agent_requested: false,
            jey_asked_to_terminate: false,
            escalation_reason: None,
            appointments: Vec::new(),
            terminated_by: None,
            pending_human_closure: false,
            closed_by_agent_id: None,
            archived: false,
            last_assistant_reply_to: None,
            created_at: now,
            last_updated_at: now,
            terminated_at: None,
        }
    }

    /// A ticket stays in an agent's active queue until a human closes it.
    pub fn in_active_queue(&self) -> bool {
        self.status != TicketStatus::Terminated || self.pending_human_closure
    }
}

/// Denormalized mirror of a [`Ticket`] for list views and presence. Updated in
/// the same logical operation as every ticket mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub ticket_id: Uuid,
    pub status: TicketStatus,
    pub assigned_agent_id: Option<String>,
    pub assigned_agent_name: Option<String>,
    pub last_message_preview: Option<String>,
    pub participants: Vec<Participant>,
    /// Advisory per-ticket typing map: actor id -> display name.
    pub typing_users: HashMap<String, String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub name: String,
}

impl Conversation {
    pub fn for_ticket(ticket: &Ticket) -> Self {
        Self {
            ticket_id: ticket.id,
            status: ticket.status,
            assigned_agent_id: ticket.assigned_agent_id.clone(),
            assigned_agent_name: ticket.assigned_agent_name.clone(),
            last_message_preview: None,
            participants: vec![Participant {
                id: ticket.client_id.clone(),
                name: ticket.client_name.clone(),
            }],
            typing_users: HashMap::new(),
            updated_at: ticket.last_updated_at,
        }
    }

    /// Re-derive the mirrored fields from the ticket, preserving the
    /// conversation-local state (preview, participants, typing map).
    pub fn sync_from(&mut self, ticket: &Ticket) {
        self.status = ticket.status;
        self.assigned_agent_id = ticket.assigned_agent_id.clone();
        self.assigned_agent_name = ticket.assigned_agent_name.clone();
        self.updated_at = ticket.last_updated_at;
        if ticket.status == TicketStatus::Terminated {
            self.typing_users.clear();
        }
        if let Some(agent_id) = &ticket.assigned_agent_id {
            let known = self.participants.iter().any(|p| &p.id == agent_id);
            if !known {
                self.participants.push(Participant {
                    id: agent_id.clone(),
                    name: ticket
                        .assigned_agent_name
                        .clone()
                        .unwrap_or_else(|| agent_id.clone()),
                });
            }
        }
    }
}

/// Typed payload carried by a chat message, tagged so clients can render the
/// right bubble and so follow-up commands can resolve deterministically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum MessagePayload {
    Text,
    Image {
        url: String,
    },
    /// Ordered partner suggestions, same order as the numbered list shown.
    PartnerSuggestionList {
        partners: Vec<RankedPartner>,
    },
    /// Asks the client to confirm a pending booking selection.
    BookingConfirmationRequest {
        partner_id: String,
        partner_name: String,
    },
    /// Prompts the client to fill the appointment form.
    AppointmentRequestPrompt,
    /// Asks the client to confirm closing the ticket.
    TerminationConfirmationRequest,
    /// Internal command emitted by the client UI, e.g. `select-partner-2`.
    SystemCommand {
        command: String,
    },
}

impl MessagePayload {
    /// Stable tag used for reconciliation equality.
    pub fn kind(&self) -> &'static str {
        match self {
            MessagePayload::Text => "text",
            MessagePayload::Image { .. } => "image",
            MessagePayload::PartnerSuggestionList { .. } => "partner_suggestion_list",
            MessagePayload::BookingConfirmationRequest { .. } => "booking_confirmation_request",
            MessagePayload::AppointmentRequestPrompt => "appointment_request_prompt",
            MessagePayload::TerminationConfirmationRequest => "termination_confirmation_request",
            MessagePayload::SystemCommand { .. } => "system_command",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub sender_id: String,
    pub sender_name: String,
    pub text: String,
    pub payload: MessagePayload,
    /// True while the message only exists locally (optimistic append) and has
    /// not yet been superseded by its server-confirmed counterpart.
    pub pending: bool,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(
        ticket_id: Uuid,
        sender: &ActorIdentity,
        text: String,
        payload: MessagePayload,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            ticket_id,
            sender_id: sender.id.clone(),
            sender_name: sender.name.clone(),
            text,
            payload,
            pending: false,
            created_at: Utc::now(),
        }
    }

    pub fn system(ticket_id: Uuid, text: String) -> Self {
        Self::new(ticket_id, &ActorIdentity::system(), text, MessagePayload::Text)
    }
}

/// Partner reference data, read-only from the orchestrator's perspective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Partner {
    pub id: String,
    pub name: String,
    pub category: String,
    pub rating: f32,
    pub promoted: bool,
    pub promotion_ends: Option<DateTime<Utc>>,
}

/// Partner entry as presented in a ranked suggestion list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedPartner {
    pub id: String,
    pub name: String,
    pub category: String,
    pub rating: f32,
    pub promoted: bool,
}

impl From<&Partner> for RankedPartner {
    fn from(p: &Partner) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            category: p.category.clone(),
            rating: p.rating,
            promoted: p.promoted,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Rescheduled,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    /// Nullable: an appointment may be booked outside any ticket.
    pub ticket_id: Option<Uuid>,
    pub client_id: String,
    pub client_name: String,
    pub client_contact: Option<String>,
    pub partner_id: String,
    pub partner_name: String,
    pub partner_category: String,
    pub scheduled_for: DateTime<Utc>,
    pub participants: Vec<String>,
    pub description: Option<String>,
    pub status: AppointmentStatus,
    pub booking_code: String,
    /// Base64 payload embedding the code and booking details for external
    /// verification (printed or scanned).
    pub encoded_payload: String,
    pub proof_image_url: Option<String>,
    /// Agent id when booked by an agent on the client's behalf.
    pub booked_by_agent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Slim appointment view embedded in the owning ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentSummary {
    pub id: Uuid,
    pub partner_name: String,
    pub scheduled_for: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub booking_code: String,
}

impl From<&Appointment> for AppointmentSummary {
    fn from(a: &Appointment) -> Self {
        Self {
            id: a.id,
            partner_name: a.partner_name.clone(),
            scheduled_for: a.scheduled_for,
            status: a.status,
            booking_code: a.booking_code.clone(),
        }
    }
}

/// Cold-storage snapshot of a terminated ticket written by the archival
/// transaction before any live data is purged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivedTicket {
    pub ticket: Ticket,
    pub conversation: Conversation,
    pub messages: Vec<ChatMessage>,
    pub terminated_by: Option<ActorRole>,
    pub archived_at: DateTime<Utc>,
}
