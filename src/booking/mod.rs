//! Appointment booking. One domain-level operation with an explicit step
//! order: code, payload, record + mirror, counters, then the best-effort
//! confirmation message. Steps 1-4 are all-or-nothing; the chat message is
//! not (the booking is the durable fact).

pub mod code;

use crate::notify::{dispatch, NotificationEvent};
use crate::shared::error::DeskError;
use crate::shared::models::{
    ActorIdentity, Appointment, AppointmentStatus, AppointmentSummary, ChatMessage,
};
use crate::shared::state::AppState;
use crate::storage::agent_booking_counter;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use log::{error, info};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

pub use code::{decode_booking_payload, encode_booking_payload, generate_booking_code};

pub fn configure_booking_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/appointments", post(create_appointment))
        .route(
            "/api/appointments/{appointment_id}",
            put(edit_appointment).delete(remove_appointment),
        )
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookAppointmentRequest {
    pub ticket_id: Option<Uuid>,
    pub client: ActorIdentity,
    pub client_contact: Option<String>,
    pub partner_id: String,
    pub scheduled_for: DateTime<Utc>,
    pub participants: Vec<String>,
    pub description: Option<String>,
    pub proof_image_url: Option<String>,
    /// Set when an agent books on the client's behalf.
    pub booked_by_agent_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditAppointmentRequest {
    pub partner_id: Option<String>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub participants: Option<Vec<String>>,
    pub description: Option<String>,
    pub proof_image_url: Option<String>,
}

/// Book a new appointment. Fails atomically: no partial appointment without
/// its mirror, no counter bump without the record.
pub async fn book_appointment(
    state: &Arc<AppState>,
    request: BookAppointmentRequest,
) -> Result<Appointment, DeskError> {
    if request.participants.is_empty() {
        return Err(DeskError::Validation(
            "an appointment needs at least one participant".to_string(),
        ));
    }

    let partner = find_partner(state, &request.partner_id).await?;

    // Steps 1-2: code and external-verification payload.
    let booking_code = generate_booking_code(&partner.name);
    let encoded_payload = encode_booking_payload(
        &booking_code,
        &partner.name,
        &partner.category,
        &request.participants,
        request.scheduled_for,
        request.description.as_deref(),
        &request.client.id,
        request.ticket_id,
    )
    .map_err(|e| DeskError::BookingTransactionFailed(e.to_string()))?;

    let now = Utc::now();
    let appointment = Appointment {
        id: Uuid::new_v4(),
        ticket_id: request.ticket_id,
        client_id: request.client.id.clone(),
        client_name: request.client.name.clone(),
        client_contact: request.client_contact.clone(),
        partner_id: partner.id.clone(),
        partner_name: partner.name.clone(),
        partner_category: partner.category.clone(),
        scheduled_for: request.scheduled_for,
        participants: request.participants.clone(),
        description: request.description.clone(),
        status: AppointmentStatus::Scheduled,
        booking_code: booking_code.clone(),
        encoded_payload,
        proof_image_url: request.proof_image_url.clone(),
        booked_by_agent_id: request.booked_by_agent_id.clone(),
        created_at: now,
        updated_at: now,
    };

    // Step 3: record and partner mirror, together.
    state
        .appointments
        .upsert(appointment.clone(), None)
        .await
        .map_err(|e| DeskError::BookingTransactionFailed(e.to_string()))?;

    // Step 4: agent lifetime counter, compensated on failure.
    if let Some(agent_id) = &request.booked_by_agent_id {
        if let Err(e) = state
            .counters
            .increment(&agent_booking_counter(agent_id))
            .await
        {
            if let Err(del) = state.appointments.delete(appointment.id).await {
                error!(
                    "compensating delete failed for appointment {}: {}",
                    appointment.id, del
                );
            }
            return Err(DeskError::BookingTransactionFailed(e.to_string()));
        }
    }

    info!(
        "appointment {} booked with {} (code {})",
        appointment.id, partner.name, booking_code
    );

    // Step 5: best-effort ticket side effects.
    if let Some(ticket_id) = request.ticket_id {
        attach_to_ticket(state, ticket_id, &appointment).await;
    }

    dispatch(
        state.notifier.as_ref(),
        NotificationEvent::AppointmentBooked {
            appointment_id: appointment.id,
            partner_name: partner.name.clone(),
            booking_code,
        },
    )
    .await;

    Ok(appointment)
}

/// Edit an existing appointment. A partner change migrates the mirror in the
/// same store step, so one appointment never owns two mirrors.
pub async fn edit_appointment_record(
    state: &Arc<AppState>,
    appointment_id: Uuid,
    request: EditAppointmentRequest,
) -> Result<Appointment, DeskError> {
    let mut appointment = state.appointments.get(appointment_id).await?;
    let previous_partner_id = appointment.partner_id.clone();

    if let Some(partner_id) = &request.partner_id {
        if partner_id != &appointment.partner_id {
            let partner = find_partner(state, partner_id).await?;
            appointment.partner_id = partner.id;
            appointment.partner_name = partner.name;
            appointment.partner_category = partner.category;
        }
    }
    if let Some(when) = request.scheduled_for {
        appointment.scheduled_for = when;
    }
    if let Some(participants) = request.participants {
        if participants.is_empty() {
            return Err(DeskError::Validation(
                "an appointment needs at least one participant".to_string(),
            ));
        }
        appointment.participants = participants;
    }
    if request.description.is_some() {
        appointment.description = request.description;
    }
    if request.proof_image_url.is_some() {
        appointment.proof_image_url = request.proof_image_url;
    }

    appointment.status = AppointmentStatus::Rescheduled;
    appointment.updated_at = Utc::now();
    appointment.encoded_payload = encode_booking_payload(
        &appointment.booking_code,
        &appointment.partner_name,
        &appointment.partner_category,
        &appointment.participants,
        appointment.scheduled_for,
        appointment.description.as_deref(),
        &appointment.client_id,
        appointment.ticket_id,
    )
    .map_err(|e| DeskError::BookingTransactionFailed(e.to_string()))?;

    state
        .appointments
        .upsert(appointment.clone(), Some(previous_partner_id))
        .await
        .map_err(|e| DeskError::BookingTransactionFailed(e.to_string()))?;

    if let Some(ticket_id) = appointment.ticket_id {
        refresh_ticket_summary(state, ticket_id, &appointment).await;
    }

    Ok(appointment)
}

/// Paired delete of the appointment and its mirror, plus the ticket summary.
pub async fn delete_appointment_record(
    state: &Arc<AppState>,
    appointment_id: Uuid,
) -> Result<(), DeskError> {
    let appointment = state.appointments.get(appointment_id).await?;
    state.appointments.delete(appointment_id).await?;

    if let Some(ticket_id) = appointment.ticket_id {
        let _guard = state.ticket_lock(ticket_id).await;
        match state.tickets.get(ticket_id).await {
            Ok(mut ticket) => {
                ticket.appointments.retain(|a| a.id != appointment_id);
                ticket.last_updated_at = Utc::now();
                if let Err(e) = state.tickets.update_ticket(ticket).await {
                    error!("failed to detach appointment from ticket {}: {}", ticket_id, e);
                }
            }
            Err(e) => error!("ticket {} lookup failed on appointment delete: {}", ticket_id, e),
        }
    }
    Ok(())
}

async fn find_partner(
    state: &Arc<AppState>,
    partner_id: &str,
) -> Result<crate::shared::models::Partner, DeskError> {
    state
        .partners
        .list()
        .await?
        .into_iter()
        .find(|p| p.id == partner_id)
        .ok_or_else(|| DeskError::Validation(format!("unknown partner {}", partner_id)))
}

/// Denormalize the booking into the owning ticket and drop the confirmation
/// message. Failures here are logged only; the booking already committed.
async fn attach_to_ticket(state: &Arc<AppState>, ticket_id: Uuid, appointment: &Appointment) {
    let _guard = state.ticket_lock(ticket_id).await;

    match state.tickets.get(ticket_id).await {
        Ok(mut ticket) => {
            ticket.appointments.push(AppointmentSummary::from(appointment));
            ticket.last_updated_at = Utc::now();
            if let Err(e) = state.tickets.update_ticket(ticket).await {
                error!("failed to attach appointment to ticket {}: {}", ticket_id, e);
                return;
            }
        }
        Err(e) => {
            error!("ticket {} lookup failed after booking: {}", ticket_id, e);
            return;
        }
    }

    let confirmation = ChatMessage::system(
        ticket_id,
        format!(
            "Rendez-vous confirmé avec {} le {} (code {}).",
            appointment.partner_name,
            appointment.scheduled_for.format("%d/%m/%Y %H:%M"),
            appointment.booking_code
        ),
    );
    if let Err(e) = state.messages.append(confirmation).await {
        error!(
            "failed to append booking confirmation to ticket {}: {}",
            ticket_id, e
        );
    }
}

async fn refresh_ticket_summary(state: &Arc<AppState>, ticket_id: Uuid, appointment: &Appointment) {
    let _guard = state.ticket_lock(ticket_id).await;
    match state.tickets.get(ticket_id).await {
        Ok(mut ticket) => {
            if let Some(slot) = ticket.appointments.iter_mut().find(|a| a.id == appointment.id) {
                *slot = AppointmentSummary::from(appointment);
            }
            ticket.last_updated_at = Utc::now();
            if let Err(e) = state.tickets.update_ticket(ticket).await {
                error!("failed to refresh appointment summary on {}: {}", ticket_id, e);
            }
        }
        Err(e) => error!("ticket {} lookup failed on appointment edit: {}", ticket_id, e),
    }
}

async fn create_appointment(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<impl IntoResponse, DeskError> {
    let appointment = book_appointment(&state, request).await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

async fn edit_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<EditAppointmentRequest>,
) -> Result<impl IntoResponse, DeskError> {
    let appointment = edit_appointment_record(&state, appointment_id, request).await?;
    Ok((StatusCode::OK, Json(appointment)))
}

async fn remove_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<impl IntoResponse, DeskError> {
    delete_appointment_record(&state, appointment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
