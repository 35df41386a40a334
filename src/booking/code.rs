//! Booking-code generation and payload encoding. The code travels outside
//! the platform (printed or scanned), so its shape is fixed: `ER`, seven
//! random alphanumerics, then up to two initials taken from the partner name.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const BOOKING_CODE_PREFIX: &str = "ER";
const RANDOM_LEN: usize = 7;
const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub fn generate_booking_code(partner_name: &str) -> String {
    let mut rng = rand::thread_rng();
    let random: String = (0..RANDOM_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..CODE_CHARSET.len());
            CODE_CHARSET[idx] as char
        })
        .collect();
    format!(
        "{}{}{}",
        BOOKING_CODE_PREFIX,
        random,
        partner_initials(partner_name)
    )
}

fn partner_initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().find(|c| c.is_alphabetic()))
        .take(2)
        .flat_map(|c| c.to_uppercase())
        .collect()
}

/// Structured booking facts embedded in the code's companion payload, used
/// by external verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingPayload {
    pub code: String,
    pub partner_name: String,
    pub partner_category: String,
    pub participants: Vec<String>,
    pub scheduled_for: String,
    pub description: Option<String>,
    pub booked_by: String,
    pub ticket_id: Option<Uuid>,
}

pub fn encode_booking_payload(
    code: &str,
    partner_name: &str,
    partner_category: &str,
    participants: &[String],
    scheduled_for: DateTime<Utc>,
    description: Option<&str>,
    booked_by: &str,
    ticket_id: Option<Uuid>,
) -> anyhow::Result<String> {
    let payload = BookingPayload {
        code: code.to_string(),
        partner_name: partner_name.to_string(),
        partner_category: partner_category.to_string(),
        participants: participants.to_vec(),
        scheduled_for: scheduled_for.format("%Y-%m-%d %H:%M").to_string(),
        description: description.map(str::to_string),
        booked_by: booked_by.to_string(),
        ticket_id,
    };
    Ok(BASE64.encode(serde_json::to_vec(&payload)?))
}

pub fn decode_booking_payload(encoded: &str) -> anyhow::Result<BookingPayload> {
    let raw = BASE64.decode(encoded)?;
    Ok(serde_json::from_slice(&raw)?)
}
