//! Optimistic-message reconciliation. A client appends a tentative message
//! with a locally generated id; the store later confirms it with a server id
//! and timestamp. Merging the two views is a pure function so the timeline
//! logic can be tested without any transport.

use crate::shared::models::ChatMessage;
use chrono::Duration;

/// Default tolerance between an optimistic creation time and its confirmed
/// counterpart.
pub const DEFAULT_RECONCILE_WINDOW_SECS: i64 = 5;

/// Merge server-confirmed messages with still-pending local ones.
///
/// A pending message matches a confirmed one when sender, text and payload
/// kind are equal and the creation times differ by less than `window`. On a
/// match the confirmed copy takes the pending entry's place, so the bubble
/// does not duplicate or jump. Pending entries with no confirmed counterpart
/// survive; confirmed messages with no pending counterpart append as new.
/// The merged list is re-sorted ascending by creation time.
pub fn reconcile(
    server: &[ChatMessage],
    pending: &[ChatMessage],
    window: Duration,
) -> Vec<ChatMessage> {
    let mut merged: Vec<ChatMessage> = Vec::with_capacity(server.len() + pending.len());
    let mut unmatched_pending: Vec<ChatMessage> = pending.to_vec();

    for confirmed in server {
        let slot = unmatched_pending
            .iter()
            .position(|p| is_counterpart(p, confirmed, window));
        if let Some(idx) = slot {
            unmatched_pending.remove(idx);
        }
        merged.push(confirmed.clone());
    }

    merged.extend(unmatched_pending);
    merged.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    merged
}

fn is_counterpart(pending: &ChatMessage, confirmed: &ChatMessage, window: Duration) -> bool {
    if pending.sender_id != confirmed.sender_id
        || pending.text != confirmed.text
        || pending.payload.kind() != confirmed.payload.kind()
    {
        return false;
    }
    let delta = (confirmed.created_at - pending.created_at).abs();
    delta <= window
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{ActorIdentity, ActorRole, MessagePayload};
    use chrono::Utc;
    use uuid::Uuid;

    fn sender() -> ActorIdentity {
        ActorIdentity {
            id: "u-1".into(),
            name: "Amira".into(),
            role: ActorRole::Client,
        }
    }

    fn msg(text: &str, offset_secs: i64, pending: bool) -> ChatMessage {
        let mut m = ChatMessage::new(
            Uuid::nil(),
            &sender(),
            text.into(),
            MessagePayload::Text,
        );
        m.created_at = Utc::now() + Duration::seconds(offset_secs);
        m.pending = pending;
        m
    }

    #[test]
    fn confirmed_counterpart_replaces_pending_entry() {
        let pending = vec![msg("bonjour", 0, true)];
        let confirmed = vec![msg("bonjour", 2, false)];

        let merged = reconcile(&confirmed, &pending, Duration::seconds(5));
        assert_eq!(merged.len(), 1);
        assert!(!merged[0].pending);
        assert_eq!(merged[0].id, confirmed[0].id);
    }

    #[test]
    fn confirmed_outside_window_appends_as_new() {
        let pending = vec![msg("bonjour", 0, true)];
        let confirmed = vec![msg("bonjour", 30, false)];

        let merged = reconcile(&confirmed, &pending, Duration::seconds(5));
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn different_text_never_matches() {
        let pending = vec![msg("bonjour", 0, true)];
        let confirmed = vec![msg("salut", 1, false)];

        let merged = reconcile(&confirmed, &pending, Duration::seconds(5));
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn merged_list_is_sorted_by_creation_time() {
        let pending = vec![msg("trois", 10, true)];
        let confirmed = vec![msg("deux", 5, false), msg("un", 1, false)];

        let merged = reconcile(&confirmed, &pending, Duration::seconds(5));
        let texts: Vec<&str> = merged.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["un", "deux", "trois"]);
    }

    #[test]
    fn one_confirmed_consumes_only_one_pending() {
        // Two identical optimistic sends within the window: a single confirmed
        // copy must supersede exactly one of them.
        let pending = vec![msg("ok", 0, true), msg("ok", 1, true)];
        let confirmed = vec![msg("ok", 2, false)];

        let merged = reconcile(&confirmed, &pending, Duration::seconds(5));
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.iter().filter(|m| m.pending).count(), 1);
    }
}
