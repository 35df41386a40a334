//! Intent detection for the Jey assistant. The cascade is an explicit,
//! prioritized rule list evaluated in fixed order; the text-completion
//! service is the last-resort leaf, never a classifier.

use crate::shared::models::{ChatMessage, MessagePayload, Ticket};
use once_cell::sync::Lazy;
use regex::Regex;

/// Detected intent, ordered by evaluation priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    ExplicitCommand(Command),
    PendingFollowUp(FollowUpReply),
    AgentRequest,
    TerminationIntent,
    BookingIntent,
    PartnerRequest,
    Fallback,
}

/// Internal commands emitted by the client UI, handled deterministically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 1-based index into the last shown suggestion list.
    SelectPartner(usize),
    ConfirmBooking(bool),
    ShowAppointmentForm,
}

/// Reply classification while a "confirm termination?" question is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUpReply {
    Confirm,
    Refuse,
    Ambiguous,
}

fn keyword_set(words: &[&str]) -> Regex {
    let alternatives: Vec<String> = words.iter().map(|w| regex::escape(w)).collect();
    Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives.join("|"))).unwrap()
}

static AGENT_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    keyword_set(&[
        "agent",
        "conseiller",
        "conseillère",
        "humain",
        "vraie personne",
        "parler à quelqu'un",
        "parler a quelqu'un",
    ])
});

static TERMINATION_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    keyword_set(&[
        "terminer",
        "clôturer",
        "cloturer",
        "fermer le ticket",
        "au revoir",
        "c'est tout",
        "rien d'autre",
    ])
});

static CONFIRM_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    keyword_set(&["oui", "ok", "d'accord", "daccord", "confirme", "parfait", "yes"])
});

static REFUSE_KEYWORDS: Lazy<Regex> =
    Lazy::new(|| keyword_set(&["non", "pas encore", "annule", "annuler", "no"]));

static BOOKING_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    keyword_set(&[
        "rendez-vous",
        "rendez vous",
        "rdv",
        "réserver",
        "reserver",
        "réservation",
        "reservation",
        "booking",
    ])
});

static PARTNER_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    keyword_set(&[
        "partenaire",
        "partenaires",
        "prestataire",
        "prestataires",
        "recommande",
        "recommandation",
        "suggestion",
        "suggestions",
        "suggère",
        "suggere",
        "adresse",
    ])
});

/// Escalation reason recorded when the client asks for a human.
pub const AGENT_REQUEST_REASON: &str = "Demande Agent";

pub fn detect_intent(ticket: &Ticket, message: &ChatMessage) -> Intent {
    // (a) Explicit internal commands bypass free-text classification.
    if let MessagePayload::SystemCommand { command } = &message.payload {
        if let Some(cmd) = parse_command(command) {
            return Intent::ExplicitCommand(cmd);
        }
    }

    let text = &message.text;

    // (b) A pending "confirm termination?" question owns the next reply.
    if ticket.jey_asked_to_terminate {
        return Intent::PendingFollowUp(classify_follow_up(text));
    }

    // (c) Explicit human-agent request.
    if AGENT_KEYWORDS.is_match(text) {
        return Intent::AgentRequest;
    }

    // (d) Termination intent.
    if TERMINATION_KEYWORDS.is_match(text) {
        return Intent::TerminationIntent;
    }

    // (e) Appointment / booking.
    if BOOKING_KEYWORDS.is_match(text) {
        return Intent::BookingIntent;
    }

    // (f) Partner request: suggestion keywords, or the ticket's category
    // mentioned by name.
    if PARTNER_KEYWORDS.is_match(text) || mentions_category(ticket, text) {
        return Intent::PartnerRequest;
    }

    // (g) Everything else goes to the completion service.
    Intent::Fallback
}

pub fn classify_follow_up(text: &str) -> FollowUpReply {
    let confirms = CONFIRM_KEYWORDS.is_match(text);
    let refuses = REFUSE_KEYWORDS.is_match(text);
    match (confirms, refuses) {
        (true, false) => FollowUpReply::Confirm,
        (false, true) => FollowUpReply::Refuse,
        _ => FollowUpReply::Ambiguous,
    }
}

/// True when generated assistant text itself asks for a human hand-off.
pub fn response_triggers_escalation(text: &str) -> bool {
    AGENT_KEYWORDS.is_match(text)
}

fn mentions_category(ticket: &Ticket, text: &str) -> bool {
    let category = ticket.category.trim();
    if category.is_empty() {
        return false;
    }
    text.to_lowercase().contains(&category.to_lowercase())
}

fn parse_command(command: &str) -> Option<Command> {
    if let Some(rest) = command.strip_prefix("select-partner-") {
        return rest.parse::<usize>().ok().map(Command::SelectPartner);
    }
    match command {
        "confirm-booking-yes" => Some(Command::ConfirmBooking(true)),
        "confirm-booking-no" => Some(Command::ConfirmBooking(false)),
        "show-appointment-form" => Some(Command::ShowAppointmentForm),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{ActorIdentity, ActorRole};

    fn client() -> ActorIdentity {
        ActorIdentity {
            id: "u-1".into(),
            name: "Amira".into(),
            role: ActorRole::Client,
        }
    }

    fn ticket(category: &str) -> Ticket {
        Ticket::new(category.into(), &client(), None)
    }

    fn msg(text: &str) -> ChatMessage {
        ChatMessage::new(uuid::Uuid::nil(), &client(), text.into(), MessagePayload::Text)
    }

    fn command(cmd: &str) -> ChatMessage {
        ChatMessage::new(
            uuid::Uuid::nil(),
            &client(),
            cmd.into(),
            MessagePayload::SystemCommand { command: cmd.into() },
        )
    }

    #[test]
    fn explicit_command_beats_keywords() {
        let m = command("select-partner-2");
        assert_eq!(
            detect_intent(&ticket("Spa"), &m),
            Intent::ExplicitCommand(Command::SelectPartner(2))
        );
    }

    #[test]
    fn confirm_booking_commands_parse() {
        assert_eq!(
            detect_intent(&ticket(""), &command("confirm-booking-yes")),
            Intent::ExplicitCommand(Command::ConfirmBooking(true))
        );
        assert_eq!(
            detect_intent(&ticket(""), &command("confirm-booking-no")),
            Intent::ExplicitCommand(Command::ConfirmBooking(false))
        );
        assert_eq!(
            detect_intent(&ticket(""), &command("show-appointment-form")),
            Intent::ExplicitCommand(Command::ShowAppointmentForm)
        );
    }

    #[test]
    fn pending_follow_up_owns_the_reply() {
        let mut t = ticket("Spa");
        t.jey_asked_to_terminate = true;
        assert_eq!(
            detect_intent(&t, &msg("oui merci")),
            Intent::PendingFollowUp(FollowUpReply::Confirm)
        );
        assert_eq!(
            detect_intent(&t, &msg("non pas encore")),
            Intent::PendingFollowUp(FollowUpReply::Refuse)
        );
        assert_eq!(
            detect_intent(&t, &msg("je ne sais pas")),
            Intent::PendingFollowUp(FollowUpReply::Ambiguous)
        );
    }

    #[test]
    fn mixed_confirm_and_refuse_is_ambiguous() {
        assert_eq!(classify_follow_up("oui enfin non"), FollowUpReply::Ambiguous);
    }

    #[test]
    fn agent_request_detected() {
        assert_eq!(
            detect_intent(&ticket("Spa"), &msg("un agent s'il vous plait")),
            Intent::AgentRequest
        );
    }

    #[test]
    fn agent_request_beats_booking() {
        assert_eq!(
            detect_intent(&ticket("Spa"), &msg("je veux un agent pour un rendez-vous")),
            Intent::AgentRequest
        );
    }

    #[test]
    fn booking_intent_detected() {
        assert_eq!(
            detect_intent(&ticket("Spa"), &msg("je veux un rendez-vous")),
            Intent::BookingIntent
        );
    }

    #[test]
    fn partner_request_via_keyword_or_category_mention() {
        assert_eq!(
            detect_intent(&ticket("Spa"), &msg("une suggestion de prestataire ?")),
            Intent::PartnerRequest
        );
        assert_eq!(
            detect_intent(&ticket("Spa"), &msg("je cherche un bon spa")),
            Intent::PartnerRequest
        );
    }

    #[test]
    fn keyword_requires_word_boundary() {
        // "nonante" must not read as a refusal, "agentive" not as a request.
        assert_eq!(classify_follow_up("nonante"), FollowUpReply::Ambiguous);
        assert_eq!(detect_intent(&ticket(""), &msg("agentive")), Intent::Fallback);
    }

    #[test]
    fn plain_question_falls_back() {
        assert_eq!(
            detect_intent(&ticket("Spa"), &msg("quels sont vos horaires ?")),
            Intent::Fallback
        );
    }
}
