//! System-prompt construction for the fallback completion call. The prompt
//! pins the assistant to the platform's own partner directory: no invented
//! partners, no outside businesses.

use crate::llm::{PromptMessage, PromptRole};
use crate::shared::models::{ChatMessage, Partner, ASSISTANT_SENDER_ID, SYSTEM_SENDER_ID};

pub fn build_system_prompt(partners: &[Partner]) -> String {
    let mut prompt = String::from(
        "Tu es Jey, l'assistant du service client de la plateforme. \
         Tu réponds en français, de façon brève et polie. \
         Tu ne peux recommander que les partenaires listés ci-dessous. \
         N'invente jamais de partenaire et ne mentionne aucune entreprise \
         ou service extérieur à la plateforme. Si la question sort de ton \
         périmètre, propose de transférer à un agent.\n\nPartenaires:\n",
    );
    if partners.is_empty() {
        prompt.push_str("(aucun partenaire disponible)\n");
    }
    for p in partners {
        prompt.push_str(&format!("- {} ({}) note {:.1}/5\n", p.name, p.category, p.rating));
    }
    prompt
}

/// Map the ticket's message log to role-tagged completion history: assistant
/// for Jey's own messages, user for everyone else; platform system messages
/// are skipped.
pub fn build_history(messages: &[ChatMessage]) -> Vec<PromptMessage> {
    messages
        .iter()
        .filter(|m| m.sender_id != SYSTEM_SENDER_ID)
        .map(|m| PromptMessage {
            role: if m.sender_id == ASSISTANT_SENDER_ID {
                PromptRole::Assistant
            } else {
                PromptRole::User
            },
            content: m.text.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{ActorIdentity, ActorRole, MessagePayload};
    use uuid::Uuid;

    #[test]
    fn prompt_enumerates_directory_only() {
        let partners = vec![Partner {
            id: "p1".into(),
            name: "Le Spa".into(),
            category: "Spa".into(),
            rating: 4.5,
            promoted: true,
            promotion_ends: None,
        }];
        let prompt = build_system_prompt(&partners);
        assert!(prompt.contains("Le Spa"));
        assert!(prompt.contains("N'invente jamais de partenaire"));
    }

    #[test]
    fn history_tags_roles_and_skips_system() {
        let ticket_id = Uuid::new_v4();
        let client = ActorIdentity {
            id: "u-1".into(),
            name: "Amira".into(),
            role: ActorRole::Client,
        };
        let messages = vec![
            ChatMessage::system(ticket_id, "ticket créé".into()),
            ChatMessage::new(ticket_id, &client, "bonjour".into(), MessagePayload::Text),
            ChatMessage::new(
                ticket_id,
                &ActorIdentity::assistant(),
                "Bonjour, je suis Jey.".into(),
                MessagePayload::Text,
            ),
        ];
        let history = build_history(&messages);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, PromptRole::User);
        assert_eq!(history[1].role, PromptRole::Assistant);
    }
}
