//! Partner filtering and ranking. Pure over a slice of directory entries so
//! the ordering rules stay deterministic and testable.

use crate::shared::models::{Partner, RankedPartner};

/// How many suggestions are presented to the client.
pub const MAX_SUGGESTIONS: usize = 3;

#[derive(Debug, Clone, Default)]
pub struct RankingQuery {
    /// Explicit category, e.g. the ticket's category or a tapped chip.
    pub category: Option<String>,
    /// Latest client message, mined for partner names and keywords.
    pub free_text: String,
    /// Ignore the category filter and consider the whole directory.
    pub all_categories: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RankingOutcome {
    /// Ordered suggestions plus the numbered list shown to the client. A
    /// later `select-partner-N` command resolves against this same order.
    Suggestions {
        list_text: String,
        partners: Vec<RankedPartner>,
    },
    /// Nothing matched and no category was explicit: ask instead of guessing.
    NeedMoreInfo,
}

pub fn rank_partners(directory: &[Partner], query: &RankingQuery) -> RankingOutcome {
    let text_lower = query.free_text.to_lowercase();
    let category_lower = query.category.as_ref().map(|c| c.to_lowercase());

    let candidates: Vec<&Partner> = directory
        .iter()
        .filter(|p| {
            if query.all_categories {
                return true;
            }
            let category_match = category_lower
                .as_ref()
                .map(|c| p.category.to_lowercase() == *c)
                .unwrap_or(false);
            let name_mentioned =
                !text_lower.is_empty() && text_lower.contains(&p.name.to_lowercase());
            category_match || name_mentioned
        })
        .collect();

    if candidates.is_empty() && category_lower.is_none() {
        return RankingOutcome::NeedMoreInfo;
    }

    let tokens: Vec<String> = text_lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 2)
        .map(str::to_string)
        .collect();

    let mut filtered: Vec<&Partner> = if tokens.is_empty() {
        candidates.clone()
    } else {
        candidates
            .iter()
            .copied()
            .filter(|p| {
                let name = p.name.to_lowercase();
                let category = p.category.to_lowercase();
                tokens.iter().any(|t| name.contains(t) || category.contains(t))
            })
            .collect()
    };

    // Keyword over-filtering must never empty an explicit category's results.
    if filtered.is_empty() && category_lower.is_some() {
        filtered = candidates;
    }

    if filtered.is_empty() {
        return RankingOutcome::NeedMoreInfo;
    }

    // Stable: promoted first, then best rated.
    filtered.sort_by(|a, b| {
        b.promoted
            .cmp(&a.promoted)
            .then(b.rating.partial_cmp(&a.rating).unwrap_or(std::cmp::Ordering::Equal))
    });
    filtered.truncate(MAX_SUGGESTIONS);

    let partners: Vec<RankedPartner> = filtered.iter().map(|p| RankedPartner::from(*p)).collect();
    let list_text = render_list(&partners);
    RankingOutcome::Suggestions { list_text, partners }
}

fn render_list(partners: &[RankedPartner]) -> String {
    let mut lines = Vec::with_capacity(partners.len());
    for (i, p) in partners.iter().enumerate() {
        let mut line = format!("{}. {} ({}) - {:.1}/5", i + 1, p.name, p.category, p.rating);
        if p.promoted {
            line.push_str(" *");
        }
        lines.push(line);
    }
    lines.join("\n")
}
