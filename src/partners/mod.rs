//! Partner directory access and ranking. The directory is reference data
//! consumed read-only; ranking turns it into the ordered suggestion lists the
//! assistant presents.

pub mod ranking;

use crate::shared::error::DeskError;
use crate::shared::models::Partner;
use crate::shared::state::AppState;
use async_trait::async_trait;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use log::warn;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

pub use ranking::{rank_partners, RankingOutcome, RankingQuery, MAX_SUGGESTIONS};

/// Read API over the partner reference data.
#[async_trait]
pub trait PartnerDirectory: Send + Sync {
    async fn list(&self) -> Result<Vec<Partner>, DeskError>;
}

/// In-memory directory, optionally seeded from a JSON file.
pub struct StaticPartnerDirectory {
    partners: Vec<Partner>,
}

impl StaticPartnerDirectory {
    pub fn new(partners: Vec<Partner>) -> Self {
        Self { partners }
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let partners: Vec<Partner> = serde_json::from_str(&raw)?;
        Ok(Self { partners })
    }
}

#[async_trait]
impl PartnerDirectory for StaticPartnerDirectory {
    async fn list(&self) -> Result<Vec<Partner>, DeskError> {
        Ok(self.partners.clone())
    }
}

pub fn configure_partner_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/partners/ranked", get(ranked_partners))
}

#[derive(Debug, Deserialize)]
struct RankedQuery {
    category: Option<String>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    all_categories: bool,
}

async fn ranked_partners(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RankedQuery>,
) -> Result<impl IntoResponse, DeskError> {
    let directory = state.partners.list().await?;
    let outcome = rank_partners(
        &directory,
        &RankingQuery {
            category: params.category,
            free_text: params.text,
            all_categories: params.all_categories,
        },
    );

    match outcome {
        RankingOutcome::Suggestions { list_text, partners } => Ok((
            StatusCode::OK,
            Json(serde_json::json!({ "list": list_text, "partners": partners })),
        )),
        RankingOutcome::NeedMoreInfo => {
            warn!("partner ranking query too vague to answer");
            Ok((
                StatusCode::OK,
                Json(serde_json::json!({ "list": "", "partners": [] })),
            ))
        }
    }
}
