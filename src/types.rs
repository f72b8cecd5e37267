use crate::constants;
use crate::error::Result;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Raw permit record exactly as returned by the source API
pub type RawRecord = Map<String, Value>;

/// A permit record that passed the silver-layer checks.
///
/// Fields the cleaner does not touch are carried through in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanedRecord {
    #[serde(rename = "permit_")]
    pub permit_id: String,
    pub permit_type: String,
    pub work_description: Option<String>,
    pub issue_date: Option<NaiveDateTime>,
    pub community_area: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One row of a gold view: a grouping key and how many silver records fall under it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewRow<K> {
    pub key: K,
    pub count: u64,
}

/// The three gold views produced by the aggregate stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GoldView {
    PermitDistribution,
    CommunityDistribution,
    IssueTrend,
}

impl GoldView {
    pub const ALL: [GoldView; 3] = [
        GoldView::PermitDistribution,
        GoldView::CommunityDistribution,
        GoldView::IssueTrend,
    ];

    pub fn collection(&self) -> &'static str {
        match self {
            GoldView::PermitDistribution => constants::GOLD_PERMIT_DISTRIBUTION,
            GoldView::CommunityDistribution => constants::GOLD_COMMUNITY_DISTRIBUTION,
            GoldView::IssueTrend => constants::GOLD_ISSUE_TREND,
        }
    }

    pub fn chart_file(&self) -> &'static str {
        match self {
            GoldView::PermitDistribution => constants::PERMIT_DISTRIBUTION_CHART,
            GoldView::CommunityDistribution => constants::COMMUNITY_DISTRIBUTION_CHART,
            GoldView::IssueTrend => constants::ISSUE_TREND_CHART,
        }
    }
}

impl std::fmt::Display for GoldView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            GoldView::PermitDistribution => "permit_distribution",
            GoldView::CommunityDistribution => "community_distribution",
            GoldView::IssueTrend => "issue_trend",
        };
        f.write_str(name)
    }
}

/// A paginated collection endpoint the ingest stage can read from
#[async_trait::async_trait]
pub trait PageSource: Send + Sync {
    /// Identifier used in logs and metrics
    fn source_name(&self) -> &str;

    /// Fetch one page of records starting at `offset`
    async fn fetch_page(&self, limit: usize, offset: usize) -> Result<Vec<RawRecord>>;
}
