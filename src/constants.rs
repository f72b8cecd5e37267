/// Collection and field names shared by every stage.
/// Stages talk to each other only through these collections, so the names are the contract.

// Collections
pub const BRONZE_COLLECTION: &str = "bronze_permits";
pub const SILVER_COLLECTION: &str = "silver_permits";
pub const GOLD_PERMIT_DISTRIBUTION: &str = "gold_permit_distribution";
pub const GOLD_COMMUNITY_DISTRIBUTION: &str = "gold_community_distribution";
pub const GOLD_ISSUE_TREND: &str = "gold_issue_trend";

// Source dataset: City of Chicago building permits (Socrata)
pub const DEFAULT_ENDPOINT: &str = "https://data.cityofchicago.org/resource/ydr8-5enu.json";
pub const DEFAULT_PAGE_SIZE: usize = 1000;
pub const DEFAULT_TARGET_COUNT: usize = 100_000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

// Record fields. The dataset calls its permit identifier `permit_`.
pub const PERMIT_ID_FIELD: &str = "permit_";
pub const PERMIT_TYPE_FIELD: &str = "permit_type";
pub const ISSUE_DATE_FIELD: &str = "issue_date";
pub const WORK_DESCRIPTION_FIELD: &str = "work_description";
pub const COMMUNITY_AREA_FIELD: &str = "community_area";

/// Fields a raw record must carry (present and non-null) to reach the silver store
pub const REQUIRED_FIELDS: [&str; 3] = [PERMIT_ID_FIELD, PERMIT_TYPE_FIELD, ISSUE_DATE_FIELD];

// Report output
pub const PERMIT_DISTRIBUTION_CHART: &str = "permit_distribution.svg";
pub const COMMUNITY_DISTRIBUTION_CHART: &str = "community_distribution.svg";
pub const ISSUE_TREND_CHART: &str = "issue_trend.svg";
pub const DEFAULT_TOP_N: usize = 10;

