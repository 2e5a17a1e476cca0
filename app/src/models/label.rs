/// Classified address totals for one flow source, as reported after a
/// contracts run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowSourceSummary {
    pub flow_source: String,
    pub total: i64,
    pub contracts: i64,
    pub eoas: i64,
}

/// Flow source assigned to addresses registered from the swap relation.
pub const DEFAULT_FLOW_SOURCE: &str = "Other";
