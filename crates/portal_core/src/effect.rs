use std::time::Duration;

use crate::GroupId;

/// Work the driver must perform on behalf of the pager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PagerEffect {
    Fetch(PageRequest),
    Sleep(Duration),
    Finish(GroupOutcome),
}

/// One list-sources request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub group_id: GroupId,
    /// 1-based.
    pub page_number: u32,
    /// Token issued with the first page; echoed back on every later page.
    pub query_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupOutcome {
    /// All matches retrieved.
    Completed { retrieved: usize },
    /// The retry budget ran out; pages fetched before that are kept.
    ExhaustedRetries { retrieved: usize, last_error: String },
}
