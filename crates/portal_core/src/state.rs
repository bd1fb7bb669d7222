use std::time::Duration;

use crate::{GroupId, PageRequest};

/// Where a group's paging currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PagerPhase {
    /// Created, no request issued yet.
    #[default]
    Idle,
    Requesting,
    RateLimited,
    ServerError,
    /// The last page arrived and the next one has been requested.
    Success,
    ExhaustedRetries,
    Done,
}

impl PagerPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, PagerPhase::ExhaustedRetries | PagerPhase::Done)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Consecutive application errors tolerated before the group is abandoned.
    pub max_retries: u32,
    /// Wait after HTTP 429; does not consume the budget.
    pub rate_limit_backoff: Duration,
    /// Wait after an application error.
    pub error_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            rate_limit_backoff: Duration::from_secs(1),
            error_backoff: Duration::from_secs(5),
        }
    }
}

/// Pagination bookkeeping for one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationState {
    pub page_number: u32,
    pub query_id: Option<String>,
    pub retrieved: usize,
    /// Unknown until the first page arrives.
    pub total_matches: Option<usize>,
}

impl Default for PaginationState {
    fn default() -> Self {
        Self {
            page_number: 1,
            query_id: None,
            retrieved: 0,
            total_matches: None,
        }
    }
}

/// Retry and pagination state machine for one group; see [`crate::update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pager {
    group_id: GroupId,
    policy: RetryPolicy,
    retries_remaining: u32,
    pagination: PaginationState,
    phase: PagerPhase,
    last_error: Option<String>,
}

impl Pager {
    pub fn new(group_id: GroupId, policy: RetryPolicy) -> Self {
        Self {
            group_id,
            retries_remaining: policy.max_retries,
            policy,
            pagination: PaginationState::default(),
            phase: PagerPhase::Idle,
            last_error: None,
        }
    }

    pub fn group_id(&self) -> GroupId {
        self.group_id
    }

    pub fn phase(&self) -> PagerPhase {
        self.phase
    }

    pub fn pagination(&self) -> &PaginationState {
        &self.pagination
    }

    pub fn retries_remaining(&self) -> u32 {
        self.retries_remaining
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// The request for the current page.
    pub fn request(&self) -> PageRequest {
        PageRequest {
            group_id: self.group_id,
            page_number: self.pagination.page_number,
            query_id: self.pagination.query_id.clone(),
        }
    }

    pub(crate) fn set_phase(&mut self, phase: PagerPhase) {
        self.phase = phase;
    }

    pub(crate) fn reset_budget(&mut self) {
        self.retries_remaining = self.policy.max_retries;
        self.last_error = None;
    }

    /// Consumes one retry; returns the budget left.
    pub(crate) fn spend_retry(&mut self, message: String) -> u32 {
        self.retries_remaining = self.retries_remaining.saturating_sub(1);
        self.last_error = Some(message);
        self.retries_remaining
    }

    pub(crate) fn record_page(
        &mut self,
        received: usize,
        total_matches: usize,
        query_id: Option<String>,
    ) {
        self.pagination.retrieved += received;
        self.pagination.total_matches = Some(total_matches);
        if query_id.is_some() {
            self.pagination.query_id = query_id;
        }
    }

    pub(crate) fn advance_page(&mut self) {
        self.pagination.page_number += 1;
    }
}
