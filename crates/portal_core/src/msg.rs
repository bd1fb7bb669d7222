/// Inputs to the pager state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PagerMsg {
    /// Begin paging a group from page 1.
    Start,
    /// The portal answered HTTP 429.
    RateLimited,
    /// The request failed: non-success status in the body, transport error or undecodable reply.
    Failed { message: String },
    /// A page arrived; its records have already been taken by the driver.
    PageReceived {
        received: usize,
        total_matches: usize,
        query_id: Option<String>,
    },
    /// A requested backoff sleep has finished.
    BackoffElapsed,
}
