use std::fmt;

use portal_core::{GroupOutcome, GroupId, SourceRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutput {
    pub bytes: Vec<u8>,
    pub metadata: FetchMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMetadata {
    pub original_url: String,
    pub final_url: String,
    pub content_type: Option<String>,
    pub byte_len: u64,
}

/// One page of `/api/sources`.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcePage {
    pub sources: Vec<SourceRecord>,
    /// Entries on the page that could not be decoded as a source.
    pub skipped: usize,
    pub total_matches: usize,
    pub query_id: Option<String>,
}

impl SourcePage {
    /// Entries the service returned, decodable or not.
    pub fn received(&self) -> usize {
        self.sources.len() + self.skipped
    }
}

/// How one group's extraction ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupReport {
    pub group_id: GroupId,
    pub outcome: GroupOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.kind == FailureKind::RateLimited
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for FetchError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    /// HTTP 429.
    RateLimited,
    HttpStatus(u16),
    /// The body was not the expected JSON document.
    Decode,
    /// The service answered with `status` other than `"success"`.
    Api,
    Timeout,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::RateLimited => write!(f, "rate limited"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Decode => write!(f, "undecodable response"),
            FailureKind::Api => write!(f, "api error"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::Network => write!(f, "network error"),
        }
    }
}
