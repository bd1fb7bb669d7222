//! Drives the pager state machine against the portal and enriches every page.

use std::collections::VecDeque;

use portal_core::{
    update, Deriver, EnrichedRecord, GroupId, GroupOutcome, PageRequest, Pager, PagerEffect,
    PagerMsg, RetryPolicy,
};
use portal_logging::{portal_error, portal_info, portal_warn};

use crate::portal::DEFAULT_PAGE_SIZE;
use crate::{GroupReport, Portal, SourceQuery};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionSettings {
    pub group_ids: Vec<GroupId>,
    pub num_per_page: u32,
    pub saved_after: Option<String>,
    pub saved_before: Option<String>,
    pub retry: RetryPolicy,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            group_ids: Vec::new(),
            num_per_page: DEFAULT_PAGE_SIZE,
            saved_after: None,
            saved_before: None,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtractionReport {
    /// Rows of every group, in group order then page order.
    pub rows: Vec<EnrichedRecord>,
    pub groups: Vec<GroupReport>,
}

impl ExtractionReport {
    pub fn exhausted_groups(&self) -> impl Iterator<Item = GroupId> + '_ {
        self.groups.iter().filter_map(|report| match report.outcome {
            GroupOutcome::ExhaustedRetries { .. } => Some(report.group_id),
            GroupOutcome::Completed { .. } => None,
        })
    }
}

/// Sequential extraction over the configured groups.
pub struct Extractor<'a> {
    portal: &'a dyn Portal,
    deriver: &'a Deriver,
    settings: &'a ExtractionSettings,
}

impl<'a> Extractor<'a> {
    pub fn new(portal: &'a dyn Portal, deriver: &'a Deriver, settings: &'a ExtractionSettings) -> Self {
        Self {
            portal,
            deriver,
            settings,
        }
    }

    pub async fn run(&self) -> ExtractionReport {
        let mut report = ExtractionReport::default();
        for &group_id in &self.settings.group_ids {
            portal_info!("Extracting sources of group {}", group_id);
            let outcome = self.run_group(group_id, &mut report.rows).await;
            match &outcome {
                GroupOutcome::Completed { retrieved } => {
                    portal_info!("Group {}: retrieved {} sources", group_id, retrieved)
                }
                GroupOutcome::ExhaustedRetries {
                    retrieved,
                    last_error,
                } => portal_error!(
                    "Group {}: giving up after {} consecutive errors ({} sources kept): {}",
                    group_id,
                    self.settings.retry.max_retries,
                    retrieved,
                    last_error
                ),
            }
            report.groups.push(GroupReport { group_id, outcome });
        }
        report
    }

    async fn run_group(&self, group_id: GroupId, rows: &mut Vec<EnrichedRecord>) -> GroupOutcome {
        let mut pager = Pager::new(group_id, self.settings.retry.clone());
        let mut inbox = VecDeque::from([PagerMsg::Start]);

        while let Some(msg) = inbox.pop_front() {
            let (next, effects) = update(pager, msg);
            pager = next;
            for effect in effects {
                match effect {
                    PagerEffect::Fetch(request) => {
                        inbox.push_back(self.fetch_page(&request, rows).await);
                    }
                    PagerEffect::Sleep(duration) => {
                        tokio::time::sleep(duration).await;
                        inbox.push_back(PagerMsg::BackoffElapsed);
                    }
                    PagerEffect::Finish(outcome) => return outcome,
                }
            }
        }

        // The pager always finishes; reaching here means it stalled.
        GroupOutcome::ExhaustedRetries {
            retrieved: pager.pagination().retrieved,
            last_error: format!("pager stalled in phase {:?}", pager.phase()),
        }
    }

    async fn fetch_page(&self, request: &PageRequest, rows: &mut Vec<EnrichedRecord>) -> PagerMsg {
        let query = SourceQuery {
            group_id: request.group_id,
            page_number: request.page_number,
            num_per_page: self.settings.num_per_page,
            query_id: request.query_id.clone(),
            saved_after: self.settings.saved_after.clone(),
            saved_before: self.settings.saved_before.clone(),
        };

        match self.portal.list_sources(&query).await {
            Ok(page) => {
                portal_info!(
                    "Group {} page {}: {} sources of {}",
                    request.group_id,
                    request.page_number,
                    page.received(),
                    page.total_matches
                );
                rows.extend(
                    page.sources
                        .iter()
                        .map(|record| self.deriver.enrich(record, request.group_id)),
                );
                PagerMsg::PageReceived {
                    received: page.received(),
                    total_matches: page.total_matches,
                    query_id: page.query_id,
                }
            }
            Err(err) if err.is_rate_limited() => {
                portal_info!("Group {}: rate limited, backing off", request.group_id);
                PagerMsg::RateLimited
            }
            Err(err) => {
                portal_warn!(
                    "Group {} page {}: {}",
                    request.group_id,
                    request.page_number,
                    err
                );
                PagerMsg::Failed {
                    message: err.to_string(),
                }
            }
        }
    }
}
