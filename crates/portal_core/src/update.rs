use portal_logging::{portal_debug, portal_warn};

use crate::{GroupOutcome, Pager, PagerEffect, PagerMsg, PagerPhase};

/// Pure update function: applies a message to the pager and returns the effects to run.
///
/// Messages arriving after the pager reached a terminal phase are ignored.
pub fn update(mut pager: Pager, msg: PagerMsg) -> (Pager, Vec<PagerEffect>) {
    if pager.phase().is_terminal() {
        return (pager, Vec::new());
    }

    let effects = match msg {
        PagerMsg::Start => {
            if pager.phase() != PagerPhase::Idle {
                return (pager, Vec::new());
            }
            if pager.retries_remaining() == 0 {
                pager.set_phase(PagerPhase::ExhaustedRetries);
                vec![exhausted(&pager, "retry budget is zero".to_string())]
            } else {
                pager.set_phase(PagerPhase::Requesting);
                vec![PagerEffect::Fetch(pager.request())]
            }
        }
        PagerMsg::RateLimited => {
            pager.set_phase(PagerPhase::RateLimited);
            vec![PagerEffect::Sleep(pager.policy().rate_limit_backoff)]
        }
        PagerMsg::Failed { message } => {
            let remaining = pager.spend_retry(message.clone());
            if remaining == 0 {
                pager.set_phase(PagerPhase::ExhaustedRetries);
                vec![exhausted(&pager, message)]
            } else {
                portal_debug!(
                    "Group {}: {} retries left after error: {}",
                    pager.group_id(),
                    remaining,
                    message
                );
                pager.set_phase(PagerPhase::ServerError);
                vec![PagerEffect::Sleep(pager.policy().error_backoff)]
            }
        }
        PagerMsg::PageReceived {
            received,
            total_matches,
            query_id,
        } => {
            pager.reset_budget();
            pager.record_page(received, total_matches, query_id);
            let retrieved = pager.pagination().retrieved;

            if retrieved >= total_matches {
                pager.set_phase(PagerPhase::Done);
                vec![PagerEffect::Finish(GroupOutcome::Completed { retrieved })]
            } else if received == 0 {
                portal_warn!(
                    "Group {}: empty page {} with {} of {} retrieved; stopping",
                    pager.group_id(),
                    pager.pagination().page_number,
                    retrieved,
                    total_matches
                );
                pager.set_phase(PagerPhase::Done);
                vec![PagerEffect::Finish(GroupOutcome::Completed { retrieved })]
            } else {
                pager.advance_page();
                pager.set_phase(PagerPhase::Success);
                vec![PagerEffect::Fetch(pager.request())]
            }
        }
        PagerMsg::BackoffElapsed => match pager.phase() {
            PagerPhase::RateLimited | PagerPhase::ServerError => {
                pager.set_phase(PagerPhase::Requesting);
                vec![PagerEffect::Fetch(pager.request())]
            }
            _ => Vec::new(),
        },
    };

    (pager, effects)
}

fn exhausted(pager: &Pager, last_error: String) -> PagerEffect {
    PagerEffect::Finish(GroupOutcome::ExhaustedRetries {
        retrieved: pager.pagination().retrieved,
        last_error,
    })
}
