//! Per-option response counts for the live question.

use std::sync::Arc;

use uuid::Uuid;

use crate::{dao::models::ResponseKind, dao::session_store::SessionStore, error::ServiceError};

/// Count responses per option index for `question_id` in the table selected
/// by `kind`.
///
/// Defined for zero responses (all zeros) and for an `option_count` larger
/// than the actual option list (excess indexes report 0). Each index is a
/// count-by-predicate against the store, so a response committed before the
/// call is always reflected; one committed concurrently may show up in the
/// next tally instead.
pub async fn tally(
    store: &Arc<dyn SessionStore>,
    kind: ResponseKind,
    question_id: Uuid,
    option_count: usize,
) -> Result<Vec<u64>, ServiceError> {
    let mut counts = Vec::with_capacity(option_count);
    for option_index in 0..option_count {
        let count = store
            .count_responses(kind, question_id, option_index as u32)
            .await?;
        counts.push(count);
    }
    Ok(counts)
}
