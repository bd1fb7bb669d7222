use crate::record::Classification;

const SEPARATOR: &str = "; ";

/// Joins classification labels in their original order.
///
/// Entries without a label (or with an empty one) are skipped; `None` when nothing is left.
pub fn join_classifications(classifications: &[Classification]) -> Option<String> {
    let labels: Vec<&str> = classifications
        .iter()
        .filter_map(|c| c.classification.as_deref())
        .filter(|label| !label.is_empty())
        .collect();
    if labels.is_empty() {
        None
    } else {
        Some(labels.join(SEPARATOR))
    }
}
