use serde_json::Value;

use crate::record::finite_number;

/// Difference of two magnitudes, e.g. WISE `w1mpro - w2mpro`.
///
/// Missing or non-numeric inputs degrade to `None` instead of failing.
pub fn magnitude_color(first: Option<&Value>, second: Option<&Value>) -> Option<f64> {
    let first = finite_number(first?)?;
    let second = finite_number(second?)?;
    let color = first - second;
    color.is_finite().then_some(color)
}
