//! Annotation pass: mark the control and compare every other alternative
//! against it.

use super::Alternative;
use crate::stats::{relative_rate, Significance};
use crate::{Error, Result};

/// Annotate `alternatives` against the alternative at `control_index`.
///
/// Every derived field is overwritten, so running this again with another
/// control index leaves nothing behind from the previous run.
///
/// # Errors
/// Returns `ControlIndexOutOfRange` if `control_index` does not address an
/// alternative. Alternatives are left untouched in that case.
pub fn annotate(alternatives: &mut [Alternative], control_index: usize) -> Result<()> {
    let control = alternatives
        .get(control_index)
        .ok_or(Error::ControlIndexOutOfRange {
            index: control_index,
            len: alternatives.len(),
        })?;
    let control_rate = control.conversion_rate();
    let control_n = control.participants();

    for (index, alternative) in alternatives.iter_mut().enumerate() {
        if index == control_index {
            alternative.set_comparison(true, None, None);
            continue;
        }

        let rate = alternative.conversion_rate();
        let significance =
            Significance::compare(rate, alternative.participants(), control_rate, control_n);
        alternative.set_comparison(false, Some(relative_rate(rate, control_rate)), significance);
    }

    Ok(())
}
