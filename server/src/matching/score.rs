//! Compatibility scoring.

use std::collections::HashSet;

/// Integer Jaccard percentage of two interest-id sets:
/// floor(100 * |M ∩ T| / |M ∪ T|), defined as 0 when the union is empty.
/// Symmetric in its inputs.
pub fn compatibility(mine: &HashSet<String>, theirs: &HashSet<String>) -> u32 {
    let intersection = mine.intersection(theirs).count();
    let union = mine.union(theirs).count();
    if union == 0 {
        0
    } else {
        (intersection * 100 / union) as u32
    }
}
