//! Selection of the next video to publish

use std::collections::BTreeSet;

use crate::types::VideoCandidate;

/// Return the first candidate whose identifier has not been published
///
/// Candidates are scanned in the order the source listed them (oldest
/// first), so videos go out in creation order and nothing is skipped except
/// what is already posted.
pub fn pick<'a>(
    candidates: &'a [VideoCandidate],
    already_published: &BTreeSet<String>,
) -> Option<&'a VideoCandidate> {
    candidates
        .iter()
        .find(|candidate| !already_published.contains(&candidate.identifier))
}
