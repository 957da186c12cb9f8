use std::sync::Arc;

use crate::file::FilePart;

/// Suspends up to `deficit` downloading parts and returns the ones that moved.
///
/// Parts that can resume at their byte offset go first; the rest, which must
/// restart from zero, only when `evict_non_resumable` is set.
pub(super) fn evict_parts(
    parts: &[Arc<FilePart>],
    deficit: usize,
    evict_non_resumable: bool,
) -> Vec<Arc<FilePart>> {
    let mut evicted = Vec::new();
    for resumable in [true, false] {
        if !resumable && !evict_non_resumable {
            break;
        }
        for part in parts
            .iter()
            .filter(|p| p.partial_download_supported() == resumable)
        {
            if evicted.len() >= deficit {
                return evicted;
            }
            if part.request_suspend().changed() {
                tracing::info!(part = part.index(), resumable, "evicting part");
                evicted.push(Arc::clone(part));
            }
        }
    }
    evicted
}
