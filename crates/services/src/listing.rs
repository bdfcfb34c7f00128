//! Ordering and virtual paging over thread summaries.

use std::ops::Range;

use domains::{PageSize, Thread, ThreadOrder};

/// Sorts descending by `order`. Ties fall back to most recent activity, then title.
pub fn sort_threads(threads: &mut [Thread], order: ThreadOrder) {
    threads.sort_by(|a, b| {
        let primary = match order {
            ThreadOrder::Time => b.bumped_at.cmp(&a.bumped_at),
            ThreadOrder::Likes => b.like_count.cmp(&a.like_count),
            ThreadOrder::Posts => b.post_count.cmp(&a.post_count),
            ThreadOrder::Images => b.image_count.cmp(&a.image_count),
        };
        primary
            .then_with(|| b.bumped_at.cmp(&a.bumped_at))
            .then_with(|| a.title.cmp(&b.title))
    });
}

/// Index range of page `page` (1-based) of size `size` within `len` items.
///
/// Paging applies only when both are given and the size is not `All`.
/// Pages past the end (and page 0) are empty, never an error.
pub fn page_window(len: usize, page: Option<u64>, size: Option<PageSize>) -> Range<usize> {
    let (page, per_page) = match (page, size) {
        (Some(page), Some(PageSize::Count(per_page))) => (page, per_page),
        _ => return 0..len,
    };
    if page == 0 {
        return 0..0;
    }
    let start = (page - 1).saturating_mul(per_page);
    let end = start.saturating_add(per_page);
    let start = usize::try_from(start).unwrap_or(usize::MAX).min(len);
    let end = usize::try_from(end).unwrap_or(usize::MAX).min(len);
    start..end
}
