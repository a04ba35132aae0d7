//! Logarithmic merge policy
//!
//! Segments are bucketed by level: level `L` holds segments with
//! `merge_factor^L <= doc_count < merge_factor^(L+1)`. Whenever a level
//! accumulates `merge_factor` segments they merge into one, promoting the
//! result a level up. Merges whose output would exceed `max_merge_docs`
//! are skipped, as are merges touching a frozen segment (one with
//! uncommitted tombstones, which a merge would make unrestorable).

/// Level of a segment given its document count
pub(crate) fn segment_level(doc_count: u32, merge_factor: u32) -> u32 {
    let mut level = 0;
    let mut threshold = merge_factor as u64;
    while doc_count as u64 >= threshold {
        level += 1;
        threshold *= merge_factor as u64;
    }
    level
}

/// Indices of the next overflowing level's segments, lowest level first;
/// `None` when no level overflows
pub(crate) fn find_merge(
    doc_counts: &[u32],
    frozen: &[bool],
    merge_factor: u32,
    max_merge_docs: u32,
) -> Option<Vec<usize>> {
    if doc_counts.len() < merge_factor as usize {
        return None;
    }

    let levels: Vec<u32> = doc_counts
        .iter()
        .map(|&docs| segment_level(docs, merge_factor))
        .collect();
    let max_level = *levels.iter().max().expect("non-empty");

    for level in 0..=max_level {
        let group: Vec<usize> = (0..doc_counts.len())
            .filter(|&i| levels[i] == level)
            .collect();
        if group.len() < merge_factor as usize {
            continue;
        }
        if group.iter().any(|&i| frozen[i]) {
            continue;
        }
        let total: u64 = group.iter().map(|&i| doc_counts[i] as u64).sum();
        if total > max_merge_docs as u64 {
            continue;
        }
        return Some(group);
    }
    None
}
