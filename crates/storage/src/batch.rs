//! Batch planning utilities.
//!
//! This module contains pure logic for splitting key lists into
//! store-sized batches. No I/O operations - just decision making.

/// Split `items` into consecutive groups of at most `chunk_size`.
///
/// The last group may be smaller. Concatenating the groups in order
/// reproduces `items` exactly. A `chunk_size` of 0 is treated as 1.
///
/// # Arguments
/// * `items` - Sequence to split
/// * `chunk_size` - Maximum group size (use `DELETE_BATCH_SIZE` for deletes)
///
/// # Returns
/// Borrowed groups in order; empty for empty input.
pub fn chunk_slice<T>(items: &[T], chunk_size: usize) -> Vec<&[T]> {
    items.chunks(chunk_size.max(1)).collect()
}

/// Calculate the expected number of chunks for `len` items.
pub fn expected_chunk_count(len: usize, chunk_size: usize) -> usize {
    len.div_ceil(chunk_size.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dump_mirror_common::DELETE_BATCH_SIZE;

    fn keys(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("requests/{:05}.gz", i)).collect()
    }

    fn assert_chunk_invariants(n: usize) {
        let items: Vec<String> = keys(n);
        let chunks: Vec<&[String]> = chunk_slice(&items, DELETE_BATCH_SIZE);

        assert_eq!(chunks.len(), expected_chunk_count(n, DELETE_BATCH_SIZE));
        assert_eq!(chunks.len(), n.div_ceil(999));

        if let Some((last, full)) = chunks.split_last() {
            assert!(full.iter().all(|c| c.len() == 999));
            assert!(!last.is_empty() && last.len() <= 999);
        }

        let rejoined: Vec<String> = chunks.concat();
        assert_eq!(rejoined, items);
    }

    #[test]
    fn test_chunk_empty() {
        let items: Vec<String> = Vec::new();
        assert!(chunk_slice(&items, DELETE_BATCH_SIZE).is_empty());
        assert_eq!(expected_chunk_count(0, DELETE_BATCH_SIZE), 0);
    }

    #[test]
    fn test_chunk_boundaries() {
        for n in [1, 998, 999, 1000, 1998, 1999, 2997, 3000, 5000] {
            assert_chunk_invariants(n);
        }
    }

    #[test]
    fn test_chunk_with_remainder() {
        let items: Vec<u32> = (0..250).collect();
        let chunks: Vec<&[u32]> = chunk_slice(&items, 100);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 100);
        assert_eq!(chunks[1].len(), 100);
        assert_eq!(chunks[2], &items[200..]);
    }

    #[test]
    fn test_chunk_size_zero_treated_as_one() {
        let items: Vec<u32> = vec![1, 2, 3];
        assert_eq!(chunk_slice(&items, 0).len(), 3);
        assert_eq!(expected_chunk_count(3, 0), 3);
    }

    #[test]
    fn test_delete_batch_size_below_store_limit() {
        assert_eq!(DELETE_BATCH_SIZE, 999);
        assert!(DELETE_BATCH_SIZE < dump_mirror_common::MAX_BATCH_DELETE_KEYS);
    }
}
