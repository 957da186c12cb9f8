//! Byte-range partitioning of a remote resource.

/// One part to create: `length: None` means "until the end of the resource".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedPart {
    pub start: u64,
    pub length: Option<u64>,
    pub partial_download_supported: bool,
}

/// Splits a resource of `size` bytes into `max_parts` contiguous parts of
/// `size / max_parts` bytes, the last absorbing the remainder.
///
/// Falls back to a single whole-resource part when splitting is not possible:
/// one part requested, no confirmed range support, unknown size, or a size
/// smaller than the part count.
pub fn plan_parts(size: Option<u64>, max_parts: usize, partial_supported: bool) -> Vec<PlannedPart> {
    let count = max_parts as u64;
    let chunk = size.filter(|_| max_parts > 1 && partial_supported).map(|s| s / count);
    match chunk {
        Some(chunk) if chunk > 0 => (0..count)
            .map(|i| PlannedPart {
                start: i * chunk,
                length: (i + 1 < count).then_some(chunk),
                partial_download_supported: true,
            })
            .collect(),
        _ => vec![PlannedPart {
            start: 0,
            length: None,
            partial_download_supported: partial_supported,
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_split_leaves_last_length_open() {
        let parts = plan_parts(Some(3000), 3, true);
        assert_eq!(parts.len(), 3);
        assert_eq!((parts[0].start, parts[0].length), (0, Some(1000)));
        assert_eq!((parts[1].start, parts[1].length), (1000, Some(1000)));
        assert_eq!((parts[2].start, parts[2].length), (2000, None));
        assert!(parts.iter().all(|p| p.partial_download_supported));
    }

    #[test]
    fn remainder_goes_to_last_part() {
        let parts = plan_parts(Some(10), 4, true);
        assert_eq!(parts.iter().map(|p| p.start).collect::<Vec<_>>(), vec![0, 2, 4, 6]);
        assert_eq!(parts[3].length, None);
    }

    #[test]
    fn no_range_support_means_one_restartable_part() {
        let parts = plan_parts(Some(3000), 3, false);
        assert_eq!(
            parts,
            vec![PlannedPart {
                start: 0,
                length: None,
                partial_download_supported: false
            }]
        );
    }

    #[test]
    fn degenerate_inputs_fall_back_to_single_part() {
        assert_eq!(plan_parts(Some(2), 4, true).len(), 1);
        assert_eq!(plan_parts(None, 4, true).len(), 1);
        assert_eq!(plan_parts(Some(3000), 1, true).len(), 1);
        assert!(plan_parts(Some(3000), 1, true)[0].partial_download_supported);
        assert_eq!(plan_parts(Some(3000), 0, true).len(), 1);
    }
}
