//! Deterministic page sampling.
//!
//! Skips the front and back matter of a book and then takes every `step`-th
//! page, denser for short books. Not random: the same page count always
//! yields the same selection.

use crate::config::SamplingConfig;

/// Page indices (0-based) to inspect for a document of `total_pages` pages
pub fn select_pages(total_pages: usize, config: &SamplingConfig) -> Vec<usize> {
    let start = config.skip_leading;
    let end = total_pages.saturating_sub(config.skip_trailing);
    let step = config.step_for(total_pages).max(1);

    (start..end).step_by(step).collect()
}

/// Human-readable "1 in N pages" descriptor; `None` when nothing was sampled
pub fn sampling_rate_descriptor(total_pages: usize, sampled_pages: usize) -> Option<String> {
    if sampled_pages == 0 {
        return None;
    }
    Some(format!("1/{}", total_pages / sampled_pages))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(total: usize) -> Vec<usize> {
        select_pages(total, &SamplingConfig::default())
    }

    #[test]
    fn test_short_documents_yield_nothing() {
        for total in 0..=10 {
            assert!(pages(total).is_empty(), "{total} pages should sample nothing");
        }
        assert_eq!(pages(11), vec![5]);
    }

    #[test]
    fn test_step_five_under_fifty_pages() {
        assert_eq!(pages(40), vec![5, 10, 15, 20, 25, 30]);
    }

    #[test]
    fn test_step_eight_under_hundred_pages() {
        assert_eq!(pages(50), vec![5, 13, 21, 29, 37]);
    }

    #[test]
    fn test_sixty_pages_uses_medium_step() {
        assert_eq!(pages(60), vec![5, 13, 21, 29, 37, 45, 53]);
    }

    #[test]
    fn test_step_ten_for_long_documents() {
        let selected = pages(120);
        assert_eq!(selected.len(), 11);
        assert_eq!(selected[..3], [5, 15, 25]);
        assert_eq!(selected.last(), Some(&105));
    }

    #[test]
    fn test_custom_step_table() {
        let config = SamplingConfig {
            medium_step: 10,
            ..SamplingConfig::default()
        };
        assert_eq!(select_pages(60, &config), vec![5, 15, 25, 35, 45]);
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(pages(237), pages(237));
        assert_eq!(pages(237).first(), Some(&5));
        assert_eq!(pages(237).last(), Some(&225));
    }

    #[test]
    fn test_sampling_rate_descriptor() {
        assert_eq!(sampling_rate_descriptor(60, 5).as_deref(), Some("1/12"));
        assert_eq!(sampling_rate_descriptor(40, 6).as_deref(), Some("1/6"));
        assert_eq!(sampling_rate_descriptor(8, 0), None);
    }
}
