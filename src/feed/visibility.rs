//! Visibility math for the vertical feed.
//!
//! Every entry occupies exactly one viewport unit, so the active entry is the
//! scroll offset rounded to the nearest whole viewport. Everything here is a
//! pure function of the scroll offset and viewport size; `FeedVisibility` only
//! remembers the last answer to report changes.

/// Direction for keyboard navigation between reels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Next,
    Previous,
}

/// Index of the entry occupying the viewport, if any.
///
/// Returns `None` for an empty feed, an unusable viewport, or an offset that
/// rounds past the last entry. Overscroll above the top counts as the top.
pub fn active_index(scroll_offset: f64, viewport_height: f64, entry_count: usize) -> Option<usize> {
    if entry_count == 0 || !viewport_height.is_finite() || viewport_height <= 0.0 {
        return None;
    }
    if !scroll_offset.is_finite() {
        return None;
    }

    let index = (scroll_offset.max(0.0) / viewport_height).round() as usize;
    (index < entry_count).then_some(index)
}

/// Whether the entry at `index` should be playing
pub fn is_visible(index: usize, active: Option<usize>) -> bool {
    active == Some(index)
}

/// Scroll offset that aligns `index` with the top of the viewport
pub fn snap_offset(index: usize, viewport_height: f64) -> f64 {
    if !viewport_height.is_finite() || viewport_height <= 0.0 {
        return 0.0;
    }
    index as f64 * viewport_height
}

/// Neighbouring entry, clamped to the feed bounds
pub fn step_index(active: Option<usize>, entry_count: usize, step: Step) -> Option<usize> {
    if entry_count == 0 {
        return None;
    }
    let current = active.unwrap_or(0).min(entry_count - 1);
    let target = match step {
        Step::Next => (current + 1).min(entry_count - 1),
        Step::Previous => current.saturating_sub(1),
    };
    Some(target)
}

/// Change in the active entry after a scroll notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityChange {
    pub previous: Option<usize>,
    pub current: Option<usize>,
}

/// Tracks the last derived active index so the UI only touches reels whose
/// visibility actually flipped.
#[derive(Debug, Default)]
pub struct FeedVisibility {
    entry_count: usize,
    active: Option<usize>,
}

impl FeedVisibility {
    pub fn new(entry_count: usize) -> Self {
        Self {
            entry_count,
            active: None,
        }
    }

    pub fn active(&self) -> Option<usize> {
        self.active
    }

    /// Replace the feed length; forgets the previous answer
    pub fn reset(&mut self, entry_count: usize) {
        self.entry_count = entry_count;
        self.active = None;
    }

    /// Recompute from scratch and report a change, if there was one
    pub fn update(&mut self, scroll_offset: f64, viewport_height: f64) -> Option<VisibilityChange> {
        let current = active_index(scroll_offset, viewport_height, self.entry_count);
        if current == self.active {
            return None;
        }
        let previous = std::mem::replace(&mut self.active, current);
        Some(VisibilityChange { previous, current })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const H: f64 = 800.0;

    #[test]
    fn test_top_is_first_entry() {
        assert_eq!(active_index(0.0, H, 3), Some(0));
    }

    #[test]
    fn test_rounds_to_nearest_viewport() {
        assert_eq!(active_index(399.0, H, 3), Some(0));
        assert_eq!(active_index(400.0, H, 3), Some(1));
        assert_eq!(active_index(1.0 * H, H, 3), Some(1));
        assert_eq!(active_index(1.6 * H, H, 3), Some(2));
    }

    #[test]
    fn test_matches_round_for_many_offsets() {
        for step in 0..=200 {
            let offset = step as f64 * 13.7;
            let expected = (offset / H).round() as usize;
            let active = active_index(offset, H, 10);
            if expected < 10 {
                assert_eq!(active, Some(expected), "offset {}", offset);
            } else {
                assert_eq!(active, None);
            }
            let visible = (0..10).filter(|i| is_visible(*i, active)).count();
            assert!(visible <= 1);
        }
    }

    #[test]
    fn test_only_middle_entry_visible() {
        let active = active_index(1.0 * H, H, 3);
        let flags: Vec<bool> = (0..3).map(|i| is_visible(i, active)).collect();
        assert_eq!(flags, vec![false, true, false]);
    }

    #[test]
    fn test_empty_feed_never_active() {
        assert_eq!(active_index(0.0, H, 0), None);
        assert_eq!(active_index(5000.0, H, 0), None);
    }

    #[test]
    fn test_degenerate_viewport() {
        assert_eq!(active_index(10.0, 0.0, 3), None);
        assert_eq!(active_index(10.0, -5.0, 3), None);
        assert_eq!(active_index(10.0, f64::NAN, 3), None);
        assert_eq!(active_index(f64::INFINITY, H, 3), None);
    }

    #[test]
    fn test_overscroll_counts_as_top() {
        assert_eq!(active_index(-300.0, H, 3), Some(0));
    }

    #[test]
    fn test_past_the_end_has_no_active_entry() {
        assert_eq!(active_index(3.0 * H, H, 3), None);
    }

    #[test]
    fn test_snap_offset() {
        assert_eq!(snap_offset(2, H), 1600.0);
        assert_eq!(snap_offset(2, 0.0), 0.0);
    }

    #[test]
    fn test_step_index_clamps() {
        assert_eq!(step_index(Some(0), 3, Step::Previous), Some(0));
        assert_eq!(step_index(Some(0), 3, Step::Next), Some(1));
        assert_eq!(step_index(Some(2), 3, Step::Next), Some(2));
        assert_eq!(step_index(None, 3, Step::Next), Some(1));
        assert_eq!(step_index(Some(1), 0, Step::Next), None);
    }

    #[test]
    fn test_tracker_reports_only_changes() {
        let mut tracker = FeedVisibility::new(3);
        assert_eq!(
            tracker.update(0.0, H),
            Some(VisibilityChange {
                previous: None,
                current: Some(0)
            })
        );
        assert_eq!(tracker.update(100.0, H), None);
        assert_eq!(
            tracker.update(900.0, H),
            Some(VisibilityChange {
                previous: Some(0),
                current: Some(1)
            })
        );
        assert_eq!(tracker.active(), Some(1));

        tracker.reset(0);
        assert_eq!(tracker.active(), None);
        assert_eq!(tracker.update(0.0, H), None);
    }
}
