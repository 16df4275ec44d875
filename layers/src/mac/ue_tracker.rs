//! Active UE Tracker
//!
//! Dense per-RNTI activity table used to disambiguate blind decodes. Entries age
//! out of the active set after an inactivity window but are never removed.

use common::types::{Direction, Rnti};
use tracing::{debug, trace};

/// Size of the RNTI address space
pub const ADDRESS_SPACE: usize = 1 << 16;

/// Subframes without a grant after which an RNTI stops counting as active
pub const DEFAULT_INACTIVITY_WINDOW: u64 = 1000;

#[derive(Debug, Clone, Copy, Default)]
struct Entry {
    total: u32,
    dl: u32,
    ul: u32,
    /// Subframe index + 1 of the latest grant; 0 means never seen
    last_active: u64,
    /// Subframe index + 1 of the first grant; 0 means never seen
    first_seen: u64,
}

/// Snapshot of one RNTI's activity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UeActivity {
    pub rnti: Rnti,
    pub total: u32,
    pub dl: u32,
    pub ul: u32,
    /// Unwrapped subframe index of the latest grant
    pub last_active: u64,
    /// Unwrapped subframe index of the first grant
    pub first_seen: u64,
}

/// Busiest RNTI for one counter
#[derive(Debug, Clone, Copy, Default)]
struct Busiest {
    rnti: Option<Rnti>,
    count: u32,
    first_seen: u64,
}

impl Busiest {
    fn offer(&mut self, rnti: Rnti, count: u32, first_seen: u64) {
        let better = match self.rnti {
            None => true,
            Some(current) if current == rnti => true,
            Some(_) => count > self.count || (count == self.count && first_seen < self.first_seen),
        };
        if better {
            self.rnti = Some(rnti);
            self.count = count;
            self.first_seen = first_seen;
        }
    }
}

/// Activity registry covering the whole RNTI space
pub struct UeTracker {
    entries: Vec<Entry>,
    touched: Vec<Rnti>,
    inactivity_window: u64,
    busiest_all: Busiest,
    busiest_dl: Busiest,
    busiest_ul: Busiest,
}

impl UeTracker {
    /// Create an empty tracker
    pub fn new(inactivity_window: u64) -> Self {
        Self {
            entries: vec![Entry::default(); ADDRESS_SPACE],
            touched: Vec::new(),
            inactivity_window,
            busiest_all: Busiest::default(),
            busiest_dl: Busiest::default(),
            busiest_ul: Busiest::default(),
        }
    }

    /// Record one accepted grant at unwrapped subframe index `now`
    pub fn update(&mut self, rnti: Rnti, direction: Direction, now: u64) {
        let stamp = now + 1;
        let entry = &mut self.entries[rnti.index()];

        if entry.first_seen == 0 {
            entry.first_seen = stamp;
            self.touched.push(rnti);
            debug!("New RNTI {} at subframe {}", rnti, now);
        }
        entry.last_active = entry.last_active.max(stamp);
        entry.total += 1;
        match direction {
            Direction::Downlink => entry.dl += 1,
            Direction::Uplink => entry.ul += 1,
        }

        let entry = *entry;
        self.busiest_all.offer(rnti, entry.total, entry.first_seen);
        match direction {
            Direction::Downlink => self.busiest_dl.offer(rnti, entry.dl, entry.first_seen),
            Direction::Uplink => self.busiest_ul.offer(rnti, entry.ul, entry.first_seen),
        }

        trace!(
            "RNTI {} total {} (dl {}, ul {}) at subframe {}",
            rnti,
            entry.total,
            entry.dl,
            entry.ul,
            now
        );
    }

    /// Whether the RNTI had a grant within the inactivity window before `now`
    pub fn is_active(&self, rnti: Rnti, now: u64) -> bool {
        let entry = &self.entries[rnti.index()];
        entry.last_active != 0
            && now.saturating_sub(entry.last_active - 1) <= self.inactivity_window
    }

    /// Whether the RNTI has ever been seen
    pub fn has_appeared(&self, rnti: Rnti) -> bool {
        self.entries[rnti.index()].first_seen != 0
    }

    /// Activity snapshot, `None` if never seen
    pub fn activity(&self, rnti: Rnti) -> Option<UeActivity> {
        let entry = &self.entries[rnti.index()];
        if entry.first_seen == 0 {
            return None;
        }
        Some(UeActivity {
            rnti,
            total: entry.total,
            dl: entry.dl,
            ul: entry.ul,
            last_active: entry.last_active - 1,
            first_seen: entry.first_seen - 1,
        })
    }

    /// RNTI with the most grants overall
    pub fn busiest(&self) -> Option<Rnti> {
        self.busiest_all.rnti
    }

    /// RNTI with the most downlink grants
    pub fn busiest_dl(&self) -> Option<Rnti> {
        self.busiest_dl.rnti
    }

    /// RNTI with the most uplink grants
    pub fn busiest_ul(&self) -> Option<Rnti> {
        self.busiest_ul.rnti
    }

    /// Every RNTI seen since the last reset, in order of first appearance
    pub fn touched(&self) -> &[Rnti] {
        &self.touched
    }

    /// RNTIs currently active
    pub fn active_rntis(&self, now: u64) -> Vec<Rnti> {
        self.touched.iter().copied().filter(|&r| self.is_active(r, now)).collect()
    }

    /// Number of RNTIs currently active
    pub fn nof_active(&self, now: u64) -> usize {
        self.touched.iter().filter(|&&r| self.is_active(r, now)).count()
    }

    /// Inactivity window in subframes
    pub fn inactivity_window(&self) -> u64 {
        self.inactivity_window
    }

    /// Forget all activity
    pub fn reset(&mut self) {
        for rnti in self.touched.drain(..) {
            self.entries[rnti.index()] = Entry::default();
        }
        self.busiest_all = Busiest::default();
        self.busiest_dl = Busiest::default();
        self.busiest_ul = Busiest::default();
        debug!("UE tracker reset");
    }
}

impl Default for UeTracker {
    fn default() -> Self {
        Self::new(DEFAULT_INACTIVITY_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_seen() {
        let tracker = UeTracker::default();
        assert!(!tracker.has_appeared(Rnti(100)));
        assert!(!tracker.is_active(Rnti(100), 0));
        assert!(tracker.activity(Rnti(100)).is_none());
        assert!(tracker.busiest().is_none());
    }

    #[test]
    fn test_seen_at_subframe_zero() {
        let mut tracker = UeTracker::default();
        tracker.update(Rnti(100), Direction::Downlink, 0);
        assert!(tracker.has_appeared(Rnti(100)));
        assert!(tracker.is_active(Rnti(100), 0));
        assert_eq!(tracker.activity(Rnti(100)).unwrap().first_seen, 0);
    }

    #[test]
    fn test_inactivity_window() {
        let mut tracker = UeTracker::new(10);
        tracker.update(Rnti(7000), Direction::Uplink, 100);
        assert!(tracker.is_active(Rnti(7000), 110));
        assert!(!tracker.is_active(Rnti(7000), 111));
        // Aged out but still known
        assert!(tracker.has_appeared(Rnti(7000)));
        assert_eq!(tracker.nof_active(111), 0);
        assert_eq!(tracker.touched(), &[Rnti(7000)]);
    }

    #[test]
    fn test_out_of_order_update_keeps_latest() {
        let mut tracker = UeTracker::new(10);
        tracker.update(Rnti(50), Direction::Downlink, 200);
        tracker.update(Rnti(50), Direction::Downlink, 190);
        assert_eq!(tracker.activity(Rnti(50)).unwrap().last_active, 200);
    }

    #[test]
    fn test_counters_are_consistent() {
        let mut tracker = UeTracker::default();
        let mut last_total = 0;
        for i in 0..50u64 {
            let direction = if i % 3 == 0 { Direction::Uplink } else { Direction::Downlink };
            tracker.update(Rnti(300), direction, i);
            let activity = tracker.activity(Rnti(300)).unwrap();
            assert!(activity.total >= last_total);
            assert_eq!(activity.total, activity.dl + activity.ul);
            last_total = activity.total;
        }
    }

    #[test]
    fn test_busiest_with_first_seen_tie_break() {
        let mut tracker = UeTracker::default();
        tracker.update(Rnti(20), Direction::Downlink, 1);
        tracker.update(Rnti(10), Direction::Downlink, 2);
        assert_eq!(tracker.busiest(), Some(Rnti(20)));

        tracker.update(Rnti(10), Direction::Uplink, 3);
        assert_eq!(tracker.busiest(), Some(Rnti(10)));
        assert_eq!(tracker.busiest_dl(), Some(Rnti(20)));
        assert_eq!(tracker.busiest_ul(), Some(Rnti(10)));
    }

    #[test]
    fn test_reset() {
        let mut tracker = UeTracker::default();
        tracker.update(Rnti(11), Direction::Downlink, 5);
        tracker.reset();
        assert!(!tracker.has_appeared(Rnti(11)));
        assert!(tracker.touched().is_empty());
        assert!(tracker.busiest().is_none());
    }
}
