//! Location Resolver
//!
//! Picks at most one message when several formats decode at the same location.

use crate::mac::ue_tracker::UeTracker;
use crate::phy::pdcch::{DecodedMessage, Resolution};
use common::types::{DciFormat, Direction};
use tracing::{debug, trace};

/// Richer downlink formats carry a full allocation (not the compact 1A)
fn is_richer_downlink(message: &DecodedMessage) -> bool {
    message.direction == Direction::Downlink && message.format != DciFormat::Format1A
}

fn is_minimal_downlink(message: &DecodedMessage) -> bool {
    message.format == DciFormat::Format1A
}

/// Index of the only element matching `predicate`
fn unique<F>(messages: &[DecodedMessage], predicate: F) -> Option<usize>
where
    F: Fn(&DecodedMessage) -> bool,
{
    let mut found = None;
    for (i, message) in messages.iter().enumerate() {
        if predicate(message) {
            if found.is_some() {
                return None;
            }
            found = Some(i);
        }
    }
    found
}

/// Per-location disambiguation policy
#[derive(Debug, Clone)]
pub struct LocationResolver {
    high_confidence: f32,
}

impl LocationResolver {
    /// Create a resolver using `high_confidence` (percent) as the unambiguous threshold
    pub fn new(high_confidence: f32) -> Self {
        Self { high_confidence }
    }

    /// Choose one message from the decodes of a single location, or none
    pub fn resolve(
        &self,
        mut messages: Vec<DecodedMessage>,
        tracker: &UeTracker,
        now: u64,
    ) -> Option<DecodedMessage> {
        let (index, resolution) = match messages.len() {
            0 => return None,
            1 => (0, Resolution::Single),
            _ => match self.pick(&messages, tracker, now) {
                Some(choice) => choice,
                None => {
                    let candidates: Vec<_> = messages
                        .iter()
                        .map(|m| (m.format.label(), m.rnti.value(), m.confidence))
                        .collect();
                    debug!(
                        "Discarding ambiguous location L{} ncce {}: {:?}",
                        messages[0].level.cces(),
                        messages[0].ncce,
                        candidates
                    );
                    return None;
                }
            },
        };

        let mut chosen = messages.swap_remove(index);
        chosen.resolution = resolution;
        trace!(
            "Location resolved to RNTI {} format {} via {:?}",
            chosen.rnti,
            chosen.format.label(),
            resolution
        );
        Some(chosen)
    }

    fn pick(
        &self,
        messages: &[DecodedMessage],
        tracker: &UeTracker,
        now: u64,
    ) -> Option<(usize, Resolution)> {
        let high = self.high_confidence;

        // 1. A single high-confidence decode, or a richer/minimal downlink pair
        let confident: Vec<usize> = (0..messages.len())
            .filter(|&i| messages[i].confidence >= high)
            .collect();
        match confident.as_slice() {
            [only] => return Some((*only, Resolution::HighConfidence)),
            [a, b] => {
                let (ma, mb) = (&messages[*a], &messages[*b]);
                if is_richer_downlink(ma) && is_minimal_downlink(mb) {
                    return Some((*a, Resolution::HighConfidence));
                }
                if is_richer_downlink(mb) && is_minimal_downlink(ma) {
                    return Some((*b, Resolution::HighConfidence));
                }
            }
            _ => {}
        }

        // 2. A single currently active RNTI
        if let Some(i) = unique(messages, |m| tracker.is_active(m.rnti, now)) {
            return Some((i, Resolution::ActiveMember));
        }

        // 3. A single match on the busiest RNTI
        if let Some(busiest) = tracker.busiest() {
            if let Some(i) = unique(messages, |m| m.rnti == busiest) {
                return Some((i, Resolution::Busiest));
            }
        }

        // 4. Richer downlink above threshold, then compact downlink
        let best_above = |filter: fn(&DecodedMessage) -> bool| {
            messages
                .iter()
                .enumerate()
                .filter(|(_, m)| filter(m) && m.confidence > high)
                .max_by(|(_, a), (_, b)| a.confidence.total_cmp(&b.confidence))
                .map(|(i, _)| i)
        };
        if let Some(i) = best_above(is_richer_downlink) {
            return Some((i, Resolution::RicherFormat));
        }
        if let Some(i) = best_above(is_minimal_downlink) {
            return Some((i, Resolution::MinimalFormat));
        }

        // 5. A single RNTI seen at any time
        if let Some(i) = unique(messages, |m| tracker.has_appeared(m.rnti)) {
            return Some((i, Resolution::KnownAddress));
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phy::pdcch::TransportBlockInfo;
    use common::types::{AggregationLevel, Rnti, Tti};

    fn message(format: DciFormat, rnti: u16, confidence: f32) -> DecodedMessage {
        DecodedMessage {
            rnti: Rnti(rnti),
            tti: Tti(10),
            direction: format.direction(),
            format,
            level: AggregationLevel::L2,
            ncce: 4,
            confidence,
            nof_prb: 5,
            tb: [TransportBlockInfo::default(); 2],
            harq_pid: 0,
            carrier_indicator: 0,
            resolution: Resolution::Unresolved,
        }
    }

    #[test]
    fn test_single_decode_passes_through() {
        let resolver = LocationResolver::new(90.0);
        let chosen = resolver
            .resolve(vec![message(DciFormat::Format0, 100, 80.0)], &UeTracker::default(), 0)
            .unwrap();
        assert_eq!(chosen.resolution, Resolution::Single);
        assert!(resolver.resolve(Vec::new(), &UeTracker::default(), 0).is_none());
    }

    #[test]
    fn test_high_confidence_wins() {
        let resolver = LocationResolver::new(90.0);
        let chosen = resolver
            .resolve(
                vec![
                    message(DciFormat::Format1A, 100, 92.0),
                    message(DciFormat::Format2, 200, 60.0),
                ],
                &UeTracker::default(),
                0,
            )
            .unwrap();
        assert_eq!(chosen.rnti, Rnti(100));
        assert_eq!(chosen.resolution, Resolution::HighConfidence);
    }

    #[test]
    fn test_richer_format_preferred_when_both_confident() {
        let resolver = LocationResolver::new(90.0);
        let chosen = resolver
            .resolve(
                vec![
                    message(DciFormat::Format1A, 100, 95.0),
                    message(DciFormat::Format2, 200, 91.0),
                ],
                &UeTracker::default(),
                0,
            )
            .unwrap();
        assert_eq!(chosen.format, DciFormat::Format2);
    }

    #[test]
    fn test_active_member_then_busiest() {
        let resolver = LocationResolver::new(90.0);
        let mut tracker = UeTracker::new(100);
        tracker.update(Rnti(200), Direction::Downlink, 10);

        let chosen = resolver
            .resolve(
                vec![
                    message(DciFormat::Format1A, 100, 80.0),
                    message(DciFormat::Format2, 200, 80.0),
                ],
                &tracker,
                50,
            )
            .unwrap();
        assert_eq!(chosen.rnti, Rnti(200));
        assert_eq!(chosen.resolution, Resolution::ActiveMember);

        // Aged out: falls through to the busiest RNTI
        let chosen = resolver
            .resolve(
                vec![
                    message(DciFormat::Format1A, 100, 80.0),
                    message(DciFormat::Format2, 200, 80.0),
                ],
                &tracker,
                500,
            )
            .unwrap();
        assert_eq!(chosen.rnti, Rnti(200));
        assert_eq!(chosen.resolution, Resolution::Busiest);
    }

    #[test]
    fn test_known_address_fallback() {
        let resolver = LocationResolver::new(90.0);
        let mut tracker = UeTracker::new(10);
        tracker.update(Rnti(300), Direction::Uplink, 0);
        tracker.update(Rnti(301), Direction::Uplink, 1);
        tracker.update(Rnti(301), Direction::Uplink, 2);

        let chosen = resolver
            .resolve(
                vec![
                    message(DciFormat::Format0, 300, 80.0),
                    message(DciFormat::Format2, 999, 85.0),
                ],
                &tracker,
                1000,
            )
            .unwrap();
        assert_eq!(chosen.rnti, Rnti(300));
        assert_eq!(chosen.resolution, Resolution::KnownAddress);
    }

    #[test]
    fn test_ambiguous_location_discarded() {
        let resolver = LocationResolver::new(90.0);
        let chosen = resolver.resolve(
            vec![
                message(DciFormat::Format1A, 100, 80.0),
                message(DciFormat::Format2, 200, 85.0),
            ],
            &UeTracker::default(),
            0,
        );
        assert!(chosen.is_none());
    }

    #[test]
    fn test_richer_format_above_threshold() {
        // Neither a richer/compact downlink pair nor known to the tracker
        let resolver = LocationResolver::new(90.0);
        let chosen = resolver
            .resolve(
                vec![
                    message(DciFormat::Format0, 300, 95.0),
                    message(DciFormat::Format2, 200, 93.0),
                ],
                &UeTracker::default(),
                0,
            )
            .unwrap();
        assert_eq!(chosen.rnti, Rnti(200));
        assert_eq!(chosen.format, DciFormat::Format2);
        assert_eq!(chosen.resolution, Resolution::RicherFormat);
    }

    #[test]
    fn test_minimal_format_above_threshold() {
        let resolver = LocationResolver::new(90.0);
        let chosen = resolver
            .resolve(
                vec![
                    message(DciFormat::Format0, 300, 96.0),
                    message(DciFormat::Format1A, 100, 94.0),
                ],
                &UeTracker::default(),
                0,
            )
            .unwrap();
        assert_eq!(chosen.rnti, Rnti(100));
        assert_eq!(chosen.resolution, Resolution::MinimalFormat);
    }

    #[test]
    fn test_three_confident_decodes_pick_best_richer() {
        let resolver = LocationResolver::new(90.0);
        let chosen = resolver
            .resolve(
                vec![
                    message(DciFormat::Format1A, 100, 97.0),
                    message(DciFormat::Format2, 200, 92.0),
                    message(DciFormat::Format1, 400, 95.0),
                ],
                &UeTracker::default(),
                0,
            )
            .unwrap();
        assert_eq!(chosen.rnti, Rnti(400));
        assert_eq!(chosen.format, DciFormat::Format1);
        assert_eq!(chosen.resolution, Resolution::RicherFormat);
    }

    #[test]
    fn test_threshold_is_strict_for_format_preference() {
        // Exactly at the threshold counts as confident but not as preferred
        let resolver = LocationResolver::new(90.0);
        let chosen = resolver.resolve(
            vec![
                message(DciFormat::Format0, 300, 90.0),
                message(DciFormat::Format2, 200, 90.0),
            ],
            &UeTracker::default(),
            0,
        );
        assert!(chosen.is_none());
    }
}
