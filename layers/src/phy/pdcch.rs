//! PDCCH Blind Decoding
//!
//! Trial decoding of candidate locations against a small set of DCI formats.
//! The RNTI is never known in advance: it is recovered from the RNTI-masked CRC
//! and then checked for plausibility.

use crate::phy::control_region::{ControlRegion, BITS_PER_CCE};
use crate::phy::convolutional::{encode, ViterbiDecoder};
use crate::phy::dci::{Dci, DciLayout, TransportBlockFields, CRC_BITS};
use crate::phy::rate_match::RateMatcher;
use crate::phy::search_space::{generate_candidates, is_legal_location, mark_overlapping, Candidate};
use crate::phy::tbs::{transport_block_size, McsTable};
use crate::LayerError;
use common::types::{AggregationLevel, CellParams, DciFormat, Direction, Rnti, Tti};
use common::utils::{append_bits, crc16_bits};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Formats attempted when none are configured explicitly
pub const DEFAULT_FORMATS: [DciFormat; 3] =
    [DciFormat::Format0, DciFormat::Format1A, DciFormat::Format2];

/// Tunable decode thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecodeThresholds {
    /// Mean |LLR| a block needs to be tried at all
    pub candidate_llr: f32,
    /// Minimum re-encode agreement (percent) to accept a decode
    pub pass_confidence: f32,
    /// Agreement (percent) treated as unambiguous
    pub high_confidence: f32,
}

impl Default for DecodeThresholds {
    fn default() -> Self {
        Self {
            candidate_llr: 0.7,
            pass_confidence: 75.0,
            high_confidence: 90.0,
        }
    }
}

/// Blind decoder configuration
#[derive(Debug, Clone)]
pub struct BlindDecoderConfig {
    /// Formats attempted at every location, in order
    pub formats: Vec<DciFormat>,
    pub thresholds: DecodeThresholds,
    /// Lowest RNTI accepted
    pub rnti_min: u16,
    /// Highest RNTI accepted
    pub rnti_max: u16,
}

impl Default for BlindDecoderConfig {
    fn default() -> Self {
        Self {
            formats: DEFAULT_FORMATS.to_vec(),
            thresholds: DecodeThresholds::default(),
            rnti_min: Rnti::MIN_VALID,
            rnti_max: Rnti::MAX_VALID,
        }
    }
}

/// How a message survived location disambiguation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    /// Not yet through the location resolver
    Unresolved,
    /// Only decode at its location
    Single,
    /// Only decode above the high confidence threshold
    HighConfidence,
    /// Only decode whose RNTI is currently active
    ActiveMember,
    /// Only decode matching the busiest RNTI
    Busiest,
    /// Richer downlink format above the high threshold
    RicherFormat,
    /// Compact downlink format above the high threshold
    MinimalFormat,
    /// Only decode whose RNTI has been seen before
    KnownAddress,
}

/// Decoded fields of one transport block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransportBlockInfo {
    pub mcs: u8,
    pub rv: u8,
    pub ndi: bool,
    pub enabled: bool,
    /// TBS from the standard table
    pub tbs: u32,
    /// TBS if the 256QAM table is in use
    pub tbs_hm: u32,
}

/// One successfully decoded scheduling grant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedMessage {
    pub rnti: Rnti,
    pub tti: Tti,
    pub direction: Direction,
    pub format: DciFormat,
    pub level: AggregationLevel,
    pub ncce: usize,
    /// Re-encode agreement in percent (0-100)
    pub confidence: f32,
    pub nof_prb: u16,
    pub tb: [TransportBlockInfo; 2],
    pub harq_pid: u8,
    pub carrier_indicator: u8,
    pub resolution: Resolution,
}

impl DecodedMessage {
    fn from_dci(dci: &Dci, rnti: Rnti, tti: Tti, candidate: &Candidate, confidence: f32) -> Self {
        let direction = dci.format.direction();
        let tb_info = |fields: &TransportBlockFields| {
            if !fields.enabled {
                return TransportBlockInfo {
                    mcs: fields.mcs,
                    rv: fields.rv,
                    ndi: fields.ndi,
                    ..Default::default()
                };
            }
            let (tbs, tbs_hm) = match direction {
                Direction::Downlink => (
                    transport_block_size(McsTable::Standard, fields.mcs, dci.nof_prb),
                    transport_block_size(McsTable::Qam256, fields.mcs, dci.nof_prb),
                ),
                Direction::Uplink => {
                    let tbs = transport_block_size(McsTable::Uplink, fields.mcs, dci.nof_prb);
                    (tbs, tbs)
                }
            };
            TransportBlockInfo {
                mcs: fields.mcs,
                rv: fields.rv,
                ndi: fields.ndi,
                enabled: true,
                tbs,
                tbs_hm,
            }
        };

        Self {
            rnti,
            tti,
            direction,
            format: dci.format,
            level: candidate.level,
            ncce: candidate.ncce,
            confidence,
            nof_prb: dci.nof_prb,
            tb: [tb_info(&dci.tb[0]), tb_info(&dci.tb[1])],
            harq_pid: dci.harq_pid,
            carrier_indicator: dci.carrier_indicator,
            resolution: Resolution::Unresolved,
        }
    }

    /// Total TBS over enabled transport blocks
    pub fn total_tbs(&self) -> u32 {
        self.tb.iter().map(|tb| tb.tbs).sum()
    }

    /// Total high-order-modulation TBS over enabled transport blocks
    pub fn total_tbs_hm(&self) -> u32 {
        self.tb.iter().map(|tb| tb.tbs_hm).sum()
    }
}

/// Decodes found at one candidate location
#[derive(Debug, Clone)]
pub struct LocationDecode {
    pub candidate: Candidate,
    pub messages: Vec<DecodedMessage>,
}

/// Append the RNTI-masked CRC to a payload
pub fn attach_masked_crc(payload: &[u8], rnti: Rnti) -> Vec<u8> {
    let crc = crc16_bits(payload) ^ rnti.value();
    let mut bits = Vec::with_capacity(payload.len() + CRC_BITS);
    bits.extend_from_slice(payload);
    append_bits(&mut bits, crc as u32, CRC_BITS);
    bits
}

/// Encode one DCI into the `72 * L` coded bits of its PDCCH (before scrambling)
pub fn encode_dci(layout: &DciLayout, dci: &Dci, rnti: Rnti, level: AggregationLevel) -> Vec<u8> {
    let coded = encode(&attach_masked_crc(&layout.pack(dci), rnti));
    RateMatcher::new(layout.coded_bits(), BITS_PER_CCE * level.cces()).rate_match(&coded)
}

/// Percentage of hard decisions on non-erased soft bits that agree with `coded`
fn agreement(coded: &[u8], soft: &[f32]) -> f32 {
    let mut total = 0usize;
    let mut matching = 0usize;
    for (&bit, &llr) in coded.iter().zip(soft.iter()) {
        if llr == 0.0 {
            continue;
        }
        total += 1;
        if (llr > 0.0) == (bit == 0) {
            matching += 1;
        }
    }
    if total == 0 {
        return 0.0;
    }
    100.0 * matching as f32 / total as f32
}

/// Format layout plus rate matchers for every aggregation level
struct FormatCodec {
    layout: DciLayout,
    matchers: Vec<(AggregationLevel, RateMatcher)>,
}

impl FormatCodec {
    fn matcher(&self, level: AggregationLevel) -> Option<&RateMatcher> {
        self.matchers.iter().find(|(l, _)| *l == level).map(|(_, m)| m)
    }
}

/// Per-thread blind decoding context for one cell
pub struct BlindDecoder {
    config: BlindDecoderConfig,
    cell: CellParams,
    codecs: Vec<FormatCodec>,
    viterbi: ViterbiDecoder,
}

impl BlindDecoder {
    /// Build the decode context; fails if no configured format fits the cell
    pub fn new(config: BlindDecoderConfig, cell: CellParams) -> Result<Self, LayerError> {
        if config.formats.is_empty() {
            return Err(LayerError::InvalidConfiguration("no DCI formats configured".to_string()));
        }
        if config.rnti_min > config.rnti_max {
            return Err(LayerError::InvalidConfiguration(format!(
                "RNTI range {}..={} is empty",
                config.rnti_min, config.rnti_max
            )));
        }

        let mut codecs = Vec::with_capacity(config.formats.len());
        for &format in &config.formats {
            let Some(layout) = DciLayout::new(format, cell.nof_prb, cell.nof_ports) else {
                debug!(
                    "Skipping format {} for cell with {} ports",
                    format.label(),
                    cell.nof_ports
                );
                continue;
            };
            let matchers = AggregationLevel::DESCENDING
                .iter()
                .map(|&level| {
                    let e = BITS_PER_CCE * level.cces();
                    (level, RateMatcher::new(layout.coded_bits(), e))
                })
                .collect();
            codecs.push(FormatCodec { layout, matchers });
        }

        if codecs.is_empty() {
            return Err(LayerError::InitializationFailed(format!(
                "none of the configured formats applies to a {}-PRB {}-port cell",
                cell.nof_prb, cell.nof_ports
            )));
        }

        let sizes: Vec<_> = codecs
            .iter()
            .map(|c| (c.layout.format.label(), c.layout.payload_bits))
            .collect();
        debug!("Blind decoder ready for PCI {}: formats {:?}", cell.pci.0, sizes);

        Ok(Self {
            config,
            cell,
            codecs,
            viterbi: ViterbiDecoder::new(),
        })
    }

    /// Cell this context was built for
    pub fn cell(&self) -> &CellParams {
        &self.cell
    }

    /// Thresholds in use
    pub fn thresholds(&self) -> &DecodeThresholds {
        &self.config.thresholds
    }

    /// Try every configured format at one location
    pub fn decode_location(
        &mut self,
        region: &ControlRegion,
        candidate: &Candidate,
        tti: Tti,
    ) -> Vec<DecodedMessage> {
        let Some(soft) = region.cce_llrs(candidate.ncce, candidate.level.cces()) else {
            return Vec::new();
        };

        let mut messages = Vec::new();
        for index in 0..self.codecs.len() {
            if let Some(message) = self.try_format(index, soft, region.nof_cce(), candidate, tti) {
                messages.push(message);
            }
        }
        messages
    }

    fn try_format(
        &mut self,
        index: usize,
        soft: &[f32],
        nof_cce: usize,
        candidate: &Candidate,
        tti: Tti,
    ) -> Option<DecodedMessage> {
        let codec = &self.codecs[index];
        let layout = codec.layout;
        let matcher = codec.matcher(candidate.level)?;

        let streams = matcher.rate_recover(soft);
        let decoded = self.viterbi.decode(&streams)?;
        let (payload, crc_bits) = decoded.split_at(layout.payload_bits);

        let received_crc = crc_bits.iter().fold(0u16, |acc, &b| (acc << 1) | b as u16);
        let rnti = Rnti(received_crc ^ crc16_bits(payload));

        // Re-encode the decoded word and compare against the received soft bits
        let reencoded = matcher.rate_match(&encode(&decoded));
        let confidence = agreement(&reencoded, soft);

        let thresholds = &self.config.thresholds;
        if confidence < thresholds.pass_confidence {
            return None;
        }
        if !rnti.in_range(self.config.rnti_min, self.config.rnti_max) {
            trace!(
                "{} L{} ncce {}: RNTI {} out of range",
                layout.format.label(),
                candidate.level.cces(),
                candidate.ncce,
                rnti
            );
            return None;
        }

        let allow_common = matches!(layout.format, DciFormat::Format0 | DciFormat::Format1A);
        let (level, ncce) = (candidate.level, candidate.ncce);
        if !is_legal_location(rnti, tti.sf_idx(), nof_cce, level, ncce, allow_common) {
            trace!("RNTI {} not legal at L{} ncce {}", rnti, level.cces(), ncce);
            return None;
        }

        // Structural discriminator and field plausibility
        let dci = layout.unpack(payload)?;

        let message = DecodedMessage::from_dci(&dci, rnti, tti, candidate, confidence);
        trace!(
            "TTI {} decoded {} RNTI {} L{} ncce {} prb {} conf {:.1}",
            tti,
            message.format.label(),
            rnti,
            candidate.level.cces(),
            candidate.ncce,
            message.nof_prb,
            confidence
        );
        Some(message)
    }

    /// Decode all unchecked candidates, marking overlaps of every successful location
    pub fn decode_candidates(
        &mut self,
        region: &ControlRegion,
        candidates: &mut [Candidate],
        tti: Tti,
    ) -> Vec<LocationDecode> {
        let mut locations = Vec::new();

        for i in 0..candidates.len() {
            if candidates[i].checked {
                continue;
            }
            let candidate = candidates[i];
            candidates[i].checked = true;

            let messages = self.decode_location(region, &candidate, tti);
            if !messages.is_empty() {
                mark_overlapping(candidates, &candidate.cce_range());
                locations.push(LocationDecode { candidate, messages });
            }
        }

        locations
    }

    /// Generate candidates for the region and decode them
    pub fn decode_subframe(&mut self, region: &ControlRegion, tti: Tti) -> Vec<LocationDecode> {
        let mut candidates = generate_candidates(region, self.config.thresholds.candidate_llr);
        self.decode_candidates(region, &mut candidates, tti)
    }
}
