//! Usage Accounting and Rate Prediction
//!
//! Condenses finalized subframe results into per-subframe PRB/TBS samples and
//! predicts achievable throughput from the recent window.

use crate::mac::subframe_resolver::SubframeDecodeResult;
use crate::phy::pdcch::DecodedMessage;
use crate::LayerError;
use common::types::{CarrierId, Rnti};
use serde::{Deserialize, Serialize};

/// Packet size the rate prediction is expressed in
pub const PACKET_BYTES: u32 = 1500;

/// Per-subframe accounting fields
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSample {
    pub index: u64,
    /// PRB budget of the cell
    pub cell_prb: u16,
    pub cell_dl_prb: u32,
    pub cell_ul_prb: u32,
    pub ue_dl_prb: u32,
    pub ue_ul_prb: u32,
    /// MCS of the target's first downlink transport block
    pub mcs: u8,
    /// Target downlink TBS in bits
    pub tbs: u32,
    /// Target downlink TBS assuming the 256QAM table
    pub tbs_hm: u32,
}

impl UsageSample {
    /// Account one subframe; UE columns stay zero without a target
    pub fn from_result(result: &SubframeDecodeResult, target: Option<Rnti>) -> Self {
        let mine = |m: &&DecodedMessage| Some(m.rnti) == target;

        let mut sample = Self {
            index: result.index,
            cell_prb: result.cell_prb,
            cell_dl_prb: result.dl_prb(),
            cell_ul_prb: result.ul_prb(),
            ..Default::default()
        };
        for message in result.downlink.iter().filter(mine) {
            sample.ue_dl_prb += message.nof_prb as u32;
            sample.tbs += message.total_tbs();
            sample.tbs_hm += message.total_tbs_hm();
            sample.mcs = message.tb[0].mcs;
        }
        sample.ue_ul_prb = result.uplink.iter().filter(mine).map(|m| m.nof_prb as u32).sum();
        sample
    }

    /// Whether the target was scheduled in this subframe
    pub fn target_scheduled(&self) -> bool {
        self.ue_dl_prb > 0 || self.ue_ul_prb > 0
    }
}

/// Report columns for one carrier, oldest subframe first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CarrierReport {
    pub carrier: usize,
    /// Target scheduled anywhere in the window
    pub active: bool,
    pub cell_dl_prb: Vec<u32>,
    pub cell_ul_prb: Vec<u32>,
    pub ue_dl_prb: Vec<u32>,
    pub ue_ul_prb: Vec<u32>,
    pub mcs: Vec<u8>,
    pub tbs: Vec<u32>,
    pub tbs_hm: Vec<u32>,
}

impl CarrierReport {
    pub fn from_samples(carrier: CarrierId, samples: &[UsageSample]) -> Self {
        Self {
            carrier: carrier.0,
            active: samples.iter().any(UsageSample::target_scheduled),
            cell_dl_prb: samples.iter().map(|s| s.cell_dl_prb).collect(),
            cell_ul_prb: samples.iter().map(|s| s.cell_ul_prb).collect(),
            ue_dl_prb: samples.iter().map(|s| s.ue_dl_prb).collect(),
            ue_ul_prb: samples.iter().map(|s| s.ue_ul_prb).collect(),
            mcs: samples.iter().map(|s| s.mcs).collect(),
            tbs: samples.iter().map(|s| s.tbs).collect(),
            tbs_hm: samples.iter().map(|s| s.tbs_hm).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.cell_dl_prb.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cell_dl_prb.is_empty()
    }
}

/// Status query result across the carrier group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    /// Group header (unwrapped subframe index)
    pub header: Option<u64>,
    pub synchronized: bool,
    pub carriers: Vec<CarrierReport>,
}

impl StatusReport {
    /// Render as a single-line JSON document
    pub fn to_json(&self) -> Result<String, LayerError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Throughput prediction in microseconds per packet
///
/// Rates are `None` when the target had no downlink PRBs in the window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RateEstimate {
    /// Rate a probe would see using the idle PRBs plus the target's share
    pub probe_us_per_pkt: Option<f64>,
    /// Rate with every PRB of every carrier
    pub full_load_us_per_pkt: Option<f64>,
    /// Rate the target actually received
    pub ue_us_per_pkt: Option<f64>,
    /// Downlink PRB utilization over all carriers
    pub cell_usage_pct: f64,
}

#[derive(Debug, Default)]
struct WindowTotals {
    subframes: u64,
    budget: u64,
    cell_dl_prb: u64,
    ue_dl_prb: u64,
    ue_tbs: u64,
}

impl WindowTotals {
    fn of(samples: &[UsageSample]) -> Self {
        let mut totals = Self::default();
        for s in samples {
            totals.subframes += 1;
            totals.budget += s.cell_prb as u64;
            totals.cell_dl_prb += s.cell_dl_prb as u64;
            totals.ue_dl_prb += s.ue_dl_prb as u64;
            totals.ue_tbs += s.tbs as u64;
        }
        totals
    }

    /// Target bits per PRB
    fn efficiency(&self) -> Option<f64> {
        (self.ue_dl_prb > 0).then(|| self.ue_tbs as f64 / self.ue_dl_prb as f64)
    }
}

fn us_per_packet(bits_per_ms: f64) -> Option<f64> {
    (bits_per_ms > 0.0).then(|| (PACKET_BYTES * 8) as f64 / bits_per_ms * 1000.0)
}

impl RateEstimate {
    /// Aggregate one window of samples per carrier
    pub fn from_windows<'a, I>(windows: I) -> Self
    where
        I: IntoIterator<Item = &'a [UsageSample]>,
    {
        let mut budget = 0u64;
        let mut used = 0u64;
        let mut ue_rate = 0.0;
        let mut full_rate = 0.0;
        let mut probe_rate = 0.0;
        let mut have_target = false;

        for samples in windows {
            let totals = WindowTotals::of(samples);
            if totals.subframes == 0 {
                continue;
            }
            budget += totals.budget;
            used += totals.cell_dl_prb.min(totals.budget);

            let Some(bits_per_prb) = totals.efficiency() else {
                continue;
            };
            have_target = true;
            let n = totals.subframes as f64;
            let idle = totals.budget.saturating_sub(totals.cell_dl_prb) as f64;
            ue_rate += totals.ue_tbs as f64 / n;
            full_rate += bits_per_prb * totals.budget as f64 / n;
            probe_rate += bits_per_prb * (idle + totals.ue_dl_prb as f64) / n;
        }

        let cell_usage_pct = if budget > 0 {
            used as f64 * 100.0 / budget as f64
        } else {
            0.0
        };

        if !have_target {
            return Self {
                cell_usage_pct,
                ..Default::default()
            };
        }

        Self {
            probe_us_per_pkt: us_per_packet(probe_rate),
            full_load_us_per_pkt: us_per_packet(full_rate),
            ue_us_per_pkt: us_per_packet(ue_rate),
            cell_usage_pct,
        }
    }
}
