//! Monitor helpers - read-side views of the sample store
//!
//! The display loop in the `nuprism-monitor` binary polls the store on a
//! fixed refresh interval and prints what these helpers produce. Nothing
//! here writes to the store.

use std::fmt::{self, Write as _};
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use crate::protocol::constants::{NUM_ADC, NUM_CH_PER_ADC};
use crate::protocol::sample_to_full_scale;
use crate::store::{SampleStore, StoreError};

/// Refresh interval when every ADC is displayed
pub const REFRESH_ALL: Duration = Duration::from_millis(200);
/// Refresh interval for a single ADC
pub const REFRESH_SINGLE: Duration = Duration::from_millis(50);

/// Glyphs for the sparkline, lowest to highest
const SPARK_GLYPHS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Width of the sparkline drawn per channel
pub const SPARK_WIDTH: usize = 48;

/// Which ADCs the monitor displays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdcSelection {
    #[default]
    All,
    /// 0-based ADC index
    Single(usize),
}

impl AdcSelection {
    /// 0-based ADC indices covered by this selection
    pub fn adc_ids(self) -> Vec<usize> {
        match self {
            AdcSelection::All => (0..NUM_ADC).collect(),
            AdcSelection::Single(id) => vec![id],
        }
    }

    pub fn default_refresh(self) -> Duration {
        match self {
            AdcSelection::All => REFRESH_ALL,
            AdcSelection::Single(_) => REFRESH_SINGLE,
        }
    }
}

impl FromStr for AdcSelection {
    type Err = String;

    /// Accepts `all` or a 1-based ADC number. Numbers outside 1..=5 are
    /// clamped into range.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(AdcSelection::All);
        }
        let n: i64 = s
            .parse()
            .map_err(|_| format!("expected 'all' or an ADC number, got '{}'", s))?;
        let n = n.clamp(1, NUM_ADC as i64) as usize;
        Ok(AdcSelection::Single(n - 1))
    }
}

impl fmt::Display for AdcSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdcSelection::All => write!(f, "all"),
            AdcSelection::Single(id) => write!(f, "{}", id + 1),
        }
    }
}

/// Statistics over the filled part of one channel
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ChannelSummary {
    pub filled: usize,
    pub capacity: usize,
    pub last: Option<i16>,
    pub min: Option<i16>,
    pub max: Option<i16>,
    pub mean: Option<f64>,
}

impl ChannelSummary {
    /// Summarise a store snapshot (oldest first, `None` for unfilled slots)
    pub fn from_snapshot(snapshot: &[Option<i16>]) -> Self {
        let mut summary = ChannelSummary {
            capacity: snapshot.len(),
            ..Default::default()
        };
        let mut sum: i64 = 0;

        for &sample in snapshot.iter().flatten() {
            summary.filled += 1;
            summary.last = Some(sample);
            summary.min = Some(summary.min.map_or(sample, |m| m.min(sample)));
            summary.max = Some(summary.max.map_or(sample, |m| m.max(sample)));
            sum += sample as i64;
        }

        if summary.filled > 0 {
            summary.mean = Some(sum as f64 / summary.filled as f64);
        }
        summary
    }

    /// Latest sample as a percentage of full scale
    pub fn last_percent(&self) -> Option<f64> {
        self.last.map(|s| sample_to_full_scale(s) * 100.0)
    }

    pub fn fill_ratio(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.filled as f64 / self.capacity as f64
        }
    }
}

/// Draw the most recent samples as a fixed-width sparkline.
///
/// Samples are bucketed into `width` columns by averaging; the vertical
/// scale spans the min..max of the input.
pub fn sparkline(samples: &[i16], width: usize) -> String {
    if samples.is_empty() || width == 0 {
        return String::new();
    }

    let columns: Vec<f64> = if samples.len() <= width {
        samples.iter().map(|&s| s as f64).collect()
    } else {
        (0..width)
            .map(|col| {
                let start = col * samples.len() / width;
                let end = ((col + 1) * samples.len() / width).max(start + 1);
                let chunk = &samples[start..end];
                chunk.iter().map(|&s| s as f64).sum::<f64>() / chunk.len() as f64
            })
            .collect()
    };

    let lo = columns.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = columns.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = hi - lo;
    let top = (SPARK_GLYPHS.len() - 1) as f64;

    columns
        .iter()
        .map(|&v| {
            let level = if span > 0.0 {
                ((v - lo) / span * top).round() as usize
            } else {
                0
            };
            SPARK_GLYPHS[level.min(SPARK_GLYPHS.len() - 1)]
        })
        .collect()
}

/// Summaries of all channels of one ADC
pub fn summarize_adc(
    store: &SampleStore,
    adc_id: usize,
) -> Result<[ChannelSummary; NUM_CH_PER_ADC], StoreError> {
    let snapshots = store.snapshot_adc(adc_id)?;
    Ok(std::array::from_fn(|ch| {
        ChannelSummary::from_snapshot(&snapshots[ch])
    }))
}

/// Render the selected ADCs as a text block
pub fn render(store: &SampleStore, selection: AdcSelection) -> Result<String, StoreError> {
    let mut out = String::new();

    for adc_id in selection.adc_ids() {
        let summaries = summarize_adc(store, adc_id)?;
        let _ = writeln!(
            out,
            "ADC {}  [{} / {} samples ({:.0}%), {} received]",
            adc_id + 1,
            summaries[0].filled,
            summaries[0].capacity,
            summaries[0].fill_ratio() * 100.0,
            store.total_pushed(adc_id)?
        );

        for (ch, summary) in summaries.iter().enumerate() {
            let _ = write!(out, "  ch{} ", ch);
            match (summary.last, summary.min, summary.max, summary.mean) {
                (Some(last), Some(min), Some(max), Some(mean)) => {
                    let recent = store.recent(adc_id, ch)?;
                    let _ = writeln!(
                        out,
                        "last {:>6} ({:>6.1}%)  min {:>6}  max {:>6}  mean {:>8.1}  {}",
                        last,
                        summary.last_percent().unwrap_or_default(),
                        min,
                        max,
                        mean,
                        sparkline(&recent, SPARK_WIDTH)
                    );
                }
                _ => {
                    let _ = writeln!(out, "(no data)");
                }
            }
        }
    }

    Ok(out)
}
