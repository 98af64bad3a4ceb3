// Copyright 2021 bmc::labs Gmbh. All rights reserved.
//
// Authors:
//   Florian Eich <florian@bmc-labs.com>
//   Jonas Reitemeyer <alumni@bmc-labs.com>

use super::ChannelStore;
use getset::{CopyGetters, Getters};
use serde::{Deserialize, Serialize};


const MS_PER_HOUR: f64 = 3_600_000.0;
const FEET_PER_MILE: f64 = 5_280.0;


/// Physical constants of a detector pair and the speeds considered real.
#[derive(Clone, Copy, Debug, PartialEq, CopyGetters, Serialize, Deserialize)]
#[getset(get_copy = "pub")]
#[serde(default)]
pub struct SpeedConfig {
  /// Distance between the upstream and downstream detector, in feet.
  detector_spacing: f64,
  /// Factor turning spacing units per millisecond into reported units. The
  /// default turns ft/ms into mph.
  scale:            f64,
  min_speed:        f64,
  max_speed:        f64,
}

impl Default for SpeedConfig {
  fn default() -> Self {
    Self { detector_spacing: 20.0,
           scale:            MS_PER_HOUR / FEET_PER_MILE,
           min_speed:        15.0,
           max_speed:        100.0, }
  }
}

impl SpeedConfig {
  pub fn new(detector_spacing: f64,
             scale: f64,
             min_speed: f64,
             max_speed: f64)
             -> Self {
    Self { detector_spacing,
           scale,
           min_speed,
           max_speed }
  }

  pub fn is_plausible(&self, speed: f64) -> bool {
    self.min_speed <= speed && speed <= self.max_speed
  }
}


/// One upstream trigger matched to its downstream trigger.
#[derive(Clone, Copy, Debug, PartialEq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct SpeedSample {
  upstream:   i64,
  downstream: i64,
  speed:      f64,
  plausible:  bool,
}

impl SpeedSample {
  pub fn elapsed(&self) -> i64 {
    self.downstream - self.upstream
  }
}


/// Outcome of one estimation run.
#[derive(Clone, Debug, PartialEq, CopyGetters, Getters)]
pub struct SpeedReport {
  #[getset(get = "pub")]
  samples:   Vec<SpeedSample>,
  /// Upstream triggers without a usable downstream trigger.
  #[getset(get_copy = "pub")]
  unmatched: usize,
  /// Mean over plausible samples, `0.0` if there are none.
  #[getset(get_copy = "pub")]
  mean:      f64,
}

impl SpeedReport {
  pub fn plausible(&self) -> impl Iterator<Item = &SpeedSample> {
    self.samples.iter().filter(|sample| sample.plausible())
  }
}


/// Estimates vehicle speed in one lane from the trigger times of an
/// upstream and a downstream detector.
///
/// Holds no state besides its configuration, so it is rerun whenever the
/// time filter or the channel pair changes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Getters)]
#[getset(get = "pub")]
pub struct SpeedEstimator {
  config: SpeedConfig,
}

impl SpeedEstimator {
  pub fn new(config: SpeedConfig) -> Self {
    Self { config }
  }

  /// Mean plausible speed of vehicles triggering `upstream` within
  /// `[start, end]`.
  pub fn average_speed(&self,
                       upstream: &ChannelStore,
                       downstream: &ChannelStore,
                       start: i64,
                       end: i64)
                       -> f64 {
    self.report(upstream, downstream, start, end).mean()
  }

  pub fn report(&self,
                upstream: &ChannelStore,
                downstream: &ChannelStore,
                start: i64,
                end: i64)
                -> SpeedReport {
    self.report_from_times(&upstream.high_state_times(),
                           &downstream.high_state_times(),
                           start,
                           end)
  }

  /// Matches every upstream time in `[start, end]` to the first downstream
  /// time strictly after it. Both slices must be sorted ascending.
  pub fn report_from_times(&self,
                           upstream: &[i64],
                           downstream: &[i64],
                           start: i64,
                           end: i64)
                           -> SpeedReport {
    let mut samples = Vec::new();
    let mut unmatched = 0;

    for &up in upstream.iter().filter(|&&t| start <= t && t <= end) {
      // an exact hit still moves on to the next downstream trigger
      let idx = downstream.partition_point(|&down| down <= up);
      let down = match downstream.get(idx) {
        Some(&down) => down,
        None => {
          unmatched += 1;
          continue;
        }
      };

      match self.speed_for(down - up) {
        Some(speed) => {
          samples.push(SpeedSample { upstream: up,
                                     downstream: down,
                                     speed,
                                     plausible: self.config
                                                    .is_plausible(speed) })
        }
        None => unmatched += 1,
      }
    }

    let plausible: Vec<f64> = samples.iter()
                                     .filter(|s| s.plausible())
                                     .map(|s| s.speed())
                                     .collect();
    let mean = if plausible.is_empty() {
      0.0
    } else {
      plausible.iter().sum::<f64>() / plausible.len() as f64
    };

    SpeedReport { samples,
                  unmatched,
                  mean }
  }

  /// Speed for a vehicle needing `elapsed` ms between the detectors. `None`
  /// for zero (missing data) or negative elapsed times.
  pub fn speed_for(&self, elapsed: i64) -> Option<f64> {
    if elapsed <= 0 {
      return None;
    }
    Some(self.config.detector_spacing() / elapsed as f64 * self.config.scale())
  }
}
