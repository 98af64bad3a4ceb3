// Copyright 2021 bmc::labs Gmbh. All rights reserved.
//
// Authors:
//   Florian Eich <florian@bmc-labs.com>
//   Jonas Reitemeyer <alumni@bmc-labs.com>

use super::{EdgeOrder, LogFormat, OrderingPolicy, SpeedConfig, TimeWindow};
use eyre::{Result, WrapErr};
use getset::{CopyGetters, Getters};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};


/// Settings of an analysis session. Every section and field falls back to
/// its default when missing from the file.
#[derive(Clone,
         Debug,
         Default,
         PartialEq,
         Getters,
         Serialize,
         Deserialize)]
#[getset(get = "pub")]
#[serde(default)]
pub struct Config {
  speed:    SpeedConfig,
  events:   EventConfig,
  ingest:   IngestConfig,
  playback: PlaybackConfig,
}

#[derive(Clone,
         Copy,
         Debug,
         Default,
         PartialEq,
         CopyGetters,
         Serialize,
         Deserialize)]
#[getset(get_copy = "pub")]
#[serde(default)]
pub struct EventConfig {
  edge_order: EdgeOrder,
}

#[derive(Clone,
         Copy,
         Debug,
         Default,
         PartialEq,
         CopyGetters,
         Serialize,
         Deserialize)]
#[getset(get_copy = "pub")]
#[serde(default)]
pub struct IngestConfig {
  format:   LogFormat,
  ordering: OrderingPolicy,
}

#[derive(Clone, Copy, Debug, PartialEq, CopyGetters, Serialize, Deserialize)]
#[getset(get_copy = "pub")]
#[serde(default)]
pub struct PlaybackConfig {
  /// Playback speed of the video the graphs follow, 1.0 is real time.
  base_rate:        f64,
  /// Time span shown by a graph, in ms.
  visible_width_ms: i64,
}

impl Default for PlaybackConfig {
  fn default() -> Self {
    Self { base_rate:        1.0,
           visible_width_ms: 10_000, }
  }
}

impl PlaybackConfig {
  /// The visible window around playback time `current`.
  pub fn window(&self, current: i64) -> TimeWindow {
    TimeWindow::centered(current, self.visible_width_ms)
  }
}

impl Config {
  pub fn load(path: &Path) -> Result<Self> {
    let contents = fs::read_to_string(path).wrap_err_with(|| {
                     format!("unable to read config ({})", path.display())
                   })?;
    Self::from_yaml(&contents).wrap_err_with(|| {
                                format!("invalid config ({})", path.display())
                              })
  }

  pub fn from_yaml(yaml: &str) -> crate::Result<Self> {
    Ok(serde_yaml::from_str(yaml)?)
  }
}
