// Copyright 2021 bmc::labs Gmbh. All rights reserved.
//
// Authors:
//   Florian Eich <florian@bmc-labs.com>
//   Jonas Reitemeyer <alumni@bmc-labs.com>

use super::{ensure, Error, Result};
use getset::CopyGetters;


/// Visible time range of a graph around the current playback time, all in
/// milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct TimeWindow {
  min:     i64,
  current: i64,
  max:     i64,
}

impl TimeWindow {
  pub fn new(min: i64, current: i64, max: i64) -> Result<Self> {
    ensure!(min <= current && current <= max,
            Error::InvalidWindow { min, current, max });
    Ok(Self { min, current, max })
  }

  /// Window of `width` milliseconds with `current` in its middle. Negative
  /// widths collapse to a single instant.
  pub fn centered(current: i64, width: i64) -> Self {
    let half = width.max(0) / 2;
    Self { min: current - half,
           current,
           max: current + half }
  }

  pub fn width(&self) -> i64 {
    self.max - self.min
  }
}
