// Copyright 2021 bmc::labs Gmbh. All rights reserved.
//
// Authors:
//   Florian Eich <florian@bmc-labs.com>
//   Jonas Reitemeyer <alumni@bmc-labs.com>

use super::{ChannelIdentity, Error, Result};
use bitcode::{Decode, Encode};
use getset::CopyGetters;


/// Binary state of a detector input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Encode, Decode)]
pub enum Level {
  Low,
  High,
}

impl Level {
  /// Parses the raw 0/1 state found in both log formats.
  pub fn from_raw(raw: i64) -> Result<Self> {
    match raw {
      0 => Ok(Level::Low),
      1 => Ok(Level::High),
      _ => Err(Error::InvalidLevel(raw)),
    }
  }

  pub fn as_raw(self) -> u8 {
    match self {
      Level::Low => 0,
      Level::High => 1,
    }
  }

  pub fn is_high(self) -> bool {
    self == Level::High
  }
}


/// One timestamped sample of a channel. Immutable once created.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, CopyGetters, Encode, Decode)]
#[getset(get_copy = "pub")]
pub struct StateRecord {
  /// Milliseconds since the start of the log.
  time:     i64,
  level:    Level,
  identity: ChannelIdentity,
}

impl StateRecord {
  pub fn new(time: i64, level: Level, identity: ChannelIdentity) -> Self {
    Self { time,
           level,
           identity }
  }

  /// Record from a C1 log line. Fails on unmapped (card, pin) pairs and on
  /// states other than 0/1.
  pub fn c1(time: i64, raw_state: i64, card: i32, pin: i32) -> Result<Self> {
    Ok(Self::new(time,
                 Level::from_raw(raw_state)?,
                 ChannelIdentity::card_pin(card, pin)?))
  }

  /// Record from an L170 log line.
  pub fn l170(time: i64, raw_state: i64, channel: u32) -> Result<Self> {
    Ok(Self::new(time,
                 Level::from_raw(raw_state)?,
                 ChannelIdentity::flat(channel)))
  }

  pub fn card(&self) -> i32 {
    self.identity.card()
  }

  pub fn pin(&self) -> i32 {
    self.identity.pin()
  }

  /// Copy of this record moved to `time`.
  pub fn at(&self, time: i64) -> Self {
    Self { time, ..*self }
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::{assert_eq, assert_ne};

  #[test]
  fn level_test() {
    assert_eq!(Ok(Level::Low), Level::from_raw(0));
    assert_eq!(Ok(Level::High), Level::from_raw(1));
    assert_eq!(Err(Error::InvalidLevel(2)), Level::from_raw(2));
    assert_eq!(Err(Error::InvalidLevel(-1)), Level::from_raw(-1));
    assert_eq!(1, Level::High.as_raw());
    assert_eq!(false, Level::Low.is_high());
  }

  #[test]
  fn state_record_test() {
    let record = StateRecord::c1(1_500, 1, 3, 4).unwrap();
    assert_eq!(1_500, record.time());
    assert_eq!(Level::High, record.level());
    assert_eq!(3, record.card());
    assert_eq!(4, record.pin());

    let moved = record.at(2_000);
    assert_eq!(2_000, moved.time());
    assert_eq!(record.level(), moved.level());
    assert_eq!(record.identity(), moved.identity());
    assert_ne!(record, moved);

    let record = StateRecord::l170(10, 0, 7).unwrap();
    assert_eq!(-1, record.card());
    assert_eq!(7, record.pin());

    assert_eq!(Err(Error::UnmappedChannel { card: 5, pin: 9 }),
               StateRecord::c1(0, 1, 5, 9));
    assert_eq!(Err(Error::InvalidLevel(3)), StateRecord::l170(0, 3, 1));
  }
}
