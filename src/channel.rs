// Copyright 2021 bmc::labs Gmbh. All rights reserved.
//
// Authors:
//   Florian Eich <florian@bmc-labs.com>
//   Jonas Reitemeyer <alumni@bmc-labs.com>

use super::{ensure, ChannelIdentity, Error, Level, Result, StateRecord};
use bitcode::{Decode, Encode};
use getset::{CopyGetters, Getters};


/// Holds the chronologically ordered records of one logical channel.
///
/// Records are appended during ingestion only. Afterwards the store is read
/// only, except for the jump index, which every windowed query refreshes so
/// playback can step to the neighbouring state change.
#[derive(Clone, Debug, PartialEq, CopyGetters, Getters, Encode, Decode)]
pub struct ChannelStore {
  #[getset(get_copy = "pub")]
  number:     u32,
  #[getset(get_copy = "pub")]
  identity:   ChannelIdentity,
  #[getset(get = "pub")]
  records:    Vec<StateRecord>,
  /// Index of the record in force at the last queried playback time.
  #[getset(get_copy = "pub")]
  jump_index: usize,
}

impl ChannelStore {
  pub fn new(identity: ChannelIdentity) -> Result<Self> {
    Ok(Self { number: identity.number()?,
              identity,
              records: Vec::new(),
              jump_index: 0 })
  }

  pub fn card(&self) -> i32 {
    self.identity.card()
  }

  pub fn pin(&self) -> i32 {
    self.identity.pin()
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  // INGESTION ------------------------------------------------------------- //
  /// Adds `record` at the end. The caller guarantees chronological order,
  /// nothing is checked here.
  pub fn append(&mut self, record: StateRecord) {
    self.records.push(record);
  }

  /// Adds `record` at the end, refusing it if it predates the last record.
  pub fn append_checked(&mut self, record: StateRecord) -> Result<()> {
    if let Some(last) = self.records.last() {
      ensure!(last.time() <= record.time(),
              Error::OutOfOrder { channel: self.number,
                                  previous: last.time(),
                                  next: record.time() });
    }
    self.records.push(record);
    Ok(())
  }

  /// Inserts `record` at its chronological position, behind all records
  /// sharing its timestamp.
  pub fn insert_sorted(&mut self, record: StateRecord) {
    let idx = self.records.partition_point(|r| r.time() <= record.time());
    self.records.insert(idx, record);
  }

  pub fn is_sorted(&self) -> bool {
    self.records.windows(2).all(|w| w[0].time() <= w[1].time())
  }

  // QUERIES --------------------------------------------------------------- //
  pub fn first(&self) -> Result<&StateRecord> {
    self.records.first().ok_or(Error::EmptyStore { channel: self.number })
  }

  pub fn last(&self) -> Result<&StateRecord> {
    self.records.last().ok_or(Error::EmptyStore { channel: self.number })
  }

  /// Returns the records needed to draw this channel between `min` and `max`.
  ///
  /// The walk starts at the first record past `max`, or at the last record if
  /// none is, and collects records backwards up to and including the first
  /// one strictly before `min`. That covers `(min, max]` plus one record on
  /// either side, so the step function can be drawn across both edges of
  /// the window. A window before the first record yields the first record
  /// alone. The result is chronological and contiguous.
  ///
  /// While walking the window backwards, the first record found at or before
  /// `current` becomes the new jump index.
  pub fn states(&mut self,
                min: i64,
                current: i64,
                max: i64)
                -> Result<Vec<StateRecord>> {
    ensure!(!self.is_empty(), Error::EmptyStore { channel: self.number });

    // first record past `max`, clamped to the last record
    let start = self.records
                    .partition_point(|r| r.time() <= max)
                    .min(self.len() - 1);

    let mut jump = None;
    let mut states = Vec::new();
    for (idx, record) in self.records[..=start].iter().enumerate().rev() {
      if jump.is_none() && record.time() <= current {
        jump = Some(idx);
      }
      states.push(*record);
      if record.time() < min {
        break;
      }
    }

    if let Some(idx) = jump {
      self.jump_index = idx;
    }
    states.reverse();
    Ok(states)
  }

  /// Synthesizes a sample at a window edge so a graph does not appear to end
  /// where the recording does.
  ///
  /// If `current` is closer to the first record than to the last one, the
  /// first record's level is placed at `max`, otherwise the last record's
  /// level is placed at `min`. Ties go to the last record.
  pub fn edge_approximate_state(&self,
                                min: i64,
                                current: i64,
                                max: i64)
                                -> Result<StateRecord> {
    let (first, last) = (self.first()?, self.last()?);
    if current - first.time() < last.time() - current {
      Ok(first.at(max))
    } else {
      Ok(last.at(min))
    }
  }

  /// Level in force at `time`, i.e. the level of the latest record at or
  /// before it. `None` before the first record.
  pub fn state_at(&self, time: i64) -> Result<Option<Level>> {
    ensure!(!self.is_empty(), Error::EmptyStore { channel: self.number });
    let idx = self.records.partition_point(|r| r.time() <= time);
    Ok(idx.checked_sub(1).map(|idx| self.records[idx].level()))
  }

  /// Timestamps of all high states, in record order. This is the trigger
  /// sequence speed estimation searches in.
  pub fn high_state_times(&self) -> Vec<i64> {
    self.records
        .iter()
        .filter(|record| record.level().is_high())
        .map(|record| record.time())
        .collect()
  }

  // FRAME NAVIGATION ------------------------------------------------------ //
  /// Moves the jump index to the latest record at or before `time` and
  /// returns it, or `None` if `time` precedes the recording.
  pub fn seek(&mut self, time: i64) -> Option<usize> {
    let idx = self.records
                  .partition_point(|r| r.time() <= time)
                  .checked_sub(1)?;
    self.jump_index = idx;
    Some(idx)
  }

  /// Time of the record following the jump index.
  pub fn next_transition_time(&self) -> Option<i64> {
    self.records.get(self.jump_index + 1).map(|record| record.time())
  }

  /// Time of the record preceding the jump index.
  pub fn previous_transition_time(&self) -> Option<i64> {
    self.jump_index
        .checked_sub(1)
        .and_then(|idx| self.records.get(idx))
        .map(|record| record.time())
  }
}
