// Copyright 2021 bmc::labs Gmbh. All rights reserved.
//
// Authors:
//   Florian Eich <florian@bmc-labs.com>
//   Jonas Reitemeyer <alumni@bmc-labs.com>

use super::{c1_channel_number,
            ensure,
            ChannelStore,
            Config,
            EdgeOrder,
            Error,
            EventStore,
            LogFormat,
            Result,
            StateRecord,
            TimeWindow};
use bitcode::{Decode, Encode};
use getset::CopyGetters;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};


/// What to do with a record that predates the last record of its channel.
#[derive(Clone,
         Copy,
         Debug,
         Default,
         PartialEq,
         Eq,
         Hash,
         Serialize,
         Deserialize,
         Encode,
         Decode)]
#[serde(rename_all = "lowercase")]
pub enum OrderingPolicy {
  /// Append unchecked; queries on unsorted channels return garbage.
  Trust,
  /// Refuse the record with `Error::OutOfOrder`.
  #[default]
  Reject,
  /// Insert the record at its chronological position.
  Resort,
}


/// Per-channel overview of the registry contents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct ChannelSummary {
  number:      u32,
  card:        i32,
  pin:         i32,
  records:     usize,
  first:       i64,
  last:        i64,
  high_states: usize,
}


/// Owns one `ChannelStore` per logical channel of a log, in the order the
/// channels first appeared, plus the event stores derived from them.
#[derive(Clone, Debug, PartialEq, CopyGetters, Encode, Decode)]
pub struct ChannelRegistry {
  #[getset(get_copy = "pub")]
  format:     LogFormat,
  #[getset(get_copy = "pub")]
  ordering:   OrderingPolicy,
  #[getset(get_copy = "pub")]
  edge_order: EdgeOrder,
  channels:   Vec<ChannelStore>,
  index:      HashMap<u32, usize>,
  events:     HashMap<u32, EventStore>,
}

impl ChannelRegistry {
  pub fn new(format: LogFormat,
             ordering: OrderingPolicy,
             edge_order: EdgeOrder)
             -> Self {
    Self { format,
           ordering,
           edge_order,
           channels: Vec::new(),
           index: HashMap::new(),
           events: HashMap::new() }
  }

  pub fn from_config(config: &Config) -> Self {
    Self::new(config.ingest().format(),
              config.ingest().ordering(),
              config.events().edge_order())
  }

  /// Number of channels.
  pub fn len(&self) -> usize {
    self.channels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  // INGESTION ------------------------------------------------------------- //
  /// Files `record` under its channel, creating the channel on first sight.
  ///
  /// Fails on records of the other log format, on C1 pins outside the
  /// mapping table and on a second identity claiming an existing channel
  /// number. Out of order records are handled per `OrderingPolicy`.
  pub fn append(&mut self, record: StateRecord) -> Result<()> {
    let found = record.identity().format();
    ensure!(found == self.format,
            Error::WrongFormat { expected: self.format,
                                 found });

    let number = record.identity().number()?;
    let idx = match self.index.get(&number).copied() {
      Some(idx) => idx,
      None => {
        debug!(channel = number, "new channel");
        self.channels.push(ChannelStore::new(record.identity())?);
        self.index.insert(number, self.channels.len() - 1);
        self.channels.len() - 1
      }
    };

    let store = &mut self.channels[idx];
    ensure!(store.identity() == record.identity(),
            Error::IdentityConflict { channel: number });
    match self.ordering {
      OrderingPolicy::Trust => store.append(record),
      OrderingPolicy::Reject => store.append_checked(record)?,
      OrderingPolicy::Resort => store.insert_sorted(record),
    }

    self.events.remove(&number);
    Ok(())
  }

  /// Appends all `records`, stopping at the first failure. Returns the
  /// number of records appended.
  pub fn extend<I>(&mut self, records: I) -> Result<usize>
    where I: IntoIterator<Item = StateRecord>
  {
    let mut count = 0;
    for record in records {
      self.append(record)?;
      count += 1;
    }
    info!(records = count, channels = self.len(), "ingested records");
    Ok(count)
  }

  /// Checks that the channel index and the event cache agree with the
  /// channels, as they must for a registry read back from storage.
  pub(crate) fn check_consistency(&self) -> Result<()> {
    let broken = |what: &str| {
      Error::Session(format!("inconsistent registry: {}", what))
    };

    ensure!(self.index.len() == self.channels.len(),
            broken("index and channels differ in size"));
    for (idx, store) in self.channels.iter().enumerate() {
      ensure!(self.index.get(&store.number()) == Some(&idx),
              broken(&format!("channel {} is not indexed", store.number())));
    }
    for (number, events) in &self.events {
      ensure!(self.index.contains_key(number) && events.channel() == *number,
              broken(&format!("events for unknown channel {}", number)));
    }
    Ok(())
  }

  // LOOKUP ---------------------------------------------------------------- //
  pub fn channel(&self, number: u32) -> Result<&ChannelStore> {
    self.index
        .get(&number)
        .map(|&idx| &self.channels[idx])
        .ok_or(Error::UnknownChannel(number))
  }

  /// Channel stored for a C1 (card, pin) pair. Fails if the pair is unmapped
  /// or the channel it maps to was recorded under another pair.
  pub fn channel_by_card_pin(&self,
                             card: i32,
                             pin: i32)
                             -> Result<&ChannelStore> {
    let store = self.channel(c1_channel_number(card, pin)?)?;
    ensure!(store.card() == card && store.pin() == pin,
            Error::IdentityConflict { channel: store.number() });
    Ok(store)
  }

  /// Channels in the order they first appeared in the log.
  pub fn channels(&self) -> impl Iterator<Item = &ChannelStore> {
    self.channels.iter()
  }

  /// Channels sorted by channel number.
  pub fn sorted_channels(&self) -> Vec<&ChannelStore> {
    let mut channels: Vec<_> = self.channels.iter().collect();
    channels.sort_by_key(|store| store.number());
    channels
  }

  pub fn channel_numbers(&self) -> Vec<u32> {
    self.sorted_channels()
        .iter()
        .map(|store| store.number())
        .collect()
  }

  // QUERIES --------------------------------------------------------------- //
  /// Windowed state query on channel `number`, see `ChannelStore::states`.
  pub fn states(&mut self,
                number: u32,
                window: TimeWindow)
                -> Result<Vec<StateRecord>> {
    let idx = *self.index
                   .get(&number)
                   .ok_or(Error::UnknownChannel(number))?;
    self.channels[idx].states(window.min(), window.current(), window.max())
  }

  pub fn edge_approximate_state(&self,
                                number: u32,
                                window: TimeWindow)
                                -> Result<StateRecord> {
    self.channel(number)?.edge_approximate_state(window.min(),
                                                 window.current(),
                                                 window.max())
  }

  /// Events of channel `number`, derived on first request and kept until a
  /// record is added to the channel.
  pub fn event_store(&mut self, number: u32) -> Result<&EventStore> {
    if !self.events.contains_key(&number) {
      let derived = EventStore::derive(self.channel(number)?, self.edge_order);
      self.events.insert(number, derived);
    }
    self.events.get(&number).ok_or(Error::UnknownChannel(number))
  }

  /// Derives the events of every channel not derived yet.
  pub fn derive_all_events(&mut self) {
    for store in &self.channels {
      if !self.events.contains_key(&store.number()) {
        self.events.insert(store.number(),
                           EventStore::derive(store, self.edge_order));
      }
    }
  }

  pub fn summary(&self) -> Vec<ChannelSummary> {
    self.sorted_channels()
        .into_iter()
        .filter_map(|store| {
          let (first, last) = (store.first().ok()?, store.last().ok()?);
          Some(ChannelSummary { number:      store.number(),
                                card:        store.card(),
                                pin:         store.pin(),
                                records:     store.len(),
                                first:       first.time(),
                                last:        last.time(),
                                high_states: store.high_state_times().len(), })
        })
        .collect()
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::{GroupStore, Level, Session};
  use pretty_assertions::{assert_eq, assert_ne};

  fn l170(time: i64, state: i64, channel: u32) -> StateRecord {
    StateRecord::l170(time, state, channel).unwrap()
  }

  fn c1(time: i64, state: i64, card: i32, pin: i32) -> StateRecord {
    StateRecord::c1(time, state, card, pin).unwrap()
  }

  fn registry(format: LogFormat, ordering: OrderingPolicy) -> ChannelRegistry {
    ChannelRegistry::new(format, ordering, EdgeOrder::default())
  }

  #[test]
  fn registry_test() {
    let mut registry = registry(LogFormat::L170, OrderingPolicy::Reject);
    assert!(registry.is_empty());

    let count = registry.extend(vec![l170(0, 0, 12),
                                     l170(0, 0, 3),
                                     l170(100, 1, 12),
                                     l170(150, 1, 3),
                                     l170(200, 0, 12),
                                     l170(250, 0, 3)])
                        .unwrap();
    assert_eq!(6, count);
    assert_eq!(2, registry.len());

    // insertion order vs sorted order
    let order: Vec<u32> = registry.channels().map(|c| c.number()).collect();
    assert_eq!(vec![12, 3], order);
    assert_eq!(vec![3, 12], registry.channel_numbers());

    assert_eq!(3, registry.channel(12).unwrap().len());
    assert_eq!(Err(Error::UnknownChannel(7)),
               registry.channel(7).map(|c| c.len()));
  }

  #[test]
  fn registry_errors_test() {
    let mut registry = registry(LogFormat::C1, OrderingPolicy::Reject);
    assert_eq!(Err(Error::WrongFormat { expected: LogFormat::C1,
                                        found:    LogFormat::L170, }),
               registry.append(l170(0, 1, 4)));

    registry.append(c1(100, 1, 1, 12)).unwrap();
    // card 5 pin 10 maps onto the same channel as card 1 pin 12
    assert_eq!(Err(Error::IdentityConflict { channel: 10 }),
               registry.append(c1(200, 0, 5, 10)));
    assert_eq!(Err(Error::OutOfOrder { channel:  10,
                                       previous: 100,
                                       next:     50, }),
               registry.append(c1(50, 0, 1, 12)));
    assert_eq!(1, registry.channel(10).unwrap().len());
  }

  #[test]
  fn card_pin_lookup_test() {
    let mut registry = registry(LogFormat::C1, OrderingPolicy::Reject);
    registry.extend(vec![c1(0, 1, 2, 4), c1(10, 1, 1, 12)]).unwrap();

    assert_eq!(27, registry.channel_by_card_pin(2, 4).unwrap().number());
    assert_eq!(10, registry.channel_by_card_pin(1, 12).unwrap().number());
    assert_eq!(Err(Error::IdentityConflict { channel: 10 }),
               registry.channel_by_card_pin(5, 10).map(|c| c.number()));
    assert_eq!(Err(Error::UnmappedChannel { card: 5, pin: 9 }),
               registry.channel_by_card_pin(5, 9).map(|c| c.number()));
    assert_eq!(Err(Error::UnknownChannel(51)),
               registry.channel_by_card_pin(3, 4).map(|c| c.number()));
  }

  #[test]
  fn ordering_policy_test() {
    let records = vec![l170(100, 1, 1), l170(300, 0, 1), l170(200, 0, 1)];

    let mut trusting = registry(LogFormat::L170, OrderingPolicy::Trust);
    trusting.extend(records.clone()).unwrap();
    assert_eq!(false, trusting.channel(1).unwrap().is_sorted());

    let mut resorting = registry(LogFormat::L170, OrderingPolicy::Resort);
    resorting.extend(records.clone()).unwrap();
    let times: Vec<i64> = resorting.channel(1)
                                   .unwrap()
                                   .records()
                                   .iter()
                                   .map(|r| r.time())
                                   .collect();
    assert_eq!(vec![100, 200, 300], times);

    let mut rejecting = registry(LogFormat::L170, OrderingPolicy::Reject);
    assert!(rejecting.extend(records).is_err());
    assert_eq!(2, rejecting.channel(1).unwrap().len());
  }

  #[test]
  fn windowed_queries_test() {
    let mut registry = registry(LogFormat::L170, OrderingPolicy::Reject);
    registry.extend(vec![l170(100, 0, 5), l170(200, 1, 5), l170(300, 0, 5)])
            .unwrap();

    let window = TimeWindow::new(150, 250, 350).unwrap();
    let states = registry.states(5, window).unwrap();
    assert_eq!(3, states.len());
    assert_eq!(1, registry.channel(5).unwrap().jump_index());

    let edge = registry.edge_approximate_state(5, window).unwrap();
    assert_eq!(150, edge.time());
    assert_eq!(Level::Low, edge.level());

    assert_eq!(Err(Error::UnknownChannel(6)),
               registry.states(6, window).map(|s| s.len()));
  }

  #[test]
  fn event_store_cache_test() {
    let mut registry = registry(LogFormat::L170, OrderingPolicy::Reject);
    registry.extend(vec![l170(0, 1, 2), l170(10, 0, 2), l170(20, 1, 2)])
            .unwrap();

    let before = registry.event_store(2).unwrap().clone();
    assert_eq!(1, before.len());
    assert_eq!(1, before.dropped().len());

    // appending invalidates the cached derivation
    registry.append(l170(30, 0, 2)).unwrap();
    let after = registry.event_store(2).unwrap().clone();
    assert_eq!(2, after.len());
    assert_ne!(before, after);

    assert_eq!(Err(Error::UnknownChannel(9)),
               registry.event_store(9).map(|e| e.len()));
  }

  #[test]
  fn consistency_test() {
    let mut registry = registry(LogFormat::L170, OrderingPolicy::Reject);
    registry.extend(vec![l170(0, 1, 1), l170(10, 0, 1), l170(5, 1, 2)])
            .unwrap();
    registry.derive_all_events();
    assert_eq!(Ok(()), registry.check_consistency());

    let mut dangling = registry.clone();
    dangling.index.insert(1, 7);
    assert!(dangling.check_consistency().is_err());

    let mut extra = registry.clone();
    extra.index.insert(3, 1);
    assert!(extra.check_consistency().is_err());

    let mut stale = registry.clone();
    let events = stale.events[&1].clone();
    stale.events.insert(9, events);
    assert!(stale.check_consistency().is_err());

    // a saved registry with a dangling index entry is refused on load
    let session = Session::new(dangling, GroupStore::new());
    assert!(matches!(Session::from_bytes(&session.to_bytes()),
                     Err(Error::Session(_))));
  }

  #[test]
  fn summary_test() {
    let mut registry = registry(LogFormat::C1, OrderingPolicy::Reject);
    registry.extend(vec![c1(500, 1, 3, 4),
                         c1(0, 0, 1, 4),
                         c1(700, 0, 3, 4),
                         c1(900, 1, 3, 4)])
            .unwrap();
    registry.derive_all_events();
    assert_eq!(1, registry.event_store(51).unwrap().len());

    let summary = registry.summary();
    assert_eq!(2, summary.len());
    assert_eq!(2, summary[0].number());
    assert_eq!(1, summary[0].card());
    assert_eq!(51, summary[1].number());
    assert_eq!(3, summary[1].records());
    assert_eq!(500, summary[1].first());
    assert_eq!(900, summary[1].last());
    assert_eq!(2, summary[1].high_states());
  }
}
