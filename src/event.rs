// Copyright 2021 bmc::labs Gmbh. All rights reserved.
//
// Authors:
//   Florian Eich <florian@bmc-labs.com>
//   Jonas Reitemeyer <alumni@bmc-labs.com>

use super::{ensure,
            ChannelIdentity,
            ChannelStore,
            Error,
            Level,
            Result,
            StateRecord};
use bitcode::{Decode, Encode};
use getset::{CopyGetters, Getters};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};


/// Which chronological order an event's edges must be in.
///
/// Older cabinet software asserted `start > end` when pairing edges, which
/// contradicts every other use of the start/end fields. `StartBeforeEnd` is
/// what the data means, `StartAfterEnd` reproduces the old assertion (and
/// therefore refuses every naturally paired event).
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
#[serde(rename_all = "snake_case")]
pub enum EdgeOrder {
  #[default]
  StartBeforeEnd,
  StartAfterEnd,
}

impl EdgeOrder {
  pub fn accepts(self, start: i64, end: i64) -> bool {
    match self {
      EdgeOrder::StartBeforeEnd => start <= end,
      EdgeOrder::StartAfterEnd => start > end,
    }
  }
}


/// A rising edge paired with the falling edge that ends it: one interval in
/// which a vehicle was present over the detector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, CopyGetters, Encode, Decode)]
#[getset(get_copy = "pub")]
pub struct Event {
  start: StateRecord,
  end:   StateRecord,
}

impl Event {
  pub fn new(start: StateRecord,
             end: StateRecord,
             order: EdgeOrder)
             -> Result<Self> {
    ensure!(start.level() == Level::High,
            Error::InvalidEvent(format!("start at {} is not high",
                                        start.time())));
    ensure!(end.level() == Level::Low,
            Error::InvalidEvent(format!("end at {} is not low", end.time())));
    ensure!(start.identity() == end.identity(),
            Error::InvalidEvent("edges on different channels".to_string()));
    ensure!(order.accepts(start.time(), end.time()),
            Error::InvalidEvent(format!("start {} and end {} violate {:?}",
                                        start.time(),
                                        end.time(),
                                        order)));
    Ok(Self { start, end })
  }

  pub fn identity(&self) -> ChannelIdentity {
    self.start.identity()
  }

  pub fn start_time(&self) -> i64 {
    self.start.time()
  }

  pub fn end_time(&self) -> i64 {
    self.end.time()
  }

  pub fn duration(&self) -> i64 {
    self.end_time() - self.start_time()
  }

  pub fn halfway_time(&self) -> i64 {
    self.start_time() + self.duration() / 2
  }

  /// Whether any part of the event lies within `[min, max]`.
  pub fn overlaps(&self, min: i64, max: i64) -> bool {
    self.start_time() <= max && self.end_time() >= min
  }
}


/// Why an edge did not end up in an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode)]
pub enum DropReason {
  /// High state followed by another high state; the earlier one is dropped.
  RepeatedRise,
  /// Low state without a pending high state.
  OrphanFall,
  /// High state still pending at the end of the recording.
  Unterminated,
  /// Pair refused by `Event::new`; the rising edge is recorded.
  Rejected,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, CopyGetters, Encode, Decode)]
#[getset(get_copy = "pub")]
pub struct DroppedEdge {
  record: StateRecord,
  reason: DropReason,
}


/// Events of one channel, derived in one go from its `ChannelStore`.
///
/// Never patched: when the underlying records change the store is derived
/// again from scratch.
#[derive(Clone, Debug, PartialEq, CopyGetters, Getters, Encode, Decode)]
pub struct EventStore {
  #[getset(get_copy = "pub")]
  channel: u32,
  #[getset(get = "pub")]
  events:  Vec<Event>,
  #[getset(get = "pub")]
  dropped: Vec<DroppedEdge>,
}

impl EventStore {
  /// Pairs every high state with the next low state of `store`, scanning
  /// forward. Malformed sequences never abort the derivation: unmatched
  /// edges are dropped and listed in `dropped()`.
  pub fn derive(store: &ChannelStore, order: EdgeOrder) -> Self {
    if order == EdgeOrder::StartAfterEnd {
      warn!(channel = store.number(),
            "deriving events with legacy start-after-end edge order");
    }

    let mut events = Vec::new();
    let mut dropped = Vec::new();
    let mut discard = |record: StateRecord, reason: DropReason| {
      trace!(channel = store.number(),
             time = record.time(),
             ?reason,
             "dropping edge");
      dropped.push(DroppedEdge { record, reason });
    };

    let mut pending: Option<StateRecord> = None;
    for record in store.records() {
      match record.level() {
        Level::High => {
          if let Some(earlier) = pending.replace(*record) {
            discard(earlier, DropReason::RepeatedRise);
          }
        }
        Level::Low => match pending.take() {
          Some(start) => match Event::new(start, *record, order) {
            Ok(event) => events.push(event),
            Err(_) => discard(start, DropReason::Rejected),
          },
          None => discard(*record, DropReason::OrphanFall),
        },
      }
    }
    if let Some(start) = pending {
      discard(start, DropReason::Unterminated);
    }

    debug!(channel = store.number(),
           events = events.len(),
           dropped = dropped.len(),
           "derived events");

    Self { channel: store.number(),
           events,
           dropped }
  }

  pub fn len(&self) -> usize {
    self.events.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Every event overlapping `[min, max]`, in chronological order. Fails if
  /// the channel has no events at all; an empty result means nothing is in
  /// range.
  pub fn events_in(&self, min: i64, max: i64) -> Result<Vec<Event>> {
    ensure!(!self.is_empty(), Error::NoEvents { channel: self.channel });

    Ok(self.events
           .iter()
           .filter(|event| event.overlaps(min, max))
           .copied()
           .collect())
  }

  /// Index of the event whose halfway time is closest to `center`. On ties
  /// the earliest event wins.
  pub fn nearest(&self, center: i64) -> Result<usize> {
    ensure!(!self.is_empty(), Error::NoEvents { channel: self.channel });

    let mut best = 0;
    let mut best_distance = self.events[0].halfway_time().abs_diff(center);
    for (idx, event) in self.events.iter().enumerate().skip(1) {
      let distance = event.halfway_time().abs_diff(center);
      if distance < best_distance {
        best = idx;
        best_distance = distance;
      }
    }
    Ok(best)
  }

  /// Up to `2n + 1` consecutive events centered on the one nearest to
  /// `center`, clipped at both ends of the recording.
  pub fn events_by_count(&self, center: i64, n: usize) -> Result<&[Event]> {
    let idx = self.nearest(center)?;
    let first = idx.saturating_sub(n);
    let last = idx.saturating_add(n).min(self.len() - 1);
    Ok(&self.events[first..=last])
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  fn store(samples: &[(i64, i64)]) -> ChannelStore {
    let mut store = ChannelStore::new(ChannelIdentity::flat(9)).unwrap();
    for &(time, state) in samples {
      store.append(StateRecord::l170(time, state, 9).unwrap());
    }
    store
  }

  fn spans(events: &[Event]) -> Vec<(i64, i64)> {
    events.iter()
          .map(|e| (e.start_time(), e.end_time()))
          .collect()
  }

  #[test]
  fn event_test() {
    let high = StateRecord::l170(100, 1, 9).unwrap();
    let low = StateRecord::l170(301, 0, 9).unwrap();
    let event = Event::new(high, low, EdgeOrder::StartBeforeEnd).unwrap();

    assert_eq!(100, event.start_time());
    assert_eq!(301, event.end_time());
    assert_eq!(201, event.duration());
    assert_eq!(200, event.halfway_time());
    assert_eq!(ChannelIdentity::flat(9), event.identity());
    assert!(event.overlaps(301, 400));
    assert!(event.overlaps(0, 100));
    assert_eq!(false, event.overlaps(302, 400));

    // zero length events are fine
    assert!(Event::new(high, low.at(100), EdgeOrder::StartBeforeEnd).is_ok());
  }

  #[test]
  fn event_invalid_test() {
    let high = StateRecord::l170(100, 1, 9).unwrap();
    let low = StateRecord::l170(300, 0, 9).unwrap();
    let order = EdgeOrder::StartBeforeEnd;

    assert!(Event::new(low, low, order).is_err());
    assert!(Event::new(high, high, order).is_err());
    assert!(Event::new(high,
                       StateRecord::l170(300, 0, 8).unwrap(),
                       order).is_err());
    assert!(Event::new(high.at(400), low, order).is_err());
  }

  #[test]
  fn edge_order_test() {
    let high = StateRecord::l170(100, 1, 9).unwrap();
    let low = StateRecord::l170(300, 0, 9).unwrap();

    assert!(EdgeOrder::StartBeforeEnd.accepts(100, 100));
    assert_eq!(false, EdgeOrder::StartAfterEnd.accepts(100, 100));
    assert!(Event::new(high, low, EdgeOrder::StartAfterEnd).is_err());
    assert!(Event::new(high.at(400), low, EdgeOrder::StartAfterEnd).is_ok());

    // the legacy order refuses every naturally paired event
    let store = store(&[(0, 1), (10, 0), (20, 1), (30, 0)]);
    let events = EventStore::derive(&store, EdgeOrder::StartAfterEnd);
    assert!(events.is_empty());
    assert_eq!(2, events.dropped().len());
    assert!(events.dropped()
                  .iter()
                  .all(|d| d.reason() == DropReason::Rejected));
  }

  #[test]
  fn derive_test() {
    let store = store(&[(0, 0), (100, 1), (250, 0), (400, 1), (420, 0)]);
    let events = EventStore::derive(&store, EdgeOrder::default());

    assert_eq!(9, events.channel());
    assert_eq!(vec![(100, 250), (400, 420)], spans(events.events()));
    assert_eq!(1, events.dropped().len());
    assert_eq!(DropReason::OrphanFall, events.dropped()[0].reason());
    assert_eq!(0, events.dropped()[0].record().time());

    for event in events.events() {
      assert!(event.end_time() >= event.start_time());
      assert_eq!(Level::High, event.start().level());
      assert_eq!(Level::Low, event.end().level());
    }

    // derivation is deterministic
    assert_eq!(events, EventStore::derive(&store, EdgeOrder::default()));
  }

  #[test]
  fn derive_malformed_test() {
    let store = store(&[(10, 0),  // orphan fall
                        (20, 1),  // repeated rise, dropped
                        (30, 1),
                        (40, 0),
                        (50, 0),  // orphan fall
                        (60, 1),
                        (70, 0),
                        (80, 1)]); // unterminated
    let events = EventStore::derive(&store, EdgeOrder::default());

    assert_eq!(vec![(30, 40), (60, 70)], spans(events.events()));
    let dropped: Vec<_> = events.dropped()
                                .iter()
                                .map(|d| (d.record().time(), d.reason()))
                                .collect();
    assert_eq!(vec![(10, DropReason::OrphanFall),
                    (20, DropReason::RepeatedRise),
                    (50, DropReason::OrphanFall),
                    (80, DropReason::Unterminated)],
               dropped);
  }

  #[test]
  fn events_in_test() {
    let store = store(&[(100, 1), (200, 0), (300, 1), (400, 0), (500, 1),
                        (600, 0)]);
    let events = EventStore::derive(&store, EdgeOrder::default());

    assert_eq!(vec![(100, 200), (300, 400)],
               spans(&events.events_in(150, 300).unwrap()));
    assert_eq!(vec![(300, 400)], spans(&events.events_in(250, 450).unwrap()));
    assert_eq!(vec![(500, 600)],
               spans(&events.events_in(600, 10_000).unwrap()));
    assert_eq!(Ok(Vec::new()), events.events_in(410, 490));
  }

  #[test]
  fn events_in_empty_test() {
    let events = EventStore::derive(&store(&[(0, 0), (10, 0)]),
                                    EdgeOrder::default());
    assert!(events.is_empty());
    assert_eq!(Err(Error::NoEvents { channel: 9 }), events.events_in(0, 10));
  }

  #[test]
  fn events_by_count_test() {
    let mut samples = Vec::new();
    for i in 0..10 {
      samples.push((i * 1_000, 1));
      samples.push((i * 1_000 + 200, 0));
    }
    let store = store(&samples);
    let events = EventStore::derive(&store, EdgeOrder::default());
    assert_eq!(10, events.len());

    // halfway times are 100, 1100, 2100, ...
    assert_eq!(Ok(4), events.nearest(4_000));
    let run = events.events_by_count(4_000, 2).unwrap();
    assert_eq!(5, run.len());
    assert_eq!(2_000, run[0].start_time());
    assert_eq!(6_000, run[4].start_time());

    // clipped at both ends
    let run = events.events_by_count(0, 3).unwrap();
    assert_eq!(4, run.len());
    assert_eq!(0, run[0].start_time());
    let run = events.events_by_count(50_000, 2).unwrap();
    assert_eq!(3, run.len());
    assert_eq!(9_000, run[2].start_time());

    // ties go to the earlier event: 600 is 500 away from 100 and 1100
    assert_eq!(Ok(0), events.nearest(600));

    let run = events.events_by_count(4_100, 0).unwrap();
    assert_eq!(1, run.len());
    assert_eq!(4_000, run[0].start_time());
  }

  #[test]
  fn events_by_count_empty_test() {
    let events = EventStore::derive(&store(&[(0, 0)]), EdgeOrder::default());
    assert_eq!(Err(Error::NoEvents { channel: 9 }),
               events.events_by_count(0, 2).map(|run| run.len()));
  }
}
