// Copyright 2021 bmc::labs Gmbh. All rights reserved.
//
// Authors:
//   Florian Eich <florian@bmc-labs.com>
//   Jonas Reitemeyer <alumni@bmc-labs.com>

use super::{ensure, Error, Event, Result};
use bitcode::{Decode, Encode};
use getset::{CopyGetters, Getters};


/// Arithmetic mean of the halfway times of `events`, truncated towards zero.
pub fn average_halfway_time(events: &[Event]) -> Result<i64> {
  ensure!(!events.is_empty(), Error::EmptyEventSet);
  let sum: i128 = events.iter().map(|e| e.halfway_time() as i128).sum();
  Ok((sum / events.len() as i128) as i64)
}


/// Whether a group was drawn by a user or produced by a matching pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode)]
pub enum GroupKind {
  Manual,
  Auto,
}


/// Associates events on an observed channel with events on a reference
/// channel, e.g. the same vehicles seen by a video detector and by a loop.
///
/// Groups are never edited in place; to change one, build a new group and
/// hand it to `GroupStore::replace`.
#[derive(Clone, Debug, PartialEq, CopyGetters, Getters, Encode, Decode)]
pub struct Group {
  #[getset(get = "pub")]
  observed:          Vec<Event>,
  #[getset(get = "pub")]
  reference:         Vec<Event>,
  #[getset(get_copy = "pub")]
  observed_channel:  u32,
  #[getset(get_copy = "pub")]
  reference_channel: u32,
  #[getset(get_copy = "pub")]
  kind:              GroupKind,
  /// Sort key of the group.
  #[getset(get_copy = "pub")]
  observed_avg_time: i64,
}

impl Group {
  pub fn manual(observed: Vec<Event>,
                reference: Vec<Event>,
                observed_channel: u32,
                reference_channel: u32)
                -> Result<Self> {
    Self::build(GroupKind::Manual,
                observed,
                reference,
                observed_channel,
                reference_channel)
  }

  pub fn auto(observed: Vec<Event>,
              reference: Vec<Event>,
              observed_channel: u32,
              reference_channel: u32)
              -> Result<Self> {
    Self::build(GroupKind::Auto,
                observed,
                reference,
                observed_channel,
                reference_channel)
  }

  /// Both event lists are turned into ordered sets. The observed side must
  /// not be empty since it defines where the group sorts; the reference side
  /// may be.
  fn build(kind: GroupKind,
           mut observed: Vec<Event>,
           mut reference: Vec<Event>,
           observed_channel: u32,
           reference_channel: u32)
           -> Result<Self> {
    check_channel(&observed, observed_channel)?;
    check_channel(&reference, reference_channel)?;

    for events in [&mut observed, &mut reference] {
      events.sort_by_key(|e| (e.start_time(), e.end_time()));
      events.dedup();
    }
    let observed_avg_time = average_halfway_time(&observed)?;

    Ok(Self { observed,
              reference,
              observed_channel,
              reference_channel,
              kind,
              observed_avg_time })
  }

  pub fn is_auto(&self) -> bool {
    self.kind == GroupKind::Auto
  }

  /// Whether `event` is a member on either side, compared by value.
  pub fn contains(&self, event: &Event) -> bool {
    self.observed.contains(event) || self.reference.contains(event)
  }

  pub fn reference_avg_time(&self) -> Result<i64> {
    average_halfway_time(&self.reference)
  }

  /// How far the reference side lags behind the observed side, in ms.
  pub fn offset(&self) -> Result<i64> {
    Ok(self.reference_avg_time()? - self.observed_avg_time)
  }
}

fn check_channel(events: &[Event], channel: u32) -> Result<()> {
  for event in events {
    let found = event.identity().number()?;
    ensure!(found == channel,
            Error::ChannelMismatch { expected: channel,
                                     found });
  }
  Ok(())
}


/// Offset statistics over a set of groups, in ms.
#[derive(Clone, Copy, Debug, PartialEq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct OffsetSummary {
  count: usize,
  mean:  f64,
  min:   i64,
  max:   i64,
}


/// Owns all groups of a session, kept sorted by `observed_avg_time`.
#[derive(Clone, Debug, Default, PartialEq, Getters, Encode, Decode)]
#[getset(get = "pub")]
pub struct GroupStore {
  groups: Vec<Group>,
}

impl GroupStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.groups.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn get(&self, index: usize) -> Result<&Group> {
    self.groups.get(index).ok_or(Error::GroupIndex(index))
  }

  /// Inserts `group` at its sorted position, behind groups with an equal
  /// key, and returns that position.
  pub fn add(&mut self, group: Group) -> usize {
    let key = group.observed_avg_time();
    let idx = self.groups
                  .partition_point(|g| g.observed_avg_time() <= key);
    self.groups.insert(idx, group);
    idx
  }

  pub fn create_manual(&mut self,
                       observed: Vec<Event>,
                       reference: Vec<Event>,
                       observed_channel: u32,
                       reference_channel: u32)
                       -> Result<&Group> {
    let group =
      Group::manual(observed, reference, observed_channel, reference_channel)?;
    let idx = self.add(group);
    Ok(&self.groups[idx])
  }

  pub fn create_auto(&mut self,
                     observed: Vec<Event>,
                     reference: Vec<Event>,
                     observed_channel: u32,
                     reference_channel: u32)
                     -> Result<&Group> {
    let group =
      Group::auto(observed, reference, observed_channel, reference_channel)?;
    let idx = self.add(group);
    Ok(&self.groups[idx])
  }

  /// Swaps the group at `index` for `group` and returns the old one. The
  /// new group may sort to a different position.
  pub fn replace(&mut self, index: usize, group: Group) -> Result<Group> {
    let old = self.remove(index)?;
    self.add(group);
    Ok(old)
  }

  pub fn remove(&mut self, index: usize) -> Result<Group> {
    ensure!(index < self.len(), Error::GroupIndex(index));
    Ok(self.groups.remove(index))
  }

  /// Drops every machine generated group, returning how many were removed.
  pub fn clear_auto(&mut self) -> usize {
    let before = self.len();
    self.groups.retain(|group| !group.is_auto());
    before - self.len()
  }

  /// Index of the first group containing `event`.
  pub fn group_of(&self, event: &Event) -> Option<usize> {
    self.groups.iter().position(|group| group.contains(event))
  }

  pub fn contains(&self, event: &Event) -> bool {
    self.group_of(event).is_some()
  }

  /// Groups relating `observed_channel` to `reference_channel`, in order.
  pub fn between(&self,
                 observed_channel: u32,
                 reference_channel: u32)
                 -> impl Iterator<Item = &Group> {
    self.groups.iter().filter(move |group| {
                        group.observed_channel() == observed_channel
                        && group.reference_channel() == reference_channel
                      })
  }

  /// Offset statistics over all groups between the two channels that have
  /// events on both sides. `None` if there are none.
  pub fn offset_summary(&self,
                        observed_channel: u32,
                        reference_channel: u32)
                        -> Option<OffsetSummary> {
    let offsets: Vec<i64> = self.between(observed_channel, reference_channel)
                                .filter_map(|group| group.offset().ok())
                                .collect();
    let (min, max) = (*offsets.iter().min()?, *offsets.iter().max()?);
    let sum: i128 = offsets.iter().map(|&o| o as i128).sum();

    Some(OffsetSummary { count: offsets.len(),
                         mean: sum as f64 / offsets.len() as f64,
                         min,
                         max })
  }
}
