// Copyright 2021 bmc::labs Gmbh. All rights reserved.
//
// Authors:
//   Florian Eich <florian@bmc-labs.com>
//   Jonas Reitemeyer <alumni@bmc-labs.com>

use super::{Error, Result};
use bitcode::{Decode, Encode};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;


lazy_static! {
  /// Wiring of the C1 cabinet: (card, pin) to logical channel number. Pins
  /// 0..=3 of every card are reserved, card 5 only exposes a handful of pins.
  static ref C1_CHANNELS: HashMap<(i32, i32), u32> = {
    let mut table = HashMap::new();
    let mut map = |card: i32, pins: &[i32], offset: i32| {
      for &pin in pins {
        table.insert((card, pin), (pin + offset) as u32);
      }
    };

    map(1, &(4..=15).collect::<Vec<_>>(), -2);
    map(1, &(16..=27).collect::<Vec<_>>(), -1);
    map(2, &(4..=27).collect::<Vec<_>>(), 23);
    map(3, &(4..=27).collect::<Vec<_>>(), 47);
    map(4, &(4..=20).collect::<Vec<_>>(), 71);
    map(4, &(21..=27).collect::<Vec<_>>(), 72);
    map(5, &(4..=7).collect::<Vec<_>>(), 96);
    map(5, &[10, 11, 12, 13, 15, 16, 18, 19, 20, 21, 22], 0);
    map(5, &[23], -6);

    table
  };
}


/// The two hardware log formats.
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
pub enum LogFormat {
  /// Cabinet logs addressing inputs as (card, pin).
  #[default]
  C1,
  /// Controller logs addressing inputs by a flat channel number.
  L170,
}


/// How a record names the physical input it was sampled on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Encode, Decode)]
pub enum ChannelIdentity {
  CardPin { card: i32, pin: i32 },
  Flat(u32),
}

impl ChannelIdentity {
  /// Builds a C1 identity, failing right away if the combination is not
  /// wired.
  pub fn card_pin(card: i32, pin: i32) -> Result<Self> {
    c1_channel_number(card, pin)?;
    Ok(ChannelIdentity::CardPin { card, pin })
  }

  pub fn flat(channel: u32) -> Self {
    ChannelIdentity::Flat(channel)
  }

  pub fn format(&self) -> LogFormat {
    match self {
      ChannelIdentity::CardPin { .. } => LogFormat::C1,
      ChannelIdentity::Flat(_) => LogFormat::L170,
    }
  }

  /// Card id, `-1` for flat identities.
  pub fn card(&self) -> i32 {
    match *self {
      ChannelIdentity::CardPin { card, .. } => card,
      ChannelIdentity::Flat(_) => -1,
    }
  }

  /// Pin id for C1, the channel number itself for L170.
  pub fn pin(&self) -> i32 {
    match *self {
      ChannelIdentity::CardPin { pin, .. } => pin,
      ChannelIdentity::Flat(channel) => channel as i32,
    }
  }

  /// Resolves the logical channel number this identity is stored under.
  pub fn number(&self) -> Result<u32> {
    match *self {
      ChannelIdentity::CardPin { card, pin } => c1_channel_number(card, pin),
      ChannelIdentity::Flat(channel) => Ok(channel),
    }
  }
}


/// Looks up the logical channel number of a C1 (card, pin) pair.
pub fn c1_channel_number(card: i32, pin: i32) -> Result<u32> {
  C1_CHANNELS.get(&(card, pin))
             .copied()
             .ok_or(Error::UnmappedChannel { card, pin })
}

/// All (card, pin) pairs that resolve to `channel`, sorted. The table is not
/// injective (card 5 reuses channel numbers of card 1), so there may be more
/// than one.
pub fn c1_card_pins(channel: u32) -> Vec<(i32, i32)> {
  let mut pairs: Vec<_> = C1_CHANNELS.iter()
                                     .filter(|(_, &number)| number == channel)
                                     .map(|(&pair, _)| pair)
                                     .collect();
  pairs.sort_unstable();
  pairs
}
