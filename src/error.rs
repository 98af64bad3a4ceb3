// Copyright 2021 bmc::labs Gmbh. All rights reserved.
//
// Authors:
//   Florian Eich <florian@bmc-labs.com>
//   Jonas Reitemeyer <alumni@bmc-labs.com>

use super::LogFormat;
use std::{array, error, fmt, io, result};


/// detlog's result type `Result` always carries the crate's `Error`.
pub type Result<T> = result::Result<T, Error>;


/// Every failure the store can report back to its caller.
///
/// The store never logs failures on its own, it hands them back as one of
/// these variants so the caller can tell "nothing in range" (an empty result,
/// never an error) apart from "there is no data at all" (`EmptyStore`,
/// `NoEvents`).
///
/// Use it through the `fail!` and `ensure!` macros, which take an `Error`
/// value and turn it into an `Err(Error)`:
///
/// ```ignore
/// fn first(&self) -> Result<&StateRecord> {
///   ensure!(!self.records.is_empty(), Error::EmptyStore { channel: 7 });
///   ...
/// }
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
  /// Query on a channel that holds no records.
  EmptyStore { channel: u32 },
  /// Query on an event store without a single derived event.
  NoEvents { channel: u32 },
  /// Averaging over an empty set of events.
  EmptyEventSet,
  /// (card, pin) combination outside of the C1 mapping table.
  UnmappedChannel { card: i32, pin: i32 },
  /// Channel number not present in the registry.
  UnknownChannel(u32),
  /// Two different identities resolved to the same channel number.
  IdentityConflict { channel: u32 },
  /// Record of one log format fed to a registry of another.
  WrongFormat { expected: LogFormat, found: LogFormat },
  /// Raw state value other than 0 or 1.
  InvalidLevel(i64),
  /// Time window with `min <= current <= max` violated.
  InvalidWindow { min: i64, current: i64, max: i64 },
  /// Record appended before the last record of its channel.
  OutOfOrder { channel: u32, previous: i64, next: i64 },
  /// Rising/falling pair that does not form a valid event.
  InvalidEvent(String),
  /// Event handed to a group under the wrong channel.
  ChannelMismatch { expected: u32, found: u32 },
  /// Group index out of range.
  GroupIndex(usize),
  /// Session blob that is truncated, corrupt or from a newer version.
  Session(String),
  Io(String),
  Config(String),
}

impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Error::EmptyStore { channel } => {
        write!(f, "channel {} holds no records", channel)
      }
      Error::NoEvents { channel } => {
        write!(f, "channel {} holds no events", channel)
      }
      Error::EmptyEventSet => write!(f, "cannot average an empty event set"),
      Error::UnmappedChannel { card, pin } => {
        write!(f, "card {} pin {} is not a mapped channel", card, pin)
      }
      Error::UnknownChannel(number) => write!(f, "no channel {}", number),
      Error::IdentityConflict { channel } => {
        write!(f, "channel {} already bound to another identity", channel)
      }
      Error::WrongFormat { expected, found } => {
        write!(f, "expected {:?} record, got {:?}", expected, found)
      }
      Error::InvalidLevel(raw) => write!(f, "state {} is neither 0 nor 1", raw),
      Error::InvalidWindow { min, current, max } => {
        write!(f, "window {} <= {} <= {} violated", min, current, max)
      }
      Error::OutOfOrder { channel, previous, next } => {
        write!(f,
               "channel {}: record at {} follows record at {}",
               channel, next, previous)
      }
      Error::InvalidEvent(msg) => write!(f, "invalid event: {}", msg),
      Error::ChannelMismatch { expected, found } => {
        write!(f, "event on channel {}, expected channel {}", found, expected)
      }
      Error::GroupIndex(index) => write!(f, "no group at index {}", index),
      Error::Session(msg) => write!(f, "session: {}", msg),
      Error::Io(msg) => write!(f, "io: {}", msg),
      Error::Config(msg) => write!(f, "config: {}", msg),
    }
  }
}

impl error::Error for Error {}


/// This macro - internal use only - generates the implementation of the
/// `From` trait for `Error` for a list of foreign error types, each mapped to
/// the variant carrying its message.
macro_rules! implement_from {
  ($($ErrType:ty => $Variant:ident),*) => {$(
    impl From<$ErrType> for Error {
      fn from(error: $ErrType) -> Self {
        Error::$Variant(error.to_string())
      }
    }
  )*}
}

implement_from!(io::Error => Io,
                bitcode::Error => Session,
                array::TryFromSliceError => Session,
                serde_yaml::Error => Config);


/// The `fail!` macro wraps an `Error` value into `Err(..)`.
#[macro_export]
macro_rules! fail {
  ($err:expr) => {
    Err($err)
  };
}


/// The `ensure!` macro returns early with `Err($err)` unless the condition
/// holds (exactly as `fail!` does - `ensure!` is implemented on top of it).
#[macro_export]
macro_rules! ensure {
  ($cond:expr, $err:expr) => {
    if !($cond) {
      return $crate::fail!($err);
    }
  };
}
