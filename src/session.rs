// Copyright 2021 bmc::labs Gmbh. All rights reserved.
//
// Authors:
//   Florian Eich <florian@bmc-labs.com>
//   Jonas Reitemeyer <alumni@bmc-labs.com>

//! Save/load of a whole analysis session as one opaque blob.
//!
//! Layout (little-endian):
//!
//! ```text
//! [0..4]   magic "DLOG"
//! [4..8]   format version (u32)
//! [8..16]  payload length (u64)
//! [16..20] xxHash32 of the payload
//! [20..]   bitcode encoded `Session`
//! ```

use super::{ensure, ChannelRegistry, Error, GroupStore, Result};
use bitcode::{Decode, Encode};
use chrono::{DateTime, TimeZone, Utc};
use getset::{CopyGetters, Getters, MutGetters};
use std::{fs, path::Path};
use tracing::info;
use xxhash_rust::xxh32::xxh32;


pub const MAGIC: [u8; 4] = *b"DLOG";
pub const FORMAT_VERSION: u32 = 1;
pub const HEADER_SIZE: usize = 20;

const XXHASH_SEED: u32 = 0;


/// Everything an analysis produced: the channels with their records and
/// derived events, and the groups drawn over them.
#[derive(Clone,
         Debug,
         PartialEq,
         CopyGetters,
         Getters,
         MutGetters,
         Encode,
         Decode)]
pub struct Session {
  #[getset(get_copy = "pub")]
  created_ms: i64,
  #[getset(get = "pub", get_mut = "pub")]
  registry:   ChannelRegistry,
  #[getset(get = "pub", get_mut = "pub")]
  groups:     GroupStore,
}

impl Session {
  pub fn new(registry: ChannelRegistry, groups: GroupStore) -> Self {
    Self { created_ms: Utc::now().timestamp_millis(),
           registry,
           groups }
  }

  /// When the session was created.
  pub fn created(&self) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(self.created_ms).single()
  }

  // ENCODING -------------------------------------------------------------- //
  pub fn to_bytes(&self) -> Vec<u8> {
    let payload = bitcode::encode(self);
    let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
    bytes.extend_from_slice(&MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    bytes.extend_from_slice(&xxh32(&payload, XXHASH_SEED).to_le_bytes());
    bytes.extend_from_slice(&payload);
    bytes
  }

  pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
    ensure!(bytes.len() >= HEADER_SIZE,
            Error::Session(format!("{} bytes is too short for a header",
                                   bytes.len())));
    ensure!(bytes[..4] == MAGIC, Error::Session("not a session".to_string()));

    let version = u32::from_le_bytes(bytes[4..8].try_into()?);
    ensure!(version >= 1,
            Error::Session(format!("invalid version {}", version)));
    ensure!(version <= FORMAT_VERSION,
            Error::Session(format!("version {} is newer than {}",
                                   version,
                                   FORMAT_VERSION)));

    let length = u64::from_le_bytes(bytes[8..16].try_into()?);
    let checksum = u32::from_le_bytes(bytes[16..20].try_into()?);
    let payload = &bytes[HEADER_SIZE..];
    ensure!(payload.len() as u64 == length,
            Error::Session(format!("payload is {} bytes, header says {}",
                                   payload.len(),
                                   length)));
    ensure!(xxh32(payload, XXHASH_SEED) == checksum,
            Error::Session("checksum mismatch".to_string()));

    let session: Self = bitcode::decode(payload)?;
    session.registry.check_consistency()?;
    Ok(session)
  }

  // FILES ----------------------------------------------------------------- //
  pub fn save(&self, path: &Path) -> Result<()> {
    let bytes = self.to_bytes();
    fs::write(path, &bytes)?;
    info!(path = %path.display(),
          bytes = bytes.len(),
          channels = self.registry.len(),
          groups = self.groups.len(),
          "saved session");
    Ok(())
  }

  pub fn load(path: &Path) -> Result<Self> {
    let session = Self::from_bytes(&fs::read(path)?)?;
    info!(path = %path.display(),
          channels = session.registry.len(),
          groups = session.groups.len(),
          "loaded session");
    Ok(session)
  }
}
