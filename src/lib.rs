// Copyright 2021 bmc::labs Gmbh. All rights reserved.
//
// Authors:
//   Florian Eich <florian@bmc-labs.com>
//   Jonas Reitemeyer <alumni@bmc-labs.com>

mod channel;
mod config;
mod error;
mod event;
mod group;
mod identity;
mod record;
mod registry;
mod session;
mod speed;
mod window;

pub use channel::ChannelStore;
pub use config::{Config, EventConfig, IngestConfig, PlaybackConfig};
pub use error::{Error, Result};
pub use event::{DropReason, DroppedEdge, EdgeOrder, Event, EventStore};
pub use group::{average_halfway_time,
                Group,
                GroupKind,
                GroupStore,
                OffsetSummary};
pub use identity::{c1_card_pins, c1_channel_number, ChannelIdentity, LogFormat};
pub use record::{Level, StateRecord};
pub use registry::{ChannelRegistry, ChannelSummary, OrderingPolicy};
pub use session::Session;
pub use speed::{SpeedConfig, SpeedEstimator, SpeedReport, SpeedSample};
pub use window::TimeWindow;
