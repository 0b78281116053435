//! Domain model, configuration, errors and collaborator contracts shared by
//! every crate of the CDP engine.

pub mod automation;
pub mod config;
pub mod error;
pub mod event;
pub mod profile;
pub mod repository;
pub mod sender;
pub mod shard;
pub mod worker;

pub use automation::{
    ActionType, Automation, AutomationAction, AutomationExecution, AutomationStats, Segment,
    SegmentKind, TriggerType,
};
pub use config::{AppConfig, OverflowPolicy};
pub use error::{CdpError, CdpResult};
pub use event::{Event, EventType};
pub use profile::{CustomerProfile, LifecycleStage, RfmSegment};
pub use repository::{AutomationRepository, CustomerRepository, EventRepository, SegmentRepository};
pub use sender::{MessageSender, Senders};
pub use shard::{ShardRouter, WriterLocks};
pub use worker::{ShutdownSender, ShutdownSignal};
