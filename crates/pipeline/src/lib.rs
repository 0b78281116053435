//! Event pipeline of the CDP engine: TrackEvent ingestion, sharded event
//! processing, the cart-abandonment scanner, and the [`CdpService`] facade
//! that wires them to the automation runtime.

pub mod ingest;
pub mod memory;
pub mod processor;
pub mod scanner;
pub mod sender;
pub mod service;

pub use ingest::{event_channels, partition_key, EventIngestor};
pub use memory::{MemoryAutomationStore, MemoryCustomerStore, MemoryEventStore, MemorySegmentStore};
pub use processor::{apply_event, EventProcessor};
pub use scanner::{CartAbandonmentScanner, SCANNER_SOURCE};
pub use sender::LoggingSender;
pub use service::{CdpService, Repositories};
