//! Network streaming for DrishtiIO
//!
//! Split transport, one concern each way:
//! - TCP (command port): reliable, ordered client commands with responses
//! - UDP (streaming port): fire-and-forget scan events to the registered
//!   client

pub mod messages;
pub mod tcp_receiver;
pub mod udp_publisher;
pub mod wire;

pub use messages::{ClientCommand, CommandResponse, ExportFormat, ScanEvent};
pub use tcp_receiver::TcpReceiver;
pub use udp_publisher::{UdpClientRegistry, UdpPublisher};
pub use wire::{Serializer, WireFormat, MAX_MESSAGE_SIZE};
