//! UDP publisher for real-time scan event streaming
//!
//! Streams [`ScanEvent`]s to the registered client as unicast datagrams.
//! Unicast (not broadcast) keeps traffic off non-listening hosts and matches
//! the single-viewer deployment: one scan client at a time.
//!
//! # Client registration
//!
//! Clients are registered when they connect via TCP:
//!
//! ```text
//! 1. Client connects TCP to the command port
//! 2. The accept loop extracts the client IP from the socket
//! 3. client IP + streaming port is stored in UdpClientRegistry
//! 4. UdpPublisher sends event datagrams to the registered address
//! 5. When TCP disconnects, the registration is cleared
//! ```
//!
//! Each datagram carries one length-prefixed payload in the same wire format
//! as TCP, so a client can share one decoding path for both transports.
//!
//! Events produced while no client is registered are drained and discarded;
//! the channel never backs up against the scan worker.

use crate::error::Result;
use crate::streaming::messages::ScanEvent;
use crate::streaming::wire::Serializer;
use crossbeam_channel::{Receiver, TryRecvError};
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Type alias for UDP client registry (single client at a time)
pub type UdpClientRegistry = Arc<Mutex<Option<SocketAddr>>>;

/// Send buffer preallocation: a 50-point JSON batch is ~4KB, allow headroom
const MAX_UDP_BUFFER_SIZE: usize = 8192;

/// UDP publisher that streams scan events to the registered client
pub struct UdpPublisher {
    socket: UdpSocket,
    serializer: Serializer,
    events: Receiver<ScanEvent>,
    /// Global running flag (daemon shutdown)
    running: Arc<AtomicBool>,
    /// Current registered client for UDP streaming
    client_registry: UdpClientRegistry,
}

impl UdpPublisher {
    /// Create a new UDP publisher
    pub fn new(
        socket: UdpSocket,
        serializer: Serializer,
        events: Receiver<ScanEvent>,
        running: Arc<AtomicBool>,
        client_registry: UdpClientRegistry,
    ) -> Self {
        Self {
            socket,
            serializer,
            events,
            running,
            client_registry,
        }
    }

    /// Get current registered client address (if any)
    fn get_client(&self) -> Option<SocketAddr> {
        *self
            .client_registry
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Run the publisher loop (unicast to registered client)
    pub fn run(&mut self) -> Result<()> {
        log::info!("UDP publisher started (unicast mode - waiting for client registration)");

        // Pre-allocate send buffer to avoid allocation per datagram
        let mut send_buffer = Vec::with_capacity(MAX_UDP_BUFFER_SIZE);
        let mut last_client: Option<SocketAddr> = None;

        while self.running.load(Ordering::Relaxed) {
            let client_addr = self.get_client();

            if client_addr != last_client {
                match &client_addr {
                    Some(addr) => log::info!("UDP streaming to client: {}", addr),
                    None => log::info!("UDP streaming paused (no client registered)"),
                }
                last_client = client_addr;
            }

            let Some(target_addr) = client_addr else {
                // No client: discard pending events so the channel never
                // backs up, then idle
                while self.events.try_recv().is_ok() {}
                std::thread::sleep(Duration::from_millis(10));
                continue;
            };

            let mut sent_any = false;
            loop {
                match self.events.try_recv() {
                    Ok(event) => {
                        if let Err(e) =
                            self.send_event_with_buffer(&event, target_addr, &mut send_buffer)
                        {
                            // UDP send errors are not fatal - just log and continue
                            log::warn!("Failed to send event to {}: {}", target_addr, e);
                        }
                        sent_any = true;
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        log::info!("Event channel closed, UDP publisher stopping");
                        return Ok(());
                    }
                }
            }

            // Yield between bursts; idle sleep is longer to reduce CPU usage
            if sent_any {
                std::thread::sleep(Duration::from_micros(500));
            } else {
                std::thread::sleep(Duration::from_millis(1));
            }
        }

        log::info!("UDP publisher stopped");
        Ok(())
    }

    /// Send one event as a length-prefixed unicast datagram
    ///
    /// Uses the provided buffer to avoid allocation per datagram.
    fn send_event_with_buffer(
        &self,
        event: &ScanEvent,
        target: SocketAddr,
        buffer: &mut Vec<u8>,
    ) -> Result<()> {
        self.serializer.frame_into(event, buffer)?;
        self.socket.send_to(buffer, target)?;
        Ok(())
    }
}
