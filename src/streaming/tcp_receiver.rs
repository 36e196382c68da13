//! TCP command receiver for client control
//!
//! Handles incoming commands from the connected client and writes a response
//! for every command on the same connection. TCP is used for commands (not
//! UDP) because they must not be lost, must execute in order, and the sender
//! needs the verdict; the connection state also tracks client presence for
//! UDP event registration.
//!
//! # Connection lifecycle
//!
//! ```text
//! 1. Client connects to the TCP command port
//! 2. The accept loop spawns a TcpReceiver thread for this client
//! 3. Client IP is registered for UDP event streaming
//! 4. Receiver loop processes commands until disconnect
//! 5. On disconnect, the UDP registration is cleared
//! ```
//!
//! # Safety features
//!
//! - 500ms read timeout allows periodic shutdown flag checks
//! - Frames over 1MB close the connection
//! - Malformed payloads are discarded with the connection left open

use crate::config::ExportConfig;
use crate::error::{Error, Result};
use crate::export;
use crate::scanner::coordinator::{ScanCommand, ScanCoordinator};
use crate::scanner::point_cloud::PointCloudStore;
use crate::streaming::messages::{ClientCommand, CommandResponse};
use crate::streaming::wire::{Serializer, MAX_MESSAGE_SIZE};
use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Initial capacity for command read buffer (typical command size)
const INITIAL_BUFFER_CAPACITY: usize = 256;

/// TCP receiver that handles commands from the connected client
pub struct TcpReceiver {
    serializer: Serializer,
    coordinator: Arc<ScanCoordinator>,
    store: Arc<PointCloudStore>,
    export_config: ExportConfig,
    /// Global running flag (daemon shutdown)
    running: Arc<AtomicBool>,
    /// Per-connection alive flag (connection health)
    conn_alive: Arc<AtomicBool>,
    /// Reusable buffer for reading command payloads
    read_buffer: Vec<u8>,
    /// Reusable buffer for framing responses
    write_buffer: Vec<u8>,
}

impl TcpReceiver {
    /// Create a new TCP receiver
    pub fn new(
        serializer: Serializer,
        coordinator: Arc<ScanCoordinator>,
        store: Arc<PointCloudStore>,
        export_config: ExportConfig,
        running: Arc<AtomicBool>,
        conn_alive: Arc<AtomicBool>,
    ) -> Self {
        Self {
            serializer,
            coordinator,
            store,
            export_config,
            running,
            conn_alive,
            read_buffer: Vec::with_capacity(INITIAL_BUFFER_CAPACITY),
            write_buffer: Vec::new(),
        }
    }

    /// Run the receiver loop for a connected client
    pub fn run(&mut self, mut stream: TcpStream) -> Result<()> {
        log::info!("TCP receiver started for client: {:?}", stream.peer_addr());

        // Read timeout so the shutdown flags are checked periodically
        if let Err(e) = stream.set_read_timeout(Some(std::time::Duration::from_millis(500))) {
            log::warn!("Failed to set read timeout: {}", e);
        }

        loop {
            if !self.running.load(Ordering::Relaxed) {
                log::debug!("Running flag cleared, exiting");
                break;
            }
            if !self.conn_alive.load(Ordering::Relaxed) {
                log::debug!("Connection alive flag cleared, exiting");
                break;
            }

            match self.read_command(&mut stream) {
                Ok(Some(cmd)) => {
                    log::info!("Received command: {:?}", cmd);
                    let response = self.handle_command(cmd);
                    if let Err(e) = self.write_response(&mut stream, &response) {
                        log::error!("Failed to write response: {}", e);
                        self.conn_alive.store(false, Ordering::Relaxed);
                        let _ = stream.shutdown(std::net::Shutdown::Both);
                        return Err(e);
                    }
                }
                Ok(None) => {
                    // Timeout or discarded malformed payload, continue loop
                }
                Err(e) => {
                    // Signal connection is dead and shutdown socket
                    self.conn_alive.store(false, Ordering::Relaxed);
                    let _ = stream.shutdown(std::net::Shutdown::Both);

                    if let Error::Io(ref io_err) = e {
                        if io_err.kind() == std::io::ErrorKind::UnexpectedEof
                            || io_err.kind() == std::io::ErrorKind::ConnectionReset
                        {
                            log::info!("Client disconnected");
                            return Ok(());
                        }
                    }
                    log::error!("Failed to read message: {}", e);
                    return Err(e);
                }
            }
        }

        // Clean shutdown: signal connection dead and close socket
        self.conn_alive.store(false, Ordering::Relaxed);
        let _ = stream.shutdown(std::net::Shutdown::Both);

        log::info!("TCP receiver stopped");
        Ok(())
    }

    /// Read a command from the client
    ///
    /// Returns `Ok(None)` on read timeout or a malformed payload. Uses a
    /// reusable internal buffer to avoid allocation per command.
    fn read_command(&mut self, stream: &mut TcpStream) -> Result<Option<ClientCommand>> {
        let mut len_buf = [0u8; 4];
        match stream.read_exact(&mut len_buf) {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
        }

        let len = u32::from_be_bytes(len_buf) as usize;
        if len > MAX_MESSAGE_SIZE {
            return Err(Error::Other(format!("Message too large: {} bytes", len)));
        }

        // Reuse buffer - resize only if needed
        self.read_buffer.clear();
        self.read_buffer.resize(len, 0);
        stream.read_exact(&mut self.read_buffer)?;

        match self.serializer.deserialize(&self.read_buffer) {
            Ok(cmd) => Ok(Some(cmd)),
            Err(e) => {
                log::warn!("Discarding malformed command payload: {}", e);
                Ok(None)
            }
        }
    }

    /// Execute one client command and build its response
    fn handle_command(&mut self, cmd: ClientCommand) -> CommandResponse {
        match cmd {
            ClientCommand::Start
            | ClientCommand::Pause
            | ClientCommand::Resume
            | ClientCommand::Stop
            | ClientCommand::Reset => {
                let scan_cmd = match cmd {
                    ClientCommand::Start => ScanCommand::Start,
                    ClientCommand::Pause => ScanCommand::Pause,
                    ClientCommand::Resume => ScanCommand::Resume,
                    ClientCommand::Stop => ScanCommand::Stop,
                    _ => ScanCommand::Reset,
                };
                match self.coordinator.command(scan_cmd) {
                    Ok(state) => CommandResponse::State { state },
                    Err(e @ Error::InvalidTransition { .. }) => CommandResponse::Rejected {
                        state: self.coordinator.state(),
                        reason: e.to_string(),
                    },
                    Err(e) => CommandResponse::Error {
                        reason: e.to_string(),
                    },
                }
            }
            ClientCommand::GetStatus => CommandResponse::Status(self.coordinator.progress()),
            ClientCommand::GetPoints => CommandResponse::Points {
                points: self.store.snapshot(),
            },
            ClientCommand::Export { format } => {
                let snapshot = self.store.snapshot();
                match export::export_snapshot(&self.export_config.directory, format, &snapshot)
                {
                    Ok(path) => CommandResponse::Exported {
                        path,
                        points: snapshot.len(),
                    },
                    Err(e) => CommandResponse::Error {
                        reason: e.to_string(),
                    },
                }
            }
            ClientCommand::Shutdown => {
                log::info!("Shutdown requested by client");
                self.running.store(false, Ordering::Relaxed);
                CommandResponse::State {
                    state: self.coordinator.state(),
                }
            }
        }
    }

    /// Write one length-prefixed response frame
    fn write_response(&mut self, stream: &mut TcpStream, response: &CommandResponse) -> Result<()> {
        self.serializer.frame_into(response, &mut self.write_buffer)?;
        stream.write_all(&self.write_buffer)?;
        Ok(())
    }
}
