//! DrishtiIO - Scan coordination daemon for a two-axis 3D scanner
//!
//! ## Protocol Architecture
//!
//! - **UDP Unicast (port 5556)**: Scan event streaming to the registered client (fire-and-forget)
//! - **TCP (port 5555)**: Commands only (reliable, bidirectional, with responses)
//!
//! When a TCP client connects for commands, their IP is automatically registered
//! for UDP event streaming. One client at a time - a scan has a single operator.

use drishti_io::config::Config;
use drishti_io::error::Error;
use drishti_io::error::Result;
use drishti_io::rig::create_rig;
use drishti_io::scanner::{ChannelSink, PointCloudStore, ScanCoordinator};
use drishti_io::streaming::{
    Serializer, TcpReceiver, UdpClientRegistry, UdpPublisher, WireFormat,
};
use std::env;
use std::net::{Shutdown, SocketAddr, TcpListener, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

/// Parse config path from command line arguments.
///
/// Supports:
/// - `drishti-io <path>` (positional)
/// - `drishti-io --config <path>` (flag-based)
/// - `drishti-io -c <path>` (short flag)
///
/// Defaults to `/etc/drishti.toml` if not specified.
fn parse_config_path() -> String {
    let args: Vec<String> = env::args().collect();

    // Look for --config or -c flag
    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }

    // Fall back to first positional argument (if it doesn't start with -)
    if args.len() > 1 && !args[1].starts_with('-') {
        return args[1].clone();
    }

    // Default path
    "/etc/drishti.toml".to_string()
}

fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("DrishtiIO v{} starting...", env!("CARGO_PKG_VERSION"));

    let config_path = parse_config_path();
    log::info!("Using config: {}", config_path);
    let config = Config::load(&config_path)?;

    log::info!(
        "Rig: {} | sweep tilt [{}, {}] step {} rotation step {}",
        config.rig.rig_type,
        config.scan.tilt_min_deg,
        config.scan.tilt_max_deg,
        config.scan.tilt_step_deg,
        config.scan.rotation_step_deg
    );

    // Create the rig and the scan worker
    let rig = create_rig(&config)?;
    let store = Arc::new(PointCloudStore::new());
    let (event_tx, event_rx) = crossbeam_channel::unbounded();
    let coordinator = Arc::new(ScanCoordinator::new(
        rig,
        config.scan.clone(),
        Arc::clone(&store),
        Box::new(ChannelSink::new(event_tx)),
    )?);

    // Set up shutdown signal handler
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);

    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    let serializer = Serializer::new(WireFormat::default());
    log::info!("Wire format: JSON");

    // =========================================================================
    // UDP Unicast Setup (scan event streaming to the registered client)
    // =========================================================================
    let udp_streaming_port = config.network.udp_streaming_port;

    // Bind UDP socket to any available port (we only send, not receive)
    let udp_socket = UdpSocket::bind("0.0.0.0:0")
        .map_err(|e| Error::Other(format!("Failed to create UDP socket: {}", e)))?;
    log::info!("UDP unicast streaming enabled (port {})", udp_streaming_port);

    // Client registry: tracks which address to send UDP events to
    // Updated when TCP clients connect/disconnect
    let udp_client_registry: UdpClientRegistry = Arc::new(Mutex::new(None));

    // Spawn single UDP publisher thread (unicast to registered client)
    let udp_serializer = serializer.clone();
    let udp_running = Arc::clone(&running);
    let udp_registry_clone = Arc::clone(&udp_client_registry);
    let _udp_handle = thread::Builder::new()
        .name("udp-publisher".to_string())
        .spawn(move || {
            let mut publisher = UdpPublisher::new(
                udp_socket,
                udp_serializer,
                event_rx,
                udp_running,
                udp_registry_clone,
            );
            if let Err(e) = publisher.run() {
                log::error!("UDP publisher error: {}", e);
            }
        })
        .map_err(|e| Error::Other(format!("Failed to spawn UDP publisher: {}", e)))?;

    // =========================================================================
    // TCP Server Setup (commands only)
    // =========================================================================
    let bind_addr = &config.network.bind_address;
    let listener = TcpListener::bind(bind_addr)
        .map_err(|e| Error::Other(format!("Failed to bind to {}: {}", bind_addr, e)))?;
    if let Err(e) = listener.set_nonblocking(true) {
        log::warn!("Failed to set nonblocking mode: {}", e);
    }

    log::info!("TCP server listening on {} (commands only)", bind_addr);
    log::info!("DrishtiIO running. Press Ctrl-C to stop.");

    // Main loop - accept TCP connections for commands
    // NOTE: TCP connect also registers the client for UDP event streaming.
    // Only one client at a time - prevents conflicting scan commands.
    while running.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((stream, addr)) => {
                // The UDP registry doubles as the active-client tracker
                let should_accept = {
                    let mut registry = udp_client_registry
                        .lock()
                        .unwrap_or_else(|e| e.into_inner());
                    if registry.is_some() {
                        log::warn!(
                            "Rejecting TCP connection from {}: already have active client {:?}",
                            addr,
                            *registry
                        );
                        false
                    } else {
                        // Register client for UDP streaming (client_ip:udp_streaming_port)
                        let udp_addr = SocketAddr::new(addr.ip(), udp_streaming_port);
                        *registry = Some(udp_addr);
                        log::info!(
                            "TCP client connected: {} (UDP streaming -> {})",
                            addr,
                            udp_addr
                        );
                        true
                    }
                };

                if !should_accept {
                    // Close the rejected connection
                    let _ = stream.shutdown(Shutdown::Both);
                    continue;
                }

                // Set socket to blocking mode for reliable command handling
                if let Err(e) = stream.set_nonblocking(false) {
                    log::error!("Failed to set socket to blocking mode: {}", e);
                    if let Ok(mut guard) = udp_client_registry.lock() {
                        *guard = None;
                    }
                    continue;
                }

                // Clone resources for receiver thread
                let recv_serializer = serializer.clone();
                let recv_coordinator = Arc::clone(&coordinator);
                let recv_store = Arc::clone(&store);
                let recv_export = config.export.clone();
                let recv_running = Arc::clone(&running);
                let registry_clone = Arc::clone(&udp_client_registry);

                // Spawn receiver thread (commands only)
                let _recv_handle = thread::Builder::new()
                    .name("tcp-receiver".to_string())
                    .spawn(move || {
                        // Per-connection alive flag
                        let conn_alive = Arc::new(AtomicBool::new(true));
                        let mut receiver = TcpReceiver::new(
                            recv_serializer,
                            recv_coordinator,
                            recv_store,
                            recv_export,
                            recv_running,
                            conn_alive,
                        );
                        if let Err(e) = receiver.run(stream) {
                            log::error!("TCP receiver error: {}", e);
                        }
                        log::info!("TCP client disconnected: {}", addr);

                        // Unregister client from UDP streaming
                        if let Ok(mut guard) = registry_clone.lock() {
                            *guard = None;
                        }
                    });
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                // No connection pending, sleep briefly
                std::thread::sleep(std::time::Duration::from_millis(10));
            }
            Err(e) => {
                log::error!("Accept error: {}", e);
            }
        }
    }

    // Shutdown: dropping the coordinator stops and homes an active scan
    log::info!("Shutting down...");
    drop(coordinator);

    log::info!("DrishtiIO stopped");
    Ok(())
}
