//! Wire message types for the client protocol
//!
//! Three families of messages cross the network boundary:
//!
//! | Direction        | Transport | Type              |
//! |------------------|-----------|-------------------|
//! | client → daemon  | TCP       | [`ClientCommand`]  |
//! | daemon → client  | TCP       | [`CommandResponse`]|
//! | daemon → client  | UDP       | [`ScanEvent`]      |
//!
//! Commands always get a response on the same TCP connection. Events are
//! fire-and-forget datagrams to the registered client.

use crate::scanner::point_cloud::ScanPoint;
use crate::scanner::session::{ScanProgress, ScanState};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Event streamed to the registered client during a scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanEvent {
    /// A batch of newly sampled Cartesian points in millimeters
    PointsBatch { points: Vec<[f64; 3]> },
    /// Progress snapshot, published with every visited sample position
    Progress(ScanProgress),
    /// Lifecycle transition; `reason` is set for fault transitions
    StateChanged {
        state: ScanState,
        reason: Option<String>,
    },
}

/// Point cloud export file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Ply,
    Pcd,
}

impl ExportFormat {
    /// File extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Ply => "ply",
            ExportFormat::Pcd => "pcd",
        }
    }
}

/// Command sent by a client over TCP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientCommand {
    Start,
    Pause,
    Resume,
    Stop,
    Reset,
    /// Query the current state and progress
    GetStatus,
    /// Query a full snapshot of the stored point cloud
    GetPoints,
    /// Write the stored point cloud to a file on the daemon host
    Export { format: ExportFormat },
    /// Shut the daemon down gracefully
    Shutdown,
}

/// Response returned for every [`ClientCommand`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandResponse {
    /// Command accepted; the resulting scanner state
    State { state: ScanState },
    /// Command rejected; state unchanged
    Rejected { state: ScanState, reason: String },
    /// Answer to `GetStatus`
    Status(ScanProgress),
    /// Answer to `GetPoints`
    Points { points: Vec<ScanPoint> },
    /// Answer to `Export`
    Exported { path: PathBuf, points: usize },
    /// Command failed for a reason other than an invalid transition
    Error { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_json_shape() {
        let json = serde_json::to_string(&ClientCommand::GetStatus).unwrap();
        assert_eq!(json, "\"get_status\"");

        let json = serde_json::to_string(&ClientCommand::Export {
            format: ExportFormat::Ply,
        })
        .unwrap();
        assert_eq!(json, r#"{"export":{"format":"ply"}}"#);
    }

    #[test]
    fn test_command_parses_from_client_json() {
        let cmd: ClientCommand = serde_json::from_str("\"start\"").unwrap();
        assert_eq!(cmd, ClientCommand::Start);
        let cmd: ClientCommand =
            serde_json::from_str(r#"{"export":{"format":"pcd"}}"#).unwrap();
        assert_eq!(
            cmd,
            ClientCommand::Export {
                format: ExportFormat::Pcd
            }
        );
    }

    #[test]
    fn test_state_changed_event_json_shape() {
        let event = ScanEvent::StateChanged {
            state: ScanState::Error,
            reason: Some("sensor gone".to_string()),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"state_changed\""));
        assert!(json.contains("\"error\""));
        assert!(json.contains("sensor gone"));
    }

    #[test]
    fn test_response_round_trip() {
        let response = CommandResponse::Rejected {
            state: ScanState::Idle,
            reason: "no scan in progress".to_string(),
        };
        let json = serde_json::to_vec(&response).unwrap();
        let back: CommandResponse = serde_json::from_slice(&json).unwrap();
        assert_eq!(back, response);
    }
}
