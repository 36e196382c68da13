//! Point cloud file exporters
//!
//! Writers take a snapshot of the stored cloud and produce an ASCII file with
//! one `x y z` record per point, coordinates in millimeters, no transformation
//! at export time. Files land in the configured export directory as
//! `scan_<unix-secs>.<ext>`.

pub mod pcd;
pub mod ply;

use crate::error::Result;
use crate::scanner::point_cloud::ScanPoint;
use crate::streaming::messages::ExportFormat;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Write a point cloud snapshot to a timestamped file, returning its path
pub fn export_snapshot(
    directory: &Path,
    format: ExportFormat,
    points: &[ScanPoint],
) -> Result<PathBuf> {
    fs::create_dir_all(directory)?;

    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let path = directory.join(format!("scan_{}.{}", stamp, format.extension()));

    let mut writer = BufWriter::new(File::create(&path)?);
    match format {
        ExportFormat::Ply => ply::write(&mut writer, points)?,
        ExportFormat::Pcd => pcd::write(&mut writer, points)?,
    }

    log::info!(
        "Exported {} points to {}",
        points.len(),
        path.display()
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn sample_points() -> Vec<ScanPoint> {
        vec![
            ScanPoint::from_spherical(90.0, 0.0, 1000.0, 0),
            ScanPoint::from_spherical(45.0, 90.0, 500.0, 1),
        ]
    }

    #[test]
    fn test_export_creates_directory_and_file() {
        let dir = std::env::temp_dir().join("drishti-export-test-ply");
        let _ = fs::remove_dir_all(&dir);

        let path = export_snapshot(&dir, ExportFormat::Ply, &sample_points()).unwrap();
        assert!(path.exists());
        assert_eq!(path.extension().unwrap(), "ply");

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("ply\n"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_export_pcd_extension() {
        let dir = std::env::temp_dir().join("drishti-export-test-pcd");
        let _ = fs::remove_dir_all(&dir);

        let path = export_snapshot(&dir, ExportFormat::Pcd, &sample_points()).unwrap();
        assert_eq!(path.extension().unwrap(), "pcd");

        let _ = fs::remove_dir_all(&dir);
    }
}
