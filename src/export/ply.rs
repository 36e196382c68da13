//! ASCII PLY writer

use crate::error::Result;
use crate::scanner::point_cloud::ScanPoint;
use std::io::Write;

/// Write points as ASCII PLY (format 1.0), coordinates in millimeters
pub fn write<W: Write>(writer: &mut W, points: &[ScanPoint]) -> Result<()> {
    writeln!(writer, "ply")?;
    writeln!(writer, "format ascii 1.0")?;
    writeln!(writer, "element vertex {}", points.len())?;
    writeln!(writer, "property float x")?;
    writeln!(writer, "property float y")?;
    writeln!(writer, "property float z")?;
    writeln!(writer, "end_header")?;
    for point in points {
        writeln!(writer, "{:.3} {:.3} {:.3}", point.x, point.y, point.z)?;
    }
    Ok(())
}
