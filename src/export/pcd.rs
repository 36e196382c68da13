//! ASCII PCD writer (format version 0.7)

use crate::error::Result;
use crate::scanner::point_cloud::ScanPoint;
use std::io::Write;

/// Write points as an unorganized ASCII PCD v0.7 cloud, coordinates in
/// millimeters
pub fn write<W: Write>(writer: &mut W, points: &[ScanPoint]) -> Result<()> {
    writeln!(writer, "# .PCD v0.7 - Point Cloud Data file format")?;
    writeln!(writer, "VERSION 0.7")?;
    writeln!(writer, "FIELDS x y z")?;
    writeln!(writer, "SIZE 4 4 4")?;
    writeln!(writer, "TYPE F F F")?;
    writeln!(writer, "COUNT 1 1 1")?;
    writeln!(writer, "WIDTH {}", points.len())?;
    writeln!(writer, "HEIGHT 1")?;
    writeln!(writer, "VIEWPOINT 0 0 0 1 0 0 0")?;
    writeln!(writer, "POINTS {}", points.len())?;
    writeln!(writer, "DATA ascii")?;
    for point in points {
        writeln!(writer, "{:.3} {:.3} {:.3}", point.x, point.y, point.z)?;
    }
    Ok(())
}
