//! Trajectory dump in TUM format.
//!
//! One keyframe per line: `time tx ty tz qx qy qz qw`. The file is
//! named after the current unix epoch second and written into the
//! configured directory at shutdown.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::core::math;
use crate::core::types::TrajectoryPose;
use crate::error::Result;

/// Write `trajectory` as `<unix_epoch_s>.txt` under `dir`.
///
/// Returns the path of the written file. The caller is responsible
/// for skipping the call when the trajectory is empty.
pub fn save_tum(dir: &Path, trajectory: &[TrajectoryPose]) -> Result<PathBuf> {
    let epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let path = dir.join(format!("{}.txt", epoch));

    let mut writer = BufWriter::new(File::create(&path)?);
    for entry in trajectory {
        let (t, q) = math::decompose(&entry.pose);
        writeln!(
            writer,
            "{:.6} {:.6} {:.6} {:.6} {:.6} {:.6} {:.6} {:.6}",
            entry.time, t.x, t.y, t.z, q.i, q.j, q.k, q.w
        )?;
    }
    writer.flush()?;
    Ok(path)
}
