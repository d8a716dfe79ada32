use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use evcs_io::merge_station_files;

use super::telemetry::{manifest_dir, record_run_timed};

pub fn handle(dir: &Path, out: &Path) -> Result<()> {
    let start = Instant::now();
    let res = (|| -> Result<()> {
        let count = merge_station_files(dir, out)?;
        println!("Merged {} stations into {}", count, out.display());
        Ok(())
    })();
    record_run_timed(
        manifest_dir(out),
        "merge",
        &[("dir", dir.display().to_string().as_str())],
        &[out.display().to_string()],
        start,
        &res,
    );
    res
}
