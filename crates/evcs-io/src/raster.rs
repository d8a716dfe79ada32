//! ESRI ASCII grid (`.asc`) reader and writer.
//!
//! The demand and capacity GeoTIFFs are exchanged as ASCII grids
//! (`gdal_translate -of AAIGrid`). Both `xllcorner`/`yllcorner` and
//! `xllcenter`/`yllcenter` headers are accepted.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use evcs_core::Raster;

#[derive(Debug, Default)]
struct Header {
    ncols: Option<usize>,
    nrows: Option<usize>,
    xll: Option<(f64, bool)>,
    yll: Option<(f64, bool)>,
    cellsize: Option<f64>,
    nodata: Option<f64>,
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse::<T>()
        .map_err(|_| anyhow!("invalid value '{value}' for ASCII grid header '{key}'"))
}

/// Parse an ASCII grid from any reader.
pub fn parse_ascii_grid(reader: impl BufRead) -> Result<Raster> {
    let mut header = Header::default();
    let mut values = Vec::new();

    for (lineno, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading ASCII grid line {}", lineno + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let first = trimmed.split_whitespace().next().unwrap_or_default();
        if values.is_empty() && first.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
            let mut parts = trimmed.split_whitespace();
            let key = parts.next().unwrap_or_default().to_ascii_lowercase();
            let value = parts
                .next()
                .ok_or_else(|| anyhow!("ASCII grid header '{key}' has no value"))?;
            match key.as_str() {
                "ncols" => header.ncols = Some(parse_number(&key, value)?),
                "nrows" => header.nrows = Some(parse_number(&key, value)?),
                "xllcorner" => header.xll = Some((parse_number(&key, value)?, false)),
                "xllcenter" => header.xll = Some((parse_number(&key, value)?, true)),
                "yllcorner" => header.yll = Some((parse_number(&key, value)?, false)),
                "yllcenter" => header.yll = Some((parse_number(&key, value)?, true)),
                "cellsize" => header.cellsize = Some(parse_number(&key, value)?),
                "nodata_value" => header.nodata = Some(parse_number(&key, value)?),
                "dx" | "dy" => bail!("non-square ASCII grid cells are not supported"),
                other => bail!("unknown ASCII grid header '{other}'"),
            }
            continue;
        }
        for token in trimmed.split_whitespace() {
            let v: f64 = token.parse().map_err(|_| {
                anyhow!("invalid cell value '{token}' on line {}", lineno + 1)
            })?;
            values.push(v);
        }
    }

    let ncols = header.ncols.ok_or_else(|| anyhow!("ASCII grid is missing 'ncols'"))?;
    let nrows = header.nrows.ok_or_else(|| anyhow!("ASCII grid is missing 'nrows'"))?;
    let cell = header
        .cellsize
        .ok_or_else(|| anyhow!("ASCII grid is missing 'cellsize'"))?;
    let (xll, x_center) = header
        .xll
        .ok_or_else(|| anyhow!("ASCII grid is missing 'xllcorner'"))?;
    let (yll, y_center) = header
        .yll
        .ok_or_else(|| anyhow!("ASCII grid is missing 'yllcorner'"))?;
    let x_min = if x_center { xll - cell / 2.0 } else { xll };
    let y_min = if y_center { yll - cell / 2.0 } else { yll };
    let y_max = y_min + nrows as f64 * cell;

    Ok(Raster::from_values(
        ncols,
        nrows,
        x_min,
        y_max,
        cell,
        header.nodata,
        values,
    )?)
}

pub fn read_ascii_grid(path: &Path) -> Result<Raster> {
    let file = File::open(path)
        .with_context(|| format!("opening ASCII grid '{}'", path.display()))?;
    parse_ascii_grid(BufReader::new(file))
        .with_context(|| format!("parsing ASCII grid '{}'", path.display()))
}

pub fn write_ascii_grid(raster: &Raster, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("creating ASCII grid '{}'", path.display()))?;
    let mut w = BufWriter::new(file);
    writeln!(w, "ncols        {}", raster.ncols)?;
    writeln!(w, "nrows        {}", raster.nrows)?;
    writeln!(w, "xllcorner    {}", raster.x_min)?;
    writeln!(w, "yllcorner    {}", raster.y_min())?;
    writeln!(w, "cellsize     {}", raster.cell_size)?;
    if let Some(nodata) = raster.nodata {
        writeln!(w, "NODATA_value {}", nodata)?;
    }
    for row in raster.values().chunks(raster.ncols) {
        let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        writeln!(w, "{}", line.join(" "))?;
    }
    w.flush()
        .with_context(|| format!("writing ASCII grid '{}'", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const GRID: &str = "ncols 3
nrows 2
xllcorner 1000
yllcorner 2000
cellsize 500
NODATA_value -9999
1 2 3
4 -9999 6
";

    #[test]
    fn parses_header_and_values() {
        let r = parse_ascii_grid(Cursor::new(GRID)).unwrap();
        assert_eq!((r.ncols, r.nrows), (3, 2));
        assert_eq!(r.x_min, 1000.0);
        assert_eq!(r.y_max, 3000.0);
        assert_eq!(r.get(0, 2), Some(3.0));
        assert_eq!(r.get(1, 1), None);
    }

    #[test]
    fn center_registration_shifts_origin() {
        let text = GRID
            .replace("xllcorner 1000", "xllcenter 1250")
            .replace("yllcorner 2000", "yllcenter 2250");
        let r = parse_ascii_grid(Cursor::new(text)).unwrap();
        assert_eq!(r.x_min, 1000.0);
        assert_eq!(r.y_max, 3000.0);
    }

    #[test]
    fn short_body_is_rejected() {
        let text = GRID.replace("4 -9999 6\n", "");
        assert!(parse_ascii_grid(Cursor::new(text)).is_err());
    }

    #[test]
    fn written_grid_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demand.asc");
        let r = parse_ascii_grid(Cursor::new(GRID)).unwrap();
        write_ascii_grid(&r, &path).unwrap();
        assert_eq!(read_ascii_grid(&path).unwrap(), r);
    }
}
