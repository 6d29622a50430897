//! Settlement series export: a tab-separated table and an SVG curve.
//!
//! Table format, one header line then one row per sample:
//!
//! ```text
//! # step	displacement
//! 0	1.234000e-8
//! 100	2.345000e-5
//! ```

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::simulation::sampler::{Series, SeriesRecord, SeriesSink};

pub const TABLE_HEADER: &str = "# step\tdisplacement";

fn format_row(r: &SeriesRecord) -> String {
    format!("{}\t{:.6e}", r.step, r.displacement)
}

/// Whole series as table text
pub fn format_table(series: &Series) -> String {
    let mut out = String::from(TABLE_HEADER);
    out.push('\n');
    for r in series.records() {
        out.push_str(&format_row(r));
        out.push('\n');
    }
    out
}

pub fn write_series_table(path: &Path, series: &Series) -> io::Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    w.write_all(format_table(series).as_bytes())?;
    w.flush()
}

/// Streams records into a table file as they are sampled. The file is
/// created on the first record.
pub struct TableWriter {
    path: PathBuf,
    out: Option<BufWriter<File>>,
}

impl TableWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            out: None,
        }
    }

    fn writer(&mut self) -> io::Result<&mut BufWriter<File>> {
        let w = match self.out.take() {
            Some(w) => w,
            None => {
                let mut w = BufWriter::new(File::create(&self.path)?);
                writeln!(w, "{TABLE_HEADER}")?;
                w
            }
        };
        Ok(self.out.insert(w))
    }
}

impl SeriesSink for TableWriter {
    fn record(&mut self, record: &SeriesRecord) -> io::Result<()> {
        let w = self.writer()?;
        writeln!(w, "{}", format_row(record))?;
        w.flush()
    }

    fn finish(&mut self) -> io::Result<()> {
        match self.out.as_mut() {
            Some(w) => w.flush(),
            None => Ok(()),
        }
    }
}

/// Load-settlement curve as a standalone SVG: step on x, settlement
/// growing downwards on y
pub fn settlement_svg(series: &Series, title: &str) -> String {
    const W: f64 = 640.0;
    const H: f64 = 400.0;
    const PAD: f64 = 50.0;

    let records = series.records();
    let max_step = records.last().map(|r| r.step).unwrap_or(1).max(1) as f64;
    let max_disp = records
        .iter()
        .map(|r| r.displacement.abs())
        .fold(0.0_f64, f64::max)
        .max(f64::MIN_POSITIVE);

    let points: Vec<String> = records
        .iter()
        .map(|r| {
            let px = PAD + (W - 2.0 * PAD) * r.step as f64 / max_step;
            let py = PAD + (H - 2.0 * PAD) * r.displacement / max_disp;
            format!("{px:.2},{py:.2}")
        })
        .collect();

    format!(
        concat!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\">\n",
            "  <rect width=\"100%\" height=\"100%\" fill=\"white\"/>\n",
            "  <text x=\"{pad}\" y=\"25\" font-family=\"sans-serif\" font-size=\"14\">{title}</text>\n",
            "  <line x1=\"{pad}\" y1=\"{pad}\" x2=\"{xr}\" y2=\"{pad}\" stroke=\"black\"/>\n",
            "  <line x1=\"{pad}\" y1=\"{pad}\" x2=\"{pad}\" y2=\"{yb}\" stroke=\"black\"/>\n",
            "  <text x=\"{xr}\" y=\"{tx}\" font-family=\"sans-serif\" font-size=\"11\" text-anchor=\"end\">step {max_step}</text>\n",
            "  <text x=\"5\" y=\"{yb}\" font-family=\"sans-serif\" font-size=\"11\">{max_disp:.3e} m</text>\n",
            "  <polyline fill=\"none\" stroke=\"steelblue\" stroke-width=\"2\" points=\"{points}\"/>\n",
            "</svg>\n"
        ),
        w = W,
        h = H,
        pad = PAD,
        xr = W - PAD,
        yb = H - PAD,
        tx = PAD - 5.0,
        title = title,
        max_step = max_step,
        max_disp = max_disp,
        points = points.join(" "),
    )
}

pub fn write_settlement_svg(path: &Path, series: &Series, title: &str) -> io::Result<()> {
    std::fs::write(path, settlement_svg(series, title))
}
