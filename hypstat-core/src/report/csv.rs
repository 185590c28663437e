//! CSV export.
//!
//! Series tables use one row per shared index point with a `progress`
//! column followed by `<channel>_<group>_<stat>` columns. Scalar tables are
//! written one row per comparison. When an analysis has both, the scalar
//! table goes to a companion `<stem>.scalars.csv` next to the series file.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::{ReportError, Tables};

/// Escape a CSV field (commas, quotes, newlines).
fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn opt(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Column-major cells keyed by index point.
#[derive(Default)]
struct Grid {
    progress: BTreeMap<usize, f64>,
    columns: Vec<String>,
    cells: BTreeMap<(usize, usize), String>,
}

impl Grid {
    fn column(&mut self, name: String) -> usize {
        match self.columns.iter().position(|c| *c == name) {
            Some(pos) => pos,
            None => {
                self.columns.push(name);
                self.columns.len() - 1
            }
        }
    }

    fn set(&mut self, index: usize, progress: f64, column: String, value: String) {
        self.progress.insert(index, progress);
        let col = self.column(column);
        self.cells.insert((index, col), value);
    }

    fn write(&self, writer: &mut impl Write) -> Result<(), ReportError> {
        let mut header = vec!["progress".to_string()];
        header.extend(self.columns.iter().map(|c| escape_field(c)));
        writeln!(writer, "{}", header.join(","))?;

        for (&index, progress) in &self.progress {
            let mut fields = vec![progress.to_string()];
            for col in 0..self.columns.len() {
                fields.push(self.cells.get(&(index, col)).cloned().unwrap_or_default());
            }
            writeln!(writer, "{}", fields.join(","))?;
        }
        Ok(())
    }
}

/// Write aggregates and comparisons in the shared-index layout.
pub fn write_series_csv(tables: &Tables, writer: &mut impl Write) -> Result<(), ReportError> {
    let mut grid = Grid::default();

    for row in &tables.aggregates {
        let prefix = format!("{}_{}", row.channel, row.group);
        grid.set(row.index, row.progress, format!("{prefix}_mean"), opt(row.mean));
        grid.set(row.index, row.progress, format!("{prefix}_ci"), opt(row.ci));
        grid.set(row.index, row.progress, format!("{prefix}_n"), row.n.to_string());
    }

    for row in &tables.comparisons {
        let prefix = format!("{}_{}", row.channel, row.treatment);
        grid.set(row.index, row.progress, format!("{prefix}_mean_diff"), opt(row.mean_diff));
        grid.set(row.index, row.progress, format!("{prefix}_p_value"), opt(row.p_value));
        grid.set(
            row.index,
            row.progress,
            format!("{prefix}_significant"),
            row.significant.to_string(),
        );
    }

    grid.write(writer)
}

/// Write the scalar comparison table, one row per comparison.
pub fn write_scalar_csv(tables: &Tables, writer: &mut impl Write) -> Result<(), ReportError> {
    writeln!(
        writer,
        "key,baseline,treatment,channel,baseline_mean,baseline_n,treatment_mean,treatment_n,degradation_pct,ci_pct,p_value,significant"
    )?;
    for row in &tables.scalars {
        let fields = [
            escape_field(&row.key),
            escape_field(&row.baseline),
            escape_field(&row.treatment),
            escape_field(&row.channel),
            opt(row.baseline_stat.mean),
            row.baseline_stat.n.to_string(),
            opt(row.treatment_stat.mean),
            row.treatment_stat.n.to_string(),
            opt(row.degradation_pct),
            opt(row.ci_pct),
            opt(row.p_value),
            row.significant.to_string(),
        ];
        writeln!(writer, "{}", fields.join(","))?;
    }
    Ok(())
}

/// Series layout when the analysis produced per-index tables, scalar layout otherwise.
pub fn write_csv(tables: &Tables, writer: &mut impl Write) -> Result<(), ReportError> {
    if tables.has_series() {
        write_series_csv(tables, writer)
    } else {
        write_scalar_csv(tables, writer)
    }
}

/// Companion path of the scalar table, e.g. `out.csv` -> `out.scalars.csv`.
pub fn scalar_csv_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{stem}.scalars.csv"))
}

fn write_file(
    path: &Path,
    tables: &Tables,
    write: impl FnOnce(&Tables, &mut BufWriter<File>) -> Result<(), ReportError>,
) -> Result<(), ReportError> {
    let mut writer = BufWriter::new(File::create(path)?);
    write(tables, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Write `tables` to `path`, plus the scalar companion file when the
/// analysis produced both series and scalar rows. Returns every path written.
pub fn write_csv_files(tables: &Tables, path: &Path) -> Result<Vec<PathBuf>, ReportError> {
    write_file(path, tables, |t, w| write_csv(t, w))?;
    let mut written = vec![path.to_path_buf()];

    if tables.has_series() && !tables.scalars.is_empty() {
        let scalars = scalar_csv_path(path);
        write_file(&scalars, tables, |t, w| write_scalar_csv(t, w))?;
        written.push(scalars);
    }
    Ok(written)
}
