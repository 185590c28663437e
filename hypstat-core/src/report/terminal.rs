use std::io::{self, Write};

use colored::Colorize;

use super::{Contribution, CorrelationRow, PhaseRow, RatioRow, ReportError, Reporter, ScalarRow, Tables};

/// Verdict on one scalar comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Worse,
    Better,
    Inconclusive,
}

impl Verdict {
    fn of(row: &ScalarRow) -> Self {
        match row.degradation_pct {
            Some(pct) if row.significant && pct > 0.0 => Verdict::Worse,
            Some(pct) if row.significant && pct < 0.0 => Verdict::Better,
            _ => Verdict::Inconclusive,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Verdict::Worse => "worse",
            Verdict::Better => "better",
            Verdict::Inconclusive => "inconclusive",
        }
    }
}

/// A reporter that prints comparison tables to the terminal.
#[derive(Debug, Clone, Default)]
pub struct TerminalReporter {
    /// Whether to use colors in output (defaults to true).
    use_colors: bool,
}

impl TerminalReporter {
    pub fn new() -> Self {
        Self { use_colors: true }
    }

    pub fn without_colors() -> Self {
        Self { use_colors: false }
    }

    /// Compact numeric rendering, `-` for undefined.
    fn format_value(value: Option<f64>) -> String {
        match value {
            None => "-".to_string(),
            Some(v) if v != 0.0 && (v.abs() >= 1e6 || v.abs() < 1e-3) => format!("{v:.3e}"),
            Some(v) => format!("{v:.3}"),
        }
    }

    /// Mean with its confidence half-width.
    fn format_mean_ci(mean: Option<f64>, ci: Option<f64>, n: usize) -> String {
        match ci {
            Some(ci) => format!(
                "{} ± {} (n={n})",
                Self::format_value(mean),
                Self::format_value(Some(ci))
            ),
            None => format!("{} (n={n})", Self::format_value(mean)),
        }
    }

    /// Signed percentage; positive means the treatment is worse.
    fn format_change(pct: Option<f64>, ci_pct: Option<f64>) -> String {
        match (pct, ci_pct) {
            (None, _) => "-".to_string(),
            (Some(p), Some(ci)) => format!("{p:+.2}% ± {ci:.2}"),
            (Some(p), None) => format!("{p:+.2}%"),
        }
    }

    fn paint(&self, text: &str, verdict: Verdict) -> String {
        if !self.use_colors {
            return text.to_string();
        }
        match verdict {
            Verdict::Worse => text.red().bold().to_string(),
            Verdict::Better => text.green().bold().to_string(),
            Verdict::Inconclusive => text.yellow().to_string(),
        }
    }

    fn title(&self, writer: &mut impl Write, text: &str, width: usize) -> io::Result<()> {
        writeln!(writer)?;
        if self.use_colors {
            writeln!(writer, "{}", text.bold())?;
        } else {
            writeln!(writer, "{text}")?;
        }
        writeln!(writer, "{}", "-".repeat(width))
    }

    fn print_header(&self, writer: &mut impl Write) -> io::Result<()> {
        let header = format!(
            "{:<24} {:<14} {:<12} {:>26} {:>26} {:>20} {:>10} {:>14}",
            "Key", "Treatment", "Channel", "Baseline", "Treatment mean", "Change", "p-value", "Result"
        );
        self.title(writer, &header, 152)
    }

    fn print_row(&self, writer: &mut impl Write, row: &ScalarRow) -> io::Result<()> {
        let key = if row.key.chars().count() > 22 {
            format!("{}...", row.key.chars().take(19).collect::<String>())
        } else {
            row.key.clone()
        };
        let verdict = Verdict::of(row);

        let baseline = Self::format_mean_ci(
            row.baseline_stat.mean,
            row.baseline_stat.ci,
            row.baseline_stat.n,
        );
        let treatment = Self::format_mean_ci(
            row.treatment_stat.mean,
            row.treatment_stat.ci,
            row.treatment_stat.n,
        );
        let change_text = Self::format_change(row.degradation_pct, row.ci_pct);
        let change = self.paint(&change_text, verdict);
        let p_value = Self::format_value(row.p_value);
        let result = self.paint(verdict.as_str(), verdict);

        // Pad on visible width; colored strings carry escape codes.
        let change_padding = 20_usize.saturating_sub(change_text.chars().count());
        let result_padding = 14_usize.saturating_sub(verdict.as_str().len());

        writeln!(
            writer,
            "{:<24} {:<14} {:<12} {:>26} {:>26} {:>width_change$}{} {:>10} {:>width_result$}{}",
            key,
            row.treatment,
            row.channel,
            baseline,
            treatment,
            "",
            change,
            p_value,
            "",
            result,
            width_change = change_padding,
            width_result = result_padding,
        )
    }

    fn print_summary(&self, writer: &mut impl Write, rows: &[ScalarRow]) -> io::Result<()> {
        let mut worse = 0;
        let mut better = 0;
        let mut inconclusive = 0;
        for row in rows {
            match Verdict::of(row) {
                Verdict::Worse => worse += 1,
                Verdict::Better => better += 1,
                Verdict::Inconclusive => inconclusive += 1,
            }
        }

        writeln!(writer, "{}", "-".repeat(152))?;
        let label = "Summary:";
        if self.use_colors {
            write!(writer, "{} ", label.bold())?;
        } else {
            write!(writer, "{label} ")?;
        }
        writeln!(
            writer,
            "{}, {}, {}",
            self.paint(&format!("{worse} worse"), Verdict::Worse),
            self.paint(&format!("{better} better"), Verdict::Better),
            self.paint(&format!("{inconclusive} inconclusive"), Verdict::Inconclusive),
        )
    }

    fn print_ratios(&self, writer: &mut impl Write, rows: &[RatioRow]) -> io::Result<()> {
        self.title(writer, "Event ratios", 96)?;
        for row in rows {
            writeln!(
                writer,
                "{:<14} {:<24} {:>22} {:>14} {:>14}",
                row.condition,
                row.bench,
                format!("{}/{}", row.event, row.normalizer),
                Self::format_value(row.ratio),
                Self::format_value(row.difference),
            )?;
        }
        Ok(())
    }

    fn print_correlations(&self, writer: &mut impl Write, rows: &[CorrelationRow]) -> io::Result<()> {
        self.title(writer, "Correlations", 96)?;
        for row in rows {
            writeln!(
                writer,
                "{:<14} {:<24} {:<24} {:>8} {:>10}",
                row.condition,
                row.x,
                row.y,
                format!("n={}", row.pairs),
                Self::format_value(row.r),
            )?;
        }
        Ok(())
    }

    fn print_phases(&self, writer: &mut impl Write, rows: &[PhaseRow]) -> io::Result<()> {
        self.title(writer, "Flight phases", 96)?;
        for row in rows {
            writeln!(
                writer,
                "{:<14} {:<14} {:<10} {:>6} pts {:>7.1}% significant  mean diff {}",
                row.treatment,
                row.channel,
                row.summary.phase,
                row.summary.points,
                row.summary.significant_fraction * 100.0,
                Self::format_value(row.summary.mean_diff),
            )?;
        }
        Ok(())
    }

    /// Per-group file and channel counts, so dropped data is visible.
    fn print_contributions(&self, writer: &mut impl Write, rows: &[Contribution]) -> io::Result<()> {
        self.title(writer, "Contributions", 96)?;
        for row in rows {
            let files = format!(
                "{} files: {} parsed, {} failed",
                row.files_found, row.files_parsed, row.files_failed
            );
            let files = if row.files_failed > 0 && self.use_colors {
                files.red().to_string()
            } else {
                files
            };
            writeln!(writer, "{:<14} {} ; {} runs", row.group, files, row.runs)?;
            if !row.channels.is_empty() {
                let channels: Vec<String> = row
                    .channels
                    .iter()
                    .map(|(channel, runs)| format!("{channel}={runs}"))
                    .collect();
                writeln!(writer, "{:<14} valid runs per channel: {}", "", channels.join(", "))?;
            }
        }
        Ok(())
    }

    /// Write every non-empty table to `writer`.
    pub fn write_report(&self, writer: &mut impl Write, tables: &Tables) -> io::Result<()> {
        if !tables.scalars.is_empty() {
            self.print_header(writer)?;
            for row in &tables.scalars {
                self.print_row(writer, row)?;
            }
            self.print_summary(writer, &tables.scalars)?;
        }
        if !tables.ratios.is_empty() {
            self.print_ratios(writer, &tables.ratios)?;
        }
        if !tables.correlations.is_empty() {
            self.print_correlations(writer, &tables.correlations)?;
        }
        if !tables.phases.is_empty() {
            self.print_phases(writer, &tables.phases)?;
        }
        if !tables.contributions.is_empty() {
            self.print_contributions(writer, &tables.contributions)?;
        }
        writeln!(writer)
    }
}

impl Reporter for TerminalReporter {
    fn report(&self, tables: &Tables) -> Result<(), ReportError> {
        let stdout = io::stdout();
        let mut writer = stdout.lock();
        self.write_report(&mut writer, tables)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{AggregateStat, ComparisonResult, Degradation};

    fn row(key: &str, pct: f64, significant: bool) -> ScalarRow {
        let stat = AggregateStat {
            mean: Some(10.0),
            stdev: Some(1.0),
            n: 4,
            ci: Some(0.98),
        };
        ScalarRow::new(
            key,
            "native",
            "bao",
            "fps",
            stat,
            stat,
            Some(Degradation {
                pct,
                ci_pct: Some(1.0),
            }),
            ComparisonResult {
                mean_diff: Some(1.0),
                p_value: Some(if significant { 0.001 } else { 0.5 }),
                significant,
            },
        )
    }

    #[test]
    fn test_format_value() {
        assert_eq!(TerminalReporter::format_value(None), "-");
        assert_eq!(TerminalReporter::format_value(Some(0.0)), "0.000");
        assert_eq!(TerminalReporter::format_value(Some(12.3456)), "12.346");
        assert_eq!(TerminalReporter::format_value(Some(2_500_000.0)), "2.500e6");
    }

    #[test]
    fn test_format_change() {
        assert_eq!(TerminalReporter::format_change(Some(10.5), None), "+10.50%");
        assert_eq!(TerminalReporter::format_change(Some(-10.5), Some(2.0)), "-10.50% ± 2.00");
        assert_eq!(TerminalReporter::format_change(None, Some(2.0)), "-");
    }

    #[test]
    fn test_verdicts() {
        assert_eq!(Verdict::of(&row("a", 5.0, true)), Verdict::Worse);
        assert_eq!(Verdict::of(&row("a", -5.0, true)), Verdict::Better);
        assert_eq!(Verdict::of(&row("a", 5.0, false)), Verdict::Inconclusive);
    }

    #[test]
    fn test_report_to_buffer() {
        let reporter = TerminalReporter::without_colors();
        let mut contribution = Contribution::new("bao");
        contribution.files_found = 3;
        contribution.files_parsed = 2;
        contribution.files_failed = 1;
        contribution.runs = 6;
        contribution.channels.insert("fps".to_string(), 6);

        let tables = Tables {
            scalars: vec![
                row("run 1", 12.0, true),
                row("run 2", -3.0, true),
                row("run 3", 0.5, false),
            ],
            contributions: vec![contribution],
            ..Tables::default()
        };

        let mut buffer = Vec::new();
        reporter.write_report(&mut buffer, &tables).unwrap();
        let output = String::from_utf8(buffer).unwrap();

        assert!(output.contains("Key"));
        assert!(output.contains("run 1"));
        assert!(output.contains("+12.00% ± 1.00"));
        assert!(output.contains("Summary:"));
        assert!(output.contains("1 worse"));
        assert!(output.contains("1 better"));
        assert!(output.contains("1 inconclusive"));
        assert!(output.contains("3 files: 2 parsed, 1 failed"));
        assert!(output.contains("fps=6"));
        assert!(!output.contains("Event ratios"));
    }
}
