//! Human-readable text report.

use std::fmt::Display;
use std::io::{self, Write};

use bytesize::ByteSize;
use yansi::{Paint, Style};

use crate::actions::DeletionReport;
use crate::duplicates::ScanResult;

const HEADER: Style = Style::new().bold();
const ORIGINAL: Style = Style::new().green();
const DUPLICATE: Style = Style::new().yellow();
const FAILURE: Style = Style::new().red();
const DIM: Style = Style::new().dim();

/// Writes scan and deletion reports as plain or colored text.
#[derive(Debug, Clone, Copy)]
pub struct TextReport {
    color: bool,
}

impl TextReport {
    /// Create a writer; `color` enables ANSI styling.
    #[must_use]
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn paint<T: Display>(&self, value: T, style: Style) -> String {
        if self.color {
            value.paint(style).to_string()
        } else {
            value.to_string()
        }
    }

    /// Write every duplicate set followed by a summary.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_scan<W: Write>(&self, w: &mut W, result: &ScanResult) -> io::Result<()> {
        for (i, set) in result.sets.iter().enumerate() {
            let title = format!(
                "Set {} ({} copies of {}, {} reclaimable)",
                i + 1,
                set.len(),
                ByteSize::b(set.size),
                ByteSize::b(set.wasted_space())
            );
            writeln!(w, "{}", self.paint(title, HEADER))?;
            writeln!(w, "  {}", self.paint(&set.hash_hex()[..16], DIM))?;

            if let Some(original) = set.original() {
                writeln!(
                    w,
                    "  {} {}",
                    self.paint("keep", ORIGINAL),
                    original.path.display()
                )?;
            }
            for copy in set.duplicates() {
                writeln!(w, "  {} {}", self.paint("dupe", DUPLICATE), copy.path.display())?;
            }
            writeln!(w)?;
        }

        if !result.errors.is_empty() {
            writeln!(
                w,
                "{}",
                self.paint(format!("{} entries could not be read:", result.errors.len()), FAILURE)
            )?;
            for error in &result.errors {
                writeln!(w, "  {error}")?;
            }
            writeln!(w)?;
        }

        self.write_scan_summary(w, result)
    }

    /// Write the one-paragraph scan summary.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_scan_summary<W: Write>(&self, w: &mut W, result: &ScanResult) -> io::Result<()> {
        if result.sets.is_empty() {
            writeln!(w, "No duplicates found.")?;
        } else {
            writeln!(
                w,
                "{} duplicate sets, {} redundant files, {} reclaimable{}",
                result.sets.len(),
                result.duplicate_files(),
                self.paint(ByteSize::b(result.reclaimable_space()), HEADER),
                if result.verified { " (verified)" } else { "" }
            )?;
        }
        writeln!(
            w,
            "Scanned {} files ({}) in {:.2?}; hashed {} files ({})",
            result.files_scanned,
            ByteSize::b(result.bytes_scanned),
            result.duration,
            result.files_hashed,
            ByteSize::b(result.bytes_hashed)
        )
    }

    /// Write per-path deletion results and a summary line.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_deletion<W: Write>(&self, w: &mut W, report: &DeletionReport) -> io::Result<()> {
        for outcome in report.failed() {
            let reason = outcome
                .cause
                .as_ref()
                .map_or_else(|| "unknown error".to_string(), ToString::to_string);
            writeln!(w, "  {} {}", self.paint("failed", FAILURE), reason)?;
        }
        writeln!(w, "{}", report.summary())
    }
}
