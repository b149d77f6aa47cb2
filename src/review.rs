//! The review log: ratings appended to a CSV file, read back to skip
//! sites a rater has already reviewed.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::csv::{self, Table};
use crate::error::{Error, Result};
use crate::model::{SiteLabels, EXPERT_RATER};

const HEADER: [&str; 3] = ["name", "labeller", "rating"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub name: String,
    /// Worker id of the labeler, or `expert`.
    pub labeller: String,
    pub rating: String,
}

impl ReviewRecord {
    pub fn new(
        name: impl Into<String>,
        labeller: impl Into<String>,
        rating: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            labeller: labeller.into(),
            rating: rating.into(),
        }
    }
}

/// Append-only CSV of review records.
#[derive(Debug, Clone)]
pub struct ReviewLog {
    path: PathBuf,
}

impl ReviewLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// All records, or none when the log has not been created yet.
    pub fn records(&self) -> Result<Vec<ReviewRecord>> {
        if !self.exists() {
            return Ok(Vec::new());
        }

        let text = fs::read_to_string(&self.path)?;
        let table = Table::parse(&text).map_err(|message| self.csv_error(message))?;
        let cols = table
            .columns(&HEADER)
            .map_err(|message| self.csv_error(message))?;

        Ok(table
            .rows
            .iter()
            .map(|row| {
                ReviewRecord::new(
                    Table::field(row, cols[0]),
                    Table::field(row, cols[1]),
                    Table::field(row, cols[2]),
                )
            })
            .collect())
    }

    /// Site names `rater` has already reviewed. Both sides are trimmed
    /// before comparison.
    pub fn reviewed_sites(&self, rater: &str) -> Result<HashSet<String>> {
        let rater = rater.trim();
        let sites: HashSet<String> = self
            .records()?
            .into_iter()
            .filter(|r| r.labeller.trim() == rater)
            .map(|r| r.name.trim().to_string())
            .collect();
        debug!("{} sites reviewed by {} in {:?}", sites.len(), rater, self.path);
        Ok(sites)
    }

    /// Append records, writing the header first if the file is new.
    pub fn append(&self, records: &[ReviewRecord]) -> Result<()> {
        let is_new = !self.exists();
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        if is_new {
            writeln!(file, "{}", csv::format_row(&HEADER))?;
        }
        for record in records {
            writeln!(
                file,
                "{}",
                csv::format_row(&[&record.name, &record.labeller, &record.rating])
            )?;
        }

        info!("Appended {} review(s) to {:?}", records.len(), self.path);
        Ok(())
    }

    fn csv_error(&self, message: String) -> Error {
        Error::Csv {
            path: self.path.display().to_string(),
            message,
        }
    }
}

/// Print `prompt` and read one line. Line breaks inside the answer are
/// impossible, surrounding whitespace is dropped.
pub fn prompt_line<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    prompt: &str,
) -> Result<String> {
    write!(output, "{prompt}")?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Ask for a rating of the labeler's work and, if `rate_expert`, of the
/// expert labels, then append the answers to `log`.
pub fn record_review<R: BufRead, W: Write>(
    log: &ReviewLog,
    labels: &SiteLabels,
    rate_expert: bool,
    input: &mut R,
    output: &mut W,
) -> Result<Vec<ReviewRecord>> {
    let name = labels.name();
    let mut records = Vec::with_capacity(2);

    let rating = prompt_line(
        input,
        output,
        &format!("Rating for labeller {} on {}: ", labels.rater, name),
    )?;
    records.push(ReviewRecord::new(name, &labels.rater, rating));

    if rate_expert {
        let rating = prompt_line(input, output, &format!("Rating for expert labels on {name}: "))?;
        records.push(ReviewRecord::new(name, EXPERT_RATER, rating));
    }

    log.append(&records)?;
    Ok(records)
}
