//! Assignment table loading and site selection.

use rand::seq::IndexedRandom;
use rand::Rng;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::csv::Table;
use crate::error::{Error, Result};
use crate::model::Assignment;

const COLUMNS: [&str; 4] = ["worker_id", "name", "assignment_id", "kml_type"];

/// Which site to review.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SiteSelector {
    /// Draw an unreviewed site at random.
    #[default]
    Random,
    /// A site by name.
    Named(String),
}

impl SiteSelector {
    pub fn parse(value: &str) -> Self {
        if value == "random" {
            Self::Random
        } else {
            Self::Named(value.to_string())
        }
    }
}

/// Load assignments from a CSV file with `worker_id,name,assignment_id,kml_type` columns.
pub fn load_assignments(path: &Path) -> Result<Vec<Assignment>> {
    let text = fs::read_to_string(path)?;
    parse_assignments(&text).map_err(|message| Error::Csv {
        path: path.display().to_string(),
        message,
    })
}

pub fn parse_assignments(text: &str) -> std::result::Result<Vec<Assignment>, String> {
    let table = Table::parse(text)?;
    let cols = table.columns(&COLUMNS)?;

    Ok(table
        .rows
        .iter()
        .map(|row| Assignment {
            worker_id: Table::field(row, cols[0]).trim().to_string(),
            name: Table::field(row, cols[1]).trim().to_string(),
            assignment_id: Table::field(row, cols[2]).trim().to_string(),
            kml_type: Table::field(row, cols[3]).trim().to_string(),
        })
        .collect())
}

/// Pick the assignment to review for `rater`.
///
/// Random selection skips every site in `reviewed` and then draws uniformly
/// among the rater's rows of type `kind`. Named selection ignores `kind` and
/// `reviewed`; when several rows share the name the first is used.
pub fn select_site<'a, R: Rng + ?Sized>(
    assignments: &'a [Assignment],
    rater: &str,
    kind: &str,
    selector: &SiteSelector,
    reviewed: &HashSet<String>,
    rng: &mut R,
) -> Result<&'a Assignment> {
    let rater = rater.trim();
    let own = assignments.iter().filter(|a| a.worker_id.trim() == rater);

    match selector {
        SiteSelector::Random => {
            let unreviewed: Vec<&Assignment> = own
                .filter(|a| !reviewed.contains(a.name.trim()))
                .collect();
            debug!(
                "{} unreviewed assignments for rater {} ({} sites already reviewed)",
                unreviewed.len(),
                rater,
                reviewed.len()
            );

            let candidates: Vec<&Assignment> = unreviewed
                .into_iter()
                .filter(|a| a.kml_type == kind)
                .collect();

            candidates
                .choose(rng)
                .copied()
                .ok_or_else(|| Error::NoSiteAvailable {
                    rater: rater.to_string(),
                    kind: kind.to_string(),
                })
        }
        SiteSelector::Named(name) => {
            let matches: Vec<&Assignment> = own.filter(|a| a.name == *name).collect();
            if matches.len() > 1 {
                warn!(
                    "{} assignments named {} for rater {}, using {}",
                    matches.len(),
                    name,
                    rater,
                    matches[0].assignment_id
                );
            }
            matches
                .first()
                .copied()
                .ok_or_else(|| Error::SiteNotFound(format!("{name} (rater {rater})")))
        }
    }
}
