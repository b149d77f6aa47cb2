use serde::{Deserialize, Serialize};

use crate::geometry::{GridCell, LabelLayer};

/// Assignment type code for assignments that carry expert (QA) labels.
pub const QA_KIND: &str = "Q";

/// Rater identity written for ratings of the expert labels.
pub const EXPERT_RATER: &str = "expert";

/// One unit of labeling work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub worker_id: String,
    pub name: String,
    pub assignment_id: String,
    pub kml_type: String,
}

/// A row of `master_grid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SitePoint {
    pub name: String,
    pub x: f64,
    pub y: f64,
    /// Capture date, `YYYY-MM-DD`.
    pub date: String,
}

/// A row of the `configuration` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
}

/// Everything needed to review one labeler's work on one site.
#[derive(Debug, Clone)]
pub struct SiteLabels {
    pub rater: String,
    /// Assignment type code.
    pub kind: String,
    pub assignment_id: String,
    pub point: SitePoint,
    /// Sampling footprint.
    pub grid: GridCell,
    /// Imagery-fetch footprint.
    pub image_grid: GridCell,
    pub user: Option<LabelLayer>,
    pub expert: Option<LabelLayer>,
}

impl SiteLabels {
    pub fn name(&self) -> &str {
        &self.point.name
    }

    pub fn is_qa(&self) -> bool {
        self.kind == QA_KIND
    }
}
