//! Sources of site points, label polygons and imagery configuration.

pub mod local;
pub mod postgres;

use crate::error::Result;
use crate::geometry::LabelLayer;
use crate::model::{ConfigEntry, SitePoint};

pub use local::LocalStore;
pub use postgres::PgStore;

/// Read-only access to the labeling tables.
///
/// Geometry lookups return `None` when nothing matches.
#[allow(async_fn_in_trait)]
pub trait LabelStore {
    /// Entries of the `configuration` table whose key starts with `instance`.
    async fn instance_config(&self) -> Result<Vec<ConfigEntry>>;

    async fn site_point(&self, name: &str) -> Result<Option<SitePoint>>;

    /// Polygons a labeler submitted for one assignment.
    async fn user_labels(&self, assignment_id: &str) -> Result<Option<LabelLayer>>;

    /// Expert (QA) polygons for a site.
    async fn expert_labels(&self, name: &str) -> Result<Option<LabelLayer>>;
}
