pub mod assignments;
pub mod config;
pub mod csv;
pub mod error;
pub mod geometry;
pub mod imagery;
pub mod map;
pub mod model;
pub mod review;
pub mod store;
pub mod workflow;

pub use assignments::{load_assignments, SiteSelector};
pub use config::Config;
pub use error::{Error, Result};
pub use geometry::{points_to_gridpoly, GridCell, LabelLayer};
pub use map::MapDocument;
pub use model::{Assignment, SiteLabels, SitePoint};
pub use review::{record_review, ReviewLog, ReviewRecord};
pub use store::{LabelStore, LocalStore, PgStore};
pub use workflow::{LabelRequest, LabelReview};
