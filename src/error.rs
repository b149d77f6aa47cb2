use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Malformed CSV in {path}: {message}")]
    Csv { path: String, message: String },

    #[error("No unreviewed site available for rater {rater} (type {kind})")]
    NoSiteAvailable { rater: String, kind: String },

    #[error("Site not found: {0}")]
    SiteNotFound(String),

    #[error("No imagery instance configured for type {0}")]
    MissingInstance(String),

    #[error("Band {0} has no valid pixels")]
    EmptyBand(usize),

    #[error("Invalid band selection: {0}")]
    InvalidBands(String),

    #[error("Image encoding error: {0}")]
    Image(#[from] image::ImageError),

    #[cfg(feature = "local-tiles")]
    #[error("Raster error: {0}")]
    Raster(#[from] gdal::errors::GdalError),
}

pub type Result<T> = std::result::Result<T, Error>;
