//! PostGIS-backed label store.

use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool};
use tracing::{debug, info};

use super::LabelStore;
use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::geometry::{Crs, LabelFeature, LabelLayer, GEOMETRY_COLUMN};
use crate::model::{ConfigEntry, SitePoint};

const INSTANCE_QUERY: &str = "SELECT key, value FROM configuration WHERE key LIKE 'instance%'";

const POINT_QUERY: &str = "\
    SELECT name, x::float8 AS x, y::float8 AS y, date::text AS date \
    FROM master_grid WHERE name = $1";

/// A label table row with its geometry as GeoJSON.
#[derive(Debug, FromRow)]
struct GeoRow {
    name: Option<String>,
    geojson: Option<String>,
}

impl GeoRow {
    /// `None` for rows without geometry. A NULL name becomes empty, as in
    /// the local store.
    fn into_feature(self) -> Option<Result<LabelFeature>> {
        let geojson = self.geojson?;
        let name = self.name.unwrap_or_default();
        Some(LabelFeature::from_geojson_str(name, &geojson))
    }
}

fn geo_query(table: &str, key: &str) -> String {
    format!(
        "SELECT name, ST_AsGeoJSON({GEOMETRY_COLUMN}) AS geojson \
         FROM {table} WHERE {key}::text = $1"
    )
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect with the credentials from the `labeller` config section.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = PgConnectOptions::new()
            .host(&config.db_host)
            .port(config.db_port)
            .username(&config.db_username)
            .password(&config.db_password)
            .database(&config.db_name);

        // One operator, one query at a time.
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        info!(
            "Connected to {}@{}:{}/{}",
            config.db_username, config.db_host, config.db_port, config.db_name
        );
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run a read query in its own transaction.
    async fn get_data<T>(&self, query: &str, param: Option<&str>) -> Result<Vec<T>>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        debug!("query: {} ({:?})", query, param);
        let mut tx = self.pool.begin().await?;

        let mut q = sqlx::query_as::<_, T>(query);
        if let Some(param) = param {
            q = q.bind(param);
        }
        let rows = q.fetch_all(&mut *tx).await?;

        tx.commit().await?;
        Ok(rows)
    }

    /// Like [`get_data`](Self::get_data), but the rows become a layer in EPSG:4326.
    async fn get_geo_data(&self, query: &str, param: &str) -> Result<Option<LabelLayer>> {
        let rows: Vec<GeoRow> = self.get_data(query, Some(param)).await?;

        let features = rows
            .into_iter()
            .filter_map(GeoRow::into_feature)
            .collect::<Result<Vec<_>>>()?;

        Ok(LabelLayer::from_features(features, Crs::WGS84))
    }
}

impl LabelStore for PgStore {
    async fn instance_config(&self) -> Result<Vec<ConfigEntry>> {
        self.get_data(INSTANCE_QUERY, None).await
    }

    async fn site_point(&self, name: &str) -> Result<Option<SitePoint>> {
        let rows: Vec<SitePoint> = self.get_data(POINT_QUERY, Some(name)).await?;
        Ok(rows.into_iter().next())
    }

    async fn user_labels(&self, assignment_id: &str) -> Result<Option<LabelLayer>> {
        self.get_geo_data(&geo_query("user_maps", "assignment_id"), assignment_id)
            .await
    }

    async fn expert_labels(&self, name: &str) -> Result<Option<LabelLayer>> {
        self.get_geo_data(&geo_query("qaqcfields", "name"), name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geo_query_is_parameterized() {
        let sql = geo_query("user_maps", "assignment_id");
        assert_eq!(
            sql,
            "SELECT name, ST_AsGeoJSON(geom_clean) AS geojson \
             FROM user_maps WHERE assignment_id::text = $1"
        );
    }

    #[test]
    fn test_geo_row_without_name_or_geometry() {
        let row = GeoRow {
            name: None,
            geojson: Some(
                r#"{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,0]]]}"#.to_string(),
            ),
        };
        let feature = row.into_feature().unwrap().unwrap();
        assert_eq!(feature.name, "");

        let row = GeoRow {
            name: Some("GH0001".to_string()),
            geojson: None,
        };
        assert!(row.into_feature().is_none());
    }

    #[test]
    fn test_point_query_binds_name() {
        assert!(POINT_QUERY.ends_with("WHERE name = $1"));
        assert!(INSTANCE_QUERY.contains("LIKE 'instance%'"));
    }
}
