use super::helpers::{fetch_driver_for_update, update_driver};
use super::Engine;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use geo_types::Geometry;
use geozero::wkb;
use sqlx::{types::Json, Acquire, Executor, Row};
use uuid::Uuid;

use crate::{
    api::DriverAPI,
    entities::{Coordinates, Driver},
    error::{invalid_input_error, Error},
};

/// Location pushes go stale after this long and drop the driver out of
/// proximity search results.
const LOCATION_TTL_SECONDS: i64 = 60;

#[async_trait]
impl DriverAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn create_driver(&self, push_address: Option<String>) -> Result<Driver, Error> {
        let driver = Driver::new(push_address);

        let mut conn = self.pool.acquire().await?;

        conn.execute(
            sqlx::query("INSERT INTO drivers (id, status, data) VALUES ($1, $2, $3)")
                .bind(&driver.id)
                .bind(driver.status_string())
                .bind(Json(&driver)),
        )
        .await?;

        Ok(driver)
    }

    #[tracing::instrument(skip(self))]
    async fn find_driver(&self, id: Uuid) -> Result<Driver, Error> {
        let mut conn = self.pool.acquire().await?;

        let maybe_result = conn
            .fetch_optional(sqlx::query("SELECT data FROM drivers WHERE id = $1").bind(&id))
            .await?;

        let result = maybe_result.ok_or_else(|| invalid_input_error())?;
        let Json(driver): Json<Driver> = result.try_get("data")?;

        Ok(driver)
    }

    #[tracing::instrument(skip(self))]
    async fn start_shift(&self, id: Uuid) -> Result<Driver, Error> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let mut driver = fetch_driver_for_update(&mut tx, &id).await?;
        driver.start()?;
        update_driver(&mut tx, &driver).await?;

        tx.commit().await?;

        Ok(driver)
    }

    #[tracing::instrument(skip(self))]
    async fn stop_shift(&self, id: Uuid) -> Result<Driver, Error> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let mut driver = fetch_driver_for_update(&mut tx, &id).await?;
        driver.stop()?;
        update_driver(&mut tx, &driver).await?;

        tx.commit().await?;

        Ok(driver)
    }

    #[tracing::instrument(skip(self))]
    async fn update_driver_location(
        &self,
        id: Uuid,
        coordinates: Coordinates,
    ) -> Result<(), Error> {
        if !coordinates.is_valid() {
            return Err(invalid_input_error());
        }

        let location: Geometry<f64> = coordinates.into();

        let mut conn = self.pool.acquire().await?;

        conn.execute(
            sqlx::query(
                "INSERT INTO driver_locations (driver_id, location, expiry) VALUES ($1, ST_SetSRID($2, 4326), $3)
                 ON CONFLICT (driver_id) DO UPDATE SET location = ST_SetSRID($2, 4326), expiry = $3",
            )
            .bind(&id)
            .bind(wkb::Encode(location))
            .bind(Utc::now() + Duration::seconds(LOCATION_TTL_SECONDS)),
        )
        .await?;

        Ok(())
    }
}
