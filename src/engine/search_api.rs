use super::{Engine, MAX_BROADCAST_CANDIDATES};

use geo_types::Geometry;
use geozero::wkb;
use sqlx::{types::Json, Executor, Row};
use uuid::Uuid;

use crate::{
    entities::{Coordinates, Driver},
    error::{invalid_input_error, query_failure_error, Error},
};

/// A driver eligible for an offer, ranked by distance from the pickup.
#[derive(Clone, Debug)]
pub struct Candidate {
    pub driver_id: Uuid,
    pub distance_meters: f64,
    pub push_address: Option<String>,
}

impl Engine {
    /// Geo-proximity finder: online drivers with no active ride and a fresh
    /// location within the radius, nearest first, capped to bound the
    /// broadcast fan-out. Read-only; store errors surface as a query
    /// failure which the broadcaster degrades to "zero candidates".
    #[tracing::instrument(skip(self))]
    pub async fn find_nearby_drivers(
        &self,
        point: Coordinates,
        radius_km: f64,
    ) -> Result<Vec<Candidate>, Error> {
        if !point.is_valid() || radius_km <= 0.0 {
            return Err(invalid_input_error());
        }

        let origin: Geometry<f64> = point.into();
        let radius_meters = radius_km * 1000.0;

        // AVAILABLE implies online with no current ride
        let query = "
            SELECT
                d.data AS driver,
                ST_Distance(l.location::geography, ST_SetSRID($1, 4326)::geography) AS distance
            FROM
                drivers d
                JOIN driver_locations l ON d.id = l.driver_id
            WHERE
                d.status = 'AVAILABLE'
                AND l.location IS NOT NULL
                AND l.expiry > now()
                AND ST_DWithin(l.location::geography, ST_SetSRID($1, 4326)::geography, $2)
            ORDER BY
                ST_Distance(l.location::geography, ST_SetSRID($1, 4326)::geography) ASC
            LIMIT $3
        ";

        let mut conn = self.pool.acquire().await.map_err(query_failure_error)?;

        let results = conn
            .fetch_all(
                sqlx::query(query)
                    .bind(wkb::Encode(origin))
                    .bind(radius_meters)
                    .bind(MAX_BROADCAST_CANDIDATES),
            )
            .await
            .map_err(query_failure_error)?;

        let mut candidates = vec![];

        for result in results.iter() {
            let Json(driver): Json<Driver> = result.try_get("driver")?;
            let distance_meters: f64 = result.try_get("distance")?;

            candidates.push(Candidate {
                driver_id: driver.id,
                distance_meters,
                push_address: driver.push_address,
            });
        }

        Ok(candidates)
    }
}
