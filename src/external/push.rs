use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use std::env;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    entities::Coordinates,
    error::{invalid_input_error, upstream_error, Error},
};

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushMessage {
    RideOffer {
        ride_id: Uuid,
        pickup: Coordinates,
        dropoff: Coordinates,
        estimated_price: f64,
        distance_km: f64,
    },
    OfferWithdrawn {
        ride_id: Uuid,
    },
    RideCancelled {
        ride_id: Uuid,
        reason: String,
    },
}

/// Best-effort delivery to a driver or requester identified by an opaque
/// address token. Failures are logged by callers, never propagated as
/// dispatch failures.
#[async_trait]
pub trait PushChannel: Send + Sync {
    async fn send(&self, address: &str, message: &PushMessage) -> Result<(), Error>;
}

pub type DynPushChannel = Arc<dyn PushChannel + Send + Sync>;

/// HTTP push gateway client.
pub struct HttpPush {
    client: reqwest::Client,
    api_base: String,
}

impl HttpPush {
    pub fn from_env() -> Result<Self, Error> {
        let api_base = env::var("PUSH_GATEWAY_BASE")?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_base,
        })
    }
}

#[async_trait]
impl PushChannel for HttpPush {
    #[tracing::instrument(skip(self))]
    async fn send(&self, address: &str, message: &PushMessage) -> Result<(), Error> {
        let url = format!("https://{}/messages", self.api_base);

        let res = self
            .client
            .post(url)
            .json(&json!({
                "to": address,
                "priority": "high",
                "message": message,
            }))
            .send()
            .await?;

        let status_code = res.status().as_u16();

        if status_code >= 400 && status_code < 500 {
            return Err(invalid_input_error());
        } else if status_code != 200 {
            return Err(upstream_error());
        }

        Ok(())
    }
}
