use async_channel::{Receiver, Sender, TrySendError};
use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

/// Lifecycle events emitted to whichever channel subscribes per ride.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RideEvent {
    Searching { drivers_notified: usize },
    NoDriverAvailable,
    AllDriversRejected,
    Accepted { driver_id: Uuid },
    StatusUpdate { status: String },
    Cancelled { reason: String },
}

const CHANNEL_CAPACITY: usize = 64;

/// Best-effort per-ride event fan-out. Delivery is never a gate on a
/// dispatch transition: publishing without a subscriber is a no-op, and a
/// lagging subscriber drops events with a debug log.
#[derive(Default)]
pub struct EventHub {
    channels: DashMap<Uuid, Sender<RideEvent>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to one ride's events, replacing any previous subscriber.
    pub fn subscribe(&self, ride_id: Uuid) -> Receiver<RideEvent> {
        let (tx, rx) = async_channel::bounded(CHANNEL_CAPACITY);
        self.channels.insert(ride_id, tx);
        rx
    }

    pub fn publish(&self, ride_id: Uuid, event: RideEvent) {
        let tx = match self.channels.get(&ride_id) {
            Some(entry) => entry.value().clone(),
            None => return,
        };

        match tx.try_send(event) {
            Ok(()) => (),
            Err(TrySendError::Full(event)) => {
                tracing::debug!(%ride_id, ?event, "subscriber lagging, event dropped");
            }
            Err(TrySendError::Closed(_)) => {
                self.channels.remove_if(&ride_id, |_, v| v.is_closed());
            }
        }
    }

    /// Drop the channel on a terminal ride transition.
    pub fn close(&self, ride_id: Uuid) {
        self.channels.remove(&ride_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_arrive_in_publish_order() {
        let hub = EventHub::new();
        let ride_id = Uuid::new_v4();
        let driver_id = Uuid::new_v4();

        let rx = hub.subscribe(ride_id);

        hub.publish(ride_id, RideEvent::Searching { drivers_notified: 3 });
        hub.publish(ride_id, RideEvent::Accepted { driver_id });

        assert!(matches!(
            rx.recv().await.unwrap(),
            RideEvent::Searching { drivers_notified: 3 }
        ));
        match rx.recv().await.unwrap() {
            RideEvent::Accepted { driver_id: id } => assert_eq!(id, driver_id),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn publish_without_subscriber_is_a_noop() {
        let hub = EventHub::new();

        hub.publish(Uuid::new_v4(), RideEvent::NoDriverAvailable);
    }

    #[tokio::test]
    async fn lagging_subscriber_drops_events_without_blocking() {
        let hub = EventHub::new();
        let ride_id = Uuid::new_v4();

        let rx = hub.subscribe(ride_id);

        // fill the channel past capacity without draining; publish must
        // neither block nor error, the overflow is simply dropped
        for n in 0..=CHANNEL_CAPACITY {
            hub.publish(ride_id, RideEvent::Searching { drivers_notified: n });
        }

        for n in 0..CHANNEL_CAPACITY {
            match rx.recv().await.unwrap() {
                RideEvent::Searching { drivers_notified } => assert_eq!(drivers_notified, n),
                other => panic!("unexpected event {:?}", other),
            }
        }
        assert!(rx.is_empty());
    }

    #[tokio::test]
    async fn close_disconnects_the_subscriber() {
        let hub = EventHub::new();
        let ride_id = Uuid::new_v4();

        let rx = hub.subscribe(ride_id);
        hub.close(ride_id);

        assert!(rx.recv().await.is_err());
    }
}
