// ============================
// quickbite-client-lib/src/realtime/buffer.rs
// ============================
//! Bounded per-domain buffers for inbound realtime updates.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use metrics::counter;
use uuid::Uuid;

use crate::metrics as keys;
use quickbite_common::ServerFrame;

/// Which buffer an update lands in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateKind {
    /// Customer-facing order progress
    Order,
    /// Restaurant-side incoming and cancelled orders
    Restaurant,
    /// Courier-side assignments and tracked positions
    Delivery,
}

impl UpdateKind {
    /// Routing table from inbound frame to buffer
    #[must_use]
    pub fn for_frame(frame: &ServerFrame) -> Self {
        match frame {
            ServerFrame::OrderStatusUpdated { .. } => Self::Order,
            ServerFrame::OrderNew { .. } | ServerFrame::OrderCancelled { .. } => Self::Restaurant,
            ServerFrame::LocationUpdated { .. } | ServerFrame::OrderAssigned { .. } => {
                Self::Delivery
            },
        }
    }
}

/// A buffered update awaiting acknowledgment by the embedding UI
#[derive(Debug, Clone)]
pub struct UpdateRecord {
    /// Client-assigned id used for acknowledgment
    pub id: Uuid,
    /// Stable label, e.g. `new_order`
    pub record_type: &'static str,
    /// The frame as received
    pub frame: ServerFrame,
    pub received_at: DateTime<Utc>,
}

/// Bounded rings of unacknowledged updates, one per kind.
///
/// Appending past capacity evicts the oldest record, so a long-lived
/// connection cannot grow memory without bound.
pub struct UpdateBuffers {
    buffers: DashMap<UpdateKind, VecDeque<UpdateRecord>>,
    capacity: usize,
}

impl UpdateBuffers {
    /// `capacity` applies per kind and must be positive (enforced by
    /// settings validation).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            buffers: DashMap::new(),
            capacity,
        }
    }

    /// Append a frame to its buffer and return the stored record's id
    pub fn push(&self, frame: ServerFrame) -> Uuid {
        let kind = UpdateKind::for_frame(&frame);
        let record = UpdateRecord {
            id: Uuid::new_v4(),
            record_type: frame.record_type(),
            frame,
            received_at: Utc::now(),
        };
        let id = record.id;

        let mut buffer = self.buffers.entry(kind).or_default();
        while buffer.len() >= self.capacity {
            buffer.pop_front();
            counter!(keys::REALTIME_EVENT_DROPPED).increment(1);
        }
        buffer.push_back(record);
        counter!(keys::REALTIME_EVENT_BUFFERED).increment(1);
        id
    }

    /// Snapshot of one buffer, oldest first
    #[must_use]
    pub fn updates(&self, kind: UpdateKind) -> Vec<UpdateRecord> {
        self.buffers
            .get(&kind)
            .map(|buffer| buffer.iter().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self, kind: UpdateKind) -> usize {
        self.buffers.get(&kind).map_or(0, |buffer| buffer.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffers.iter().all(|buffer| buffer.is_empty())
    }

    /// Remove one acknowledged update by id; returns whether it was present
    pub fn clear_update(&self, kind: UpdateKind, id: Uuid) -> bool {
        match self.buffers.get_mut(&kind) {
            Some(mut buffer) => {
                let before = buffer.len();
                buffer.retain(|record| record.id != id);
                buffer.len() != before
            },
            None => false,
        }
    }

    /// Drop every buffered update of every kind
    pub fn clear_all(&self) {
        for mut entry in self.buffers.iter_mut() {
            entry.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickbite_common::OrderStatus;

    fn new_order(order_id: &str) -> ServerFrame {
        ServerFrame::OrderNew {
            order_id: order_id.to_string(),
            restaurant_id: Some("r7".to_string()),
        }
    }

    #[test]
    fn frames_route_to_their_buffers() {
        let buffers = UpdateBuffers::new(8);

        buffers.push(ServerFrame::OrderStatusUpdated {
            order_id: "o1".to_string(),
            status: OrderStatus::Preparing,
            reason: None,
        });
        buffers.push(new_order("o2"));
        buffers.push(ServerFrame::OrderCancelled {
            order_id: "o3".to_string(),
            reason: Some("out of stock".to_string()),
        });
        buffers.push(ServerFrame::OrderAssigned {
            order_id: "o4".to_string(),
            restaurant_id: None,
        });
        buffers.push(ServerFrame::LocationUpdated {
            order_id: "o5".to_string(),
            lat: -33.9,
            lng: 151.2,
        });

        assert_eq!(buffers.len(UpdateKind::Order), 1);
        assert_eq!(buffers.len(UpdateKind::Restaurant), 2);
        assert_eq!(buffers.len(UpdateKind::Delivery), 2);
    }

    #[test]
    fn new_order_records_carry_the_new_order_label() {
        let buffers = UpdateBuffers::new(8);
        buffers.push(new_order("o1"));

        let updates = buffers.updates(UpdateKind::Restaurant);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].record_type, "new_order");
    }

    #[test]
    fn capacity_evicts_oldest_first() {
        let buffers = UpdateBuffers::new(3);
        for i in 0..5 {
            buffers.push(new_order(&format!("o{i}")));
        }

        let updates = buffers.updates(UpdateKind::Restaurant);
        assert_eq!(updates.len(), 3);
        let ids: Vec<&str> = updates
            .iter()
            .map(|record| record.frame.order_id())
            .collect();
        // Newest three survive, in arrival order
        assert_eq!(ids, vec!["o2", "o3", "o4"]);
    }

    #[test]
    fn clear_update_removes_exactly_one_record() {
        let buffers = UpdateBuffers::new(8);
        buffers.push(new_order("o1"));
        let target = buffers.push(new_order("o2"));
        buffers.push(new_order("o3"));

        assert!(buffers.clear_update(UpdateKind::Restaurant, target));
        assert!(!buffers.clear_update(UpdateKind::Restaurant, target));

        let updates = buffers.updates(UpdateKind::Restaurant);
        let remaining: Vec<&str> = updates
            .iter()
            .map(|record| record.frame.order_id())
            .collect();
        assert_eq!(remaining, vec!["o1", "o3"]);
    }

    #[test]
    fn clear_all_empties_every_kind() {
        let buffers = UpdateBuffers::new(8);
        buffers.push(new_order("o1"));
        buffers.push(ServerFrame::OrderAssigned {
            order_id: "o2".to_string(),
            restaurant_id: None,
        });
        assert!(!buffers.is_empty());

        buffers.clear_all();
        assert!(buffers.is_empty());
        assert_eq!(buffers.len(UpdateKind::Restaurant), 0);
        assert_eq!(buffers.len(UpdateKind::Delivery), 0);
    }
}
