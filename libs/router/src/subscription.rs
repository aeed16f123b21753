//! Subscription queries, matching, and the consumer-facing receiver.

use mavswitch_codec::{Frame, Message};
use tokio::sync::mpsc;

/// A local consumer's filter. A 0 in any id field is a wildcard; a frame is
/// delivered iff every non-zero field equals the frame's corresponding
/// field, and `message_id` (when set) equals the decoded message id.
///
/// Target constraints never match broadcast frames: a broadcast carries
/// target 0, so a query with a non-zero target field only sees targeted
/// traffic.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubscriptionQuery {
    pub message_id: Option<u32>,
    pub source_system: u8,
    pub source_component: u8,
    pub target_system: u8,
    pub target_component: u8,
    /// Deliver the whole frame instead of just the decoded message.
    pub as_frame: bool,
}

impl SubscriptionQuery {
    pub fn matches<M: Message>(&self, frame: &Frame<M>) -> bool {
        if let Some(id) = self.message_id {
            if frame.message_id != id {
                return false;
            }
        }
        if self.source_system != 0 && frame.source_system != self.source_system {
            return false;
        }
        if self.source_component != 0 && frame.source_component != self.source_component {
            return false;
        }
        let (target_system, target_component) = frame.destination().raw();
        if self.target_system != 0 && target_system != self.target_system {
            return false;
        }
        if self.target_component != 0 && target_component != self.target_component {
            return false;
        }
        true
    }
}

/// Identity of one registration, unique within a router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// What a subscriber receives, per its query's `as_frame` flag.
#[derive(Debug, Clone)]
pub enum Delivery<M> {
    Message(M),
    Frame(Frame<M>),
}

/// One live registration inside the router.
#[derive(Debug)]
pub(crate) struct Subscription<M> {
    pub id: SubscriptionId,
    pub query: SubscriptionQuery,
    pub sender: mpsc::Sender<Delivery<M>>,
}

/// Consumer half of a subscription. Dropping it ends the subscription: the
/// router notices the closed channel on the next matching delivery and
/// removes the registration.
#[derive(Debug)]
pub struct Subscriber<M> {
    id: SubscriptionId,
    rx: mpsc::Receiver<Delivery<M>>,
}

impl<M> Subscriber<M> {
    pub(crate) fn new(id: SubscriptionId, rx: mpsc::Receiver<Delivery<M>>) -> Self {
        Self { id, rx }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub async fn recv(&mut self) -> Option<Delivery<M>> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Result<Delivery<M>, mpsc::error::TryRecvError> {
        self.rx.try_recv()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mavswitch_codec::{encode, MavVersion};
    use mavswitch_common::{HeartbeatData, MavMessage, PingData};

    fn broadcast_frame(source_system: u8, source_component: u8) -> Frame<MavMessage> {
        encode(
            MavMessage::Heartbeat(HeartbeatData::default()),
            MavVersion::V2,
            0,
            source_system,
            source_component,
        )
        .unwrap()
    }

    fn targeted_frame(
        source: (u8, u8),
        target_system: u8,
        target_component: u8,
    ) -> Frame<MavMessage> {
        encode(
            MavMessage::Ping(PingData {
                time_usec: 1,
                seq: 1,
                target_system,
                target_component,
            }),
            MavVersion::V2,
            0,
            source.0,
            source.1,
        )
        .unwrap()
    }

    #[test]
    fn empty_query_matches_everything() {
        let query = SubscriptionQuery::default();
        assert!(query.matches(&broadcast_frame(3, 1)));
        assert!(query.matches(&targeted_frame((1, 1), 2, 1)));
    }

    #[test]
    fn source_fields_filter() {
        let query = SubscriptionQuery {
            source_system: 3,
            ..Default::default()
        };
        assert!(query.matches(&broadcast_frame(3, 1)));
        assert!(!query.matches(&broadcast_frame(4, 1)));
    }

    #[test]
    fn message_id_filters() {
        let query = SubscriptionQuery {
            message_id: Some(0),
            ..Default::default()
        };
        assert!(query.matches(&broadcast_frame(1, 1)));
        assert!(!query.matches(&targeted_frame((1, 1), 2, 1)));
    }

    #[test]
    fn target_constraints_skip_broadcast_frames() {
        let query = SubscriptionQuery {
            target_system: 2,
            ..Default::default()
        };
        assert!(query.matches(&targeted_frame((1, 1), 2, 1)));
        assert!(!query.matches(&broadcast_frame(1, 1)));
        assert!(!query.matches(&targeted_frame((1, 1), 3, 1)));
    }

    #[test]
    fn widening_a_query_never_shrinks_its_match_set() {
        let frames = [
            broadcast_frame(3, 1),
            broadcast_frame(4, 2),
            targeted_frame((3, 1), 2, 1),
            targeted_frame((1, 1), 3, 4),
        ];
        let tight = SubscriptionQuery {
            message_id: Some(4),
            source_system: 3,
            source_component: 1,
            target_system: 2,
            target_component: 1,
            as_frame: false,
        };

        // Relax one field at a time; everything the tight query matched must
        // still match.
        let widenings = [
            SubscriptionQuery {
                message_id: None,
                ..tight.clone()
            },
            SubscriptionQuery {
                source_system: 0,
                ..tight.clone()
            },
            SubscriptionQuery {
                source_component: 0,
                ..tight.clone()
            },
            SubscriptionQuery {
                target_system: 0,
                ..tight.clone()
            },
            SubscriptionQuery {
                target_component: 0,
                ..tight.clone()
            },
        ];
        for frame in &frames {
            if tight.matches(frame) {
                for wide in &widenings {
                    assert!(wide.matches(frame), "widened query lost a match");
                }
            }
        }
    }
}
