use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tracing::trace;

use huddle_types::events::{ErrorFrame, ServerEvent};

/// A single frame queued for one connection.
#[derive(Debug, Clone)]
pub struct OutboundFrame {
    pub text: String,
    /// Typing indicators are shed first when a peer's queue saturates.
    pub droppable: bool,
}

impl OutboundFrame {
    pub fn event(event: &ServerEvent) -> Self {
        Self {
            text: serde_json::to_string(event).unwrap(),
            droppable: matches!(event, ServerEvent::Typing { .. }),
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            text: serde_json::to_string(&ErrorFrame {
                error: message.to_string(),
            })
            .unwrap(),
            droppable: false,
        }
    }
}

/// Items delivered to a connection's send task.
#[derive(Debug, Clone)]
pub enum Delivery {
    Frame(OutboundFrame),
    /// Instructs the connection to close with the given WebSocket code.
    Close(u16, &'static str),
}

/// Pub/sub fabric between the event producers and connected channels.
///
/// Delivery is at-least-once within one server instance and best-effort
/// beyond it; a send to a channel that is gone is counted and dropped.
/// Ordering comes from the producers: a chat serializes its own emissions,
/// and each channel's queue is FIFO.
pub trait Broker: Send + Sync {
    /// Open a delivery queue for a new channel.
    fn register(&self, channel: &str) -> mpsc::UnboundedReceiver<Delivery>;

    /// Drop a channel and remove it from every room.
    fn remove_channel(&self, channel: &str);

    /// Ask a channel's connection to close, then forget the channel.
    fn close_channel(&self, channel: &str, code: u16, reason: &'static str);

    fn group_add(&self, room: &str, channel: &str);

    fn group_discard(&self, room: &str, channel: &str);

    /// Deliver `frame` once to every channel currently in `room`.
    fn group_send(&self, room: &str, frame: &OutboundFrame);

    /// Deliver `frame` to a single channel.
    fn send(&self, channel: &str, frame: &OutboundFrame);

    /// Events dropped because their channel was gone or saturated.
    fn dropped_events(&self) -> u64;
}

/// Single-instance broker: rooms and channels live in process memory.
#[derive(Default)]
pub struct InProcessBroker {
    channels: RwLock<HashMap<String, mpsc::UnboundedSender<Delivery>>>,
    rooms: RwLock<HashMap<String, HashSet<String>>>,
    dropped: AtomicU64,
}

impl InProcessBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn deliver(&self, channel: &str, delivery: Delivery) {
        let channels = self.channels.read().expect("broker lock poisoned");
        let delivered = channels
            .get(channel)
            .is_some_and(|tx| tx.send(delivery).is_ok());
        if !delivered {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Broker for InProcessBroker {
    fn register(&self, channel: &str) -> mpsc::UnboundedReceiver<Delivery> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.channels
            .write()
            .expect("broker lock poisoned")
            .insert(channel.to_string(), tx);
        rx
    }

    fn remove_channel(&self, channel: &str) {
        self.channels
            .write()
            .expect("broker lock poisoned")
            .remove(channel);
        let mut rooms = self.rooms.write().expect("broker lock poisoned");
        for members in rooms.values_mut() {
            members.remove(channel);
        }
        rooms.retain(|_, members| !members.is_empty());
    }

    fn close_channel(&self, channel: &str, code: u16, reason: &'static str) {
        self.deliver(channel, Delivery::Close(code, reason));
        self.remove_channel(channel);
    }

    fn group_add(&self, room: &str, channel: &str) {
        self.rooms
            .write()
            .expect("broker lock poisoned")
            .entry(room.to_string())
            .or_default()
            .insert(channel.to_string());
    }

    fn group_discard(&self, room: &str, channel: &str) {
        let mut rooms = self.rooms.write().expect("broker lock poisoned");
        if let Some(members) = rooms.get_mut(room) {
            members.remove(channel);
            if members.is_empty() {
                rooms.remove(room);
            }
        }
    }

    fn group_send(&self, room: &str, frame: &OutboundFrame) {
        let members: Vec<String> = {
            let rooms = self.rooms.read().expect("broker lock poisoned");
            match rooms.get(room) {
                Some(members) => members.iter().cloned().collect(),
                None => return,
            }
        };

        trace!(room, members = members.len(), "group send");
        for channel in members {
            self.deliver(&channel, Delivery::Frame(frame.clone()));
        }
    }

    fn send(&self, channel: &str, frame: &OutboundFrame) {
        self.deliver(channel, Delivery::Frame(frame.clone()));
    }

    fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_of(delivery: Delivery) -> String {
        match delivery {
            Delivery::Frame(frame) => frame.text,
            Delivery::Close(code, _) => panic!("unexpected close {code}"),
        }
    }

    #[tokio::test]
    async fn group_send_reaches_members_exactly_once() {
        let broker = InProcessBroker::new();
        let mut rx_a = broker.register("a");
        let mut rx_b = broker.register("b");
        let mut rx_c = broker.register("c");

        broker.group_add("room", "a");
        broker.group_add("room", "b");
        broker.group_add("room", "a"); // idempotent

        broker.group_send("room", &OutboundFrame::error("boom"));

        assert!(text_of(rx_a.try_recv().unwrap()).contains("boom"));
        assert!(text_of(rx_b.try_recv().unwrap()).contains("boom"));
        assert!(rx_a.try_recv().is_err());
        assert!(rx_c.try_recv().is_err());
    }

    #[tokio::test]
    async fn discard_stops_delivery() {
        let broker = InProcessBroker::new();
        let mut rx = broker.register("a");
        broker.group_add("room", "a");
        broker.group_discard("room", "a");

        broker.group_send("room", &OutboundFrame::error("gone"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn vanished_channel_counts_as_dropped() {
        let broker = InProcessBroker::new();
        broker.group_add("room", "ghost");

        broker.group_send("room", &OutboundFrame::error("x"));
        broker.send("ghost", &OutboundFrame::error("y"));
        assert_eq!(broker.dropped_events(), 2);
    }

    #[tokio::test]
    async fn close_channel_delivers_the_code_then_forgets() {
        let broker = InProcessBroker::new();
        let mut rx = broker.register("a");
        broker.group_add("room", "a");

        broker.close_channel("a", 4400, "unknown event type");
        match rx.recv().await {
            Some(Delivery::Close(code, _)) => assert_eq!(code, 4400),
            other => panic!("expected close, got {other:?}"),
        }
        // Channel is out of the room and out of the registry.
        broker.group_send("room", &OutboundFrame::error("x"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn typing_frames_are_droppable() {
        use chrono::Utc;
        use huddle_types::models::ChatKind;

        let frame = OutboundFrame::event(&ServerEvent::Typing {
            chat_type: ChatKind::Direct,
            chat_id: "1_2".into(),
            user_id: 1,
            end_time: Utc::now(),
        });
        assert!(frame.droppable);
        assert!(!OutboundFrame::event(&ServerEvent::SetOnline { user_id: 1 }).droppable);
    }
}
