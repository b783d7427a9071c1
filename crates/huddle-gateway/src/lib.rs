pub mod auth;
pub mod broker;
pub mod connection;
pub mod presence;
pub mod rooms;

pub use broker::{Broker, Delivery, InProcessBroker, OutboundFrame};
pub use connection::{ConnectionCtx, FrameHandler, FrameOutcome, Gateway};
pub use presence::PresenceRegistry;
pub use rooms::GroupRouter;
