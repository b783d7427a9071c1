pub mod dispatch;
pub mod error;
pub mod kanban;

mod direct;
mod project;

pub use dispatch::ChatEngine;
pub use error::ChatError;
pub use kanban::KanbanBroadcaster;
