use std::sync::Arc;

use tracing::debug;

use huddle_db::models::BoardColumnRow;
use huddle_gateway::broker::{Broker, OutboundFrame};
use huddle_gateway::rooms::kanban_room;
use huddle_types::events::{KanbanEvent, ServerEvent};
use huddle_types::models::ColumnBody;

/// Fans board mutations out to `kanban:<project_id>` under the same delivery
/// model as chat rooms. The REST surface applies the mutation first, then
/// hands the result here.
#[derive(Clone)]
pub struct KanbanBroadcaster {
    broker: Arc<dyn Broker>,
}

impl KanbanBroadcaster {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self { broker }
    }

    pub fn emit(&self, project_id: i64, event: KanbanEvent) {
        debug!(project_id, "kanban event");
        self.broker.group_send(
            &kanban_room(project_id),
            &OutboundFrame::event(&ServerEvent::Kanban(event)),
        );
    }
}

pub fn column_body(row: &BoardColumnRow) -> ColumnBody {
    ColumnBody {
        id: row.id,
        order: row.ord,
        name: row.name.clone(),
    }
}

pub fn column_bodies(rows: &[BoardColumnRow]) -> Vec<ColumnBody> {
    rows.iter().map(column_body).collect()
}
