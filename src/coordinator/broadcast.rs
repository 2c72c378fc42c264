//! Broadcast router: live fan-out plus persistence of canvas actions.
//!
//! DESIGN
//! ======
//! Persistence and fan-out are independent effects. The append is queued
//! on the persistence writer without waiting, then the action is relayed to
//! every other member of the sender's room. The sender never receives its
//! own action back.

use tracing::debug;

use super::Coordinator;
use super::registry::ConnectionId;
use crate::action::ActionKind;
use crate::frame::ServerFrame;

impl Coordinator {
    /// Route one draw/clear from `sender`. Returns the number of peers the
    /// action was delivered to; unbound senders are dropped silently.
    pub(super) fn route_action(&mut self, sender: ConnectionId, action: ActionKind) -> usize {
        let Some(connection) = self.registry.lookup(sender) else {
            return 0;
        };
        let Some(room_id) = connection.room_id.clone() else {
            debug!(connection_id = %sender, kind = action.type_name(), "dropping action from unbound connection");
            return 0;
        };

        self.writer.enqueue(&room_id, &connection.user_id, action.clone());

        let frame = ServerFrame::live(&action, sender);
        self.registry.broadcast(&room_id, &frame, sender)
    }
}
