//! Presence notifier.
//!
//! Called after every membership mutation; the count in each frame is read
//! from the registry at that moment, so it always reflects the mutation
//! that triggered it.

use super::registry::{ConnectionId, Registry};
use crate::frame::ServerFrame;

/// Tell the other members of `room_id` that `joiner` arrived. Returns the
/// room's new presence count.
pub(crate) fn announce_joined(registry: &mut Registry, room_id: &str, joiner: ConnectionId) -> usize {
    let online_users = registry.count_of(room_id);
    registry.broadcast(room_id, &ServerFrame::UserJoined { user_id: joiner, online_users }, joiner);
    online_users
}

/// Tell the remaining members of `room_id` that `leaver` is gone. The
/// leaver must already be unbound. Returns the room's new presence count.
pub(crate) fn announce_left(registry: &mut Registry, room_id: &str, leaver: ConnectionId) -> usize {
    let online_users = registry.count_of(room_id);
    registry.broadcast(room_id, &ServerFrame::UserLeft { user_id: leaver, online_users }, leaver);
    online_users
}
