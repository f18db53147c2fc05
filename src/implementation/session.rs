use std::collections::BTreeMap;

use num_integer::Integer;
use smol::net::SocketAddr;

use super::stack::DatabaseStack;
use crate::interface::database::Connection;
use crate::interface::session::{ISessionStore, SessionId};
use crate::interface::types::Reply;

#[derive(Debug)]
pub struct SessionState<C: Connection> {
    pub addr: SocketAddr,
    pub stack: DatabaseStack<C>,
}

#[derive(Debug)]
pub struct SessionStore<C: Connection> {
    data: BTreeMap<SessionId, SessionState<C>>,
    next_id: SessionId,
}

impl<C: Connection> Default for SessionStore<C> {
    fn default() -> Self {
        Self {
            data: BTreeMap::new(),
            next_id: SessionId::default(),
        }
    }
}

impl<C: Connection> ISessionStore for SessionStore<C> {
    type State = SessionState<C>;

    fn state_mut(&mut self, id: &SessionId) -> Option<&mut SessionState<C>> {
        self.data.get_mut(id)
    }

    fn connect(&mut self, state: SessionState<C>) -> SessionId {
        let id = self.next_id.clone();
        self.next_id.inc();
        self.data.insert(id.clone(), state);
        id
    }

    fn disconnect(&mut self, id: &SessionId) {
        self.data.remove(id);
    }

    fn has(&self, id: &SessionId) -> bool {
        self.data.contains_key(id)
    }

    fn len(&self) -> usize {
        self.data.len()
    }
}

impl<C: Connection> SessionStore<C> {
    pub fn list(&self) -> Reply {
        Reply::BulkString(
            self.data
                .iter()
                .flat_map(|(id, state)| {
                    let mut v = format!(
                        "id={} addr={} db={} depth={} stack={}",
                        id,
                        state.addr,
                        state.stack.active().name(),
                        state.stack.entries().len(),
                        if state.stack.is_enabled() { "on" } else { "off" },
                    )
                    .into_bytes();
                    v.push(b'\n');
                    v
                })
                .collect(),
        )
    }
}
