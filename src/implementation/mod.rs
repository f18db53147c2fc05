use std::rc::Rc;

use smol::net::SocketAddr;
use tracing::debug;

mod arg;
pub mod catalog;
mod command;
mod session;
pub mod stack;

use crate::bstr::BStr;

use crate::interface::database::Connection;
use crate::interface::database::ConnectionError;
use crate::interface::session::ISessionStore;
use crate::interface::session::SessionId;
use crate::interface::types::InputValue;
use crate::interface::types::Reply;
use crate::interface::IController;
use crate::interface::UseController;

use command::{Command, CommandStore, ControllerCommand};
use session::{SessionState, SessionStore};
use stack::{DatabaseStack, SessionOptions};

/// Owns every session and the catalog they share.
#[derive(Debug)]
pub struct Controller<C: Connection> {
    conn: Rc<C>,
    options: SessionOptions,
    sessions: SessionStore<C>,
    commands: CommandStore<C>,
}

pub enum Interrupt {
    ClientId,
    ClientList,
    DbList,
}

impl<C: Connection> Controller<C> {
    pub fn new(conn: Rc<C>, options: SessionOptions) -> Self {
        Controller {
            conn,
            options,
            sessions: SessionStore::default(),
            commands: CommandStore::default(),
        }
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn handle_interrupt(&mut self, res: Result<Interrupt, Reply>, id: &SessionId) -> Reply {
        match res {
            Err(e) => e,
            Ok(interrupt) => match interrupt {
                Interrupt::ClientId => self.client_id(id),
                Interrupt::ClientList => self.client_list(),
                Interrupt::DbList => self.db_list(),
            },
        }
    }
}

impl<C: Connection> IController for Controller<C> {
    fn connect(&mut self, addr: SocketAddr) -> Result<SessionId, ConnectionError> {
        let stack = DatabaseStack::new(self.conn.clone(), &self.options)?;
        Ok(self.sessions.connect(SessionState { addr, stack }))
    }

    fn disconnect(&mut self, id: SessionId) {
        self.sessions.disconnect(&id);
    }

    fn execute(&mut self, mut input: Vec<InputValue>, id: SessionId) -> Vec<u8> {
        debug_assert!(self.sessions.has(&id));

        let Some(name_bs) = input.first().cloned() else {
            return Reply::error("empty command").to_bytes_vec();
        };
        let unknown = || Reply::error(format!("unknown command '{}'", name_bs.to_lossy()));

        // commands should be valid UTF-8
        let Some(name) = name_bs.to_lower_string() else {
            return unknown().to_bytes_vec();
        };
        debug!(session = %id, command = %name, args = input.len() - 1, "executing");

        if let Some(cmd) = self.commands.stack_commands.get(name.as_str()) {
            let Some(state) = self.sessions.state_mut(&id) else {
                return Reply::error("no such session").to_bytes_vec();
            };
            return cmd
                .execute(name.as_str(), &mut state.stack, input.drain(1..).collect())
                .to_bytes_vec();
        }

        if let Some(v) = self
            .commands
            .container_commands
            .get(name.as_str())
            .map(|command| command.execute(name.as_str(), input.drain(1..).collect()))
        {
            return self.handle_interrupt(v, &id).to_bytes_vec();
        }

        if let Some(v) = self
            .commands
            .controller_commands
            .get(name.as_str())
            .map(|command| command.execute(name.as_str(), input.drain(1..).collect()))
        {
            return self.handle_interrupt(v, &id).to_bytes_vec();
        }

        unknown().to_bytes_vec()
    }
}

impl<C: Connection> UseController for Controller<C> {
    fn client_list(&self) -> Reply {
        self.sessions.list()
    }

    fn client_id(&self, id: &SessionId) -> Reply {
        let id_least_digit = id.iter_u64_digits().next();
        Reply::Integer(match id_least_digit {
            None => 0,
            Some(i) if i <= i64::MAX as u64 => i as i64,
            _ => i64::MAX,
        })
    }

    fn db_list(&self) -> Reply {
        Reply::Array(
            self.conn
                .names()
                .into_iter()
                .map(|n| Reply::BulkString(n.into_bytes()))
                .collect(),
        )
    }
}
