use smol::net::SocketAddr;

pub mod database;
pub mod session;
pub mod types;

use database::ConnectionError;
use session::SessionId;
use types::{InputValue, Reply};

// External interface
pub trait IController {
    fn connect(&mut self, addr: SocketAddr) -> Result<SessionId, ConnectionError>;
    fn disconnect(&mut self, id: SessionId);
    fn execute(&mut self, input: Vec<InputValue>, id: SessionId) -> Vec<u8>;
}

// Internal interface
pub trait UseController {
    fn client_list(&self) -> Reply;
    fn client_id(&self, id: &SessionId) -> Reply;
    fn db_list(&self) -> Reply;
}
