use smol::net::SocketAddr;

use std::cell::RefCell;
use std::ops::Deref;
use std::rc::Rc;

use crate::{
    implementation::{catalog::Catalog, stack::SessionOptions, Controller},
    interface::{
        database::ConnectionError, session::SessionId, types::InputValue, IController,
    },
};

#[derive(Debug)]
pub struct ControllerWrapper(Rc<RefCell<Controller<Catalog>>>);

impl Deref for ControllerWrapper {
    type Target = Rc<RefCell<Controller<Catalog>>>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Clone for ControllerWrapper {
    fn clone(&self) -> Self {
        ControllerWrapper(self.0.clone())
    }
}

impl ControllerWrapper {
    pub fn new(catalog: Rc<Catalog>, options: SessionOptions) -> Self {
        ControllerWrapper(Rc::new(RefCell::new(Controller::new(catalog, options))))
    }

    pub fn connect(&self, addr: SocketAddr) -> Result<Handle, ConnectionError> {
        let id = self.borrow_mut().connect(addr)?;
        Ok(Handle {
            ex: self.clone(),
            id,
        })
    }
}

/// A live session. Dropping it ends the session.
pub struct Handle {
    ex: ControllerWrapper,
    id: SessionId,
}

impl Handle {
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn execute(&self, input: Vec<InputValue>) -> Vec<u8> {
        self.ex.borrow_mut().execute(input, self.id.clone())
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.ex.borrow_mut().disconnect(self.id.clone());
    }
}
