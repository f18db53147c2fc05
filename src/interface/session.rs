use num_bigint::BigUint;

pub type SessionId = BigUint;

pub trait ISessionStore {
    type State;

    fn state_mut(&mut self, id: &SessionId) -> Option<&mut Self::State>;
    fn connect(&mut self, state: Self::State) -> SessionId;
    fn disconnect(&mut self, id: &SessionId);
    fn has(&self, id: &SessionId) -> bool;
    fn len(&self) -> usize;
}
