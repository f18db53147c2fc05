use std::fmt::Debug;

use thiserror::Error;

/// A named database as handed out by a [`Connection`].
///
/// Handles are compared by name. Two handles resolved separately for the same
/// name refer to the same database.
pub trait DatabaseHandle: Clone + Debug {
    fn name(&self) -> &str;
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("database name must not be empty")]
    EmptyName,
    #[error("database name {0:?} is too long")]
    NameTooLong(String),
    #[error("database name {name:?} contains invalid character {ch:?}")]
    InvalidCharacter { name: String, ch: char },
}

/// Resolves database names into handles.
pub trait Connection {
    type Handle: DatabaseHandle;

    fn get_db(&self, name: &str) -> Result<Self::Handle, ConnectionError>;

    /// Names of every database resolved so far, sorted.
    fn names(&self) -> Vec<String>;
}
