use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::info;

use crate::interface::database::{Connection, ConnectionError, DatabaseHandle};

const MAX_NAME_LEN: usize = 64;
const INVALID_CHARS: &[char] = &['/', '\\', '.', ' ', '"', '$'];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Database {
    name: Rc<str>,
}

impl DatabaseHandle for Database {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Every database known to the server. Databases spring into existence the
/// first time a name is resolved.
#[derive(Debug, Default)]
pub struct Catalog {
    databases: RefCell<BTreeMap<String, Database>>,
}

fn validate_name(name: &str) -> Result<(), ConnectionError> {
    if name.is_empty() {
        return Err(ConnectionError::EmptyName);
    }
    if name.len() >= MAX_NAME_LEN {
        return Err(ConnectionError::NameTooLong(name.to_owned()));
    }
    match name
        .chars()
        .find(|c| INVALID_CHARS.contains(c) || c.is_control())
    {
        Some(ch) => Err(ConnectionError::InvalidCharacter {
            name: name.to_owned(),
            ch,
        }),
        None => Ok(()),
    }
}

impl Connection for Catalog {
    type Handle = Database;

    fn get_db(&self, name: &str) -> Result<Database, ConnectionError> {
        validate_name(name)?;
        let mut databases = self.databases.borrow_mut();
        let count = databases.len();
        let db = databases.entry(name.to_owned()).or_insert_with(|| {
            info!(db = name, databases = count + 1, "created database");
            Database {
                name: Rc::from(name),
            }
        });
        Ok(db.clone())
    }

    fn names(&self) -> Vec<String> {
        self.databases.borrow().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lazy_creation() {
        let catalog = Catalog::default();
        let a = catalog.get_db("admin").unwrap();
        let b = catalog.get_db("test").unwrap();
        let a2 = catalog.get_db("admin").unwrap();
        assert_eq!(a, a2);
        assert!(Rc::ptr_eq(&a.name, &a2.name));
        assert_ne!(a, b);
        assert_eq!(catalog.names(), vec!["admin".to_string(), "test".to_string()]);
    }

    #[test]
    fn test_rejected_names() {
        let catalog = Catalog::default();
        assert_eq!(catalog.get_db(""), Err(ConnectionError::EmptyName));
        assert!(matches!(
            catalog.get_db(&"x".repeat(64)),
            Err(ConnectionError::NameTooLong(_))
        ));
        assert!(catalog.get_db(&"x".repeat(63)).is_ok());
        for bad in ["a.b", "a b", "a/b", "a\\b", "a$b", "a\"b", "a\0b", "a\rb"] {
            assert!(
                matches!(
                    catalog.get_db(bad),
                    Err(ConnectionError::InvalidCharacter { .. })
                ),
                "{bad:?} should be rejected"
            );
        }
        assert_eq!(catalog.names().len(), 1);
    }
}
