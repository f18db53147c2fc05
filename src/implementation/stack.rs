use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use super::arg::StackArg;
use crate::interface::database::{Connection, ConnectionError, DatabaseHandle};

/// The database the rest of a session works against.
///
/// Cloning shares the cell, so whoever holds a clone observes every switch
/// made through the stack.
#[derive(Debug)]
pub struct ActiveDatabase<H>(Rc<RefCell<H>>);

impl<H> Clone for ActiveDatabase<H> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<H: DatabaseHandle> ActiveDatabase<H> {
    pub fn new(handle: H) -> Self {
        Self(Rc::new(RefCell::new(handle)))
    }

    pub fn set(&self, handle: H) {
        *self.0.borrow_mut() = handle;
    }

    pub fn name(&self) -> String {
        self.0.borrow().name().to_owned()
    }
}

#[derive(Clone, Debug)]
pub struct SessionOptions {
    pub initial_db: String,
    pub enabled: bool,
    pub silent: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            initial_db: "test".to_string(),
            enabled: true,
            silent: false,
        }
    }
}

/// History of visited databases. `entries[0]` is the current one.
#[derive(Debug)]
pub struct DatabaseStack<C: Connection> {
    entries: Vec<C::Handle>,
    enabled: bool,
    silent: bool,
    active: ActiveDatabase<C::Handle>,
    conn: Rc<C>,
}

impl<C: Connection> DatabaseStack<C> {
    pub fn new(conn: Rc<C>, options: &SessionOptions) -> Result<Self, ConnectionError> {
        let head = conn.get_db(&options.initial_db)?;
        Ok(Self {
            entries: vec![head.clone()],
            enabled: options.enabled,
            silent: options.silent,
            active: ActiveDatabase::new(head),
            conn,
        })
    }

    pub fn active(&self) -> &ActiveDatabase<C::Handle> {
        &self.active
    }

    pub fn entries(&self) -> &[C::Handle] {
        &self.entries
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_silent(&mut self, silent: bool) {
        self.silent = silent;
    }

    pub fn stack_on(&mut self) -> Option<String> {
        self.enabled = true;
        self.report(false)
    }

    pub fn stack_off(&mut self) {
        self.enabled = false;
    }

    /// Moves the entry at `index` to the front, keeping everything else in
    /// order. Negative indices count from the back and anything out of range
    /// selects the last entry.
    pub fn promote(&mut self, index: i64) {
        let len = self.entries.len();
        if len > 1 {
            self.rotate_to_front(resolve_index(index, len));
        }
        self.sync_active();
    }

    /// `use <name>`.
    ///
    /// With the stack enabled an entry already on the stack is promoted and
    /// an unknown name replaces the head. Disabled, only the active database
    /// changes.
    pub fn use_db(&mut self, name: &str) -> Result<Option<String>, ConnectionError> {
        if self.enabled {
            return self.switch_to(name);
        }
        let handle = self.conn.get_db(name)?;
        let msg = format!("switched to db {}", handle.name());
        self.active.set(handle);
        Ok(Some(msg))
    }

    pub fn switch_to(&mut self, name: &str) -> Result<Option<String>, ConnectionError> {
        match self.position(name) {
            Some(index) => self.rotate_to_front(index),
            None => {
                let handle = self.conn.get_db(name)?;
                if let Some(head) = self.entries.first_mut() {
                    *head = handle;
                }
            }
        }
        self.sync_active();
        Ok(self.report(false))
    }

    pub fn push(&mut self, arg: StackArg) -> Result<Option<String>, ConnectionError> {
        match arg {
            StackArg::NoArg => self.promote(1),
            StackArg::SignedIndex(index) => self.promote(index),
            StackArg::Name(name) => match self.position(&name) {
                Some(index) => self.rotate_to_front(index),
                None => {
                    let handle = self.conn.get_db(&name)?;
                    self.entries.insert(0, handle);
                    debug!(db = %name, depth = self.entries.len(), "pushed database");
                }
            },
        }
        self.sync_active();
        Ok(self.report(false))
    }

    /// Removes the entry at `depth`, the head by default. Negative depths
    /// count from the back; a depth past the end removes nothing.
    pub fn pop(&mut self, depth: i64) -> Option<String> {
        let len = self.entries.len();
        if len > 1 {
            let start = splice_start(depth, len);
            if start < len {
                let removed = self.entries.remove(start);
                debug!(db = removed.name(), index = start, "popped database");
            }
        }
        self.sync_active();
        self.report(false)
    }

    pub fn clear(&mut self) -> String {
        self.entries.truncate(1);
        self.sync_active();
        self.render()
    }

    /// The formatted stack unless silenced. `force` overrides silence.
    pub fn report(&self, force: bool) -> Option<String> {
        (force || !self.silent).then(|| self.render())
    }

    fn render(&self) -> String {
        let names = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| {
                if i == 0 {
                    format!(">{}<", e.name())
                } else {
                    e.name().to_owned()
                }
            })
            .collect::<Vec<_>>();
        format!("[{}]", names.join(","))
    }

    // last match wins when a name appears more than once
    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().rposition(|e| e.name() == name)
    }

    fn rotate_to_front(&mut self, index: usize) {
        if index > 0 && index < self.entries.len() {
            self.entries[..=index].rotate_right(1);
            debug!(index, db = self.entries[0].name(), "promoted database");
        }
    }

    fn sync_active(&self) {
        if let Some(head) = self.entries.first() {
            self.active.set(head.clone());
        }
    }
}

fn resolve_index(index: i64, len: usize) -> usize {
    match usize::try_from(index.unsigned_abs()) {
        Ok(abs) if abs < len => {
            if index < 0 {
                len - abs
            } else {
                abs
            }
        }
        _ => len - 1,
    }
}

fn splice_start(depth: i64, len: usize) -> usize {
    let abs = usize::try_from(depth.unsigned_abs()).unwrap_or(usize::MAX);
    if depth < 0 {
        len.saturating_sub(abs)
    } else {
        abs.min(len)
    }
}
