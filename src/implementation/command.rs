use std::collections::HashMap;

use super::arg::{parse_depth, StackArg};
use super::stack::DatabaseStack;
use super::Interrupt;
use crate::bstr::BStr;
use crate::interface::database::{Connection, ConnectionError};
use crate::interface::types::{InputValue, Reply};

type StackCommandHandler<C> = fn(&mut DatabaseStack<C>, Vec<InputValue>) -> Reply;
type ControllerCommandHandler = fn(Vec<InputValue>) -> Result<Interrupt, Reply>;

trait HashMapExt<K, V>
where
    K: Eq + std::hash::Hash,
{
    fn insert_without_duplicate(&mut self, key: K, value: V);
}

impl<K, V> HashMapExt<K, V> for HashMap<K, V>
where
    K: Eq + std::hash::Hash,
{
    fn insert_without_duplicate(&mut self, key: K, value: V) {
        let out = self.insert(key, value);
        if out.is_some() {
            panic!("Duplicate key");
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Arity {
    min: usize,
    max: Option<usize>,
}

impl Arity {
    const fn exactly(n: usize) -> Self {
        Self {
            min: n,
            max: Some(n),
        }
    }

    const fn up_to(max: usize) -> Self {
        Self {
            min: 0,
            max: Some(max),
        }
    }

    fn allows(&self, arity: usize) -> bool {
        if arity < self.min {
            false
        } else if let Some(max) = self.max {
            arity <= max
        } else {
            true
        }
    }
}

fn wrong_arity(name: &str) -> Reply {
    Reply::error(format!("wrong number of arguments for '{}'", name))
}

/// A command run against the calling session's stack.
pub struct StackCommand<C: Connection> {
    pub handler: StackCommandHandler<C>,
    arity: Arity,
}

impl<C: Connection> std::fmt::Debug for StackCommand<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StackCommand")
            .field("handler", &"...")
            .field("arity", &self.arity)
            .finish()
    }
}

/// A command that needs the whole controller; it only parses its arguments
/// and hands back an [`Interrupt`].
pub struct ControllerCommandDefinition {
    pub handler: ControllerCommandHandler,
    arity: Arity,
}

impl std::fmt::Debug for ControllerCommandDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerCommandDefinition")
            .field("handler", &"...")
            .field("arity", &self.arity)
            .finish()
    }
}

/// A command made of subcommands only, like `client list`.
#[derive(Debug)]
pub struct ContainerCommand {
    subcommands: HashMap<&'static str, ControllerCommandDefinition>,
}

pub trait Command<D> {
    fn is_arity_correct(&self, arity: usize) -> bool;
    fn execute(&self, name: &str, target: &mut D, input: Vec<InputValue>) -> Reply;
}

impl<C: Connection> Command<DatabaseStack<C>> for StackCommand<C> {
    fn is_arity_correct(&self, arity: usize) -> bool {
        self.arity.allows(arity)
    }

    fn execute(&self, name: &str, stack: &mut DatabaseStack<C>, input: Vec<InputValue>) -> Reply {
        if !self.is_arity_correct(input.len()) {
            return wrong_arity(name);
        }
        (self.handler)(stack, input)
    }
}

pub trait ControllerCommand {
    fn is_arity_correct(&self, arity: usize) -> bool;
    fn execute(&self, name: &str, input: Vec<InputValue>) -> Result<Interrupt, Reply>;
}

impl ControllerCommand for ControllerCommandDefinition {
    fn is_arity_correct(&self, arity: usize) -> bool {
        self.arity.allows(arity)
    }

    fn execute(&self, name: &str, input: Vec<InputValue>) -> Result<Interrupt, Reply> {
        if !self.is_arity_correct(input.len()) {
            return Err(wrong_arity(name));
        }
        (self.handler)(input)
    }
}

impl ControllerCommand for ContainerCommand {
    fn is_arity_correct(&self, arity: usize) -> bool {
        arity >= 1
    }

    fn execute(&self, name: &str, mut input: Vec<InputValue>) -> Result<Interrupt, Reply> {
        if !self.is_arity_correct(input.len()) {
            return Err(wrong_arity(name));
        }
        let rest = input.drain(1..).collect::<Vec<_>>();
        let Some(sub_bytes) = get_first(input) else {
            return Err(wrong_arity(name));
        };
        let unknown = || Reply::error(format!("unknown subcommand for '{}'", name));
        let sub = sub_bytes.to_lower_string().ok_or_else(unknown)?;
        let cmd = self.subcommands.get(sub.as_str()).ok_or_else(unknown)?;

        cmd.execute(format!("{} {}", name, sub).as_str(), rest)
    }
}

#[derive(Debug)]
pub struct CommandStore<C: Connection> {
    pub stack_commands: HashMap<&'static str, StackCommand<C>>,
    pub container_commands: HashMap<&'static str, ContainerCommand>,
    pub controller_commands: HashMap<&'static str, ControllerCommandDefinition>,
}

impl<C: Connection> Default for CommandStore<C> {
    fn default() -> Self {
        Self {
            stack_commands: initialise_stack_commands(),
            container_commands: initialise_container_commands(),
            controller_commands: initialise_controller_commands(),
        }
    }
}

fn get_first<T>(args: Vec<T>) -> Option<T> {
    args.into_iter().next()
}

fn outcome(res: Result<Option<String>, ConnectionError>) -> Reply {
    match res {
        Ok(status) => status.into(),
        Err(e) => Reply::error(e.to_string()),
    }
}

fn initialise_stack_commands<C: Connection>() -> HashMap<&'static str, StackCommand<C>> {
    let mut map = HashMap::<&'static str, StackCommand<C>>::new();
    map.insert_without_duplicate(
        "stackon",
        StackCommand {
            arity: Arity::exactly(0),
            handler: |stack, _| stack.stack_on().into(),
        },
    );
    map.insert_without_duplicate(
        "stackoff",
        StackCommand {
            arity: Arity::exactly(0),
            handler: |stack, _| {
                stack.stack_off();
                Reply::Ok
            },
        },
    );
    map.insert_without_duplicate(
        "use",
        StackCommand {
            arity: Arity::up_to(1),
            handler: |stack, input| {
                let arg = get_first(input).unwrap_or_default();
                match arg.to_str() {
                    Some(name) if !name.is_empty() => outcome(stack.use_db(name)),
                    _ => Reply::error("bad use parameter"),
                }
            },
        },
    );
    map.insert_without_duplicate(
        "pushdb",
        StackCommand {
            arity: Arity::up_to(1),
            handler: |stack, input| {
                let arg = match get_first(input) {
                    None => StackArg::NoArg,
                    Some(bytes) => match bytes.to_str() {
                        Some(s) => StackArg::parse(s),
                        None => return Reply::error("invalid argument for 'pushdb'"),
                    },
                };
                outcome(stack.push(arg))
            },
        },
    );
    map.insert_without_duplicate(
        "popdb",
        StackCommand {
            arity: Arity::up_to(1),
            handler: |stack, input| {
                let depth = match get_first(input) {
                    None => Some(0),
                    Some(bytes) => bytes.to_str().and_then(parse_depth),
                };
                match depth {
                    Some(depth) => stack.pop(depth).into(),
                    None => stack.report(false).into(),
                }
            },
        },
    );
    map.insert_without_duplicate(
        "cleardbs",
        StackCommand {
            arity: Arity::exactly(0),
            handler: |stack, _| Reply::Status(stack.clear()),
        },
    );
    map.insert_without_duplicate(
        "dbs",
        StackCommand {
            arity: Arity::exactly(0),
            handler: |stack, _| stack.report(true).into(),
        },
    );
    map.insert_without_duplicate(
        "stacksilent",
        StackCommand {
            arity: Arity::exactly(1),
            handler: |stack, input| {
                match get_first(input).unwrap_or_default().to_lower_string().as_deref() {
                    Some("on") => stack.set_silent(true),
                    Some("off") => stack.set_silent(false),
                    _ => return Reply::error("argument for 'stacksilent' must be 'on' or 'off'"),
                }
                Reply::Ok
            },
        },
    );
    map.extend(initialise_connection_commands());
    map
}

fn initialise_connection_commands<C: Connection>() -> HashMap<&'static str, StackCommand<C>> {
    let mut map = HashMap::new();
    map.insert_without_duplicate(
        "db",
        StackCommand {
            arity: Arity::exactly(0),
            handler: |stack, _| Reply::BulkString(stack.active().name().into_bytes()),
        },
    );
    map.insert_without_duplicate(
        "ping",
        StackCommand {
            arity: Arity::up_to(1),
            handler: |_, input| {
                get_first(input)
                    .map(Reply::BulkString)
                    .unwrap_or_else(|| Reply::Status("PONG".to_string()))
            },
        },
    );
    map
}

fn initialise_controller_commands() -> HashMap<&'static str, ControllerCommandDefinition> {
    let mut map = HashMap::new();
    map.insert_without_duplicate(
        "dblist",
        ControllerCommandDefinition {
            arity: Arity::exactly(0),
            handler: |_| Ok(Interrupt::DbList),
        },
    );
    map
}

fn initialise_container_commands() -> HashMap<&'static str, ContainerCommand> {
    let mut map = HashMap::new();
    map.insert_without_duplicate(
        "client",
        ContainerCommand {
            subcommands: {
                let mut sub = HashMap::new();
                sub.insert_without_duplicate(
                    "id",
                    ControllerCommandDefinition {
                        arity: Arity::exactly(0),
                        handler: |_| Ok(Interrupt::ClientId),
                    },
                );
                sub.insert_without_duplicate(
                    "list",
                    ControllerCommandDefinition {
                        arity: Arity::exactly(0),
                        handler: |_| Ok(Interrupt::ClientList),
                    },
                );
                sub
            },
        },
    );
    map
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::implementation::catalog::Catalog;
    use crate::implementation::stack::SessionOptions;

    fn run(
        store: &CommandStore<Catalog>,
        stack: &mut DatabaseStack<Catalog>,
        words: &[&str],
    ) -> Reply {
        let input = words[1..].iter().map(|w| w.as_bytes().to_vec()).collect();
        store.stack_commands[words[0]].execute(words[0], stack, input)
    }

    fn setup() -> (CommandStore<Catalog>, DatabaseStack<Catalog>) {
        let options = SessionOptions {
            initial_db: "a".to_string(),
            ..Default::default()
        };
        let stack = DatabaseStack::new(Rc::new(Catalog::default()), &options).unwrap();
        (CommandStore::default(), stack)
    }

    fn status(s: &str) -> Reply {
        Reply::Status(s.to_string())
    }

    #[test]
    fn test_push_and_pop_words() {
        let (store, mut stack) = setup();
        assert_eq!(run(&store, &mut stack, &["pushdb", "b"]), status("[>b<,a]"));
        assert_eq!(run(&store, &mut stack, &["pushdb", "c"]), status("[>c<,b,a]"));
        assert_eq!(run(&store, &mut stack, &["pushdb"]), status("[>b<,c,a]"));
        assert_eq!(run(&store, &mut stack, &["pushdb", "+2"]), status("[>a<,b,c]"));
        assert_eq!(run(&store, &mut stack, &["pushdb", "-1"]), status("[>c<,a,b]"));
        assert_eq!(run(&store, &mut stack, &["popdb", "1"]), status("[>c<,b]"));
        assert_eq!(run(&store, &mut stack, &["popdb"]), status("[>b<]"));
        assert_eq!(run(&store, &mut stack, &["popdb"]), status("[>b<]"));
    }

    #[test]
    fn test_popdb_non_integer_is_noop() {
        let (store, mut stack) = setup();
        run(&store, &mut stack, &["pushdb", "b"]);
        assert_eq!(run(&store, &mut stack, &["popdb", "top"]), status("[>b<,a]"));
        assert_eq!(run(&store, &mut stack, &["popdb", ""]), status("[>a<]"));
    }

    #[test]
    fn test_popdb_hex_depth() {
        let (store, mut stack) = setup();
        run(&store, &mut stack, &["pushdb", "b"]);
        run(&store, &mut stack, &["pushdb", "c"]);
        assert_eq!(run(&store, &mut stack, &["popdb", "0x1"]), status("[>c<,a]"));
    }

    #[test]
    fn test_use_words() {
        let (store, mut stack) = setup();
        run(&store, &mut stack, &["pushdb", "b"]);
        assert_eq!(run(&store, &mut stack, &["use", "a"]), status("[>a<,b]"));
        assert_eq!(run(&store, &mut stack, &["use", "z"]), status("[>z<,b]"));
        assert_eq!(
            run(&store, &mut stack, &["use", ""]),
            Reply::Error("ERR bad use parameter".to_string())
        );
        assert_eq!(
            run(&store, &mut stack, &["use"]),
            Reply::Error("ERR bad use parameter".to_string())
        );
        assert_eq!(
            run(&store, &mut stack, &["use", "a", "b"]),
            Reply::Error("ERR wrong number of arguments for 'use'".to_string())
        );
        assert_eq!(run(&store, &mut stack, &["dbs"]), status("[>z<,b]"));
    }

    #[test]
    fn test_use_rejected_name() {
        let (store, mut stack) = setup();
        assert_eq!(
            run(&store, &mut stack, &["use", "bad.name"]),
            Reply::Error(
                "ERR database name \"bad.name\" contains invalid character '.'".to_string()
            )
        );
        assert_eq!(run(&store, &mut stack, &["dbs"]), status("[>a<]"));
    }

    #[test]
    fn test_stackoff_use() {
        let (store, mut stack) = setup();
        assert_eq!(run(&store, &mut stack, &["stackoff"]), Reply::Ok);
        assert_eq!(run(&store, &mut stack, &["use", "b"]), status("switched to db b"));
        assert_eq!(run(&store, &mut stack, &["db"]), Reply::BulkString(b"b".to_vec()));
        assert_eq!(run(&store, &mut stack, &["dbs"]), status("[>a<]"));
        assert_eq!(run(&store, &mut stack, &["stackon"]), status("[>a<]"));
        assert_eq!(run(&store, &mut stack, &["use", "b"]), status("[>b<]"));
    }

    #[test]
    fn test_silent_words() {
        let (store, mut stack) = setup();
        assert_eq!(run(&store, &mut stack, &["stacksilent", "ON"]), Reply::Ok);
        assert_eq!(run(&store, &mut stack, &["pushdb", "b"]), Reply::Ok);
        assert_eq!(run(&store, &mut stack, &["dbs"]), status("[>b<,a]"));
        assert_eq!(run(&store, &mut stack, &["cleardbs"]), status("[>b<]"));
        assert!(matches!(
            run(&store, &mut stack, &["stacksilent", "maybe"]),
            Reply::Error(_)
        ));
        assert_eq!(run(&store, &mut stack, &["stacksilent", "off"]), Reply::Ok);
        assert_eq!(run(&store, &mut stack, &["pushdb", "c"]), status("[>c<,b]"));
    }

    #[test]
    fn test_ping() {
        let (store, mut stack) = setup();
        assert_eq!(run(&store, &mut stack, &["ping"]), status("PONG"));
        assert_eq!(
            run(&store, &mut stack, &["ping", "hi"]),
            Reply::BulkString(b"hi".to_vec())
        );
    }

    #[test]
    fn test_container_dispatch() {
        let store = CommandStore::<Catalog>::default();
        let client = &store.container_commands["client"];
        assert!(matches!(
            client.execute("client", vec![b"ID".to_vec()]),
            Ok(Interrupt::ClientId)
        ));
        assert!(matches!(
            client.execute("client", vec![b"list".to_vec()]),
            Ok(Interrupt::ClientList)
        ));
        assert!(client.execute("client", vec![]).is_err());
        assert!(client.execute("client", vec![b"kill".to_vec()]).is_err());
        assert!(client
            .execute("client", vec![b"id".to_vec(), b"extra".to_vec()])
            .is_err());
    }
}
