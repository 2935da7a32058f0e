//! Command registry and argv router.
//!
//! Commands are validated and indexed once at startup into a trie keyed by
//! lower-cased path segments. Handlers live in a parallel function table
//! addressed by [`CommandId`].

use std::sync::Arc;

use crate::error::{DispatchError, SchemaError};
use crate::schema::{Command, CommandSchema, HandlerFn, NameConversion, RESERVED_COMMANDS};

/// Index of a command in the registry's function table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandId(usize);

/// A routing decision: which command, and how many leading tokens named it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub command: CommandId,
    pub offset: usize,
}

#[derive(Default)]
struct Node {
    children: Vec<(String, Node)>,
    command: Option<CommandId>,
}

impl Node {
    fn child(&self, segment: &str) -> Option<&Node> {
        let segment = segment.to_lowercase();
        self.children
            .iter()
            .find(|(key, _)| *key == segment)
            .map(|(_, node)| node)
    }

    fn child_mut(&mut self, segment: &str) -> &mut Node {
        let segment = segment.to_lowercase();
        let index = match self.children.iter().position(|(key, _)| *key == segment) {
            Some(index) => index,
            None => {
                self.children.push((segment, Node::default()));
                self.children.len() - 1
            }
        };
        &mut self.children[index].1
    }
}

struct CommandEntry {
    schema: Arc<CommandSchema>,
    handler: HandlerFn,
}

/// Immutable index of every registered command.
pub struct CommandRegistry {
    entries: Vec<CommandEntry>,
    trie: Node,
    root: Option<CommandId>,
}

impl CommandRegistry {
    /// Validate and index `commands`.
    ///
    /// Fails on missing handlers, reserved or duplicate names (case-insensitive)
    /// and any structural problem in a command's parameters.
    pub fn build(commands: Vec<Command>, naming: NameConversion) -> Result<Self, SchemaError> {
        let mut registry = CommandRegistry {
            entries: Vec::with_capacity(commands.len()),
            trie: Node::default(),
            root: None,
        };

        for command in commands {
            let (schema, handler) = command.into_parts();
            let label = if schema.is_root() {
                "(root)".to_string()
            } else {
                schema.name().to_string()
            };

            let handler = handler.ok_or_else(|| SchemaError::MissingHandler(label.clone()))?;
            let schema = schema.finalize(naming)?;

            if let Some(first) = schema.path().first() {
                if RESERVED_COMMANDS
                    .iter()
                    .any(|reserved| first.eq_ignore_ascii_case(reserved))
                {
                    return Err(SchemaError::ReservedName(label));
                }
            }

            let id = CommandId(registry.entries.len());
            let node = schema
                .path()
                .iter()
                .fold(&mut registry.trie, |node, segment| node.child_mut(segment));
            if node.command.is_some() {
                return Err(SchemaError::DuplicateCommand(label));
            }
            node.command = Some(id);
            if schema.is_root() {
                registry.root = Some(id);
            }

            tracing::debug!(command = %label, params = schema.parameters().len(), "Command registered");
            registry.entries.push(CommandEntry {
                schema: Arc::new(schema),
                handler,
            });
        }

        Ok(registry)
    }

    /// Pick the command named by the leading tokens of `args`.
    pub fn resolve(&self, args: &[String]) -> Result<Route, DispatchError> {
        if let Some(root) = self.root {
            if self.entries.len() == 1 || args.is_empty() {
                return Ok(Route {
                    command: root,
                    offset: 0,
                });
            }
        }

        // Greedy walk; remember the deepest node that carries a command so an
        // interior command still wins when the next token is not a child.
        let mut node = &self.trie;
        let mut best = None;
        for (depth, token) in args.iter().enumerate() {
            match node.child(token) {
                Some(next) => {
                    node = next;
                    if let Some(command) = node.command {
                        best = Some(Route {
                            command,
                            offset: depth + 1,
                        });
                    }
                }
                None => break,
            }
        }

        if let Some(route) = best {
            return Ok(route);
        }

        match self.root {
            Some(root) => Ok(Route {
                command: root,
                offset: 0,
            }),
            None => Err(DispatchError::UnknownCommand(
                args.first().cloned().unwrap_or_default(),
            )),
        }
    }

    /// Exact lookup by path, ignoring case. Hidden commands are included.
    pub fn find<S: AsRef<str>>(&self, path: &[S]) -> Option<CommandId> {
        path.iter()
            .try_fold(&self.trie, |node, segment| node.child(segment.as_ref()))
            .and_then(|node| node.command)
    }

    pub fn root(&self) -> Option<CommandId> {
        self.root
    }

    pub fn schema(&self, id: CommandId) -> &Arc<CommandSchema> {
        &self.entries[id.0].schema
    }

    pub(crate) fn handler(&self, id: CommandId) -> &HandlerFn {
        &self.entries[id.0].handler
    }

    /// Commands in registration order.
    pub fn commands(&self) -> impl Iterator<Item = (CommandId, &Arc<CommandSchema>)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (CommandId(i), &entry.schema))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field(
                "commands",
                &self.entries.iter().map(|e| e.schema.name()).collect::<Vec<_>>(),
            )
            .field("root", &self.root)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ParameterSpec;

    fn cmd(name: &str) -> Command {
        Command::new(name).handler_sync(|_| ())
    }

    fn registry(commands: Vec<Command>) -> CommandRegistry {
        CommandRegistry::build(commands, NameConversion::KebabCase).unwrap()
    }

    fn args(strs: &[&str]) -> Vec<String> {
        strs.iter().map(|s| s.to_string()).collect()
    }

    fn routed_name(reg: &CommandRegistry, argv: &[&str]) -> (String, usize) {
        let route = reg.resolve(&args(argv)).unwrap();
        (reg.schema(route.command).name().to_string(), route.offset)
    }

    #[test]
    fn test_sub_path_beats_root() {
        let reg = registry(vec![cmd("a/b"), Command::root().handler_sync(|_| ())]);
        assert_eq!(routed_name(&reg, &["a", "b"]), ("a b".to_string(), 2));
    }

    #[test]
    fn test_root_only_and_empty_argv() {
        let reg = registry(vec![Command::root().handler_sync(|_| ())]);
        assert_eq!(routed_name(&reg, &["anything", "--x"]), (String::new(), 0));

        let reg = registry(vec![cmd("add"), Command::root().handler_sync(|_| ())]);
        assert_eq!(routed_name(&reg, &[]), (String::new(), 0));
    }

    #[test]
    fn test_unknown_token_falls_back_to_root() {
        let reg = registry(vec![
            cmd("add"),
            Command::root()
                .param(ParameterSpec::of::<String>("file").positional())
                .handler_sync(|_| ()),
        ]);
        assert_eq!(routed_name(&reg, &["notes.txt"]), (String::new(), 0));
    }

    #[test]
    fn test_interior_command_and_backtracking() {
        let reg = registry(vec![cmd("remote"), cmd("remote add"), cmd("remote prune origin")]);
        assert_eq!(routed_name(&reg, &["remote", "add", "x"]), ("remote add".into(), 2));
        assert_eq!(routed_name(&reg, &["remote", "-v"]), ("remote".into(), 1));
        // "prune" is an interior node without a command: back up to "remote".
        assert_eq!(routed_name(&reg, &["remote", "prune", "x"]), ("remote".into(), 1));
    }

    #[test]
    fn test_segments_match_case_insensitively() {
        let reg = registry(vec![cmd("Config Set")]);
        assert_eq!(routed_name(&reg, &["config", "SET"]), ("Config Set".into(), 2));
    }

    #[test]
    fn test_unknown_command_without_root() {
        let reg = registry(vec![cmd("add"), cmd("list")]);
        let err = reg.resolve(&args(&["remove"])).unwrap_err();
        assert!(matches!(err, DispatchError::UnknownCommand(ref t) if t == "remove"));
    }

    #[test]
    fn test_routing_is_idempotent() {
        let reg = registry(vec![cmd("a b"), cmd("a"), Command::root().handler_sync(|_| ())]);
        let cases: [&[&str]; 4] = [&["a", "b", "c"], &["a"], &["zzz"], &[]];
        for argv in cases {
            let first = reg.resolve(&args(argv)).unwrap();
            let second = reg.resolve(&args(argv)).unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_build_rejects_duplicates_ignoring_case() {
        let err = CommandRegistry::build(vec![cmd("add"), cmd("ADD")], NameConversion::KebabCase)
            .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateCommand("ADD".into()));
    }

    #[test]
    fn test_build_rejects_reserved_names() {
        for name in ["help", "Version", "help me"] {
            let err = CommandRegistry::build(vec![cmd(name)], NameConversion::KebabCase)
                .unwrap_err();
            assert!(matches!(err, SchemaError::ReservedName(_)), "{}", name);
        }
    }

    #[test]
    fn test_build_rejects_missing_handler() {
        let err = CommandRegistry::build(vec![Command::new("orphan")], NameConversion::KebabCase)
            .unwrap_err();
        assert_eq!(err, SchemaError::MissingHandler("orphan".into()));
    }

    #[test]
    fn test_find_is_exact() {
        let reg = registry(vec![cmd("remote add").hidden(), cmd("remote")]);
        assert!(reg.find(&["remote", "ADD"]).is_some());
        assert!(reg.find(&["remote", "add", "x"]).is_none());
        assert!(reg.find::<&str>(&[]).is_none());
    }
}
