use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::commands::{CommandRegistry, CommandValue, EditContext, ExecDef, ProcessingOptions};
use crate::config::EditorConfig;
use crate::dom::{Dom, NodeId};
use crate::error::{CommandError, QueryError};
use crate::selection::{Bookmark, NodeList, ProcessingSelection};
use crate::value::{EditorValue, Snapshot};

pub struct UndoRecord {
    pub before: Snapshot,
    pub after: Snapshot,
    pub selection_before: ProcessingSelection,
    pub selection_after: ProcessingSelection,
}

/// A document, the commands that edit it and the current selection.
pub struct Editor {
    dom: Dom,
    selection: ProcessingSelection,
    registry: CommandRegistry,
    config: EditorConfig,
    undo_stack: Vec<UndoRecord>,
    redo_stack: Vec<UndoRecord>,
}

impl Editor {
    pub fn new(dom: Dom, registry: CommandRegistry, config: EditorConfig) -> Self {
        let selection = ProcessingSelection::caret(dom.root(), 0);
        Self {
            dom,
            selection,
            registry,
            config,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
        }
    }

    pub fn with_core_commands() -> Self {
        Self::from_html("<p><br></p>")
    }

    pub fn from_html(html: &str) -> Self {
        Self::new(
            Dom::from_html(html),
            CommandRegistry::core(),
            EditorConfig::default(),
        )
    }

    pub fn from_value(value: EditorValue, config: EditorConfig) -> Self {
        Self::new(value.into_dom(), CommandRegistry::core(), config)
    }

    pub fn dom(&self) -> &Dom {
        &self.dom
    }

    /// Direct tree access; clears the redo history.
    pub fn dom_mut(&mut self) -> &mut Dom {
        self.redo_stack.clear();
        &mut self.dom
    }

    pub fn html(&self) -> String {
        self.dom.html()
    }

    pub fn value(&self) -> EditorValue {
        EditorValue::from_dom(&self.dom)
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut CommandRegistry {
        &mut self.registry
    }

    pub fn selection(&self) -> &ProcessingSelection {
        &self.selection
    }

    pub fn set_selection(&mut self, selection: ProcessingSelection) {
        self.selection = selection;
    }

    pub fn set_caret(&mut self, node: NodeId, offset: usize) {
        self.selection = ProcessingSelection::caret(node, offset);
    }

    pub fn select_cells(&mut self, cells: Vec<NodeId>) {
        self.selection = ProcessingSelection::cells(cells);
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo(&mut self) -> bool {
        let Some(record) = self.undo_stack.pop() else {
            return false;
        };
        record.before.clone().restore(&mut self.dom);
        self.selection = record.selection_before.clone();
        self.redo_stack.push(record);
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(record) = self.redo_stack.pop() else {
            return false;
        };
        record.after.clone().restore(&mut self.dom);
        self.selection = record.selection_after.clone();
        self.undo_stack.push(record);
        true
    }

    /// Runs `name` with JSON `args`. The command's bookmark becomes the new
    /// selection; a command that changes nothing leaves no undo entry.
    pub fn run_command(
        &mut self,
        name: &str,
        args: Option<Value>,
    ) -> Result<Option<Value>, CommandError> {
        let name = name.to_ascii_lowercase();
        let Some(command) = self.registry.command(&name) else {
            return Err(CommandError::UnknownCommand(name));
        };
        let value = CommandValue::parse(&name, args)?;
        let options = command.processing_options();

        let node_list = if options.contains(ProcessingOptions::PROVIDE_NODE_LIST) {
            NodeList::from_selection(&self.dom, &self.selection)
        } else {
            NodeList {
                common_ancestor: self.dom.root(),
                nodes: Vec::new(),
            }
        };
        let bookmark = options
            .contains(ProcessingOptions::PROVIDE_BOOKMARK)
            .then(|| Bookmark::from_selection(&self.selection));
        let selection = if options.contains(ProcessingOptions::PROVIDE_SELECTION) {
            self.selection.clone()
        } else {
            ProcessingSelection::caret(self.dom.root(), 0)
        };
        let mut def = ExecDef {
            command: name.clone(),
            value,
            selection,
            node_list,
            bookmark,
        };
        let initial = def.bookmark;

        let before = Snapshot::capture(&self.dom);
        let mut cx = EditContext {
            dom: &mut self.dom,
            config: &self.config,
        };
        let result = command.execute(&mut cx, &mut def);
        match &result {
            Ok(_) => tracing::trace!(target: "rte::editor", command = %name, "command finished"),
            Err(err) => tracing::debug!(
                target: "rte::editor",
                command = %name,
                error = %err,
                "command failed"
            ),
        }
        let ret = result?;

        let selection_before = self.selection.clone();
        if let Some(bookmark) = def.bookmark.filter(|b| Some(*b) != initial) {
            if self.dom.is_attached(bookmark.start.node) {
                self.selection = bookmark.to_selection();
            } else {
                tracing::warn!(
                    target: "rte::editor",
                    command = %name,
                    "bookmark points at a detached node"
                );
            }
        }
        self.record_undo(before, selection_before);
        Ok(ret)
    }

    fn record_undo(&mut self, before: Snapshot, selection_before: ProcessingSelection) {
        if before.markup() == self.dom.html() {
            return;
        }
        self.undo_stack.push(UndoRecord {
            before,
            after: Snapshot::capture(&self.dom),
            selection_before,
            selection_after: self.selection.clone(),
        });
        if self.undo_stack.len() > self.config.max_undo {
            let overflow = self.undo_stack.len() - self.config.max_undo;
            self.undo_stack.drain(0..overflow);
        }
        self.redo_stack.clear();
    }

    pub fn query_state_json(&self, name: &str) -> Result<Value, QueryError> {
        let name = name.to_ascii_lowercase();
        let Some(command) = self.registry.command(&name) else {
            return Err(QueryError::UnknownQuery(name));
        };
        let node_list = NodeList::from_selection(&self.dom, &self.selection);
        command
            .query_state(&self.dom, &self.selection, &node_list, &name)
            .ok_or(QueryError::UnknownQuery(name))
    }

    pub fn query_state<T>(&self, name: &str) -> Result<T, QueryError>
    where
        T: DeserializeOwned,
    {
        let value = self.query_state_json(name)?;
        serde_json::from_value(value).map_err(|err| QueryError::Decode(err.to_string()))
    }
}
