use std::collections::HashMap;

use bitflags::bitflags;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{EditorConfig, PasteRules};
use crate::dom::{Dom, NodeId};
use crate::error::CommandError;
use crate::selection::{Bookmark, NodeList, ProcessingSelection};

mod list;
mod paste;
mod table;

pub use list::ListCommand;
pub use paste::{NativePaste, PasteCommand};
pub use table::TableCommand;

bitflags! {
    /// What the caller has to prepare in the [`ExecDef`] before `execute`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct ProcessingOptions: u32 {
        const PROVIDE_BOOKMARK = 1 << 0;
        const PROVIDE_SELECTION = 1 << 1;
        const PROVIDE_NODE_LIST = 1 << 2;
    }
}

pub struct EditContext<'a> {
    pub dom: &'a mut Dom,
    pub config: &'a EditorConfig,
}

/// One command invocation. Commands mutate the tree through the
/// [`EditContext`] and leave the caret to restore in `bookmark`.
#[derive(Debug, Clone)]
pub struct ExecDef {
    pub command: String,
    pub value: CommandValue,
    pub selection: ProcessingSelection,
    pub node_list: NodeList,
    pub bookmark: Option<Bookmark>,
}

pub trait Command: Send + Sync {
    fn id(&self) -> &'static str;
    fn is_command(&self, name: &str) -> bool;
    fn processing_options(&self) -> ProcessingOptions {
        ProcessingOptions::all()
    }
    fn execute(
        &self,
        cx: &mut EditContext<'_>,
        def: &mut ExecDef,
    ) -> Result<Option<Value>, CommandError>;
    fn query_state(
        &self,
        _dom: &Dom,
        _selection: &ProcessingSelection,
        _node_list: &NodeList,
        _name: &str,
    ) -> Option<Value> {
        None
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[default]
    Before,
    After,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CaretPlacement {
    /// The new cell in the caret's column/row.
    #[default]
    Aligned,
    FirstCell,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateTableValue {
    pub rows: Option<usize>,
    pub columns: Option<usize>,
    /// `"top"`, `"left"`, `"top left"` or empty.
    pub header: Option<String>,
    pub cellpadding: Option<String>,
    pub cellspacing: Option<String>,
    pub border: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
    pub table_style: Option<String>,
    /// Raw table markup inserted instead of a generated grid.
    pub html: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TableAttrsValue {
    pub cellpadding: Option<String>,
    pub cellspacing: Option<String>,
    pub border: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
    pub table_style: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InsertValue {
    pub position: Side,
    pub caret_position: CaretPlacement,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyTo {
    #[default]
    Cell,
    Row,
    Column,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModifyCellValue {
    #[serde(rename = "_applyTo")]
    pub apply_to: ApplyTo,
    /// `"td"`/`"th"` (also `"data"`/`"header"`).
    pub cell_type: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
    pub align: Option<String>,
    pub valign: Option<String>,
    pub cell_style: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionPropsValue {
    pub anchor_cell: NodeId,
    pub cols: usize,
    pub rows: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MergeCellsValue {
    pub selection_props: Option<SelectionPropsValue>,
    pub cells: Vec<NodeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitDirection {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PasteValue {
    /// `"browser"`, `"plaintext"` or `"wordhtml"`; anything else is rejected
    /// when the paste runs.
    pub mode: String,
    pub html: Option<String>,
    pub text: Option<String>,
    pub paste_rules: Option<PasteRules>,
    pub strip_html_tags: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListValue {
    pub keep_structure: Option<bool>,
}

/// Typed payload of a command invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CommandValue {
    #[default]
    None,
    CreateTable(CreateTableValue),
    ModifyTable(TableAttrsValue),
    Insert(InsertValue),
    ModifyCell(ModifyCellValue),
    MergeCells(MergeCellsValue),
    SplitCell(SplitDirection),
    EnsureParagraph(Side),
    Paste(PasteValue),
    List(ListValue),
}

fn decode<T: DeserializeOwned + Default>(
    command: &str,
    args: Option<Value>,
) -> Result<T, CommandError> {
    match args {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => {
            serde_json::from_value(value).map_err(|e| CommandError::invalid_args(command, e))
        }
    }
}

fn decode_required<T: DeserializeOwned>(
    command: &str,
    args: Option<Value>,
) -> Result<T, CommandError> {
    let value = args.ok_or_else(|| CommandError::invalid_args(command, "missing value"))?;
    serde_json::from_value(value).map_err(|e| CommandError::invalid_args(command, e))
}

impl CommandValue {
    pub fn parse(command: &str, args: Option<Value>) -> Result<Self, CommandError> {
        Ok(match command {
            "createtable" => Self::CreateTable(decode(command, args)?),
            "modifytable" => Self::ModifyTable(decode(command, args)?),
            "insertrow" | "insertcolumn" => match args {
                // A bare "before"/"after" is accepted as shorthand.
                Some(Value::String(_)) => Self::Insert(InsertValue {
                    position: decode_required(command, args)?,
                    caret_position: CaretPlacement::default(),
                }),
                args => Self::Insert(decode(command, args)?),
            },
            "modifycell" => Self::ModifyCell(decode(command, args)?),
            "mergecells" => Self::MergeCells(decode(command, args)?),
            "splitcell" => Self::SplitCell(decode_required(command, args)?),
            "ensureparagraph" => Self::EnsureParagraph(decode(command, args)?),
            "paste" => Self::Paste(decode(command, args)?),
            "insertunorderedlist" | "insertorderedlist" | "indent" | "outdent" => {
                Self::List(decode(command, args)?)
            }
            _ => Self::None,
        })
    }
}

/// Lowercase command name to command object.
#[derive(Default)]
pub struct CommandRegistry {
    commands: Vec<Box<dyn Command>>,
    ids: HashMap<&'static str, usize>,
}

impl CommandRegistry {
    pub fn new(commands: impl IntoIterator<Item = Box<dyn Command>>) -> Result<Self, CommandError> {
        let mut registry = Self::default();
        for command in commands {
            registry.register(command)?;
        }
        Ok(registry)
    }

    pub fn core() -> Self {
        let mut registry = Self::default();
        registry.push(Box::new(TableCommand));
        registry.push(Box::new(ListCommand));
        registry.push(Box::new(PasteCommand::default()));
        registry
    }

    pub fn register(&mut self, command: Box<dyn Command>) -> Result<(), CommandError> {
        if self.ids.contains_key(command.id()) {
            return Err(CommandError::DuplicateCommand(command.id().to_string()));
        }
        self.push(command);
        Ok(())
    }

    /// Replaces a registered command with the same id, or adds it.
    pub fn replace(&mut self, command: Box<dyn Command>) {
        match self.ids.get(command.id()) {
            Some(ix) => self.commands[*ix] = command,
            None => self.push(command),
        }
    }

    fn push(&mut self, command: Box<dyn Command>) {
        self.ids.insert(command.id(), self.commands.len());
        self.commands.push(command);
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.commands.iter().map(|c| c.id()).collect()
    }

    pub fn command(&self, name: &str) -> Option<&dyn Command> {
        let name = name.to_ascii_lowercase();
        self.commands
            .iter()
            .find(|c| c.is_command(&name))
            .map(|c| c.as_ref())
    }
}
