pub mod cleanup;
pub mod commands;
mod config;
mod dom;
pub mod dom_processor;
mod editor;
mod error;
mod html;
pub mod list_utils;
mod selection;
pub mod table_matrix;
pub mod tags;
mod value;

pub use crate::commands::{
    Command, CommandRegistry, CommandValue, EditContext, ExecDef, ListCommand, NativePaste,
    PasteCommand, ProcessingOptions, TableCommand,
};
pub use crate::config::*;
pub use crate::dom::*;
pub use crate::editor::*;
pub use crate::error::*;
pub use crate::html::*;
pub use crate::selection::*;
pub use crate::table_matrix::{CellDef, CellSelectionProps, TableMatrix, TableSize};
pub use crate::value::*;
