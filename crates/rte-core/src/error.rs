use thiserror::Error;

/// Grid-level failure raised by [`crate::TableMatrix`] operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("Invalid table structure.")]
    InvalidStructure,
    #[error("Node is not a table.")]
    NotATable,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
    #[error("Duplicate command id: {0}")]
    DuplicateCommand(String),
    #[error("Invalid arguments for {command}: {message}")]
    InvalidArgs { command: String, message: String },
    #[error("Invalid paste mode: {0}")]
    InvalidPasteMode(String),
    #[error("Cannot paste.")]
    CannotPaste,
    /// The pasted/merged content would need a non-rectangular grid. The
    /// document has been restored; the message is meant for the user.
    #[error(
        "The table cannot be modified this way: {0} \
         Simplify the table structure (split merged cells) and try again."
    )]
    Structure(#[from] TableError),
    #[error(
        "The selected cells do not form a rectangle. \
         Select a rectangular block of cells and try again."
    )]
    NonRectangularSelection,
}

impl CommandError {
    pub fn invalid_args(command: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidArgs {
            command: command.into(),
            message: message.to_string(),
        }
    }

    /// Whether the error is a recoverable, user-facing limitation rather than
    /// an integration mistake.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::Structure(TableError::InvalidStructure) | Self::NonRectangularSelection
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("Unknown query: {0}")]
    UnknownQuery(String),
    #[error("Failed to decode query result: {0}")]
    Decode(String),
}
