//! Error types for the editor

use thiserror::Error;

use crate::command::CommandState;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Document error: {0}")]
    Document(#[from] quire_document::DocumentError),

    /// Undo or inverse requested before the command ran
    #[error("Command {0} has not been executed")]
    NotExecuted(&'static str),

    #[error("Command {command} cannot do that from state {state:?}")]
    InvalidState {
        command: &'static str,
        state: CommandState,
    },

    #[error("Command {0} cannot be undone")]
    NotUndoable(&'static str),
}

pub type CommandResult<T> = Result<T, CommandError>;
