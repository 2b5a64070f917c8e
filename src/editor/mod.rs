//! Undoable edits.
//!
//! Mutations that should be undoable are wrapped in a [`Command`] and run
//! through a [`CommandHistory`]:
//! - [`EditCellCommand`] writes a cell value through the cache
//! - [`ResizeColumnCommand`] / [`ResizeRowCommand`] change an axis override

mod commands;
mod history;

pub use commands::{EditCellCommand, Notifier, ResizeColumnCommand, ResizeRowCommand};
pub use history::{Command, CommandFuture, CommandHistory};
