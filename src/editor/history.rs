//! Linear undo/redo history.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::error::Result;

/// Future returned by [`Command`] actions.
pub type CommandFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + 'a>>;

/// A reversible mutation.
///
/// `execute` applies the new state and `undo` restores the old one. Both
/// replay snapshots captured when the command was built, so either may run
/// any number of times.
pub trait Command {
    fn execute(&self) -> CommandFuture<'_>;
    fn undo(&self) -> CommandFuture<'_>;
    /// Short description for diagnostics.
    fn label(&self) -> String;
}

/// Undo and redo stacks of executed commands.
///
/// Executing a new command discards the redo stack. Stacks are updated even
/// when a command's action fails, so the history always reflects what was
/// attempted; the error is returned to the caller.
#[derive(Default)]
pub struct CommandHistory {
    undo_stack: RefCell<Vec<Box<dyn Command>>>,
    redo_stack: RefCell<Vec<Box<dyn Command>>>,
}

impl fmt::Debug for CommandHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandHistory")
            .field("undo_len", &self.undo_len())
            .field("redo_len", &self.redo_len())
            .finish()
    }
}

impl CommandHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `command` forward and push it on the undo stack.
    pub async fn execute(&self, command: Box<dyn Command>) -> Result<()> {
        let result = command.execute().await;
        if let Err(e) = &result {
            log::warn!("{} failed: {e}", command.label());
        }
        self.undo_stack.borrow_mut().push(command);
        self.redo_stack.borrow_mut().clear();
        result
    }

    /// Revert the most recent command. Returns `false` if there was nothing to undo.
    pub async fn undo(&self) -> Result<bool> {
        let Some(command) = self.undo_stack.borrow_mut().pop() else {
            log::info!("Nothing to undo.");
            return Ok(false);
        };
        let result = command.undo().await;
        if let Err(e) = &result {
            log::warn!("undo of {} failed: {e}", command.label());
        }
        self.redo_stack.borrow_mut().push(command);
        result.map(|()| true)
    }

    /// Re-apply the most recently undone command. Returns `false` if there was nothing to redo.
    pub async fn redo(&self) -> Result<bool> {
        let Some(command) = self.redo_stack.borrow_mut().pop() else {
            log::info!("Nothing to redo.");
            return Ok(false);
        };
        let result = command.execute().await;
        if let Err(e) = &result {
            log::warn!("redo of {} failed: {e}", command.label());
        }
        self.undo_stack.borrow_mut().push(command);
        result.map(|()| true)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.borrow().is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.borrow().is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.borrow().len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.borrow().len()
    }

    /// Drop every command from both stacks.
    pub fn clear(&self) {
        self.undo_stack.borrow_mut().clear();
        self.redo_stack.borrow_mut().clear();
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::error::GridError;
    use std::rc::Rc;

    /// Appends `+label` / `-label` to a shared log; fails when `fail` is set.
    struct Recorded {
        label: &'static str,
        log: Rc<RefCell<Vec<String>>>,
        fail: bool,
    }

    impl Recorded {
        fn boxed(label: &'static str, log: &Rc<RefCell<Vec<String>>>) -> Box<dyn Command> {
            Box::new(Self {
                label,
                log: Rc::clone(log),
                fail: false,
            })
        }

        fn run(&self, sign: char) -> Result<()> {
            self.log.borrow_mut().push(format!("{sign}{}", self.label));
            if self.fail {
                Err(GridError::StoreUnavailable("closed".into()))
            } else {
                Ok(())
            }
        }
    }

    impl Command for Recorded {
        fn execute(&self) -> CommandFuture<'_> {
            Box::pin(async move { self.run('+') })
        }

        fn undo(&self) -> CommandFuture<'_> {
            Box::pin(async move { self.run('-') })
        }

        fn label(&self) -> String {
            self.label.to_string()
        }
    }

    #[tokio::test]
    async fn test_undo_redo_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let history = CommandHistory::new();
        history.execute(Recorded::boxed("a", &log)).await.unwrap();
        history.execute(Recorded::boxed("b", &log)).await.unwrap();

        assert!(history.undo().await.unwrap());
        assert!(history.undo().await.unwrap());
        assert!(!history.undo().await.unwrap());
        assert!(history.redo().await.unwrap());

        assert_eq!(*log.borrow(), ["+a", "+b", "-b", "-a", "+a"]);
        assert_eq!((history.undo_len(), history.redo_len()), (1, 1));
    }

    #[tokio::test]
    async fn test_execute_clears_redo() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let history = CommandHistory::new();
        history.execute(Recorded::boxed("a", &log)).await.unwrap();
        history.undo().await.unwrap();
        assert!(history.can_redo());

        history.execute(Recorded::boxed("b", &log)).await.unwrap();
        assert!(!history.can_redo());
        assert!(!history.redo().await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_execute_still_recorded() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let history = CommandHistory::new();
        let failing = Box::new(Recorded {
            label: "x",
            log: Rc::clone(&log),
            fail: true,
        });
        assert!(history.execute(failing).await.is_err());
        assert!(history.can_undo());
        // Undo runs the backward action, fails again, and still moves the command.
        assert!(history.undo().await.is_err());
        assert!(!history.can_undo());
        assert!(history.can_redo());
    }

    #[tokio::test]
    async fn test_clear() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let history = CommandHistory::new();
        history.execute(Recorded::boxed("a", &log)).await.unwrap();
        history.clear();
        assert!(!history.can_undo());
        assert!(!history.undo().await.unwrap());
    }
}
