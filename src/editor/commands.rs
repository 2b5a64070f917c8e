//! Concrete commands: cell edits and axis resizes.

use std::fmt;
use std::rc::Rc;

use super::{Command, CommandFuture};
use crate::cache::CellValueCache;
use crate::cell_ref;
use crate::layout::PersistedAxis;
use crate::store::GridStore;

/// Called after a command action completes successfully.
pub type Notifier = Box<dyn Fn()>;

fn notify(on_complete: Option<&Notifier>) {
    if let Some(callback) = on_complete {
        callback();
    }
}

/// Set one cell to `new_value`; undo restores `old_value`.
pub struct EditCellCommand<S> {
    cache: Rc<CellValueCache<S>>,
    row: u32,
    col: u32,
    old_value: String,
    new_value: String,
    on_complete: Option<Notifier>,
}

impl<S> EditCellCommand<S> {
    pub fn new(
        cache: Rc<CellValueCache<S>>,
        row: u32,
        col: u32,
        old_value: impl Into<String>,
        new_value: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            row,
            col,
            old_value: old_value.into(),
            new_value: new_value.into(),
            on_complete: None,
        }
    }

    pub fn with_notifier(mut self, on_complete: impl Fn() + 'static) -> Self {
        self.on_complete = Some(Box::new(on_complete));
        self
    }
}

impl<S> fmt::Debug for EditCellCommand<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditCellCommand")
            .field("row", &self.row)
            .field("col", &self.col)
            .field("old_value", &self.old_value)
            .field("new_value", &self.new_value)
            .finish_non_exhaustive()
    }
}

impl<S: GridStore> EditCellCommand<S> {
    async fn apply(&self, value: &str) -> crate::error::Result<()> {
        self.cache.set(self.row, self.col, value).await?;
        notify(self.on_complete.as_ref());
        Ok(())
    }
}

impl<S: GridStore + 'static> Command for EditCellCommand<S> {
    fn execute(&self) -> CommandFuture<'_> {
        Box::pin(self.apply(&self.new_value))
    }

    fn undo(&self) -> CommandFuture<'_> {
        Box::pin(self.apply(&self.old_value))
    }

    fn label(&self) -> String {
        format!("edit {}", cell_ref::cell_address(self.row, self.col))
    }
}

/// Shared body of the two resize commands.
struct Resize<S> {
    axis: Rc<PersistedAxis<S>>,
    index: u32,
    old_size: f64,
    new_size: f64,
    on_complete: Option<Notifier>,
}

impl<S: GridStore> Resize<S> {
    async fn apply(&self, size: f64) -> crate::error::Result<()> {
        self.axis.set_size(self.index, size).await?;
        notify(self.on_complete.as_ref());
        Ok(())
    }
}

macro_rules! resize_command {
    ($(#[$meta:meta])* $name:ident, $what:literal) => {
        $(#[$meta])*
        pub struct $name<S>(Resize<S>);

        impl<S> $name<S> {
            pub fn new(axis: Rc<PersistedAxis<S>>, index: u32, old_size: f64, new_size: f64) -> Self {
                Self(Resize {
                    axis,
                    index,
                    old_size,
                    new_size,
                    on_complete: None,
                })
            }

            pub fn with_notifier(mut self, on_complete: impl Fn() + 'static) -> Self {
                self.0.on_complete = Some(Box::new(on_complete));
                self
            }
        }

        impl<S> fmt::Debug for $name<S> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("index", &self.0.index)
                    .field("old_size", &self.0.old_size)
                    .field("new_size", &self.0.new_size)
                    .finish_non_exhaustive()
            }
        }

        impl<S: GridStore + 'static> Command for $name<S> {
            fn execute(&self) -> CommandFuture<'_> {
                Box::pin(self.0.apply(self.0.new_size))
            }

            fn undo(&self) -> CommandFuture<'_> {
                Box::pin(self.0.apply(self.0.old_size))
            }

            fn label(&self) -> String {
                format!(concat!("resize ", $what, " {}"), self.0.index)
            }
        }
    };
}

resize_command!(
    /// Set a column width; undo restores the previous width.
    ResizeColumnCommand,
    "column"
);

resize_command!(
    /// Set a row height; undo restores the previous height.
    ResizeRowCommand,
    "row"
);

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::cache::HighWaterMark;
    use crate::editor::CommandHistory;
    use crate::layout::{AxisIndex, AxisKind};
    use crate::store::MemoryStore;
    use std::cell::Cell;

    #[tokio::test]
    async fn test_edit_cell_replays_snapshots() {
        let store = Rc::new(MemoryStore::open());
        let cache = Rc::new(CellValueCache::new(Rc::clone(&store), HighWaterMark::new(100, 100)));
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let command = EditCellCommand::new(Rc::clone(&cache), 1, 2, "", "hello")
            .with_notifier(move || counter.set(counter.get() + 1));
        assert_eq!(command.label(), "edit C2");

        command.execute().await.unwrap();
        assert_eq!(cache.get(1, 2).await.unwrap(), Some("hello".to_string()));
        command.undo().await.unwrap();
        assert_eq!(cache.get(1, 2).await.unwrap(), None);
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test]
    async fn test_failed_edit_skips_notifier() {
        let store = Rc::new(MemoryStore::open());
        let cache = Rc::new(CellValueCache::new(Rc::clone(&store), HighWaterMark::default()));
        let called = Rc::new(Cell::new(false));
        let flag = Rc::clone(&called);
        let command =
            EditCellCommand::new(cache, 0, 0, "a", "b").with_notifier(move || flag.set(true));
        store.close();
        assert!(command.execute().await.is_err());
        assert!(!called.get());
    }

    #[tokio::test]
    async fn test_resize_through_history() {
        let store = Rc::new(MemoryStore::open());
        let columns = Rc::new(PersistedAxis::new(
            Rc::clone(&store),
            AxisKind::Columns,
            AxisIndex::new(100, 65.0),
        ));
        let rows = Rc::new(PersistedAxis::new(
            Rc::clone(&store),
            AxisKind::Rows,
            AxisIndex::new(100, 23.0),
        ));
        let history = CommandHistory::new();

        history
            .execute(Box::new(ResizeColumnCommand::new(Rc::clone(&columns), 4, 65.0, 120.0)))
            .await
            .unwrap();
        history
            .execute(Box::new(ResizeRowCommand::new(Rc::clone(&rows), 2, 23.0, 40.0)))
            .await
            .unwrap();
        assert_eq!(columns.size(4), 120.0);
        assert_eq!(rows.size(2), 40.0);

        history.undo().await.unwrap();
        history.undo().await.unwrap();
        assert_eq!(columns.size(4), 65.0);
        assert_eq!(rows.size(2), 23.0);
        // The restored default is persisted as an explicit override.
        assert_eq!(columns.with_index(|index| index.override_count()), 1);
    }

    #[test]
    fn test_resize_label() {
        let store = Rc::new(MemoryStore::open());
        let rows = Rc::new(PersistedAxis::new(store, AxisKind::Rows, AxisIndex::new(10, 23.0)));
        assert_eq!(ResizeRowCommand::new(rows, 7, 23.0, 30.0).label(), "resize row 7");
    }
}
