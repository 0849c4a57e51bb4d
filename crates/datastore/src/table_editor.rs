use crate::database::Database;
use crate::Result;
use serde::{Deserialize, Serialize};
use strata_sats::{Hash, Value};
use strata_table::{RootValue, Row};

/// When a [`TableEditor`]'s edits become visible.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchMode {
    /// Every edit publishes a new root.
    #[default]
    Single,
    /// Edits accumulate privately and are published together by [`TableEditor::flush`].
    Batched,
}

/// Funnels row edits to one table.
///
/// In [`BatchMode::Batched`], edits apply to a private root derived from the root current
/// at the first edit. `flush` publishes that root if nothing else was published since,
/// and fails with a root conflict otherwise. Unflushed edits are discarded on drop.
pub struct TableEditor<'a> {
    db: &'a Database,
    table: Box<str>,
    mode: BatchMode,
    pending: Option<(Hash, RootValue)>,
    edits: usize,
}

impl<'a> TableEditor<'a> {
    pub fn new(db: &'a Database, table: &str, mode: BatchMode) -> Self {
        Self {
            db,
            table: table.into(),
            mode,
            pending: None,
            edits: 0,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn mode(&self) -> BatchMode {
        self.mode
    }

    /// The number of edits awaiting [`TableEditor::flush`].
    pub fn pending_edits(&self) -> usize {
        self.edits
    }

    pub fn insert(&mut self, row: &Row) -> Result<()> {
        self.apply(|root, table| root.insert_row(table, row))
    }

    pub fn update(&mut self, old: &Row, new: &Row) -> Result<()> {
        self.apply(|root, table| root.update_row(table, old, new))
    }

    pub fn delete(&mut self, pk: &[Value]) -> Result<()> {
        self.apply(|root, table| root.delete_row(table, pk))
    }

    pub fn replace(&mut self, row: &Row) -> Result<()> {
        self.apply(|root, table| root.replace_row(table, row))
    }

    fn apply(&mut self, edit: impl FnOnce(&RootValue, &str) -> strata_table::Result<RootValue>) -> Result<()> {
        match self.mode {
            BatchMode::Single => self.db.update_root(|root| Ok((edit(root, &self.table)?, ()))),
            BatchMode::Batched => {
                let (base, root) = match self.pending.take() {
                    Some(pending) => pending,
                    None => {
                        let root = self.db.root();
                        (root.hash(), root)
                    }
                };
                match edit(&root, &self.table) {
                    Ok(next) => {
                        self.pending = Some((base, next));
                        self.edits += 1;
                        Ok(())
                    }
                    Err(e) => {
                        if self.edits > 0 {
                            self.pending = Some((base, root));
                        }
                        Err(e.into())
                    }
                }
            }
        }
    }

    /// Publishes every pending edit as one root.
    pub fn flush(&mut self) -> Result<()> {
        let Some((base, root)) = self.pending.take() else {
            return Ok(());
        };
        let edits = std::mem::take(&mut self.edits);
        log::debug!("FLUSHING: {edits} edits to {}", self.table);
        self.db.compare_and_set_root(base, root)
    }
}

impl Drop for TableEditor<'_> {
    fn drop(&mut self) {
        if self.edits > 0 {
            log::warn!("discarding {} unflushed edits to {}", self.edits, self.table);
        }
    }
}
