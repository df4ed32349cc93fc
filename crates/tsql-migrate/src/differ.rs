//! Schema differ.
//!
//! Compares a declared model against introspected facts and produces the
//! changes needed to converge them. The primary-key column and its index
//! belong to table creation and are never touched here.

use std::collections::HashSet;

use tsql_core::{Direction, FieldDef, IndexSpec, ModelDef};

use crate::introspect::{ActualColumn, ActualIndex};
use crate::types::DatatypeMapper;

/// A single schema change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaChange {
    /// Add a declared column.
    AddColumn(FieldDef),
    /// Change the type or nullability of a column.
    AlterColumn(FieldDef),
    /// Drop an undeclared column.
    DropColumn(String),
    /// Drop an index.
    DropIndex(String),
    /// Create a declared index.
    CreateIndex(IndexSpec),
}

impl SchemaChange {
    /// Returns a short description, e.g. `add column [email]`.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::AddColumn(f) => format!("add column [{}]", f.name),
            Self::AlterColumn(f) => format!("alter column [{}]", f.name),
            Self::DropColumn(c) => format!("drop column [{c}]"),
            Self::DropIndex(n) => format!("drop index [{n}]"),
            Self::CreateIndex(i) => format!("create index [{}]", i.resolved_name()),
        }
    }
}

/// Something the differ found but will not fix automatically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaMismatch {
    /// Affected table.
    pub table: String,
    /// What is wrong.
    pub message: String,
}

/// Result of diffing one model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableDiff {
    /// Table name.
    pub table: String,
    /// Changes in execution order: index drops, column adds/alters, column
    /// drops, index creations.
    pub changes: Vec<SchemaChange>,
    /// Problems that need a human decision.
    pub mismatches: Vec<SchemaMismatch>,
}

impl TableDiff {
    /// Returns `true` when no changes are needed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// An actual index with its columns and directions in key order.
#[derive(Debug)]
struct IndexGroup {
    name: String,
    columns: Vec<(String, Direction)>,
    unique: bool,
    primary_key: bool,
}

fn group_indexes(indexes: &[ActualIndex]) -> Vec<IndexGroup> {
    let mut groups: Vec<IndexGroup> = Vec::new();
    for idx in indexes {
        if !groups.iter().any(|g| g.name == idx.name) {
            groups.push(IndexGroup {
                name: idx.name.clone(),
                columns: Vec::new(),
                unique: idx.unique,
                primary_key: idx.primary_key,
            });
        }
    }
    // Catalog rows are not guaranteed to arrive in key order.
    for group in &mut groups {
        let mut members: Vec<&ActualIndex> =
            indexes.iter().filter(|i| i.name == group.name).collect();
        members.sort_by_key(|i| i.seq_in_index);
        group.columns = members
            .iter()
            .map(|i| {
                let direction = if i.descending { Direction::Desc } else { Direction::Asc };
                (i.column.clone(), direction)
            })
            .collect();
    }
    groups
}

fn same_name(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Diffs declared models against introspected facts.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaDiffer {
    mapper: DatatypeMapper,
}

impl SchemaDiffer {
    /// Creates a differ.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            mapper: DatatypeMapper::new(),
        }
    }

    /// Computes the changes that bring `columns`/`indexes` in line with
    /// `model`.
    #[must_use]
    pub fn diff(
        &self,
        model: &ModelDef,
        columns: &[ActualColumn],
        indexes: &[ActualIndex],
    ) -> TableDiff {
        let table = model.table_name();
        let mut mismatches = Vec::new();
        let pk = model.primary_key();

        match columns.iter().find(|c| same_name(&c.name, pk)) {
            None => mismatches.push(SchemaMismatch {
                table: table.clone(),
                message: format!("primary key column [{pk}] is missing"),
            }),
            Some(col) if DatatypeMapper::normalize(&col.data_type) != "INT" => {
                mismatches.push(SchemaMismatch {
                    table: table.clone(),
                    message: format!(
                        "primary key column [{pk}] has type {} instead of int",
                        col.data_type
                    ),
                });
            }
            Some(_) => {}
        }

        let mut column_changes = Vec::new();
        let mut altered: HashSet<String> = HashSet::new();
        for field in model.columns() {
            match columns.iter().find(|c| same_name(&c.name, &field.name)) {
                None => column_changes.push(SchemaChange::AddColumn(field.clone())),
                Some(actual) => {
                    if actual.nullable != field.nullable
                        || !self.mapper.same_type(field, &actual.data_type)
                    {
                        altered.insert(field.name.to_lowercase());
                        column_changes.push(SchemaChange::AlterColumn(field.clone()));
                    }
                }
            }
        }
        for actual in columns {
            let declared = model.columns().any(|f| same_name(&f.name, &actual.name));
            if !declared && !model.is_primary_key(&actual.name) && !same_name(&actual.name, pk) {
                column_changes.push(SchemaChange::DropColumn(actual.name.clone()));
            }
        }

        let declared = model.declared_indexes();
        let mut drops = Vec::new();
        let mut kept: HashSet<String> = HashSet::new();
        for group in group_indexes(indexes) {
            if group.primary_key {
                continue;
            }
            let Some(spec) = declared
                .iter()
                .find(|s| same_name(&s.resolved_name(), &group.name))
            else {
                drops.push(SchemaChange::DropIndex(group.name));
                continue;
            };
            let order_matches = spec.columns.len() == group.columns.len()
                && spec
                    .columns
                    .iter()
                    .zip(&group.columns)
                    .all(|(w, (column, direction))| {
                        same_name(&w.field, column) && w.direction == *direction
                    });
            let touches_altered = group
                .columns
                .iter()
                .any(|(c, _)| altered.contains(&c.to_lowercase()));
            if order_matches && spec.unique == group.unique && !touches_altered {
                kept.insert(spec.resolved_name());
            } else {
                drops.push(SchemaChange::DropIndex(group.name));
            }
        }

        let creates = declared
            .into_iter()
            .filter(|spec| !kept.contains(&spec.resolved_name()))
            .map(SchemaChange::CreateIndex);

        let mut changes = drops;
        changes.extend(column_changes);
        changes.extend(creates);

        TableDiff {
            table,
            changes,
            mismatches,
        }
    }
}
