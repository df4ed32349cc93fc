//! DDL generation for SQL Server.

use tsql_core::{AdapterSettings, Dialect, IndexSpec, ModelDef, MssqlDialect};

use crate::differ::SchemaChange;
use crate::types::DatatypeMapper;

const PRIMARY_KEY_OPTIONS: &str = "WITH (PAD_INDEX = OFF, STATISTICS_NORECOMPUTE = OFF, \
     IGNORE_DUP_KEY = OFF, ALLOW_ROW_LOCKS = ON, ALLOW_PAGE_LOCKS = ON) ON [PRIMARY]";

const INDEX_OPTIONS: &str = "WITH (PAD_INDEX = OFF, STATISTICS_NORECOMPUTE = OFF, \
     SORT_IN_TEMPDB = OFF, IGNORE_DUP_KEY = OFF, DROP_EXISTING = OFF, ONLINE = OFF, \
     ALLOW_ROW_LOCKS = ON, ALLOW_PAGE_LOCKS = ON) ON [PRIMARY]";

/// Trait for database-specific DDL generation.
pub trait MigrationDialect: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Creates the table and every declared index, skipping anything that
    /// already exists.
    fn create_table_sql(&self, model: &ModelDef) -> String;

    /// Drops the table if it exists.
    fn drop_table_sql(&self, model: &ModelDef) -> String;

    /// Creates one index if it does not exist.
    fn create_index_sql(&self, model: &ModelDef, index: &IndexSpec) -> String;

    /// Generates the statement for one schema change.
    fn change_sql(&self, model: &ModelDef, change: &SchemaChange) -> String;

    /// Joins the statements for several changes into one batch.
    fn changes_sql(&self, model: &ModelDef, changes: &[SchemaChange]) -> Option<String> {
        if changes.is_empty() {
            return None;
        }
        let statements: Vec<String> = changes
            .iter()
            .map(|c| self.change_sql(model, c))
            .collect();
        Some(format!("{};", statements.join(";\n")))
    }
}

/// SQL Server DDL.
#[derive(Debug, Clone, Default)]
pub struct MssqlDdl {
    settings: AdapterSettings,
    dialect: MssqlDialect,
    mapper: DatatypeMapper,
}

fn literal(text: &str) -> String {
    format!("N'{}'", text.replace('\'', "''"))
}

impl MssqlDdl {
    /// Creates a generator for the given settings.
    #[must_use]
    pub fn new(settings: AdapterSettings) -> Self {
        Self {
            settings,
            dialect: MssqlDialect,
            mapper: DatatypeMapper::new(),
        }
    }

    fn table(&self, model: &ModelDef) -> String {
        self.dialect
            .qualified_table(&self.settings.schema, &model.table_name())
    }

    fn quote(&self, name: &str) -> String {
        self.dialect.quote_identifier(name)
    }

    fn table_exists(&self, model: &ModelDef) -> String {
        format!(
            "EXISTS (SELECT * FROM sys.objects WHERE object_id = OBJECT_ID({}) AND type in (N'U'))",
            literal(&self.table(model))
        )
    }

    fn column_definitions(&self, model: &ModelDef) -> Vec<String> {
        let pk = self.quote(model.primary_key());
        let mut defs = vec![format!("{pk} [int] IDENTITY(1,1) NOT NULL")];
        for field in model.columns() {
            defs.push(format!(
                "{} {}",
                self.quote(&field.name),
                self.mapper.column_settings(field)
            ));
        }
        let mut constraint = format!("PRIMARY KEY CLUSTERED\n(\n    {pk} ASC\n)");
        if !self.settings.azure {
            constraint.push(' ');
            constraint.push_str(PRIMARY_KEY_OPTIONS);
        }
        defs.push(constraint);
        defs
    }
}

impl MigrationDialect for MssqlDdl {
    fn name(&self) -> &'static str {
        "mssql"
    }

    fn create_table_sql(&self, model: &ModelDef) -> String {
        let table = self.table(model);
        let mut sql = String::from("SET ANSI_NULLS ON;\nSET QUOTED_IDENTIFIER ON;\nSET ANSI_PADDING ON;\n");
        sql.push_str(&format!(
            "IF NOT {}\nBEGIN\nCREATE TABLE {table} (\n    {}\n)",
            self.table_exists(model),
            self.column_definitions(model).join(",\n    ")
        ));
        if !self.settings.azure {
            sql.push_str(" ON [PRIMARY]");
        }
        sql.push_str("\nEND;");
        for index in model.declared_indexes() {
            sql.push('\n');
            sql.push_str(&self.create_index_sql(model, &index));
            sql.push(';');
        }
        sql
    }

    fn drop_table_sql(&self, model: &ModelDef) -> String {
        format!(
            "IF {}\nBEGIN\n    DROP TABLE {}\nEND;",
            self.table_exists(model),
            self.table(model)
        )
    }

    fn create_index_sql(&self, model: &ModelDef, index: &IndexSpec) -> String {
        let table = self.table(model);
        let name = index.resolved_name();
        let columns: Vec<String> = index
            .columns
            .iter()
            .map(|c| format!("    {} {}", self.quote(&c.field), c.direction))
            .collect();
        let mut sql = format!(
            "IF NOT EXISTS (SELECT * FROM sys.indexes WHERE name = {} AND object_id = OBJECT_ID({}))\n\
             CREATE {}{} INDEX {} ON {table}\n(\n{}\n)",
            literal(&name),
            literal(&table),
            if index.unique { "UNIQUE " } else { "" },
            index.kind,
            self.quote(&name),
            columns.join(",\n")
        );
        if !self.settings.azure {
            sql.push(' ');
            sql.push_str(INDEX_OPTIONS);
        }
        sql
    }

    fn change_sql(&self, model: &ModelDef, change: &SchemaChange) -> String {
        let table = self.table(model);
        match change {
            SchemaChange::AddColumn(field) => format!(
                "ALTER TABLE {table} ADD {} {}",
                self.quote(&field.name),
                self.mapper.column_settings(field)
            ),
            SchemaChange::AlterColumn(field) => format!(
                "ALTER TABLE {table} ALTER COLUMN {} {}",
                self.quote(&field.name),
                self.mapper.column_settings(field)
            ),
            SchemaChange::DropColumn(name) => {
                format!("ALTER TABLE {table} DROP COLUMN {}", self.quote(name))
            }
            SchemaChange::DropIndex(name) => {
                format!("DROP INDEX {} ON {table}", self.quote(name))
            }
            SchemaChange::CreateIndex(index) => self.create_index_sql(model, index),
        }
    }
}
