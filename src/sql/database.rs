use std::{collections::BTreeMap, sync::Arc};

use crate::{
    error::{Error, Result},
    sql::{ast::Expr, schema::Table, types::TypeRegistry},
    storage::TableSource,
};

/// Named collection of tables and user variables
pub struct Database {
    name: String,
    tables: BTreeMap<String, Table>,
    variables: BTreeMap<String, Expr>,
    implicit_tables: Vec<String>,
    types: Arc<TypeRegistry>,
}

impl Database {
    pub fn new(name: &str) -> Self {
        Self::with_types(name, Arc::new(TypeRegistry::new()))
    }

    /// Database sharing an existing type registry
    pub fn with_types(name: &str, types: Arc<TypeRegistry>) -> Self {
        Self {
            name: name.to_string(),
            tables: BTreeMap::new(),
            variables: BTreeMap::new(),
            implicit_tables: Vec::new(),
            types,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    /// Creates an empty table owned by this database's name and type registry,
    /// to be filled with columns and handed back through `add_table`
    pub fn new_table(&self, name: &str, path: &str, source: Box<dyn TableSource>) -> Table {
        Table::new(&self.name, path, name, self.types.clone(), source)
    }

    /// Adds a table; a table with the same name is replaced
    pub fn add_table(&mut self, table: Table) {
        let name = table.name().to_string();
        if self.tables.insert(name.clone(), table).is_some() {
            tracing::warn!("table {} replaced in database {}", name, self.name);
        }
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(name)
            .ok_or(Error::User(format!("table {} does not exist in database {}", name, self.name)))
    }

    pub fn table_mut(&mut self, name: &str) -> Result<&mut Table> {
        let database = self.name.clone();
        self.tables
            .get_mut(name)
            .ok_or(Error::User(format!("table {} does not exist in database {}", name, database)))
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    /// Declares a positional link: rows of `from` address windows of `to`
    /// through their `<to>.offset` and `<to>.length` columns
    pub fn link(&mut self, from: &str, to: &str) -> Result<()> {
        self.table(to)?;
        self.table_mut(from)?.add_link_to(to);
        self.table_mut(to)?.add_link_from(from);
        Ok(())
    }

    pub fn set_variable(&mut self, name: &str, value: Expr) {
        self.variables.insert(name.to_string(), value);
    }

    pub fn variable(&self, name: &str) -> Result<&Expr> {
        self.variables
            .get(name)
            .ok_or(Error::User(format!("variable {} not defined", name)))
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    /// Tables a SELECT without FROM reads from
    pub fn set_implicit_tables(&mut self, tables: Vec<String>) {
        self.implicit_tables = tables;
    }

    pub fn implicit_tables(&self) -> &[String] {
        &self.implicit_tables
    }
}
