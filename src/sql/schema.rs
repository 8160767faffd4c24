use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Display,
    sync::{Arc, RwLock},
};

use crate::{
    error::{Error, Result},
    sql::{
        database::Database,
        types::{BitfieldDef, LINK_TYPE, TypeRef, TypeRegistry, TypeRepr},
    },
    storage::{ColumnFetch, TableIterator, TableSource},
};

/// Position of a column in its table's arena
pub type ColumnId = usize;

/// Bit sub-column: one field of a bitfield column
#[derive(Debug, Clone, PartialEq)]
pub struct BitView {
    pub parent: ColumnId,
    pub field: String,
    pub mask: u64,
    pub shift: u32,
}

/// Column schema definition
#[derive(Debug, Clone)]
pub struct SqlColumn {
    pub id: ColumnId,
    pub name: String,
    /// Name of the owning table
    pub table: String,
    /// Storage position in a row
    pub index: usize,
    pub ty: TypeRef,
    pub has_missing: bool,
    pub missing_value: f64,
    pub bitfield: Option<BitfieldDef>,
    pub view: Option<BitView>,
    /// Synthetic `<table>.offset`/`<table>.length` column of a link
    pub link: bool,
}

impl SqlColumn {
    /// `name@table`, unless the name already carries a table reference
    pub fn full_name(&self) -> String {
        if self.name.contains('@') {
            self.name.clone()
        } else {
            format!("{}@{}", self.name, self.table)
        }
    }

    pub fn fetch(&self) -> ColumnFetch {
        ColumnFetch {
            index: self.index,
            size: self.ty.size,
            has_missing: self.has_missing,
            missing_value: self.missing_value,
        }
    }
}

/// Table schema plus the source its rows are read from
pub struct Table {
    database: String,
    path: String,
    name: String,
    types: Arc<TypeRegistry>,
    columns: Vec<Arc<SqlColumn>>,
    by_name: BTreeMap<String, ColumnId>,
    by_index: BTreeMap<usize, ColumnId>,
    bit_column_names: BTreeMap<String, Vec<String>>,
    // bit sub-columns resolved on demand, keyed by the requested name
    views: RwLock<BTreeMap<String, Arc<SqlColumn>>>,
    links_to: BTreeSet<String>,
    links_from: BTreeSet<String>,
    source: Box<dyn TableSource>,
}

impl Table {
    pub fn new(
        database: &str,
        path: &str,
        name: &str,
        types: Arc<TypeRegistry>,
        source: Box<dyn TableSource>,
    ) -> Self {
        tracing::debug!("new table [path={}, name={}]", path, name);
        Self {
            database: database.to_string(),
            path: path.to_string(),
            name: name.to_string(),
            types,
            columns: Vec::new(),
            by_name: BTreeMap::new(),
            by_index: BTreeMap::new(),
            bit_column_names: BTreeMap::new(),
            views: RwLock::new(BTreeMap::new()),
            links_to: BTreeSet::new(),
            links_from: BTreeSet::new(),
            source,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// `database.table`
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.database, self.name)
    }

    fn push_column(&mut self, mut column: SqlColumn, names: &[String], indexed: bool) -> ColumnId {
        let id = self.columns.len();
        column.id = id;
        if indexed {
            self.by_index.insert(column.index, id);
        }
        for name in names {
            self.by_name.insert(name.clone(), id);
        }
        self.columns.push(Arc::new(column));
        id
    }

    /// Registers a column. A `@LINK` type expands into the integer columns
    /// `<name>.offset` and `<name>.length` at `index` and `index + 1`; a
    /// bitfield also registers each field as `col.field@table` and `col.field`.
    pub fn add_column(
        &mut self,
        name: &str,
        index: usize,
        ty: TypeRef,
        has_missing: bool,
        missing_value: f64,
        bitfield: Option<BitfieldDef>,
    ) -> Result<()> {
        let (base, reference) = match name.split_once('@') {
            Some((base, table)) => (base.to_string(), format!("@{}", table)),
            None => (name.to_string(), String::new()),
        };

        if ty.name == LINK_TYPE {
            let integer = self.types.lookup("integer")?;
            for (i, part) in ["offset", "length"].iter().enumerate() {
                let column_name = format!("{}.{}{}", base, part, reference);
                let column = SqlColumn {
                    id: 0,
                    name: column_name.clone(),
                    table: self.name.clone(),
                    index: index + i,
                    ty: integer.clone(),
                    has_missing: false,
                    missing_value: 0.0,
                    bitfield: None,
                    view: None,
                    link: true,
                };
                self.push_column(column, &[column_name], true);
            }
            return Ok(());
        }

        let ty = match (&bitfield, &ty.repr) {
            (Some(def), TypeRepr::Bitfield(existing)) if existing != def => {
                self.types.make_bitfield(&base, def.clone(), None)?
            }
            _ => ty,
        };

        let column = SqlColumn {
            id: 0,
            name: name.to_string(),
            table: self.name.clone(),
            index,
            ty: ty.clone(),
            has_missing,
            missing_value,
            bitfield: bitfield.clone(),
            view: None,
            link: false,
        };
        let parent = self.push_column(column, &[name.to_string()], true);

        let Some(def) = bitfield else {
            return Ok(());
        };
        self.bit_column_names.insert(name.to_string(), def.fields.clone());
        let table_reference = if reference.is_empty() {
            format!("@{}", self.name)
        } else {
            reference
        };
        for field in &def.fields {
            let bare = format!("{}.{}", base, field);
            let qualified = format!("{}{}", bare, table_reference);
            let bit = self.types.sub_type(&ty, &bare)?;
            let (mask, shift) = def.field_mask(field).ok_or(Error::SeriousBug(format!(
                "field {} vanished from bitfield {}",
                field, name
            )))?;
            let column = SqlColumn {
                id: 0,
                name: qualified.clone(),
                table: self.name.clone(),
                index,
                ty: bit,
                has_missing,
                missing_value,
                bitfield: None,
                view: Some(BitView {
                    parent,
                    field: field.clone(),
                    mask,
                    shift,
                }),
                link: false,
            };
            self.push_column(column, &[qualified, bare], false);
        }
        Ok(())
    }

    fn resolve(&self, name: &str) -> Result<Option<Arc<SqlColumn>>> {
        if let Some(id) = self.by_name.get(name) {
            return Ok(Some(self.columns[*id].clone()));
        }
        if let Some(view) = self.views.read()?.get(name) {
            return Ok(Some(view.clone()));
        }

        if !name.contains('@') {
            let prefix = format!("{}@", name);
            let matches: Vec<&ColumnId> = self
                .by_name
                .range(prefix.clone()..)
                .take_while(|(k, _)| k.starts_with(&prefix))
                .map(|(_, id)| id)
                .collect();
            match matches.len() {
                0 => {}
                1 => return Ok(Some(self.columns[*matches[0]].clone())),
                _ => {
                    return Err(Error::User(format!(
                        "ambiguous column name: '{}' in table {}",
                        name, self.name
                    )));
                }
            }
        }

        // `column.field`, resolved lazily as a bit sub-column
        if let Some((column, field)) = name.split_once('.') {
            let (field, _) = field.split_once('@').unwrap_or((field, ""));
            if let Some(parent) = self.resolve(column)? {
                if let Some(def) = &parent.bitfield {
                    if let Some((mask, shift)) = def.field_mask(field) {
                        let ty = self.types.sub_type(&parent.ty, &format!("{}.{}", column, field))?;
                        let base = parent.name.split('@').next().unwrap_or(&parent.name);
                        let view = Arc::new(SqlColumn {
                            id: parent.id,
                            name: format!("{}.{}@{}", base, field, self.name),
                            table: self.name.clone(),
                            index: parent.index,
                            ty,
                            has_missing: parent.has_missing,
                            missing_value: parent.missing_value,
                            bitfield: None,
                            view: Some(BitView {
                                parent: parent.id,
                                field: field.to_string(),
                                mask,
                                shift,
                            }),
                            link: false,
                        });
                        self.views.write()?.insert(name.to_string(), view.clone());
                        return Ok(Some(view));
                    }
                }
            }
        }
        Ok(None)
    }

    /// Looks a column up by exact name, `name@table` suffix or `bitfield.field`
    pub fn column(&self, name: &str) -> Result<Arc<SqlColumn>> {
        self.resolve(name)?
            .ok_or(Error::User(format!("column not found: {} in table {}", name, self.name)))
    }

    /// Full name of the column `name` resolves to, if any; ambiguous names fail
    pub fn has_column(&self, name: &str) -> Result<Option<String>> {
        Ok(self.resolve(name)?.map(|c| c.full_name()))
    }

    /// Column by arena id
    pub fn column_by_id(&self, id: ColumnId) -> Result<Arc<SqlColumn>> {
        self.columns
            .get(id)
            .cloned()
            .ok_or(Error::SeriousBug(format!("no column {} in table {}", id, self.name)))
    }

    /// Stored columns in storage order
    pub fn columns(&self) -> Vec<Arc<SqlColumn>> {
        self.by_index.values().map(|id| self.columns[*id].clone()).collect()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns().into_iter().map(|c| c.name.clone()).collect()
    }

    /// Field names of a bitfield column, also found by `name@table` suffix
    pub fn bit_column_names(&self, name: &str) -> Result<Vec<String>> {
        if let Some(fields) = self.bit_column_names.get(name) {
            return Ok(fields.clone());
        }
        let prefix = format!("{}@", name);
        let matches: Vec<&Vec<String>> = self
            .bit_column_names
            .iter()
            .filter(|(k, _)| k.starts_with(&prefix))
            .map(|(_, v)| v)
            .collect();
        match matches.len() {
            0 => Err(Error::User(format!("column '{}' not found", name))),
            1 => Ok(matches[0].clone()),
            _ => Err(Error::User(format!("ambiguous column name: '{}'", name))),
        }
    }

    pub fn add_link_from(&mut self, from: &str) {
        self.links_from.insert(from.to_string());
    }

    pub fn add_link_to(&mut self, to: &str) {
        self.links_to.insert(to.to_string());
    }

    pub fn has_link_from(&self, from: &str) -> bool {
        self.links_from.contains(from)
    }

    pub fn has_link_to(&self, to: &str) -> bool {
        self.links_to.contains(to)
    }

    pub fn links_to(&self) -> impl Iterator<Item = &String> {
        self.links_to.iter()
    }

    /// Whether `other` is reachable over links from this table
    pub fn is_parent_of(&self, other: &str, database: &Database) -> bool {
        let mut visited = BTreeSet::new();
        let mut stack: Vec<&Table> = vec![self];
        while let Some(table) = stack.pop() {
            if !visited.insert(table.name.clone()) {
                continue;
            }
            if table.has_link_to(other) {
                return true;
            }
            for name in &table.links_to {
                if let Ok(next) = database.table(name) {
                    stack.push(next);
                }
            }
        }
        false
    }

    /// Opens an iterator decoding the given columns
    pub fn iterator(&self, columns: &[Arc<SqlColumn>]) -> Result<Box<dyn TableIterator + '_>> {
        let fetches: Vec<ColumnFetch> = columns.iter().map(|c| c.fetch()).collect();
        self.source.iterator(&fetches)
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "CREATE TABLE {} AS (", self.full_name())?;
        for column in self.columns() {
            writeln!(f, "\t{} {},", column.name, column.ty)?;
        }
        writeln!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{
        error::{Error, Result},
        sql::{
            database::Database,
            types::{BitfieldDef, LINK_TYPE, TypeRegistry},
        },
        storage::MemoryTable,
    };

    use super::Table;

    fn table() -> Result<Table> {
        let types = Arc::new(TypeRegistry::new());
        let mut table = Table::new("db", "mem:hdr", "hdr", types.clone(), Box::new(MemoryTable::new(vec![1; 5])));
        table.add_column("seqno@hdr", 0, types.lookup("integer")?, false, 0.0, None)?;
        let def = BitfieldDef::new(vec!["active".into(), "level".into()], vec![1, 3])?;
        let status = types.make_bitfield("status", def.clone(), None)?;
        table.add_column("status@hdr", 1, status, false, 0.0, Some(def))?;
        table.add_column("body", 2, types.lookup(LINK_TYPE)?, false, 0.0, None)?;
        table.add_column("obsvalue@hdr", 4, types.lookup("real")?, true, -2147483647.0, None)?;
        Ok(table)
    }

    #[test]
    fn test_columns() -> Result<()> {
        let table = table()?;
        assert_eq!(
            table.column_names(),
            vec!["seqno@hdr", "status@hdr", "body.offset", "body.length", "obsvalue@hdr"]
        );
        assert_eq!(table.column("seqno")?.full_name(), "seqno@hdr");
        assert_eq!(table.column("body.length")?.index, 3);
        assert!(table.column("body.length")?.link);
        assert!(matches!(table.column("nothing"), Err(Error::User(_))));
        assert_eq!(table.has_column("obsvalue")?, Some("obsvalue@hdr".to_string()));
        assert_eq!(table.has_column("nothing")?, None);
        assert_eq!(table.bit_column_names("status")?, vec!["active", "level"]);
        Ok(())
    }

    #[test]
    fn test_bit_columns() -> Result<()> {
        let table = table()?;
        let level = table.column("status.level")?;
        let view = level.view.clone().ok_or(Error::Internal("not a view".into()))?;
        assert_eq!((view.mask, view.shift), (0b1110, 1));
        assert_eq!(level.full_name(), "status.level@hdr");
        assert_eq!(table.column("status.level@hdr")?.id, level.id);

        // resolved lazily through the qualified parent name
        let lazy = table.column("status@hdr.active")?;
        assert_eq!(lazy.view.as_ref().map(|v| v.mask), Some(1));
        assert_eq!(lazy.full_name(), "status.active@hdr");
        assert!(table.column("status.unknown").is_err());
        Ok(())
    }

    #[test]
    fn test_ambiguous() -> Result<()> {
        let types = Arc::new(TypeRegistry::new());
        let mut table = Table::new("db", "", "t", types.clone(), Box::new(MemoryTable::new(vec![1, 1])));
        table.add_column("x@a", 0, types.lookup("real")?, false, 0.0, None)?;
        table.add_column("x@b", 1, types.lookup("real")?, false, 0.0, None)?;
        assert!(matches!(table.has_column("x"), Err(Error::User(_))));
        assert!(table.column("x@b").is_ok());
        Ok(())
    }

    #[test]
    fn test_links() -> Result<()> {
        let mut db = Database::new("db");
        for name in ["a", "b", "c"] {
            let table = db.new_table(name, "", Box::new(MemoryTable::new(vec![])));
            db.add_table(table);
        }
        db.link("a", "b")?;
        db.link("b", "c")?;
        db.link("c", "a")?;
        let a = db.table("a")?;
        assert!(a.has_link_to("b"));
        assert!(db.table("b")?.has_link_from("a"));
        assert!(a.is_parent_of("c", &db));
        assert!(!db.table("b")?.is_parent_of("d", &db));
        Ok(())
    }

    #[test]
    fn test_display() -> Result<()> {
        let text = table()?.to_string();
        assert!(text.starts_with("CREATE TABLE db.hdr AS (\n"));
        assert!(text.contains("\tobsvalue@hdr real,\n"));
        Ok(())
    }
}
