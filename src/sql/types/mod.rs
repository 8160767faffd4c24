use std::{
    cmp::Ordering,
    collections::BTreeMap,
    fmt::Display,
    sync::{Arc, RwLock},
};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    sql::output::ValueWriter,
};

/// Storage kind of a type, drives arithmetic and comparison coercion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Real,
    Integer,
    String,
    Bitmap,
    Blob,
    Double,
}

impl TypeKind {
    pub fn is_numeric(&self) -> bool {
        !matches!(self, TypeKind::String | TypeKind::Blob)
    }

    /// Kinds whose storage slot holds an integer when integers are not treated as doubles
    pub fn is_integral(&self) -> bool {
        matches!(self, TypeKind::Integer | TypeKind::Bitmap)
    }
}

/// Column alignment in text output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Right,
}

/// Names and widths (in bits) of the fields packed into a bitfield column
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BitfieldDef {
    pub fields: Vec<String>,
    pub sizes: Vec<u32>,
}

impl BitfieldDef {
    pub fn new(fields: Vec<String>, sizes: Vec<u32>) -> Result<Self> {
        if fields.len() != sizes.len() {
            return Err(Error::User(format!(
                "bitfield has {} field names but {} sizes",
                fields.len(),
                sizes.len()
            )));
        }
        if sizes.iter().sum::<u32>() > 64 {
            return Err(Error::User("bitfield is wider than 64 bits".into()));
        }
        Ok(Self { fields, sizes })
    }

    /// Mask and shift of one field, derived from the cumulative sizes of the fields before it
    pub fn field_mask(&self, field: &str) -> Option<(u64, u32)> {
        let mut shift = 0;
        for (name, size) in self.fields.iter().zip(&self.sizes) {
            if name == field {
                let bits = if *size >= 64 { u64::MAX } else { (1u64 << size) - 1 };
                return Some((bits << shift, shift));
            }
            shift += size;
        }
        None
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    /// Canonical signature, e.g. `status[active:1;passive:2]`
    pub fn signature(&self, name: &str) -> String {
        let fields: Vec<String> = self
            .fields
            .iter()
            .zip(&self.sizes)
            .map(|(f, s)| format!("{}:{}", f, s))
            .collect();
        format!("{}[{}]", name, fields.join(";"))
    }
}

/// Type specific representation
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRepr {
    Plain,
    Bitfield(BitfieldDef),
    /// One field of a bitfield
    Bit { field: String, mask: u64, shift: u32 },
}

/// Immutable scalar type descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct SqlType {
    pub name: String,
    /// Storage width in 8-byte units
    pub size: usize,
    pub kind: TypeKind,
    /// Display width
    pub width: usize,
    pub alignment: Alignment,
    pub repr: TypeRepr,
}

pub type TypeRef = Arc<SqlType>;

impl SqlType {
    pub fn new(name: &str, size: usize, kind: TypeKind) -> Self {
        let (width, alignment) = match kind {
            TypeKind::Integer => (11, Alignment::Right),
            TypeKind::Real | TypeKind::Double => (15, Alignment::Right),
            TypeKind::Bitmap => (11, Alignment::Right),
            TypeKind::String | TypeKind::Blob => (8 * size + 2, Alignment::Left),
        };
        Self {
            name: name.to_string(),
            size,
            kind,
            width,
            alignment,
            repr: TypeRepr::Plain,
        }
    }

    pub fn is_bitfield(&self) -> bool {
        matches!(self.repr, TypeRepr::Bitfield(_))
    }

    pub fn bitfield(&self) -> Option<&BitfieldDef> {
        match &self.repr {
            TypeRepr::Bitfield(def) => Some(def),
            _ => None,
        }
    }

    /// Materializes a raw slot value according to this type's kind
    pub fn value(&self, x: Option<f64>) -> Value {
        match x {
            None => Value::Null,
            Some(x) => match self.kind {
                TypeKind::Integer => Value::Integer(x as i64),
                TypeKind::Real => Value::Real(x),
                TypeKind::Double => Value::Double(x),
                TypeKind::Bitmap => Value::Bitfield(x as u64),
                TypeKind::String | TypeKind::Blob => Value::String(unpack_string(&[x])),
            },
        }
    }
}

impl Display for SqlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Registry of named types
///
/// Append-only: bitfield types and their per-field bit types are registered
/// on first use and stay for the registry's lifetime.
#[derive(Debug)]
pub struct TypeRegistry {
    types: RwLock<BTreeMap<String, TypeRef>>,
}

pub const LINK_TYPE: &str = "@LINK";

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        let mut types = BTreeMap::new();
        for ty in [
            SqlType::new("integer", 1, TypeKind::Integer),
            SqlType::new("real", 1, TypeKind::Real),
            SqlType::new("double", 1, TypeKind::Double),
            SqlType::new("string", 1, TypeKind::String),
            SqlType::new("blob", 1, TypeKind::Blob),
            SqlType::new(LINK_TYPE, 2, TypeKind::Integer),
        ] {
            types.insert(ty.name.clone(), Arc::new(ty));
        }
        let mut bitfield = SqlType::new("bitfield", 1, TypeKind::Bitmap);
        bitfield.repr = TypeRepr::Bitfield(BitfieldDef::default());
        types.insert(bitfield.name.clone(), Arc::new(bitfield));
        Self {
            types: RwLock::new(types),
        }
    }

    /// Returns the named type, failing if it was never registered
    pub fn lookup(&self, name: &str) -> Result<TypeRef> {
        self.types
            .read()?
            .get(name)
            .cloned()
            .ok_or(Error::SeriousBug(format!("type {} not defined", name)))
    }

    pub fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.types.read()?.contains_key(name))
    }

    /// Resolves a type of a given storage size; strings wider than one
    /// double get a canonical `string(<bytes>)` type
    pub fn lookup_sized(&self, name: &str, size: usize) -> Result<TypeRef> {
        let base = self.lookup(name)?;
        if base.size == size || size == 0 {
            return Ok(base);
        }
        if base.kind != TypeKind::String {
            return Err(Error::SeriousBug(format!(
                "type {} has size {}, not {}",
                name, base.size, size
            )));
        }
        let canonical = format!("{}({})", name, size * 8);
        if let Some(ty) = self.types.read()?.get(&canonical) {
            return Ok(ty.clone());
        }
        self.register(SqlType::new(&canonical, size, TypeKind::String))
    }

    /// Inserts or overwrites a type
    pub fn register(&self, ty: SqlType) -> Result<TypeRef> {
        let ty = Arc::new(ty);
        self.types.write()?.insert(ty.name.clone(), ty.clone());
        Ok(ty)
    }

    /// Registers a bitfield type under its canonical signature, once.
    /// The optional alias points at the same descriptor.
    pub fn make_bitfield(&self, name: &str, def: BitfieldDef, alias: Option<&str>) -> Result<TypeRef> {
        let signature = def.signature(name);
        let mut types = self.types.write()?;
        let ty = match types.get(&signature) {
            Some(ty) => ty.clone(),
            None => {
                let mut ty = SqlType::new(&signature, 1, TypeKind::Bitmap);
                ty.repr = TypeRepr::Bitfield(def);
                let ty = Arc::new(ty);
                types.insert(signature.clone(), ty.clone());
                ty
            }
        };
        if let Some(alias) = alias {
            types.entry(alias.to_string()).or_insert_with(|| ty.clone());
        }
        Ok(ty)
    }

    /// Resolves `column.field` against a bitfield type: the bare column name
    /// resolves to the bitfield itself, a field name to its memoized bit type
    pub fn sub_type(&self, ty: &TypeRef, qualified_name: &str) -> Result<TypeRef> {
        let def = match &ty.repr {
            TypeRepr::Bitfield(def) => def,
            _ => return Ok(ty.clone()),
        };
        let bare = qualified_name.split('@').next().unwrap_or(qualified_name);
        let field = match bare.split_once('.') {
            Some((_, field)) => field,
            None => return Ok(ty.clone()),
        };
        let (mask, shift) = def.field_mask(field).ok_or(Error::User(format!(
            "bitfield {} has no field {}",
            ty.name, field
        )))?;

        let name = format!("{}.{}", ty.name, field);
        if let Some(bit) = self.types.read()?.get(&name) {
            return Ok(bit.clone());
        }
        let mut bit = SqlType::new(&name, 1, TypeKind::Integer);
        bit.repr = TypeRepr::Bit {
            field: field.to_string(),
            mask,
            shift,
        };
        let bit = Arc::new(bit);
        self.types.write()?.entry(name).or_insert_with(|| bit.clone());
        Ok(bit)
    }
}

/// Packs a string into `size` doubles, 8 bytes each, NUL padded
pub fn pack_string(s: &str, size: usize) -> Vec<f64> {
    let mut bytes = s.as_bytes().to_vec();
    bytes.resize(size * 8, 0);
    bytes
        .chunks(8)
        .map(|chunk| {
            let mut word = [0u8; 8];
            word.copy_from_slice(chunk);
            f64::from_le_bytes(word)
        })
        .collect()
}

/// Reverse of `pack_string`, trailing NULs are dropped
pub fn unpack_string(data: &[f64]) -> String {
    let bytes: Vec<u8> = data.iter().flat_map(|d| d.to_le_bytes()).collect();
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

const TRIMMED: &[char] = &[' ', '\t', '\n', '\x0b', '\x0c', '\r'];

/// Trims the whitespace set used by string comparisons
pub fn trim(s: &str) -> &str {
    s.trim_matches(TRIMMED)
}

/// Runtime value of one output cell
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Double(f64),
    String(String),
    Bitfield(u64),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Real(v) | Value::Double(v) => Some(*v),
            Value::Bitfield(v) => Some(*v as f64),
            Value::Null | Value::String(_) => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Double dispatch into a writer, by value kind
    pub fn output_to(&self, writer: &mut dyn ValueWriter) -> Result<()> {
        match self {
            Value::Null => writer.output_null(),
            Value::Integer(v) => writer.output_int(*v),
            Value::Real(v) => writer.output_real(*v),
            Value::Double(v) => writer.output_double(*v),
            Value::String(v) => writer.output_string(v),
            Value::Bitfield(v) => writer.output_bitfield(*v),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::String(_) => 2,
            _ => 1,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Real(v) | Value::Double(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "'{}'", v),
            Value::Bitfield(v) => write!(f, "{}", v),
        }
    }
}

/// Total order used by grouping, MATCH and ORDER BY: NULL first, then
/// numbers compared numerically, then strings compared trimmed
impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::String(a), Value::String(b)) => trim(a).cmp(trim(b)),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                _ => a.rank().cmp(&b.rank()),
            },
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

/// A row is a vector of values
pub type Row = Vec<Value>;
