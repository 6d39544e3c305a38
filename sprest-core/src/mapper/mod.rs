// Method tables: which methods and lazy properties an entity type exposes.

mod builtin;

use crate::error::SpRestError;
use crate::method::MethodDescriptor;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

pub use builtin::builtin_table;

/// Reserved key holding the property declarations of an entity type.
pub const PROPERTIES_KEY: &str = "properties";

/// Lookup from normalized entity-type name to what that type can do.
pub trait MethodTable: Send + Sync + fmt::Debug {
    fn lookup(&self, type_name: &str) -> Option<&EntityMethods>;
}

/// A lazy property accessor declared as `Name|ReturnType[|SubPath|SubType]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDecl {
    pub name: String,
    pub return_type: Option<String>,
    pub sub_path: Option<String>,
    pub sub_type: Option<String>,
}

impl PropertyDecl {
    pub fn parse(declaration: &str) -> Result<Self, SpRestError> {
        let parts: Vec<&str> = declaration.split('|').collect();
        if parts.is_empty() || parts.len() > 4 || parts[0].is_empty() {
            return Err(SpRestError::InvalidPropertyDeclaration(declaration.to_string()));
        }
        let part = |i: usize| {
            parts
                .get(i)
                .filter(|p| !p.is_empty())
                .map(|p| p.to_string())
        };

        Ok(Self {
            name: parts[0].to_string(),
            return_type: part(1),
            sub_path: part(2),
            sub_type: part(3),
        })
    }

    /// Sub-path and type to request, given an optional accessor argument.
    ///
    /// With an argument and a sub-path declaration, `[Name]` in the sub-path is replaced by the
    /// argument and the sub-type is used; otherwise the plain property is requested.
    pub fn resolve(&self, argument: Option<&str>) -> (String, Option<String>) {
        match (argument, &self.sub_path) {
            (Some(arg), Some(sub_path)) => (
                format!("{}{}", self.name, sub_path.replace("[Name]", arg)),
                self.sub_type.clone(),
            ),
            _ => (self.name.clone(), self.return_type.clone()),
        }
    }
}

impl FromStr for PropertyDecl {
    type Err = SpRestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PropertyDecl::parse(s)
    }
}

/// The methods and lazy properties of one entity type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityMethods {
    pub methods: IndexMap<String, MethodDescriptor>,
    pub properties: Vec<PropertyDecl>,
}

impl EntityMethods {
    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.get(name)
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDecl> {
        self.properties.iter().find(|p| p.name == name)
    }

    fn from_json(entity: &str, value: &Value) -> Result<Self, SpRestError> {
        let map = value.as_object().ok_or_else(|| {
            SpRestError::InvalidMethodTable(format!("entry '{}' is not an object", entity))
        })?;

        let mut out = EntityMethods::default();
        for (key, entry) in map {
            if key == PROPERTIES_KEY {
                let declarations: Vec<String> = serde_json::from_value(entry.clone())?;
                out.properties = declarations
                    .iter()
                    .map(|d| PropertyDecl::parse(d))
                    .collect::<Result<_, _>>()?;
            } else {
                let descriptor: MethodDescriptor = serde_json::from_value(entry.clone())?;
                out.methods.insert(key.clone(), descriptor);
            }
        }
        Ok(out)
    }
}

/// In-memory method table.
#[derive(Debug, Clone, Default)]
pub struct StaticMethodTable {
    entries: HashMap<String, EntityMethods>,
}

impl StaticMethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, type_name: impl Into<String>, methods: EntityMethods) {
        self.entries.insert(type_name.into().to_lowercase(), methods);
    }

    /// Merge `other` over this table, entry by entry.
    pub fn extend(&mut self, other: StaticMethodTable) {
        self.entries.extend(other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load a table shaped as `{ "<type>": { "properties": [...], "<method>": {...} } }`.
    pub fn from_json(json: &str) -> Result<Self, SpRestError> {
        let root: Value = serde_json::from_str(json)?;
        let entities = root
            .as_object()
            .ok_or_else(|| SpRestError::InvalidMethodTable("root is not an object".to_string()))?;

        let mut table = StaticMethodTable::new();
        for (name, value) in entities {
            table.insert(name.clone(), EntityMethods::from_json(name, value)?);
        }
        Ok(table)
    }
}

impl MethodTable for StaticMethodTable {
    fn lookup(&self, type_name: &str) -> Option<&EntityMethods> {
        self.entries.get(&type_name.to_lowercase())
    }
}

/// Normalize a metadata type (`SP.Data.TasksListItem`) or endpoint into a table key.
///
/// The last path and dotted segment is lower-cased, pluralized for collections, then field
/// subtypes fold into `field`/`fields`, item types into `listitem`, item collections into `items`.
pub fn normalize_type_name(raw: &str, is_collection: bool) -> String {
    let raw = raw.split('?').next().unwrap_or_default();
    let last = raw.rsplit('/').next().unwrap_or(raw);
    let last = last.rsplit('.').next().unwrap_or(last);
    let mut name = last.to_lowercase();
    if is_collection {
        name.push('s');
    }

    if (name.starts_with("field") || name.ends_with("field"))
        && name != "fieldlinks"
        && name != "fields"
    {
        if is_collection {
            "fields".to_string()
        } else {
            "field".to_string()
        }
    } else if name.ends_with("item") {
        "listitem".to_string()
    } else if name.ends_with("items") {
        "items".to_string()
    } else {
        name
    }
}
