use std::collections::HashMap;

use adsnap_core::error::FormatError;
use adsnap_core::types::SyntaxKind;
use tracing::warn;

/// One attribute from the snapshot's schema section. The id is the dense
/// index of the record in that section and is what object records refer to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDef {
    pub id: u32,
    pub name: String,
    pub syntax: SyntaxKind,
    pub single_valued: bool,
    pub schema_dn: String,
    pub schema_guid: String,
    pub security_guid: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDef {
    pub id: u32,
    pub name: String,
    pub schema_guid: String,
}

/// Immutable attribute/class catalogs plus the DN prefix table. Built once
/// by the snapshot reader; lookups never mutate.
#[derive(Debug)]
pub struct Schema {
    attributes: Vec<AttributeDef>,
    classes: Vec<ClassDef>,
    by_name: HashMap<String, u32>,
    prefixes: Vec<String>,
}

impl Schema {
    pub(crate) fn new(
        attributes: Vec<AttributeDef>,
        classes: Vec<ClassDef>,
        prefixes: Vec<String>,
    ) -> Self {
        let mut by_name = HashMap::with_capacity(attributes.len());
        for attr in &attributes {
            let key = attr.name.to_ascii_lowercase();
            if by_name.contains_key(&key) {
                // First definition wins for name lookups.
                warn!(attribute = %attr.name, id = attr.id, "duplicate attribute name in schema");
                continue;
            }
            by_name.insert(key, attr.id);
        }
        Self {
            attributes,
            classes,
            by_name,
            prefixes,
        }
    }

    pub fn attribute_by_id(&self, id: u32) -> Option<&AttributeDef> {
        self.attributes.get(id as usize)
    }

    /// Case-insensitive lookup; LDAP attribute descriptions are ASCII.
    pub fn attribute_by_name(&self, name: &str) -> Option<&AttributeDef> {
        let id = *self.by_name.get(&name.to_ascii_lowercase())?;
        self.attribute_by_id(id)
    }

    pub fn class_by_id(&self, id: u32) -> Option<&ClassDef> {
        self.classes.get(id as usize)
    }

    pub fn attributes(&self) -> &[AttributeDef] {
        &self.attributes
    }

    pub fn classes(&self) -> &[ClassDef] {
        &self.classes
    }

    pub fn prefix_count(&self) -> u32 {
        self.prefixes.len() as u32
    }

    /// Full DN for a stored `(prefix_id, suffix)` pair.
    pub fn resolve_dn(&self, prefix_id: u32, suffix: &str) -> Result<String, FormatError> {
        let prefix = self.prefixes.get(prefix_id as usize).ok_or({
            FormatError::InvalidPrefixId {
                id: prefix_id,
                count: self.prefixes.len() as u32,
            }
        })?;
        let mut dn = String::with_capacity(prefix.len() + suffix.len());
        dn.push_str(prefix);
        dn.push_str(suffix);
        Ok(dn)
    }
}
