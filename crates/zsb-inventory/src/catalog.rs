use super::*;
use std::collections::HashMap;

/// Immutable item-definition lookup, seeded once at startup.
pub struct Catalog {
    defs: HashMap<String, ItemDef>,
}

impl Catalog {
    pub fn new(defs: Vec<ItemDef>) -> Self {
        Self {
            defs: defs.into_iter().map(|d| (d.id.clone(), d)).collect(),
        }
    }
    pub fn def(&self, id: &str) -> Option<&ItemDef> {
        self.defs.get(id)
    }
    pub fn defs(&self) -> impl Iterator<Item = &ItemDef> {
        self.defs.values()
    }
    pub fn len(&self) -> usize {
        self.defs.len()
    }
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}
