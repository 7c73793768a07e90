//! Metadata for nodes parked outside the owned tree
//!
//! The arena nodes themselves live in `ast::OpaqueStore`; this table keeps the
//! lifetime-free facts the rewriter needs about them, keyed by the same index.

use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpaqueId(pub u32);

impl OpaqueId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpaqueKind {
    /// Literal with a statically known truthiness, when there is one
    Literal { truthy: Option<bool> },
    /// Numeric literal
    Number(f64),
    /// Function or arrow expression
    Function,
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpaqueInfo {
    pub kind: OpaqueKind,
    /// Identifiers read or written anywhere inside, nested functions included
    pub references: HashSet<String>,
    /// Identifiers that appear inside assignment or update targets
    pub assigned: HashSet<String>,
    /// Identifiers referenced from inside a nested function or arrow
    pub captured: HashSet<String>,
    /// Name for a temporary holding this expression, e.g. `items$push`
    pub hint: Option<String>,
}

impl OpaqueInfo {
    pub fn new(kind: OpaqueKind) -> Self {
        Self {
            kind,
            references: HashSet::new(),
            assigned: HashSet::new(),
            captured: HashSet::new(),
            hint: None,
        }
    }

    /// Evaluating the node has no side effects and always yields the same value
    pub fn is_constant(&self) -> bool {
        matches!(
            self.kind,
            OpaqueKind::Literal { .. } | OpaqueKind::Number(_) | OpaqueKind::Function
        )
    }

    pub fn truthiness(&self) -> Option<bool> {
        match self.kind {
            OpaqueKind::Literal { truthy } => truthy,
            OpaqueKind::Number(value) => Some(value != 0.0 && !value.is_nan()),
            OpaqueKind::Function => Some(true),
            OpaqueKind::Other => None,
        }
    }
}

/// Facts about every opaque node of one function, indexed by [`OpaqueId`]
#[derive(Debug, Default, Clone)]
pub struct InfoTable {
    infos: Vec<OpaqueInfo>,
}

impl InfoTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, info: OpaqueInfo) -> OpaqueId {
        let id = OpaqueId(self.infos.len() as u32);
        self.infos.push(info);
        id
    }

    pub fn get(&self, id: OpaqueId) -> Option<&OpaqueInfo> {
        self.infos.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_follow_insertion_order() {
        let mut table = InfoTable::new();
        let a = table.push(OpaqueInfo::new(OpaqueKind::Other));
        let b = table.push(OpaqueInfo::new(OpaqueKind::Function));
        assert_eq!(a, OpaqueId(0));
        assert_eq!(b, OpaqueId(1));
        assert_eq!(table.get(b).map(|info| info.kind), Some(OpaqueKind::Function));
        assert!(table.get(OpaqueId(7)).is_none());
    }

    #[test]
    fn test_truthiness() {
        assert_eq!(OpaqueInfo::new(OpaqueKind::Number(0.0)).truthiness(), Some(false));
        assert_eq!(OpaqueInfo::new(OpaqueKind::Number(2.0)).truthiness(), Some(true));
        assert_eq!(OpaqueInfo::new(OpaqueKind::Other).truthiness(), None);
        assert!(OpaqueInfo::new(OpaqueKind::Literal { truthy: None }).is_constant());
    }
}
