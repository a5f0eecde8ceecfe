use crate::language::types::{Record, SizedType};
use std::collections::BTreeMap;

/// Record definitions known to one compilation, keyed by full name
/// (`struct task_struct`, `struct kprobe:f_args`).
#[derive(Clone, Debug, Default)]
pub struct StructRegistry {
    records: BTreeMap<String, Record>,
}

impl StructRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a definition. An unresolved record never replaces a
    /// resolved one of the same name.
    pub fn insert(&mut self, record: Record) {
        if !record.is_resolved() && self.is_resolved(&record.name) {
            return;
        }
        self.records.insert(record.name.clone(), record);
    }

    pub fn get(&self, name: &str) -> Option<&Record> {
        self.records.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    pub fn is_resolved(&self, name: &str) -> bool {
        self.get(name).is_some_and(Record::is_resolved)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Fills in the fields of every unresolved record reachable from `ty`
    /// (through pointers, arrays and tuples) from the registered definitions.
    pub fn complete(&self, ty: &mut SizedType) {
        match ty {
            SizedType::Record(record) if !record.is_resolved() => {
                if let Some(known) = self.get(&record.name) {
                    *record = known.clone();
                }
            }
            SizedType::Pointer(inner) => self.complete(inner),
            SizedType::Array { element, .. } => self.complete(element),
            SizedType::Tuple(elements) => elements.iter_mut().for_each(|elem| self.complete(elem)),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point() -> Record {
        Record::with_fields(
            "struct point",
            vec![("x".into(), SizedType::int(32)), ("y".into(), SizedType::int(32))],
        )
    }

    #[test]
    fn unresolved_forward_declaration_does_not_clobber() {
        let mut registry = StructRegistry::new();
        registry.insert(point());
        registry.insert(Record::named("struct point"));
        assert!(registry.is_resolved("struct point"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn complete_resolves_through_pointers() {
        let mut registry = StructRegistry::new();
        registry.insert(point());
        let mut ty = SizedType::record("point", 2);
        registry.complete(&mut ty);
        assert_eq!(
            ty.innermost_record().map(|r| r.fields.len()),
            Some(2)
        );
    }
}
