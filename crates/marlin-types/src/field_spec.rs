//! Field specifications.
//!
//! A field spec is the address of per-term match data: the searched
//! field id, the handle of the scratch row the iterator writes into,
//! and whether the field is evaluated as a filter (no position data
//! wanted).

use smallvec::SmallVec;

use crate::match_data::TermFieldHandle;

/// The handle/field binding carried by blueprints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpecBase {
    field_id: u32,
    handle: TermFieldHandle,
    filter: bool,
}

impl FieldSpecBase {
    #[must_use]
    pub fn new(field_id: u32, handle: TermFieldHandle, filter: bool) -> Self {
        Self {
            field_id,
            handle,
            filter,
        }
    }

    #[must_use]
    pub fn field_id(&self) -> u32 {
        self.field_id
    }

    #[must_use]
    pub fn handle(&self) -> TermFieldHandle {
        self.handle
    }

    #[must_use]
    pub fn is_filter(&self) -> bool {
        self.filter
    }
}

/// A field spec with the field name attached, used where blueprints are
/// created from a query tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    name: String,
    base: FieldSpecBase,
}

impl FieldSpec {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        field_id: u32,
        handle: TermFieldHandle,
        filter: bool,
    ) -> Self {
        Self {
            name: name.into(),
            base: FieldSpecBase::new(field_id, handle, filter),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn base(&self) -> FieldSpecBase {
        self.base
    }

    #[must_use]
    pub fn field_id(&self) -> u32 {
        self.base.field_id()
    }

    #[must_use]
    pub fn handle(&self) -> TermFieldHandle {
        self.base.handle()
    }

    #[must_use]
    pub fn is_filter(&self) -> bool {
        self.base.is_filter()
    }

    /// Same field, different filter flag.
    #[must_use]
    pub fn with_filter(&self, filter: bool) -> Self {
        Self {
            name: self.name.clone(),
            base: FieldSpecBase::new(self.base.field_id(), self.base.handle(), filter),
        }
    }
}

/// Short inline list of field spec bases. Most terms search one field.
pub type FieldSpecBaseList = SmallVec<[FieldSpecBase; 4]>;

/// A list of named field specs, used by the multi-field searchable
/// entry point.
#[derive(Debug, Clone, Default)]
pub struct FieldSpecList {
    specs: Vec<FieldSpec>,
}

impl FieldSpecList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, spec: FieldSpec) -> &mut Self {
        self.specs.push(spec);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    #[must_use]
    pub fn get(&self, idx: usize) -> &FieldSpec {
        &self.specs[idx]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldSpec> {
        self.specs.iter()
    }
}

impl<'a> IntoIterator for &'a FieldSpecList {
    type Item = &'a FieldSpec;
    type IntoIter = std::slice::Iter<'a, FieldSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.specs.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_spec_roundtrip() {
        let spec = FieldSpec::new("title", 3, 7, false);
        assert_eq!(spec.name(), "title");
        assert_eq!(spec.field_id(), 3);
        assert_eq!(spec.handle(), 7);
        assert!(!spec.is_filter());
        assert!(spec.with_filter(true).is_filter());
    }

    #[test]
    fn base_list_is_inline_for_small_sizes() {
        let mut list = FieldSpecBaseList::new();
        for i in 0..4 {
            list.push(FieldSpecBase::new(i, i, false));
        }
        assert!(!list.spilled());
    }
}
