//! Compact tracking of which children require unpack.
//!
//! [`UnpackInfo`] holds up to 31 child indices (each at most 255) in a
//! fixed inline array, or the sentinel state "unpack all". Insert and
//! remove renumber the stored indices so the set stays valid while
//! children move around underneath it.

use marlin_types::DocId;

use crate::search_iterator::SearchIteratorBox;

const MAX_SIZE: usize = 31;
const MAX_INDEX: usize = 255;

/// Set of child indices that need unpack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnpackInfo {
    size: u8,
    unpack: [u8; MAX_SIZE],
}

impl Default for UnpackInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl UnpackInfo {
    #[must_use]
    pub fn new() -> Self {
        Self {
            size: 0,
            unpack: [0; MAX_SIZE],
        }
    }

    /// Add an index to unpack. Does not renumber existing indices.
    /// Overflowing capacity or index range degrades to unpack-all.
    pub fn add(&mut self, index: usize) -> &mut Self {
        if index <= MAX_INDEX && (self.size as usize) < MAX_SIZE {
            self.unpack[self.size as usize] = index as u8;
            self.size += 1;
            self.unpack[..self.size as usize].sort_unstable();
        } else {
            self.force_all();
        }
        self
    }

    /// Account for a child inserted at `index`: stored indices at or
    /// beyond it shift up; when `unpack` is set the new index is added.
    pub fn insert(&mut self, index: usize, unpack: bool) -> &mut Self {
        if self.unpack_all() {
            return self;
        }
        for slot in 0..self.size as usize {
            if (self.unpack[slot] as usize) >= index {
                if self.unpack[slot] as usize == MAX_INDEX {
                    self.force_all();
                    return self;
                }
                self.unpack[slot] += 1;
            }
        }
        if unpack {
            self.add(index);
        }
        self
    }

    /// Account for a child removed at `index`: its entry is dropped and
    /// stored indices beyond it shift down.
    pub fn remove(&mut self, index: usize) -> &mut Self {
        if self.unpack_all() {
            return self;
        }
        let mut wp = 0;
        let mut found = false;
        for rp in 0..self.size as usize {
            let value = self.unpack[rp] as usize;
            if value == index {
                found = true;
            } else if value > index {
                self.unpack[wp] = (value - 1) as u8;
                wp += 1;
            } else {
                self.unpack[wp] = value as u8;
                wp += 1;
            }
        }
        if found {
            self.size -= 1;
        }
        debug_assert_eq!(wp, self.size as usize);
        self
    }

    pub fn force_all(&mut self) -> &mut Self {
        self.size = (MAX_SIZE + 1) as u8;
        self
    }

    #[must_use]
    pub fn unpack_all(&self) -> bool {
        (self.size as usize) > MAX_SIZE
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[must_use]
    pub fn need_unpack(&self, index: usize) -> bool {
        if self.unpack_all() {
            return true;
        }
        self.unpack[..self.size as usize]
            .iter()
            .any(|&stored| stored as usize == index)
    }

    /// Apply `f` to every active index; `n` bounds the iteration in the
    /// unpack-all state.
    pub fn each(&self, n: usize, mut f: impl FnMut(usize)) {
        if self.unpack_all() {
            for i in 0..n {
                f(i);
            }
        } else {
            for &index in &self.unpack[..self.size as usize] {
                f(index as usize);
            }
        }
    }
}

impl std::fmt::Display for UnpackInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.unpack_all() {
            write!(f, "full-unpack")
        } else if self.is_empty() {
            write!(f, "no-unpack")
        } else {
            for (i, &index) in self.unpack[..self.size as usize].iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{index}")?;
            }
            Ok(())
        }
    }
}

/// Unpack dispatch chosen at plan time: everything, nothing, or a
/// selected subset of children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnpackPolicy {
    All,
    None,
    Selective(UnpackInfo),
}

impl UnpackPolicy {
    /// Pick the cheapest dispatch for the given info.
    #[must_use]
    pub fn from_info(info: UnpackInfo) -> Self {
        if info.unpack_all() {
            Self::All
        } else if info.is_empty() {
            Self::None
        } else {
            Self::Selective(info)
        }
    }

    #[must_use]
    pub fn need_unpack(&self, index: usize) -> bool {
        match self {
            Self::All => true,
            Self::None => false,
            Self::Selective(info) => info.need_unpack(index),
        }
    }

    pub fn on_insert(&mut self, index: usize) {
        if let Self::Selective(info) = self {
            info.insert(index, true);
        }
    }

    pub fn on_remove(&mut self, index: usize) {
        if let Self::Selective(info) = self {
            info.remove(index);
        }
    }

    /// Apply `f` to every child index this policy unpacks.
    pub fn each(&self, n: usize, f: impl FnMut(usize)) {
        match self {
            Self::All => {
                let mut f = f;
                for i in 0..n {
                    f(i);
                }
            }
            Self::None => {}
            Self::Selective(info) => info.each(n, f),
        }
    }

    /// Seek-then-unpack every selected child sitting on `doc_id`. The
    /// seek step lets lazily positioned children (e.g. under a strict
    /// OR) catch up before they are asked for match data.
    pub fn unpack_children(
        &self,
        children: &mut [SearchIteratorBox],
        doc_id: DocId,
    ) {
        self.each(children.len(), |i| {
            let child = &mut children[i];
            if child.doc_id() < doc_id {
                child.do_seek(doc_id);
            }
            if child.doc_id() == doc_id {
                child.do_unpack(doc_id);
            }
        });
    }

    /// Unpack every selected child directly. Valid when the caller
    /// knows all children are positioned at `doc_id` (AND after a hit).
    pub fn unpack_children_direct(
        &self,
        children: &mut [SearchIteratorBox],
        doc_id: DocId,
    ) {
        self.each(children.len(), |i| children[i].do_unpack(doc_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_keeps_indices_sorted() {
        let mut info = UnpackInfo::new();
        info.add(9).add(2).add(5);
        assert!(info.need_unpack(2));
        assert!(info.need_unpack(5));
        assert!(info.need_unpack(9));
        assert!(!info.need_unpack(3));
        assert_eq!(info.to_string(), "2 5 9");
    }

    #[test]
    fn insert_renumbers_existing() {
        let mut info = UnpackInfo::new();
        info.add(1).add(3);
        info.insert(2, true);
        assert!(info.need_unpack(1));
        assert!(info.need_unpack(2));
        assert!(info.need_unpack(4));
        assert!(!info.need_unpack(3));
    }

    #[test]
    fn insert_without_unpack_only_shifts() {
        let mut info = UnpackInfo::new();
        info.add(1).add(3);
        info.insert(0, false);
        assert!(!info.need_unpack(0));
        assert!(info.need_unpack(2));
        assert!(info.need_unpack(4));
    }

    #[test]
    fn remove_renumbers_and_drops() {
        let mut info = UnpackInfo::new();
        info.add(1).add(3).add(5);
        info.remove(3);
        assert!(info.need_unpack(1));
        assert!(info.need_unpack(4));
        assert!(!info.need_unpack(3));
        info.remove(0);
        assert!(info.need_unpack(0));
        assert!(info.need_unpack(3));
    }

    #[test]
    fn capacity_overflow_forces_all() {
        let mut info = UnpackInfo::new();
        for i in 0..32 {
            info.add(i);
        }
        assert!(info.unpack_all());
        assert!(info.need_unpack(1000));
        assert_eq!(info.to_string(), "full-unpack");
    }

    #[test]
    fn index_overflow_forces_all() {
        let mut info = UnpackInfo::new();
        info.add(256);
        assert!(info.unpack_all());

        let mut info = UnpackInfo::new();
        info.add(255);
        info.insert(0, false);
        assert!(info.unpack_all());
    }

    #[test]
    fn each_visits_active_indices() {
        let mut info = UnpackInfo::new();
        info.add(0).add(4);
        let mut seen = Vec::new();
        info.each(8, |i| seen.push(i));
        assert_eq!(seen, vec![0, 4]);

        info.force_all();
        seen.clear();
        info.each(3, |i| seen.push(i));
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[test]
    fn policy_from_info_picks_variant() {
        assert_eq!(UnpackPolicy::from_info(UnpackInfo::new()), UnpackPolicy::None);
        let mut all = UnpackInfo::new();
        all.force_all();
        assert_eq!(UnpackPolicy::from_info(all), UnpackPolicy::All);
        let mut some = UnpackInfo::new();
        some.add(1);
        assert!(matches!(
            UnpackPolicy::from_info(some),
            UnpackPolicy::Selective(_)
        ));
    }
}
