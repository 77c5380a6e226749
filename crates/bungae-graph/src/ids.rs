//! Session-scoped module-id allocation.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

/// Injective path -> integer map, allocated in first-seen order.
///
/// Ids are session-scoped: the allocator lives as long as its build session,
/// is reused across deltas, and never reassigns an id to a different path.
/// The id a client registered for a module therefore stays valid for the
/// whole session, including in `deleted` lists after the path is gone.
#[derive(Debug, Default, Clone)]
pub struct IdAllocator {
    ids: FxHashMap<PathBuf, u32>,
    paths: Vec<PathBuf>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the next unused integer to a previously unseen path.
    pub fn get_or_assign(&mut self, path: &Path) -> u32 {
        if let Some(id) = self.ids.get(path) {
            return *id;
        }
        let id = self.paths.len() as u32;
        self.ids.insert(path.to_path_buf(), id);
        self.paths.push(path.to_path_buf());
        id
    }

    /// Walk an ordered module sequence, assigning ids in sequence order.
    pub fn assign_all(&mut self, order: &[PathBuf]) {
        for path in order {
            self.get_or_assign(path);
        }
    }

    pub fn id_for(&self, path: &Path) -> Option<u32> {
        self.ids.get(path).copied()
    }

    pub fn path_for(&self, id: u32) -> Option<&Path> {
        self.paths.get(id as usize).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_seen_order() {
        let mut ids = IdAllocator::new();
        assert_eq!(ids.get_or_assign(Path::new("/foo")), 0);
        assert_eq!(ids.get_or_assign(Path::new("/bar")), 1);
        assert_eq!(ids.get_or_assign(Path::new("/foo")), 0);
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn test_stability_across_reassignment_rounds() {
        let mut ids = IdAllocator::new();
        ids.assign_all(&[PathBuf::from("/a"), PathBuf::from("/b")]);

        // A later round with a different order must not move existing ids.
        ids.assign_all(&[PathBuf::from("/c"), PathBuf::from("/a"), PathBuf::from("/b")]);
        assert_eq!(ids.id_for(Path::new("/a")), Some(0));
        assert_eq!(ids.id_for(Path::new("/b")), Some(1));
        assert_eq!(ids.id_for(Path::new("/c")), Some(2));
    }

    #[test]
    fn test_reverse_lookup() {
        let mut ids = IdAllocator::new();
        ids.get_or_assign(Path::new("/a"));
        ids.get_or_assign(Path::new("/b"));
        assert_eq!(ids.path_for(0), Some(Path::new("/a")));
        assert_eq!(ids.path_for(1), Some(Path::new("/b")));
        assert_eq!(ids.path_for(2), None);
    }
}
