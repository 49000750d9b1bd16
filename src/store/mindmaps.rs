use anyhow::Result;
use parking_lot::RwLock;
use std::path::Path;
use uuid::Uuid;

use super::JsonFile;
use crate::models::MindMap;

/// Mind maps mirrored to `mindmaps.json`.
pub struct MindMapStore {
    file: JsonFile,
    maps: RwLock<Vec<MindMap>>,
}

impl MindMapStore {
    pub fn open(path: &Path) -> Result<Self> {
        let file = JsonFile::new(path);
        let maps = file.load()?;
        Ok(Self {
            file,
            maps: RwLock::new(maps),
        })
    }

    /// All mind maps, newest first.
    pub fn list(&self) -> Vec<MindMap> {
        let mut maps = self.maps.read().clone();
        maps.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        maps
    }

    pub fn get(&self, id: Uuid) -> Option<MindMap> {
        self.maps.read().iter().find(|m| m.id == id).cloned()
    }

    /// The most recent single-document map for `document_id`, if any.
    pub fn latest_for_document(&self, document_id: Uuid) -> Option<MindMap> {
        self.maps
            .read()
            .iter()
            .filter(|m| m.document_ids == [document_id])
            .max_by_key(|m| m.created_at)
            .cloned()
    }

    pub fn insert(&self, map: MindMap) -> Result<()> {
        let mut maps = self.maps.write();
        let mut next = maps.clone();
        next.push(map);
        self.file.replace(&mut maps, next)
    }

    /// Insert `map` in place of any earlier map built from exactly the same
    /// single document.
    pub fn replace_document_map(&self, map: MindMap) -> Result<()> {
        let mut maps = self.maps.write();
        let mut next: Vec<MindMap> = match map.document_ids.as_slice() {
            [document_id] => maps
                .iter()
                .filter(|m| m.document_ids != [*document_id])
                .cloned()
                .collect(),
            _ => maps.clone(),
        };
        next.push(map);
        self.file.replace(&mut maps, next)
    }

    pub fn delete(&self, id: Uuid) -> Result<bool> {
        let mut maps = self.maps.write();
        let next: Vec<MindMap> = maps.iter().filter(|m| m.id != id).cloned().collect();
        if next.len() == maps.len() {
            return Ok(false);
        }
        self.file.replace(&mut maps, next)?;
        Ok(true)
    }

    /// Drop every map built from `document_id`. Returns how many were removed.
    pub fn delete_for_document(&self, document_id: Uuid) -> Result<usize> {
        let mut maps = self.maps.write();
        let next: Vec<MindMap> = maps
            .iter()
            .filter(|m| !m.document_ids.contains(&document_id))
            .cloned()
            .collect();
        let removed = maps.len() - next.len();
        if removed > 0 {
            self.file.replace(&mut maps, next)?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ConceptGraph, ConceptNode};
    use chrono::Utc;

    fn map(document_ids: Vec<Uuid>) -> MindMap {
        MindMap {
            id: Uuid::new_v4(),
            document_ids,
            title: "map".into(),
            graph: ConceptGraph {
                nodes: vec![ConceptNode::new("a", "A")],
                edges: vec![],
            },
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mindmaps.json");
        let store = MindMapStore::open(&path).unwrap();
        let m = map(vec![Uuid::new_v4()]);
        store.insert(m.clone()).unwrap();

        let reopened = MindMapStore::open(&path).unwrap();
        assert_eq!(reopened.get(m.id), Some(m));
    }

    #[test]
    fn test_delete_for_document_removes_sets_containing_it() {
        let dir = tempfile::tempdir().unwrap();
        let store = MindMapStore::open(&dir.path().join("mindmaps.json")).unwrap();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        store.insert(map(vec![a])).unwrap();
        store.insert(map(vec![a, b])).unwrap();
        store.insert(map(vec![b])).unwrap();

        assert_eq!(store.delete_for_document(a).unwrap(), 2);
        let remaining = store.list();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].document_ids, vec![b]);
    }

    #[test]
    fn test_latest_for_document_ignores_multi_document_maps() {
        let dir = tempfile::tempdir().unwrap();
        let store = MindMapStore::open(&dir.path().join("mindmaps.json")).unwrap();
        let a = Uuid::new_v4();
        store.insert(map(vec![a, Uuid::new_v4()])).unwrap();
        assert!(store.latest_for_document(a).is_none());

        let single = map(vec![a]);
        store.insert(single.clone()).unwrap();
        assert_eq!(store.latest_for_document(a).unwrap().id, single.id);
    }

    #[test]
    fn test_replace_document_map_keeps_one_per_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = MindMapStore::open(&dir.path().join("mindmaps.json")).unwrap();
        let a = Uuid::new_v4();
        store.insert(map(vec![a, Uuid::new_v4()])).unwrap();
        store.replace_document_map(map(vec![a])).unwrap();
        let newest = map(vec![a]);
        store.replace_document_map(newest.clone()).unwrap();

        assert_eq!(store.list().len(), 2);
        assert_eq!(store.latest_for_document(a).unwrap().id, newest.id);
    }

    #[test]
    fn test_failed_save_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mindmaps.json");
        let store = MindMapStore::open(&path).unwrap();
        let a = Uuid::new_v4();
        let kept = map(vec![a]);
        store.insert(kept.clone()).unwrap();

        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        assert!(store.insert(map(vec![Uuid::new_v4()])).is_err());
        assert!(store.replace_document_map(map(vec![a])).is_err());
        assert!(store.delete_for_document(a).is_err());
        assert_eq!(store.list(), vec![kept]);
    }
}
