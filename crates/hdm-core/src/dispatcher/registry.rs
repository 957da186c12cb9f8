//! Known files and the part→file back-association.
//!
//! Always used under the dispatcher's registry mutex; that mutex is the
//! critical section shared by submission, forgetting, resume and resizing.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use super::error::DispatchError;
use crate::file::{DownloadFile, FilePart, PartId};
use crate::state::PartState;

#[derive(Default)]
pub(super) struct Registry {
    files: Vec<Arc<DownloadFile>>,
    owners: HashMap<PartId, Arc<DownloadFile>>,
    /// Parts with a queued or running task.
    in_flight: HashSet<PartId>,
    /// Evicted parts whose worker has not handed the part back yet.
    suspending: HashSet<PartId>,
}

impl Registry {
    pub(super) fn files(&self) -> &[Arc<DownloadFile>] {
        &self.files
    }

    pub(super) fn by_locator(&self, locator: &str) -> Option<&Arc<DownloadFile>> {
        self.files.iter().find(|f| f.locator() == locator)
    }

    pub(super) fn by_output(&self, path: &Path) -> Option<&Arc<DownloadFile>> {
        self.files.iter().find(|f| f.output_path() == path)
    }

    pub(super) fn contains(&self, file: &Arc<DownloadFile>) -> bool {
        self.files.iter().any(|f| Arc::ptr_eq(f, file))
    }

    pub(super) fn insert(&mut self, file: Arc<DownloadFile>) {
        self.files.push(file);
    }

    /// Drops the file and every trace of its parts. False if it was not registered.
    pub(super) fn remove(&mut self, file: &Arc<DownloadFile>) -> bool {
        let before = self.files.len();
        self.files.retain(|f| !Arc::ptr_eq(f, file));
        if self.files.len() == before {
            return false;
        }
        for part in file.parts() {
            self.owners.remove(&part.id());
            self.in_flight.remove(&part.id());
            self.suspending.remove(&part.id());
        }
        true
    }

    pub(super) fn register_part(
        &mut self,
        file: &Arc<DownloadFile>,
        part: &FilePart,
    ) -> Result<(), DispatchError> {
        if !self.contains(file) {
            return Err(DispatchError::UnknownFile(file.locator().to_string()));
        }
        self.owners.insert(part.id(), Arc::clone(file));
        Ok(())
    }

    pub(super) fn owner(&self, part: PartId) -> Option<&Arc<DownloadFile>> {
        self.owners.get(&part)
    }

    /// Claims the single in-flight slot of a known part.
    pub(super) fn track(&mut self, part: PartId) -> Result<(), DispatchError> {
        let owner = self
            .owners
            .get(&part)
            .ok_or_else(|| DispatchError::UnknownFile(format!("{part:?}")))?;
        if !self.contains(owner) {
            return Err(DispatchError::UnknownFile(owner.locator().to_string()));
        }
        if !self.in_flight.insert(part) {
            return Err(DispatchError::PartAlreadyTracked(part));
        }
        Ok(())
    }

    pub(super) fn release(&mut self, part: PartId) -> bool {
        self.suspending.remove(&part);
        self.in_flight.remove(&part)
    }

    pub(super) fn mark_suspending(&mut self, part: PartId) {
        self.suspending.insert(part);
    }

    /// Running tasks that are already on their way out after an eviction.
    pub(super) fn suspending_count(&self) -> usize {
        self.suspending.len()
    }

    pub(super) fn is_tracked(&self, part: PartId) -> bool {
        self.in_flight.contains(&part)
    }

    /// Parts currently downloading, in file submission then part order.
    pub(super) fn downloading_parts(&self) -> Vec<Arc<FilePart>> {
        self.files
            .iter()
            .flat_map(|f| f.parts())
            .filter(|p| p.status() == PartState::Downloading)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::thread;

    fn file_with_part(reg: &mut Registry) -> (Arc<DownloadFile>, Arc<FilePart>) {
        let file = Arc::new(DownloadFile::new("http://h/a.bin", "/tmp/a.bin", 1));
        reg.insert(Arc::clone(&file));
        let part = file.add_part(FilePart::new(0, "http://h/a.bin", "/tmp/a.bin", 0, None, true));
        reg.register_part(&file, &part).unwrap();
        (file, part)
    }

    #[test]
    fn concurrent_track_admits_exactly_one() {
        let mut reg = Registry::default();
        let (_file, part) = file_with_part(&mut reg);
        let reg = Arc::new(Mutex::new(reg));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let reg = Arc::clone(&reg);
                let id = part.id();
                thread::spawn(move || reg.lock().unwrap().track(id))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| *e == DispatchError::PartAlreadyTracked(part.id())));
    }

    #[test]
    fn release_allows_tracking_again() {
        let mut reg = Registry::default();
        let (_file, part) = file_with_part(&mut reg);
        reg.track(part.id()).unwrap();
        assert!(reg.is_tracked(part.id()));
        assert!(reg.release(part.id()));
        assert!(!reg.release(part.id()));
        reg.track(part.id()).unwrap();
    }

    #[test]
    fn suspending_parts_clear_when_their_worker_returns() {
        let mut reg = Registry::default();
        let (file, part) = file_with_part(&mut reg);
        reg.track(part.id()).unwrap();
        reg.mark_suspending(part.id());
        assert_eq!(reg.suspending_count(), 1);
        reg.release(part.id());
        assert_eq!(reg.suspending_count(), 0);

        reg.track(part.id()).unwrap();
        reg.mark_suspending(part.id());
        assert!(reg.remove(&file));
        assert_eq!(reg.suspending_count(), 0);
    }

    #[test]
    fn forgotten_file_rejects_parts() {
        let mut reg = Registry::default();
        let (file, part) = file_with_part(&mut reg);
        assert!(reg.remove(&file));
        assert!(!reg.remove(&file));
        assert!(reg.owner(part.id()).is_none());
        assert!(matches!(reg.track(part.id()), Err(DispatchError::UnknownFile(_))));
        let late = FilePart::new(1, "http://h/a.bin", "/tmp/x", 0, None, true);
        assert!(matches!(reg.register_part(&file, &late), Err(DispatchError::UnknownFile(_))));
    }

    #[test]
    fn lookups_by_locator_and_output() {
        let mut reg = Registry::default();
        let (file, _) = file_with_part(&mut reg);
        assert!(reg.by_locator("http://h/a.bin").is_some());
        assert!(reg.by_output(Path::new("/tmp/a.bin")).is_some());
        assert!(reg.by_output(Path::new("/tmp/b.bin")).is_none());
        assert_eq!(reg.files().len(), 1);
        assert!(reg.contains(&file));
    }
}
