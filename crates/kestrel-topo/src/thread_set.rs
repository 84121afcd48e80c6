use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{CoreId, SelectionError, Thread, TopoResult};

/// Ordered collection of distinct hardware threads.
///
/// Order follows insertion (discovery order for discovered sets) and is preserved by every
/// operation, so selections over the same topology are reproducible. Inserting a thread that is
/// already present is a no-op.
///
/// All operations are pure: they return new sets and leave the receiver untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Thread>")]
pub struct ThreadSet(Vec<Thread>);

impl ThreadSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Thread> {
        self.0.iter()
    }

    pub fn contains(&self, thread: &Thread) -> bool {
        self.0.contains(thread)
    }

    /// Append `thread` unless it is already present. Returns whether the set changed.
    pub fn insert(&mut self, thread: Thread) -> bool {
        if self.contains(&thread) {
            return false;
        }
        self.0.push(thread);
        true
    }

    /// The set without `thread`.
    pub fn remove(&self, thread: &Thread) -> ThreadSet {
        self.filter(|t| t != thread)
    }

    /// The set without any thread of physical core `core`.
    pub fn remove_core(&self, core: CoreId) -> ThreadSet {
        self.filter(|t| t.core() != core)
    }

    /// Threads matching `predicate`, in order.
    pub fn filter<P>(&self, mut predicate: P) -> ThreadSet
    where
        P: FnMut(&Thread) -> bool,
    {
        ThreadSet(self.0.iter().copied().filter(|t| predicate(t)).collect())
    }

    /// Threads of the first `count` sockets, ordered by socket id.
    pub fn sockets(&self, count: usize) -> TopoResult<ThreadSet> {
        let present = self.sockets_present();
        if present.len() < count {
            return Err(SelectionError::InsufficientSockets {
                requested: count,
                available: present.len(),
            }
            .into());
        }

        let wanted: BTreeSet<u32> = present.into_iter().take(count).collect();
        Ok(self.filter(|t| wanted.contains(&t.socket())))
    }

    /// Threads whose physical core is one of `cores`. Fails if nothing matches.
    pub fn from_cores(&self, cores: &[CoreId]) -> TopoResult<ThreadSet> {
        let matched = self.filter(|t| cores.contains(&t.core()));
        if matched.is_empty() {
            return Err(SelectionError::NoMatchingCores.into());
        }
        Ok(matched)
    }

    /// Distinct physical cores present in the set.
    pub fn available_cores(&self) -> BTreeSet<CoreId> {
        self.0.iter().map(Thread::core).collect()
    }

    /// Distinct socket ids present in the set.
    pub fn sockets_present(&self) -> BTreeSet<u32> {
        self.0.iter().map(Thread::socket).collect()
    }

    /// Logical CPU numbers in set order.
    pub fn ids(&self) -> Vec<u32> {
        self.0.iter().map(Thread::id).collect()
    }

    /// Logical CPU numbers in `cpulist` syntax (`0-3,8`), as accepted by `taskset -c`.
    pub fn to_cpulist(&self) -> String {
        let ids: BTreeSet<u32> = self.0.iter().map(Thread::id).collect();
        cpulist::emit(ids)
    }
}

impl FromIterator<Thread> for ThreadSet {
    fn from_iter<I: IntoIterator<Item = Thread>>(iter: I) -> Self {
        let mut set = ThreadSet::new();
        for thread in iter {
            set.insert(thread);
        }
        set
    }
}

// Deserialized lists go through `insert` so repeated threads collapse.
impl From<Vec<Thread>> for ThreadSet {
    fn from(threads: Vec<Thread>) -> Self {
        threads.into_iter().collect()
    }
}

impl IntoIterator for ThreadSet {
    type Item = Thread;
    type IntoIter = std::vec::IntoIter<Thread>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ThreadSet {
    type Item = &'a Thread;
    type IntoIter = std::slice::Iter<'a, Thread>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for ThreadSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_cpulist())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TopoError;
    use crate::fixtures::two_socket_topology;

    #[test]
    fn insert_ignores_duplicates() {
        let mut set = ThreadSet::new();
        assert!(set.insert(Thread::new(0, 0, 0)));
        assert!(!set.insert(Thread::new(0, 0, 0)));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn deserialized_duplicates_collapse() {
        let set: ThreadSet = serde_json::from_str(
            r#"[{"id":0,"core":0,"socket":0},{"id":4,"core":0,"socket":0},{"id":0,"core":0,"socket":0}]"#,
        )
        .unwrap();

        assert_eq!(set.ids(), vec![0, 4]);
        assert_eq!(serde_json::to_string(&set).unwrap().matches("\"id\"").count(), 2);
    }

    #[test]
    fn remove_returns_new_set() {
        let all = two_socket_topology();
        let without = all.remove(&Thread::new(0, 0, 0));

        assert_eq!(all.len(), 16);
        assert_eq!(without.len(), 15);
        assert!(!without.contains(&Thread::new(0, 0, 0)));
    }

    #[test]
    fn one_socket_has_eight_threads() {
        let socket = two_socket_topology().sockets(1).unwrap();

        assert_eq!(socket.len(), 8);
        assert!(socket.iter().all(|t| t.socket() == 0));
    }

    #[test]
    fn too_many_sockets_is_an_error() {
        let err = two_socket_topology().sockets(3).unwrap_err();
        assert_eq!(
            err,
            TopoError::Selection(SelectionError::InsufficientSockets {
                requested: 3,
                available: 2
            })
        );
    }

    #[test]
    fn from_cores_keeps_both_hyperthreads() {
        let all = two_socket_topology();
        let core = all.from_cores(&[CoreId::new(1, 2)]).unwrap();

        assert_eq!(core.ids(), vec![6, 14]);
    }

    #[test]
    fn from_cores_without_match_fails() {
        let err = two_socket_topology()
            .from_cores(&[CoreId::new(7, 7)])
            .unwrap_err();
        assert_eq!(err, TopoError::Selection(SelectionError::NoMatchingCores));
    }

    #[test]
    fn core_ids_are_scoped_by_socket() {
        let all = two_socket_topology();
        assert_eq!(all.available_cores().len(), 8);

        let without = all.remove_core(CoreId::new(0, 0));
        assert_eq!(without.len(), 14);
        assert!(without.contains(&Thread::new(4, 0, 1)));
    }

    #[test]
    fn cpulist_is_compact_and_sorted() {
        let set: ThreadSet = [Thread::new(6, 2, 1), Thread::new(2, 2, 0)]
            .into_iter()
            .collect();
        assert_eq!(set.to_cpulist(), "2,6");
        assert_eq!(two_socket_topology().to_cpulist(), "0-15");
    }
}
