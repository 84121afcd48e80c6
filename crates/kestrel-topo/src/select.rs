//! Placement questions answered over a topology snapshot.
//!
//! [`CoreSelector`] works on a snapshot it owns and never mutates it, so one selector can serve
//! concurrent callers. The free functions discover a fresh topology on every call.

use std::collections::BTreeSet;

use tracing::trace;

use crate::{CoreId, SelectionError, Thread, ThreadSet, TopoResult, Topology};

#[derive(Debug, Clone)]
pub struct CoreSelector {
    topology: Topology,
}

impl CoreSelector {
    pub fn new(topology: Topology) -> Self {
        Self { topology }
    }

    /// Selector over a freshly discovered host topology.
    pub fn discover() -> TopoResult<Self> {
        Topology::discover().map(Self::new)
    }

    #[inline]
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// One hardware thread per physical core of the first socket.
    ///
    /// All returned threads share the socket's last-level cache while no two of them share a
    /// physical core. The first thread seen for each core (in discovery order) is kept.
    pub fn shared_cache_threads(&self) -> TopoResult<ThreadSet> {
        let socket = self.topology.threads().sockets(1)?;

        let (_, picked) = socket.iter().fold(
            (socket.available_cores(), ThreadSet::new()),
            |(mut remaining, mut picked): (BTreeSet<CoreId>, ThreadSet), thread| {
                if remaining.remove(&thread.core()) {
                    picked.insert(*thread);
                }
                (remaining, picked)
            },
        );

        trace!(target: "kestrel.topo.select", threads = %picked, "shared cache threads");
        Ok(picked)
    }

    /// The hyperthread siblings of `thread`: every other thread on its physical core.
    ///
    /// Fails with [`SelectionError::ThreadNotFound`] if `thread` is not part of the topology.
    pub fn sibling_threads_of(&self, thread: &Thread) -> TopoResult<ThreadSet> {
        let all = self.topology.threads();
        if !all.contains(thread) {
            return Err(SelectionError::ThreadNotFound(*thread).into());
        }

        let core = all.from_cores(&[thread.core()])?;
        Ok(core.remove(thread))
    }

    /// Union of the siblings of every member of `threads`, excluding the members themselves.
    ///
    /// When two members share a core they are not reported as each other's siblings, and each
    /// sibling appears once even if it is reachable from several members.
    pub fn sibling_threads_of_set(&self, threads: &ThreadSet) -> TopoResult<ThreadSet> {
        let mut siblings = ThreadSet::new();
        for thread in threads {
            for sibling in self.sibling_threads_of(thread)? {
                if !threads.contains(&sibling) {
                    siblings.insert(sibling);
                }
            }
        }

        trace!(
            target: "kestrel.topo.select",
            reserved = %threads,
            siblings = %siblings,
            "sibling threads"
        );
        Ok(siblings)
    }
}

/// [`CoreSelector::shared_cache_threads`] on a freshly discovered host topology.
pub fn shared_cache_threads() -> TopoResult<ThreadSet> {
    CoreSelector::discover()?.shared_cache_threads()
}

/// [`CoreSelector::sibling_threads_of`] on a freshly discovered host topology.
pub fn sibling_threads_of(thread: &Thread) -> TopoResult<ThreadSet> {
    CoreSelector::discover()?.sibling_threads_of(thread)
}

/// [`CoreSelector::sibling_threads_of_set`] on a freshly discovered host topology.
pub fn sibling_threads_of_set(threads: &ThreadSet) -> TopoResult<ThreadSet> {
    CoreSelector::discover()?.sibling_threads_of_set(threads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TopoError;
    use crate::fixtures::two_socket_topology;

    fn selector() -> CoreSelector {
        CoreSelector::new(Topology::from_threads(two_socket_topology()))
    }

    #[test]
    fn shared_cache_threads_one_per_core() {
        let picked = selector().shared_cache_threads().unwrap();

        assert_eq!(picked.len(), 4);
        assert_eq!(picked.available_cores().len(), 4);
        assert!(picked.iter().all(|t| t.socket() == 0));
        // First hyperthread of every core wins.
        assert_eq!(picked.ids(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn shared_cache_threads_is_deterministic() {
        let s = selector();
        assert_eq!(
            s.shared_cache_threads().unwrap(),
            s.shared_cache_threads().unwrap()
        );
    }

    #[test]
    fn shared_cache_threads_without_hyperthreading() {
        let threads: ThreadSet = (0..4).map(|i| Thread::new(i, i, 0)).collect();
        let picked = CoreSelector::new(Topology::from_threads(threads.clone()))
            .shared_cache_threads()
            .unwrap();

        assert_eq!(picked, threads);
    }

    #[test]
    fn siblings_of_thread_exclude_itself() {
        let siblings = selector()
            .sibling_threads_of(&Thread::new(5, 1, 1))
            .unwrap();

        assert_eq!(siblings.ids(), vec![13]);
    }

    #[test]
    fn siblings_of_unknown_thread_fail() {
        let err = selector()
            .sibling_threads_of(&Thread::new(99, 0, 0))
            .unwrap_err();

        assert_eq!(
            err,
            TopoError::Selection(SelectionError::ThreadNotFound(Thread::new(99, 0, 0)))
        );
    }

    #[test]
    fn siblings_of_set_never_contain_members() {
        let s = selector();
        let reserved = s.shared_cache_threads().unwrap();
        let siblings = s.sibling_threads_of_set(&reserved).unwrap();

        assert_eq!(siblings.ids(), vec![8, 9, 10, 11]);
        assert!(siblings.iter().all(|t| !reserved.contains(t)));
    }

    #[test]
    fn siblings_of_set_with_paired_members_are_empty_for_that_core() {
        let s = selector();
        // 0 and 8 are siblings of each other on socket 0 core 0; 1 is alone on core 1.
        let reserved: ThreadSet = [
            Thread::new(0, 0, 0),
            Thread::new(8, 0, 0),
            Thread::new(1, 1, 0),
        ]
        .into_iter()
        .collect();

        let siblings = s.sibling_threads_of_set(&reserved).unwrap();
        assert_eq!(siblings.ids(), vec![9]);
    }

    #[test]
    fn siblings_of_set_counts_each_sibling_once() {
        let threads: ThreadSet = [
            Thread::new(0, 0, 0),
            Thread::new(1, 0, 0),
            Thread::new(2, 0, 0),
        ]
        .into_iter()
        .collect();
        let s = CoreSelector::new(Topology::from_threads(threads));

        let reserved: ThreadSet = [Thread::new(0, 0, 0), Thread::new(1, 0, 0)]
            .into_iter()
            .collect();
        let siblings = s.sibling_threads_of_set(&reserved).unwrap();

        assert_eq!(siblings.ids(), vec![2]);
    }

    #[test]
    fn siblings_of_empty_set_are_empty() {
        let siblings = selector().sibling_threads_of_set(&ThreadSet::new()).unwrap();
        assert!(siblings.is_empty());
    }
}
