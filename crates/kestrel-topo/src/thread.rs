use std::fmt;

use serde::{Deserialize, Serialize};

/// Physical core identity.
///
/// Kernel core ids restart at zero on every socket, so a core is only unique together with its
/// socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CoreId {
    pub socket: u32,
    pub core: u32,
}

impl CoreId {
    #[inline]
    pub const fn new(socket: u32, core: u32) -> Self {
        Self { socket, core }
    }
}

impl fmt::Display for CoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "socket {} core {}", self.socket, self.core)
    }
}

/// A hardware thread: logical CPU `id` living on physical core `core` of socket `socket`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Thread {
    id: u32,
    core: u32,
    socket: u32,
}

impl Thread {
    #[inline]
    pub const fn new(id: u32, core: u32, socket: u32) -> Self {
        Self { id, core, socket }
    }

    /// Logical CPU number, as used by `taskset`, `sched_setaffinity` and cpulists.
    #[inline]
    pub const fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    pub const fn core(&self) -> CoreId {
        CoreId::new(self.socket, self.core)
    }

    #[inline]
    pub const fn socket(&self) -> u32 {
        self.socket
    }
}

impl fmt::Display for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cpu{} ({})", self.id, self.core())
    }
}
