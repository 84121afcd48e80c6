//! CPU topology model and topology-aware core selection.
//!
//! A machine is described as a [`ThreadSet`]: every online hardware thread together with the
//! physical core and socket it belongs to. Selection helpers answer the placement questions used
//! to parameterize CPU-pinning decorators, e.g. "one hardware thread per physical core of a socket"
//! or "the hyperthread siblings of these reserved threads".

mod error;
pub use error::{SelectionError, TopoError, TopoResult};

mod thread;
pub use thread::{CoreId, Thread};

mod thread_set;
pub use thread_set::ThreadSet;

mod discover;
pub use discover::{Topology, discover};

pub mod select;
pub use select::CoreSelector;

#[cfg(test)]
mod fixtures;

pub mod prelude {
    pub use crate::select::CoreSelector;
    pub use crate::{CoreId, Thread, ThreadSet, TopoError, TopoResult, Topology};
}
