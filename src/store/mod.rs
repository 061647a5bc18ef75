//! Counter store backends.
//!
//! `MemoryStore` keeps records for the lifetime of the process only and backs
//! limiters that guard cheap in-session actions. `FileStore` keeps one JSON
//! file per key so counters survive restarts.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;
