//! Lock and atomic types shared by the reassembly domain.
//!
//! Under `cfg(loom)` these resolve to the `loom` model-checker equivalents so
//! the bucket locking protocol can be explored exhaustively.

#[cfg(not(loom))]
pub(crate) use std::sync::{
    Mutex,
    MutexGuard,
    atomic::AtomicUsize,
};

#[cfg(loom)]
pub(crate) use loom::sync::{
    Mutex,
    MutexGuard,
    atomic::AtomicUsize,
};
