//! Unit tests for per-datagram reassembly state.
//!
//! Split by type so each file stays focused.

mod segment_tests;
