//! Top-level facade crate for meterpulse.
//!
//! Re-exports the core types and the harness library so users can depend on a single crate.

pub mod core {
    pub use meterpulse_core::*;
}

pub mod harness {
    pub use meterpulse_harness::*;
}
