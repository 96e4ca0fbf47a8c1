//! Job drivers: the per-job attempt loop (polling delivery), up-front
//! webhook submission, and the reconciliation sweep that closes jobs whose
//! provider callbacks went missing.

pub mod reconciler;
pub mod runner;
