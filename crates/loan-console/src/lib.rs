//! Headless workflow console for loan applications in the core-banking back office.
//!
//! The backend owns every business rule; this crate mirrors the client-side
//! workflow surface: who may act on an application, which action is offered,
//! the approval-terms calculator, and the dispatch of reviewer decisions.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
