//! Utility modules: retry and timeout around completion calls.

pub mod retry;
pub mod timeout;
