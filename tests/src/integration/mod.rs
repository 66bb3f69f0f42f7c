//! Cross-crate integration scenarios.

mod attacks;
mod flows;
mod runtime;
