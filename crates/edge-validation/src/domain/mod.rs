//! # Domain Layer
//!
//! Pure validation logic: canonicalization, authentication, freshness,
//! payload decryption and rate limiting. No I/O happens here; time is
//! passed in by the caller.

pub mod canonical;
pub mod confidentiality;
pub mod entities;
pub mod errors;
pub mod freshness;
pub mod rate_limit;
pub mod sealer;
pub mod signature;
