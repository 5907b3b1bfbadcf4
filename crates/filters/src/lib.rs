#![forbid(unsafe_code)]

pub mod non_finite;

pub use non_finite::remove_non_finite;
