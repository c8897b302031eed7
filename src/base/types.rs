//! Crate-wide result aliases.

/// The error type used throughout the crate.
pub type Err = anyhow::Error;
/// A result carrying [`Err`].
pub type Res<T> = Result<T, Err>;
/// A result with no value.
pub type Void = Res<()>;
