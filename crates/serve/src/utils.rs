//! Utility macros used across the crate.

/// Returns early with an error if a condition is not met.
///
/// Similar to `assert!`, but returns an error instead of panicking.
///
/// ```ignore
/// ensure!(buffered <= max_size, ParseError::too_large_header(buffered, max_size));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
