//! Logging front end.
//!
//! With the `defmt` feature each level forwards to the matching [defmt] macro. Host tests (and
//! the `test-utils` feature) print to stderr. Otherwise the arguments are evaluated and
//! dropped. Format strings must stay within the `{}` and `{:?}` placeholders so they are valid
//! for both backends.

/// Log at debug level.
#[macro_export]
macro_rules! debug {
    ($($arg:expr),*) => { $crate::__log!(debug, "DEBUG", $($arg),*) };
}

#[macro_export]
macro_rules! info {
    ($($arg:expr),*) => { $crate::__log!(info, "INFO", $($arg),*) };
}

#[macro_export]
macro_rules! warn {
    ($($arg:expr),*) => { $crate::__log!(warn, "WARN", $($arg),*) };
}

/// Log a condition the pipeline recovered from. Never panics, not even in tests.
#[macro_export]
macro_rules! error {
    ($($arg:expr),*) => { $crate::__log!(error, "ERROR", $($arg),*) };
}

#[cfg(all(not(test), not(feature = "test-utils"), feature = "defmt"))]
#[doc(hidden)]
#[macro_export]
macro_rules! __log {
    ($level:ident, $tag:literal, $($arg:expr),*) => {
        defmt::$level!($($arg,)*)
    };
}

#[cfg(any(test, feature = "test-utils"))]
#[doc(hidden)]
#[macro_export]
macro_rules! __log {
    (error, $tag:literal, $($arg:expr),*) => {{
        extern crate std;
        std::eprintln!("\n{}: at ./{}:{}: {}", $tag, file!(), line!(), std::format!($($arg,)*));
    }};
    ($level:ident, $tag:literal, $($arg:expr),*) => {{
        extern crate std;
        std::eprintln!("{}: {}", $tag, std::format!($($arg,)*));
    }};
}

#[cfg(all(not(test), not(feature = "defmt"), not(feature = "test-utils")))]
#[doc(hidden)]
#[macro_export]
macro_rules! __log {
    ($level:ident, $tag:literal, $($arg:expr),*) => {{
        let _ = ($(&$arg),*);
    }};
}
