//! Domain-tagged logging macros.
//!
//! Every event carries a `domain` field, one of `sys`, `conn`, `pipe`,
//! `res` or `conf`. The plain formatter in `tracing_init` renders it as a
//! `[domain]` prefix; the JSON formatter keeps it as a field.
//!
//! ```ignore
//! wr_info!(sys, partitions = 4, "pipeline started");
//! wr_warn!(res, window = %key, "final result rejected, retrying");
//! wr_debug!(conn, peer = %peer, "accepted connection");
//! ```
//!
//! The domain is a bare identifier, not a string.

#[doc(hidden)]
macro_rules! wr_log {
    ($level:ident, $domain:ident, $($field:tt)*) => {
        tracing::$level!(domain = stringify!($domain), $($field)*)
    };
}

macro_rules! wr_error {
    ($domain:ident, $($rest:tt)*) => {
        wr_log!(error, $domain, $($rest)*)
    };
}

macro_rules! wr_warn {
    ($domain:ident, $($rest:tt)*) => {
        wr_log!(warn, $domain, $($rest)*)
    };
}

macro_rules! wr_info {
    ($domain:ident, $($rest:tt)*) => {
        wr_log!(info, $domain, $($rest)*)
    };
}

macro_rules! wr_debug {
    ($domain:ident, $($rest:tt)*) => {
        wr_log!(debug, $domain, $($rest)*)
    };
}

#[allow(unused_macros)]
macro_rules! wr_trace {
    ($domain:ident, $($rest:tt)*) => {
        wr_log!(trace, $domain, $($rest)*)
    };
}
