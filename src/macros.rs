/// Flags a violated invariant loudly without aborting the process.
/// Usage:
/// ```rust
/// # let reply_len = 2;
/// hwgate::soft_assert!(reply_len == 4, "read-port reply truncated: {} bytes", reply_len);
/// ```
/// Logs like:
/// [ERROR][hwgate::channel] invariant violated: read-port reply truncated: 2 bytes
#[macro_export]
macro_rules! soft_assert {
    ($cond:expr, $fmt:expr $(, $($arg:tt)+)?) => {
        if !$cond {
            log::error!(concat!("invariant violated: ", $fmt) $(, $($arg)+)?);
        }
    };
}
