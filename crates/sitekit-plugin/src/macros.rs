//! Convenience macros for plugin development.

/// Builds a hook argument tuple from JSON-convertible expressions.
///
/// # Example
/// ```rust,ignore
/// let args = hook_args!["styles.css", 1200, true];
/// ```
#[macro_export]
macro_rules! hook_args {
    () => {
        ::std::vec::Vec::<::serde_json::Value>::new()
    };
    ($($value:expr),+ $(,)?) => {
        vec![$(::serde_json::json!($value)),+]
    };
}
