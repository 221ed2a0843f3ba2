use ulid::Ulid;

/// Generates a new ULID-based ID with the given prefix.
///
/// # Examples
/// ```
/// let id = bazaar_common::id::prefixed_ulid("conn");
/// assert!(id.starts_with("conn_"));
/// ```
pub fn prefixed_ulid(prefix: &str) -> String {
    format!("{}_{}", prefix, Ulid::new())
}

/// Well-known ID prefixes.
pub mod prefix {
    /// A single open stream connection (one browser tab).
    pub const CONNECTION: &str = "conn";
    /// Server-assigned id for events with no backing domain entity.
    pub const EVENT: &str = "evt";
    /// Opaque access token accepted by the live endpoints.
    pub const TOKEN: &str = "lat";
    pub const USER: &str = "usr";
}
