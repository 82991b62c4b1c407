//! Caller identity derivation

/// Shared bucket for callers without a forwarded address
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Derive the limiter key from proxy headers.
///
/// Prefers the first entry of `x-forwarded-for`, then `x-real-ip`. Callers
/// with neither share the [`UNKNOWN_CLIENT`] bucket.
pub fn client_identifier(forwarded_for: Option<&str>, real_ip: Option<&str>) -> String {
    forwarded_for
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .or_else(|| real_ip.map(str::trim).filter(|ip| !ip.is_empty()))
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}
