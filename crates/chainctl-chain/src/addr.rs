//! TCP address normalization

use crate::error::ChainError;
use url::Url;

const TCP_SCHEME: &str = "tcp";
const ACCEPTED_SCHEMES: &[&str] = &["tcp", "http", "https"];
const UNSPECIFIED_HOST: &str = "0.0.0.0";

/// Normalize an address to `tcp://host:port`
///
/// Accepts `host:port`, `:port` and `tcp|http|https://host:port`. The port
/// is required for every scheme.
///
/// # Errors
/// `ChainError::InvalidAddress` if the address has no port, an unsupported
/// scheme, or does not parse.
pub fn tcp(field: &'static str, address: &str) -> Result<String, ChainError> {
    let invalid = |reason: String| ChainError::InvalidAddress {
        field,
        address: address.to_string(),
        reason,
    };

    let trimmed = address.trim();
    let (scheme, rest) = trimmed
        .split_once("://")
        .unwrap_or((TCP_SCHEME, trimmed));
    if !ACCEPTED_SCHEMES.contains(&scheme) {
        return Err(invalid(format!("unsupported scheme '{scheme}'")));
    }

    let rest = if rest.starts_with(':') {
        format!("{UNSPECIFIED_HOST}{rest}")
    } else {
        rest.to_string()
    };

    // Special schemes drop their default port on parse.
    let url = Url::parse(&format!("{TCP_SCHEME}://{rest}")).map_err(|e| invalid(e.to_string()))?;
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| invalid("missing host".to_string()))?;
    let port = url
        .port()
        .ok_or_else(|| invalid("missing port".to_string()))?;

    Ok(format!("{TCP_SCHEME}://{host}:{port}"))
}
