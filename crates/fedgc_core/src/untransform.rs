//! Built-in registry backing the CLI's `-u NAME` flag.
//!
//! spec.md §6's `-u MOD:EXPR` loads an arbitrary host-language callable to
//! untransform raw record bytes before ref extraction. Rust has no runtime
//! `eval`; this crate replaces it with a small named registry of built-in
//! untransform functions (spec.md's REDESIGN FLAGS intent).

/// Strips a `.h` prefix and hex-decodes the remainder, matching spec.md
/// §8 scenario 3 (records stored with a `.h` prefix and hex body).
fn hex(data: &[u8]) -> Option<Vec<u8>> {
    let body = data.strip_prefix(b".h")?;
    let text = std::str::from_utf8(body).ok()?;
    hex::decode(text).ok()
}

/// Looks up a built-in untransform function by name.
pub fn lookup(name: &str) -> Option<fn(&[u8]) -> Option<Vec<u8>>> {
    match name {
        "hex" => Some(hex),
        _ => None,
    }
}
