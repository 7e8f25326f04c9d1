use serde::Serialize;
use std::fmt;

use crate::error::AppError;

/// Longest accepted code. Keeps `{code}_purchase_items` inside Postgres'
/// 63-byte identifier limit.
pub const MAX_CODE_LEN: usize = 40;

/// A normalized company code: non-empty, `[a-z0-9_]` only, no leading,
/// trailing or repeated underscores.
///
/// The only constructor is [`normalize_tenant_code`], so holding a
/// `TenantCode` means it is safe to splice into a table identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TenantCode(String);

impl TenantCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalizes a raw company code.
///
/// Lowercases, replaces every character outside `[a-z0-9_]` with `_`,
/// collapses runs of `_` and strips them from both ends.
///
/// # Errors
///
/// Returns `InvalidTenantCode` when nothing is left after normalization or
/// the result exceeds [`MAX_CODE_LEN`].
pub fn normalize_tenant_code(raw: &str) -> Result<TenantCode, AppError> {
    let mut code = String::with_capacity(raw.len());
    for ch in raw.trim().chars().flat_map(char::to_lowercase) {
        let ch = if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_' {
            ch
        } else {
            '_'
        };
        if ch == '_' && code.ends_with('_') {
            continue;
        }
        code.push(ch);
    }

    let code = code.trim_matches('_');
    let valid = !code.is_empty()
        && code.len() <= MAX_CODE_LEN
        && code
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_');
    if !valid {
        return Err(AppError::InvalidTenantCode(raw.to_string()));
    }

    Ok(TenantCode(code.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizes_mixed_input() {
        let code = normalize_tenant_code(" ACME Co.! ").expect("valid code");
        assert_eq!(code.as_str(), "acme_co");
    }

    #[test]
    fn test_collapses_and_strips_underscores() {
        let code = normalize_tenant_code("__Green--Field__Farms__").expect("valid code");
        assert_eq!(code.as_str(), "green_field_farms");
    }

    #[test]
    fn test_keeps_digits() {
        let code = normalize_tenant_code("Store 42").expect("valid code");
        assert_eq!(code.as_str(), "store_42");
    }

    #[test]
    fn test_rejects_empty_after_normalization() {
        assert!(matches!(
            normalize_tenant_code("!!!"),
            Err(AppError::InvalidTenantCode(_))
        ));
        assert!(matches!(
            normalize_tenant_code("   "),
            Err(AppError::InvalidTenantCode(_))
        ));
    }

    #[test]
    fn test_non_ascii_letters_become_separators() {
        let code = normalize_tenant_code("Café Noir").expect("valid code");
        assert_eq!(code.as_str(), "caf_noir");
    }

    #[test]
    fn test_rejects_overlong_code() {
        let raw = "a".repeat(MAX_CODE_LEN + 1);
        assert!(normalize_tenant_code(&raw).is_err());
        assert!(normalize_tenant_code(&raw[..MAX_CODE_LEN]).is_ok());
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let once = normalize_tenant_code("Mega Mart (North)").expect("valid code");
        let twice = normalize_tenant_code(once.as_str()).expect("valid code");
        assert_eq!(once, twice);
    }
}
