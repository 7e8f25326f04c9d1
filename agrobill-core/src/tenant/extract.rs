use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use serde::Deserialize;

use crate::error::AppError;
use crate::tenant::code::normalize_tenant_code;
use crate::tenant::tables::TenantTables;

/// Header carrying the company code on tenant-scoped requests.
pub const COMPANY_CODE_HEADER: &str = "x-company-code";

/// Raw company code taken from the `x-company-code` header, falling back
/// to a `company_code` query parameter.
///
/// Extraction never fails; handlers call [`CompanyCode::require`] or
/// [`CompanyCode::or_body`] so a body field can serve as a last fallback.
#[derive(Debug, Clone, Default)]
pub struct CompanyCode(pub Option<String>);

impl CompanyCode {
    /// Resolves the tenant from the header or query string.
    pub fn require(&self) -> Result<TenantTables, AppError> {
        self.or_body(None)
    }

    /// Resolves the tenant, using `body_code` when neither header nor query
    /// parameter supplied one.
    pub fn or_body(&self, body_code: Option<&str>) -> Result<TenantTables, AppError> {
        let raw = self
            .0
            .as_deref()
            .or(body_code)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(AppError::MissingTenantCode)?;
        Ok(TenantTables::new(normalize_tenant_code(raw)?))
    }
}

#[derive(Debug, Deserialize)]
struct CompanyCodeQuery {
    company_code: Option<String>,
}

#[async_trait]
impl<S> FromRequestParts<S> for CompanyCode
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let from_header = parts
            .headers
            .get(COMPANY_CODE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let code = from_header.or_else(|| {
            Query::<CompanyCodeQuery>::try_from_uri(&parts.uri)
                .ok()
                .and_then(|Query(query)| query.company_code)
        });
        Ok(CompanyCode(code))
    }
}
