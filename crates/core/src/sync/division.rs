//! Mapping of Recras companies onto Exact Online divisions

use koppeling_domain::{ApiError, ApiResult};
use tracing::debug;

use super::mapper::normalize_vat_number;
use super::ports::ExactApi;

/// Find the division whose VAT number matches `vat_number`.
///
/// The base division is searched first, then every division listed under the
/// current credential.
///
/// # Errors
/// [`ApiError::NotFound`] when no division matches; other API errors as-is.
pub async fn resolve_division(exact: &dyn ExactApi, base: i64, vat_number: &str) -> ApiResult<i64> {
    let vat_number = normalize_vat_number(vat_number);
    if vat_number.is_empty() {
        return Err(ApiError::not_found("Division", vat_number));
    }

    match exact.find_division_by_vat_number(base, &vat_number).await {
        Ok(division) => return Ok(division.code),
        Err(err) if !err.is_not_found() => return Err(err),
        Err(_) => debug!(vat = %vat_number, base, "VAT number not in base division"),
    }

    for candidate in exact.list_divisions(base).await? {
        match exact.find_division_by_vat_number(candidate.code, &vat_number).await {
            Ok(division) => return Ok(division.code),
            Err(err) if err.is_not_found() => continue,
            Err(err) => return Err(err),
        }
    }

    Err(ApiError::not_found("Division", vat_number))
}
