//! Status check per Recras company
//!
//! Reports whether each administration is prepared for synchronization
//! without writing anything.

use std::collections::BTreeMap;

use koppeling_domain::constants::{JOURNAL_CODE, PAYMENT_CONDITION_DESCRIPTION, VAT_CODE_DESCRIPTION_PREFIX};
use koppeling_domain::types::exact::VatCode;
use koppeling_domain::types::recras::Company;
use koppeling_domain::ApiResult;
use tracing::{debug, instrument, warn};

use crate::sync::division::resolve_division;
use crate::sync::ports::{ExactApi, RecrasApi};

/// Readiness of the administration behind one company
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdministrationStatus {
    pub company: Company,
    pub division: Option<i64>,
    /// Set when the administration could not be found at all
    pub error: Option<String>,
    pub item_group_ok: bool,
    pub item_group_code: String,
    pub journal_ok: bool,
    pub journal_description: String,
    /// `recras:<p>` description to whether a VAT code carries it
    pub vat_codes: BTreeMap<String, bool>,
    pub vat_codes_ok: bool,
    pub payment_condition_ok: bool,
    pub everything_ok: bool,
}

/// Check every Recras company against Exact Online.
///
/// # Errors
/// Failing to read the current division or the company list.
#[instrument(skip_all)]
pub async fn check_status(
    exact: &dyn ExactApi,
    recras: &dyn RecrasApi,
) -> ApiResult<Vec<AdministrationStatus>> {
    let base = exact.current_division().await?;
    let companies = recras.list_companies().await?;
    let percentages = recras.vat_percentages().await.unwrap_or_else(|err| {
        warn!(error = %err, "Could not read VAT percentages");
        Vec::new()
    });

    let mut statuses = Vec::with_capacity(companies.len());
    for company in companies {
        statuses.push(check_company(exact, base, company, &percentages).await?);
    }
    Ok(statuses)
}

async fn check_company(
    exact: &dyn ExactApi,
    base: i64,
    company: Company,
    percentages: &[String],
) -> ApiResult<AdministrationStatus> {
    let mut status = AdministrationStatus::default();

    let division = match resolve_division(exact, base, &company.vat_number).await {
        Ok(division) => division,
        Err(err) if err.is_fatal() => return Err(err),
        Err(err) => {
            debug!(company = company.id, error = %err, "No administration for company");
            status.error =
                Some(format!("No administration in Exact Online with VAT number {}", company.vat_number));
            status.company = company;
            return Ok(status);
        }
    };
    status.division = Some(division);
    status.company = company;

    match exact.find_default_item_group(division).await {
        Ok(group) => {
            status.item_group_ok = true;
            status.item_group_code = group.code;
        }
        Err(err) if err.is_fatal() => return Err(err),
        Err(_) => {}
    }

    match exact.find_journal_by_code(division, JOURNAL_CODE).await {
        Ok(journal) => {
            status.journal_ok = true;
            status.journal_description = journal.description;
        }
        Err(err) if err.is_fatal() => return Err(err),
        Err(_) => {}
    }

    let vat_codes = match exact.vat_codes_matching_convention(division).await {
        Ok(codes) => codes,
        Err(err) if err.is_fatal() => return Err(err),
        Err(_) => Vec::new(),
    };
    status.vat_codes = check_vat_codes(&vat_codes, percentages);
    status.vat_codes_ok = status.vat_codes.values().all(|found| *found);

    match exact.find_payment_condition_by_description(division, PAYMENT_CONDITION_DESCRIPTION).await {
        Ok(_) => status.payment_condition_ok = true,
        Err(err) if err.is_fatal() => return Err(err),
        Err(_) => {}
    }

    status.everything_ok = status.item_group_ok
        && status.journal_ok
        && status.vat_codes_ok
        && status.payment_condition_ok;
    Ok(status)
}

fn check_vat_codes(vat_codes: &[VatCode], percentages: &[String]) -> BTreeMap<String, bool> {
    percentages
        .iter()
        .map(|percentage| {
            let description = format!("{VAT_CODE_DESCRIPTION_PREFIX}{percentage}");
            let found = vat_codes.iter().any(|code| code.description == description);
            (description, found)
        })
        .collect()
}
