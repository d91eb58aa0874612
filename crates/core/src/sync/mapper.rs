//! Entity mapping from Recras to Exact Online
//!
//! Everything here is pure construction, except [`flatten_invoice_lines`]
//! which resolves items through an injected [`ItemResolver`].

use chrono::{Days, NaiveDate};
use koppeling_domain::constants::{
    ACCOUNT_SEARCH_CODE_PREFIX, ACCOUNT_STATUS_CUSTOMER, AMOUNT_EPSILON,
    INVOICE_DOCUMENT_SUBJECT_PREFIX, ITEM_CODE_PREFIX, ITEM_UNIT, SALES_ENTRY_DESCRIPTION_PREFIX,
};
use koppeling_domain::types::exact::{
    Account, Document, DocumentAttachment, DocumentType, Item, PaymentCondition, SalesEntry,
    SalesEntryLine, SalesEntryType, VatCode, VatCodeTable,
};
use koppeling_domain::types::recras::{Customer, Invoice, InvoiceLine, Product};
use tracing::trace;

use super::errors::MappingError;
use super::ports::ItemResolver;

/// Remaining share of an amount after `percentage` discount.
fn discount_factor(percentage: f64) -> f64 {
    (100.0 - percentage) / 100.0
}

/// Flatten nested invoice lines into sales entry lines.
///
/// Group discounts compound into every descendant line. Lines whose final
/// amount is below [`AMOUNT_EPSILON`] are dropped and the walk continues.
/// Source order of the item lines is preserved.
///
/// # Errors
/// Stops at the first line whose item cannot be resolved, whose item has no
/// revenue account, or whose VAT percentage has no code.
pub async fn flatten_invoice_lines(
    lines: &[InvoiceLine],
    reduction_factor: f64,
    vat_codes: &VatCodeTable,
    items: &dyn ItemResolver,
) -> Result<Vec<SalesEntryLine>, MappingError> {
    let mut out = Vec::new();
    let mut stack = vec![(lines.iter(), reduction_factor)];

    loop {
        let Some((pending, factor)) = stack.last_mut() else {
            break;
        };
        let factor = *factor;
        let Some(line) = pending.next() else {
            stack.pop();
            continue;
        };

        match line {
            InvoiceLine::Group(group) => {
                stack.push((group.lines.iter(), factor * discount_factor(group.discount_percentage)));
            }
            InvoiceLine::Item(item_line) => {
                let item = items.resolve(item_line.product_id).await?;
                let amount = item_line.quantity
                    * item_line.amount
                    * (100.0 - item_line.discount_percentage)
                    / 100.0
                    * factor;
                if amount.abs() < AMOUNT_EPSILON {
                    trace!(product = item_line.product_id, amount, "Dropping line without value");
                    continue;
                }
                if !item.has_revenue_account() {
                    return Err(MappingError::NoRevenueAccount { product_id: item_line.product_id });
                }
                let vat_code = vat_codes
                    .get(item_line.vat_percentage)
                    .ok_or(MappingError::NoVatCode { percentage: item_line.vat_percentage })?;

                out.push(SalesEntryLine {
                    amount_fc: amount,
                    gl_account: item.gl_revenue,
                    description: item_line.name.clone(),
                    quantity: item_line.quantity,
                    vat_code: vat_code.to_string(),
                    ..SalesEntryLine::default()
                });
            }
            InvoiceLine::Other => {}
        }
    }

    Ok(out)
}

/// Build the sales entry header for `invoice`; lines are attached by the caller.
#[must_use]
pub fn build_sales_entry(
    account: &Account,
    invoice: &Invoice,
    payment_condition: &PaymentCondition,
    journal_code: &str,
) -> SalesEntry {
    let entry_date = invoice.date;
    let due_date = entry_date.and_then(|date| add_days(date, invoice.payment_term_days));
    let entry_type = if invoice.total_incl_vat < 0.0 {
        SalesEntryType::CreditNote
    } else {
        SalesEntryType::Invoice
    };

    SalesEntry {
        description: format!("{SALES_ENTRY_DESCRIPTION_PREFIX}{}", invoice.invoice_number),
        payment_reference: invoice.invoice_number.clone(),
        journal: journal_code.to_string(),
        customer: account.id.clone(),
        your_ref: invoice.customer_reference.clone(),
        payment_condition: payment_condition.code.clone(),
        entry_date,
        due_date,
        entry_type,
        ..SalesEntry::default()
    }
}

fn add_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    let magnitude = Days::new(days.unsigned_abs());
    if days >= 0 {
        date.checked_add_days(magnitude)
    } else {
        date.checked_sub_days(magnitude)
    }
}

/// Item code of a Recras product.
#[must_use]
pub fn item_code(product_id: i64) -> String {
    format!("{ITEM_CODE_PREFIX}{product_id}")
}

/// Account search code of a Recras customer.
#[must_use]
pub fn account_search_code(customer_id: i64) -> String {
    format!("{ACCOUNT_SEARCH_CODE_PREFIX}{customer_id}")
}

#[must_use]
pub fn build_item(product: &Product) -> Item {
    Item {
        code: item_code(product.id),
        description: format!("Recras p{}: {}", product.id, product.name),
        start_date: NaiveDate::from_ymd_opt(1970, 1, 1),
        is_sales_item: true,
        unit: ITEM_UNIT.to_string(),
        ..Item::default()
    }
}

#[must_use]
pub fn build_account(customer: &Customer) -> Account {
    let search_code = account_search_code(customer.id);
    let name = if customer.display_name.trim().is_empty() {
        format!("Recras {search_code}")
    } else {
        format!("{search_code} {}", customer.display_name)
    };

    Account {
        name,
        address_line1: customer.address.clone(),
        postcode: customer.postcode.clone(),
        city: customer.city.clone(),
        search_code,
        status: ACCOUNT_STATUS_CUSTOMER.to_string(),
        ..Account::default()
    }
}

/// Index VAT codes by the percentage in their description.
#[must_use]
pub fn build_vat_code_table(vat_codes: &[VatCode]) -> VatCodeTable {
    vat_codes
        .iter()
        .filter_map(|code| code.conventional_percentage().map(|p| (p, code.code.clone())))
        .collect()
}

#[must_use]
pub fn build_invoice_document(
    invoice: &Invoice,
    document_type: &DocumentType,
    account: &Account,
) -> Document {
    Document {
        subject: format!("{INVOICE_DOCUMENT_SUBJECT_PREFIX}{}", invoice.invoice_number),
        document_type: document_type.id,
        account: account.id.clone(),
        ..Document::default()
    }
}

#[must_use]
pub fn build_invoice_attachment(
    document: &Document,
    invoice: &Invoice,
    pdf: Vec<u8>,
) -> DocumentAttachment {
    DocumentAttachment {
        attachment: Some(pdf),
        document: document.id.clone(),
        file_name: invoice.pdf_location.clone(),
        ..DocumentAttachment::default()
    }
}

/// Strip punctuation and whitespace from a VAT number.
#[must_use]
pub fn normalize_vat_number(vat_number: &str) -> String {
    vat_number.chars().filter(char::is_ascii_alphanumeric).collect()
}
