//! Synchronization service - core business logic
//!
//! Walks one tenant strictly in order: companies, then per company the
//! reference entities, products and invoices. Problems with a single
//! company, product or invoice are collected in the [`SyncReport`] and the
//! walk continues. Only fatal errors (authentication, transport,
//! cancellation) end the run early.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use koppeling_domain::constants::{
    JOURNAL_CODE, PAYMENT_CONDITION_DESCRIPTION, SALES_INVOICE_DOCUMENT_TYPE,
};
use koppeling_domain::types::exact::{Account, Document, Item, PaymentCondition, VatCodeTable};
use koppeling_domain::types::recras::{Company, Customer, Invoice, InvoiceFilter, Product, User};
use koppeling_domain::ApiResult;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};

use super::division::resolve_division;
use super::errors::{SyncError, SyncResult};
use super::mapper::{
    build_account, build_invoice_attachment, build_invoice_document, build_item,
    build_sales_entry, build_vat_code_table, flatten_invoice_lines,
};
use super::ports::{ExactApi, RecrasApi};
use super::report::{build_report_note, SyncReport};
use super::resolver::CachingItemResolver;

/// Tunables of a tenant run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Journal code written on every sales entry
    pub journal_code: String,
    /// Fail a company before any invoice when the journal is missing
    pub require_journal: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self { journal_code: JOURNAL_CODE.to_string(), require_journal: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompanyOutcome {
    Synced,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InvoiceOutcome {
    Created,
    Existing,
    WithoutLines,
}

/// Reference data resolved once per company.
struct CompanyContext<'a> {
    division: i64,
    payment_condition: PaymentCondition,
    vat_codes: VatCodeTable,
    items: &'a CachingItemResolver,
}

/// Synchronizes one tenant from Recras into Exact Online
pub struct SyncService {
    exact: Arc<dyn ExactApi>,
    recras: Arc<dyn RecrasApi>,
    options: SyncOptions,
}

fn ensure_active(cancel: &CancellationToken) -> SyncResult<()> {
    if cancel.is_cancelled() {
        return Err(SyncError::Cancelled);
    }
    Ok(())
}

impl SyncService {
    /// Create a new sync service
    pub fn new(exact: Arc<dyn ExactApi>, recras: Arc<dyn RecrasApi>) -> Self {
        Self { exact, recras, options: SyncOptions::default() }
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Run a full synchronization and return its report.
    ///
    /// # Errors
    /// Returns the fatal error that aborted the run; collected problems are
    /// part of the report instead.
    pub async fn run(
        &self,
        start_date: NaiveDate,
        cancel: &CancellationToken,
    ) -> SyncResult<SyncReport> {
        let mut report = SyncReport::new();
        self.run_into(&mut report, start_date, cancel).await?;
        Ok(report)
    }

    /// Run a full synchronization, collecting into `report`.
    ///
    /// On a fatal error `report` still holds everything collected before it.
    ///
    /// # Errors
    /// Authentication, transport and cancellation errors.
    #[instrument(skip_all, fields(start = %start_date))]
    pub async fn run_into(
        &self,
        report: &mut SyncReport,
        start_date: NaiveDate,
        cancel: &CancellationToken,
    ) -> SyncResult<()> {
        ensure_active(cancel)?;

        let base = match self.exact.current_division().await {
            Ok(division) => division,
            Err(err) if err.is_fatal() => return Err(err.into()),
            Err(err) => {
                report.push(format!("Could not read the current Exact Online division: {err}"));
                return Ok(());
            }
        };

        let companies = match self.recras.list_companies().await {
            Ok(companies) => companies,
            Err(err) if err.is_fatal() => return Err(err.into()),
            Err(err) => {
                report.push(format!("Could not list Recras companies: {err}"));
                return Ok(());
            }
        };
        info!(base_division = base, companies = companies.len(), "Starting synchronization");

        for company in &companies {
            ensure_active(cancel)?;
            let span = info_span!("company", company = company.id, name = %company.name);
            match self.sync_company(base, company, start_date, cancel, report).instrument(span).await {
                Ok(CompanyOutcome::Synced) => report.counters.companies_processed += 1,
                Ok(CompanyOutcome::Skipped) => report.counters.companies_skipped += 1,
                Err(err) if err.is_fatal() => {
                    error!(company = company.id, error = %err, "Aborting synchronization");
                    return Err(err);
                }
                Err(err) => {
                    warn!(company = company.id, error = %err, "Company synchronization failed");
                    report.counters.companies_skipped += 1;
                    report.push(format!("Company {} could not be synchronized: {err}", company.name));
                }
            }
        }

        info!(counters = ?report.counters, "Synchronization finished");
        Ok(())
    }

    async fn sync_company(
        &self,
        base: i64,
        company: &Company,
        start_date: NaiveDate,
        cancel: &CancellationToken,
        report: &mut SyncReport,
    ) -> SyncResult<CompanyOutcome> {
        let division = match resolve_division(self.exact.as_ref(), base, &company.vat_number).await {
            Ok(division) => division,
            Err(err) if err.is_not_found() => {
                debug!(vat = %company.vat_number, "No division for company");
                report.push(format!(
                    "Company {} skipped: no matching VAT number `{}` in Exact Online",
                    company.name, company.vat_number
                ));
                return Ok(CompanyOutcome::Skipped);
            }
            Err(err) => return Err(err.into()),
        };
        debug!(division, "Division resolved");

        let payment_condition = self
            .exact
            .find_payment_condition_by_description(division, PAYMENT_CONDITION_DESCRIPTION)
            .await?;
        let vat_codes =
            build_vat_code_table(&self.exact.vat_codes_matching_convention(division).await?);

        if self.options.require_journal {
            match self.exact.find_journal_by_code(division, &self.options.journal_code).await {
                Ok(_) => {}
                Err(err) if err.is_not_found() => {
                    return Err(SyncError::MissingJournal {
                        code: self.options.journal_code.clone(),
                        division,
                    });
                }
                Err(err) => return Err(err.into()),
            }
        }

        let items = CachingItemResolver::new(Arc::clone(&self.exact), division);
        self.sync_products(division, &items, report).await?;

        let context = CompanyContext { division, payment_condition, vat_codes, items: &items };
        let filter = InvoiceFilter::bookable(company.id, start_date);
        let invoices = self.recras.list_invoices(&filter).await?;
        debug!(invoices = invoices.len(), start = %start_date, "Invoices to synchronize");

        for invoice in &invoices {
            ensure_active(cancel)?;
            let span = info_span!("invoice", invoice = %invoice.invoice_number);
            match self.sync_invoice(&context, invoice, report).instrument(span).await {
                Ok(InvoiceOutcome::Created) => report.counters.invoices_created += 1,
                Ok(InvoiceOutcome::Existing) => report.counters.invoices_existing += 1,
                Ok(InvoiceOutcome::WithoutLines) => report.counters.invoices_without_lines += 1,
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!(invoice = %invoice.invoice_number, error = %err, "Invoice not copied");
                    report.counters.invoices_failed += 1;
                    report.push(format!("Error copying invoice {}: {err}", invoice.invoice_number));
                }
            }
        }

        info!(division, "Finished company synchronization");
        Ok(CompanyOutcome::Synced)
    }

    /// Make sure every Recras product has an item, seeding `items`.
    async fn sync_products(
        &self,
        division: i64,
        items: &CachingItemResolver,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        let products = self.recras.list_products().await?;

        for product in &products {
            match self.sync_product(division, product).await {
                Ok((item, created)) => {
                    if created {
                        report.counters.products_created += 1;
                    }
                    items.seed(product.id, item).await;
                }
                Err(err) if err.is_fatal() => return Err(err.into()),
                Err(err) => {
                    warn!(product = product.id, error = %err, "Error syncing product");
                    report.push(format!("Error synchronizing product {}: {err}", product.id));
                }
            }
        }
        Ok(())
    }

    async fn sync_product(&self, division: i64, product: &Product) -> ApiResult<(Item, bool)> {
        match self.exact.find_item_by_external_key(division, product.id).await {
            Ok(item) => {
                debug!(product = product.id, "Found item");
                Ok((item, false))
            }
            Err(err) if err.is_not_found() => {
                let item = self.exact.create_item(division, &build_item(product)).await?;
                info!(product = product.id, code = %item.code, "Created item");
                Ok((item, true))
            }
            Err(err) => Err(err),
        }
    }

    async fn sync_invoice(
        &self,
        context: &CompanyContext<'_>,
        invoice: &Invoice,
        report: &mut SyncReport,
    ) -> SyncResult<InvoiceOutcome> {
        let division = context.division;
        match self.exact.find_sales_entry_by_invoice_number(division, &invoice.invoice_number).await {
            Ok(_) => {
                debug!("Sales entry exists");
                return Ok(InvoiceOutcome::Existing);
            }
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err.into()),
        }

        let lines =
            flatten_invoice_lines(&invoice.lines, 1.0, &context.vat_codes, context.items).await?;
        if lines.is_empty() {
            report.push(format!("Skipping invoice {}, no lines with value", invoice.invoice_number));
            return Ok(InvoiceOutcome::WithoutLines);
        }

        let account = self.resolve_account(division, &invoice.customer).await?;
        let mut entry =
            build_sales_entry(&account, invoice, &context.payment_condition, &self.options.journal_code);
        entry.sales_entry_lines = lines;

        if !invoice.pdf_location.is_empty() {
            match self.upload_invoice_pdf(division, invoice, &account).await {
                Ok(document) => entry.document = document.id,
                Err(err) => warn!(error = %err, "Error uploading invoice PDF"),
            }
        }

        self.exact.create_sales_entry(division, &entry).await?;
        info!("Saved sales entry");
        Ok(InvoiceOutcome::Created)
    }

    async fn resolve_account(&self, division: i64, customer: &Customer) -> ApiResult<Account> {
        match self.exact.find_account_by_external_key(division, customer.id).await {
            Err(err) if err.is_not_found() => {
                info!(customer = customer.id, "Creating account");
                self.exact.create_account(division, &build_account(customer)).await
            }
            found => found,
        }
    }

    /// Store the invoice PDF as a document with one attachment.
    ///
    /// The PDF is downloaded before anything is written.
    async fn upload_invoice_pdf(
        &self,
        division: i64,
        invoice: &Invoice,
        account: &Account,
    ) -> ApiResult<Document> {
        let pdf = self.recras.fetch_pdf(&invoice.pdf_location).await?;
        let document_type = self
            .exact
            .find_document_type_by_description(division, SALES_INVOICE_DOCUMENT_TYPE)
            .await?;
        let document = self
            .exact
            .create_document(division, &build_invoice_document(invoice, &document_type, account))
            .await?;
        self.exact
            .create_document_attachment(division, &build_invoice_attachment(&document, invoice, pdf))
            .await?;
        Ok(document)
    }

    /// Post the report as a note on the current Recras staff member.
    ///
    /// `abort` is appended when the run ended early.
    ///
    /// # Errors
    /// Errors reading the staff member or posting the note.
    pub async fn post_report_note(
        &self,
        report: &SyncReport,
        abort: Option<&SyncError>,
    ) -> ApiResult<()> {
        let staff = self.recras.current_staff().await?;
        let user = match self.recras.user_with_roles(staff.id).await {
            Ok(user) => user,
            Err(err) => {
                debug!(error = %err, "No roles for staff member");
                User::default()
            }
        };

        let mut message = report.to_note_message();
        if let Some(err) = abort {
            message = format!("{message}Synchronization aborted: {err}<br>\n");
        }

        let note = build_report_note(&staff, &user, message, Utc::now());
        self.recras.post_note(&note).await
    }
}
