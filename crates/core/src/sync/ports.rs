//! Port interfaces for sync operations

use async_trait::async_trait;
use koppeling_domain::types::exact::{
    Account, Division, Document, DocumentAttachment, DocumentType, Item, ItemGroup, Journal,
    PaymentCondition, SalesEntry, VatCode,
};
use koppeling_domain::types::recras::{
    Company, Invoice, InvoiceFilter, Note, Product, Staff, User,
};
use koppeling_domain::ApiResult;

/// Exact Online, the target administration
///
/// Every division-scoped call takes the division explicitly. Lookups return
/// [`koppeling_domain::ApiError::NotFound`] when nothing matches.
#[async_trait]
pub trait ExactApi: Send + Sync {
    // Divisions
    /// Division of the user behind the current credential
    async fn current_division(&self) -> ApiResult<i64>;

    /// Find the division with `vat_number` as seen from `division`
    async fn find_division_by_vat_number(
        &self,
        division: i64,
        vat_number: &str,
    ) -> ApiResult<Division>;

    /// All divisions reachable with the current credential, listed from `division`
    async fn list_divisions(&self, division: i64) -> ApiResult<Vec<Division>>;

    // Accounts
    /// Find the account of a Recras customer by its search code
    async fn find_account_by_external_key(
        &self,
        division: i64,
        customer_id: i64,
    ) -> ApiResult<Account>;

    async fn create_account(&self, division: i64, account: &Account) -> ApiResult<Account>;

    // Items
    /// Find the item of a Recras product by its code
    async fn find_item_by_external_key(&self, division: i64, product_id: i64) -> ApiResult<Item>;

    async fn create_item(&self, division: i64, item: &Item) -> ApiResult<Item>;

    async fn get_all_items(&self, division: i64) -> ApiResult<Vec<Item>>;

    // Reference entities
    async fn find_payment_condition_by_description(
        &self,
        division: i64,
        description: &str,
    ) -> ApiResult<PaymentCondition>;

    async fn find_journal_by_code(&self, division: i64, code: &str) -> ApiResult<Journal>;

    async fn find_default_item_group(&self, division: i64) -> ApiResult<ItemGroup>;

    /// VAT codes whose description starts with `recras:`
    async fn vat_codes_matching_convention(&self, division: i64) -> ApiResult<Vec<VatCode>>;

    async fn find_document_type_by_description(
        &self,
        division: i64,
        description: &str,
    ) -> ApiResult<DocumentType>;

    // Documents
    async fn create_document(&self, division: i64, document: &Document) -> ApiResult<Document>;

    async fn create_document_attachment(
        &self,
        division: i64,
        attachment: &DocumentAttachment,
    ) -> ApiResult<DocumentAttachment>;

    // Sales entries
    /// Find a sales entry whose description contains `invoice_number`
    async fn find_sales_entry_by_invoice_number(
        &self,
        division: i64,
        invoice_number: &str,
    ) -> ApiResult<SalesEntry>;

    async fn create_sales_entry(&self, division: i64, entry: &SalesEntry)
        -> ApiResult<SalesEntry>;
}

/// Recras, the source of invoices
#[async_trait]
pub trait RecrasApi: Send + Sync {
    async fn list_companies(&self) -> ApiResult<Vec<Company>>;

    async fn list_products(&self) -> ApiResult<Vec<Product>>;

    async fn list_invoices(&self, filter: &InvoiceFilter) -> ApiResult<Vec<Invoice>>;

    /// Staff member the API credentials belong to
    async fn current_staff(&self) -> ApiResult<Staff>;

    /// User record of a staff member with its roles embedded
    async fn user_with_roles(&self, staff_id: i64) -> ApiResult<User>;

    async fn post_note(&self, note: &Note) -> ApiResult<()>;

    /// Download the rendered PDF of an invoice
    async fn fetch_pdf(&self, pdf_location: &str) -> ApiResult<Vec<u8>>;

    /// Configured VAT percentages, as written in the setting
    async fn vat_percentages(&self) -> ApiResult<Vec<String>>;

    /// Check that the username and password are accepted
    async fn validate_credentials(&self) -> ApiResult<()>;
}

/// Resolves a Recras product id to its Exact Online item
#[async_trait]
pub trait ItemResolver: Send + Sync {
    async fn resolve(&self, product_id: i64) -> ApiResult<Item>;
}
