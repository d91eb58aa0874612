//! Application constants
//!
//! Business-key conventions shared by the Recras and Exact Online sides of
//! the synchronization. Exact Online administrations are prepared by hand
//! with entities that carry these keys.

// Exact Online reference entities
pub const PAYMENT_CONDITION_DESCRIPTION: &str = "recras";
pub const JOURNAL_CODE: &str = "recras";
pub const ITEM_GROUP_CODE: &str = "recras";
pub const ITEM_UNIT: &str = "recras";
pub const VAT_CODE_DESCRIPTION_PREFIX: &str = "recras:";
pub const SALES_INVOICE_DOCUMENT_TYPE: &str = "Sales invoice";

// Derived business keys
pub const ITEM_CODE_PREFIX: &str = "recras";
pub const ACCOUNT_SEARCH_CODE_PREFIX: &str = "K";
pub const LEGACY_ACCOUNT_CODE_PREFIX: &str = "732727";
pub const ACCOUNT_STATUS_CUSTOMER: &str = "C";

// Sales entries
pub const SALES_ENTRY_DESCRIPTION_PREFIX: &str = "Recras factuur: ";
pub const INVOICE_DOCUMENT_SUBJECT_PREFIX: &str = "Recras factuur ";

/// Amounts with a smaller magnitude are treated as zero and not booked.
pub const AMOUNT_EPSILON: f64 = 1e-3;

// Synchronization report note
pub const NOTE_KIND: &str = "noot";
pub const NOTE_SUBJECT: &str = "Synchronisatierapport";
pub const NOTE_FOLLOW_UP_REMARK: &str = "Synchronisatierapport Exact Online";

// Endpoints
pub const EXACT_BASE_URL_NL: &str = "https://start.exactonline.nl";
pub const EXACT_TOKEN_PATH: &str = "/api/oauth2/token";
