//! Domain types and models

pub mod credential;
pub mod exact;
pub mod recras;

pub use credential::{LinkState, TenantCredential};
pub use exact::{
    Account, Division, Document, DocumentAttachment, DocumentType, Item, ItemGroup, Journal, Me,
    PaymentCondition, SalesEntry, SalesEntryLine, SalesEntryType, VatCode, VatCodeTable,
};
pub use recras::{
    Company, Customer, GroupLine, Invoice, InvoiceFilter, InvoiceLine, InvoiceStatus, ItemLine,
    Note, Product, Role, Setting, Staff, User,
};
