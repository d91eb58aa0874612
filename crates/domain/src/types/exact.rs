//! Exact Online (target system) entities
//!
//! Field names on the wire are PascalCase. Ids are GUID strings unless noted.
//! Empty ids are omitted on writes so Exact Online assigns them.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::constants::VAT_CODE_DESCRIPTION_PREFIX;
use crate::errors::{ApiError, ApiResult};
use crate::utils::odata;

fn is_blank(value: &str) -> bool {
    value.is_empty()
}

/// A relation (customer) in a division.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Account {
    #[serde(rename = "ID", skip_serializing_if = "is_blank")]
    pub id: String,
    #[serde(skip_serializing_if = "is_blank")]
    pub code: String,
    pub name: String,
    #[serde(skip_serializing_if = "is_blank")]
    pub address_line1: String,
    #[serde(skip_serializing_if = "is_blank")]
    pub postcode: String,
    #[serde(skip_serializing_if = "is_blank")]
    pub city: String,
    #[serde(skip_serializing_if = "is_blank")]
    pub search_code: String,
    #[serde(skip_serializing_if = "is_blank")]
    pub status: String,
}

impl Account {
    /// Check mandatory fields before the account is created.
    ///
    /// # Errors
    /// [`ApiError::Validation`] naming the first empty field.
    pub fn validate(&self) -> ApiResult<()> {
        if self.name.is_empty() {
            return Err(ApiError::validation("Account", "Name"));
        }
        Ok(())
    }
}

/// A logistics item backing invoice lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Item {
    #[serde(rename = "ID", skip_serializing_if = "is_blank")]
    pub id: String,
    pub code: String,
    pub description: String,
    #[serde(with = "odata::option_date")]
    pub start_date: Option<NaiveDate>,
    pub is_sales_item: bool,
    #[serde(skip_serializing_if = "is_blank")]
    pub unit: String,
    /// Revenue GL account; required before the item can back a line.
    #[serde(rename = "GLRevenue", skip_serializing_if = "is_blank")]
    pub gl_revenue: String,
}

impl Item {
    #[must_use]
    pub fn has_revenue_account(&self) -> bool {
        !self.gl_revenue.trim().is_empty()
    }

    /// Check mandatory fields before the item is created.
    ///
    /// # Errors
    /// [`ApiError::Validation`] naming the first empty field.
    pub fn validate(&self) -> ApiResult<()> {
        if self.code.is_empty() {
            return Err(ApiError::validation("Item", "Code"));
        }
        if self.description.is_empty() {
            return Err(ApiError::validation("Item", "Description"));
        }
        if self.unit.is_empty() {
            return Err(ApiError::validation("Item", "Unit"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ItemGroup {
    #[serde(rename = "ID")]
    pub id: String,
    pub code: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Journal {
    #[serde(rename = "ID")]
    pub id: String,
    pub code: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PaymentCondition {
    #[serde(rename = "ID", skip_serializing_if = "is_blank")]
    pub id: String,
    pub code: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct VatCode {
    #[serde(rename = "ID")]
    pub id: String,
    pub code: String,
    pub description: String,
}

impl VatCode {
    /// Percentage encoded in a `recras:<p>` description.
    ///
    /// A comma is accepted as decimal separator. Returns `None` for
    /// descriptions that do not follow the convention.
    #[must_use]
    pub fn conventional_percentage(&self) -> Option<f64> {
        let raw = self.description.trim().strip_prefix(VAT_CODE_DESCRIPTION_PREFIX)?;
        raw.trim().replace(',', ".").parse::<f64>().ok().filter(|p| p.is_finite())
    }
}

/// VAT percentage to VAT code lookup, keyed on hundredths of a percent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VatCodeTable {
    codes: HashMap<i64, String>,
}

impl VatCodeTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn key(percentage: f64) -> i64 {
        (percentage * 100.0).round() as i64
    }

    pub fn insert(&mut self, percentage: f64, code: impl Into<String>) {
        self.codes.insert(Self::key(percentage), code.into());
    }

    #[must_use]
    pub fn get(&self, percentage: f64) -> Option<&str> {
        self.codes.get(&Self::key(percentage)).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

impl FromIterator<(f64, String)> for VatCodeTable {
    fn from_iter<T: IntoIterator<Item = (f64, String)>>(iter: T) -> Self {
        let mut table = Self::new();
        for (percentage, code) in iter {
            table.insert(percentage, code);
        }
        table
    }
}

/// Sales entry type: a normal invoice or a credit note.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum SalesEntryType {
    #[default]
    Invoice,
    CreditNote,
}

impl From<SalesEntryType> for i32 {
    fn from(kind: SalesEntryType) -> Self {
        match kind {
            SalesEntryType::Invoice => 20,
            SalesEntryType::CreditNote => 21,
        }
    }
}

impl TryFrom<i32> for SalesEntryType {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            20 => Ok(Self::Invoice),
            21 => Ok(Self::CreditNote),
            other => Err(format!("unknown sales entry type {other}")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SalesEntryLine {
    #[serde(rename = "ID", skip_serializing_if = "is_blank")]
    pub id: String,
    #[serde(rename = "AmountFC")]
    pub amount_fc: f64,
    pub description: String,
    #[serde(rename = "GLAccount")]
    pub gl_account: String,
    pub quantity: f64,
    #[serde(rename = "VATCode")]
    pub vat_code: String,
}

/// Lines of a sales entry: inline on writes, deferred or inline on reads.
mod entry_lines {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::SalesEntryLine;

    pub fn serialize<S: Serializer>(
        lines: &[SalesEntryLine],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        lines.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<SalesEntryLine>, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Inline(Vec<SalesEntryLine>),
            Expanded { results: Vec<SalesEntryLine> },
            Deferred(serde::de::IgnoredAny),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Inline(lines) | Raw::Expanded { results: lines } => lines,
            Raw::Deferred(_) => Vec::new(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SalesEntry {
    #[serde(rename = "EntryID", skip_serializing_if = "is_blank")]
    pub id: String,
    pub customer: String,
    pub description: String,
    #[serde(with = "odata::option_date")]
    pub due_date: Option<NaiveDate>,
    #[serde(with = "odata::option_date")]
    pub entry_date: Option<NaiveDate>,
    pub journal: String,
    pub payment_condition: String,
    #[serde(skip_serializing_if = "is_blank")]
    pub payment_reference: String,
    pub your_ref: String,
    #[serde(skip_serializing_if = "is_blank")]
    pub document: String,
    #[serde(with = "entry_lines")]
    pub sales_entry_lines: Vec<SalesEntryLine>,
    #[serde(rename = "Type")]
    pub entry_type: SalesEntryType,
}

impl SalesEntry {
    /// Check mandatory fields before the entry is created.
    ///
    /// # Errors
    /// [`ApiError::Validation`] naming the first empty field.
    pub fn validate(&self) -> ApiResult<()> {
        if self.sales_entry_lines.is_empty() {
            return Err(ApiError::validation("SalesEntry", "SalesEntryLines"));
        }
        if self.customer.is_empty() {
            return Err(ApiError::validation("SalesEntry", "Customer"));
        }
        if self.payment_condition.is_empty() {
            return Err(ApiError::validation("SalesEntry", "PaymentCondition"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DocumentType {
    #[serde(rename = "ID")]
    pub id: i32,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Document {
    #[serde(rename = "ID", skip_serializing_if = "is_blank")]
    pub id: String,
    pub subject: String,
    #[serde(rename = "Type")]
    pub document_type: i32,
    #[serde(skip_serializing_if = "is_blank")]
    pub account: String,
}

impl Document {
    /// Check mandatory fields before the document is created.
    ///
    /// # Errors
    /// [`ApiError::Validation`] naming the first empty field.
    pub fn validate(&self) -> ApiResult<()> {
        if self.subject.is_empty() {
            return Err(ApiError::validation("Document", "Subject"));
        }
        if self.document_type == 0 {
            return Err(ApiError::validation("Document", "Type"));
        }
        if self.account.is_empty() {
            return Err(ApiError::validation("Document", "Account"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DocumentAttachment {
    #[serde(rename = "ID", skip_serializing_if = "is_blank")]
    pub id: String,
    #[serde(with = "odata::binary")]
    pub attachment: Option<Vec<u8>>,
    pub document: String,
    pub file_name: String,
}

impl DocumentAttachment {
    /// Check mandatory fields before the attachment is created.
    ///
    /// # Errors
    /// [`ApiError::Validation`] naming the first empty field.
    pub fn validate(&self) -> ApiResult<()> {
        if self.document.is_empty() {
            return Err(ApiError::validation("DocumentAttachment", "Document"));
        }
        if self.file_name.is_empty() {
            return Err(ApiError::validation("DocumentAttachment", "FileName"));
        }
        if self.attachment.is_none() {
            return Err(ApiError::validation("DocumentAttachment", "Attachment"));
        }
        Ok(())
    }
}

/// An administration in Exact Online.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Division {
    pub code: i64,
    #[serde(rename = "HID", with = "odata::string_int")]
    pub hid: i64,
    #[serde(rename = "VATNumber")]
    pub vat_number: String,
    pub main: bool,
    pub country: String,
}

/// The user behind the current access token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Me {
    pub current_division: i64,
    pub full_name: String,
}
