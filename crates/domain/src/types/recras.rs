//! Recras (source system) entities
//!
//! Field names follow the Recras `api2` JSON; the Rust names are English.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::impl_domain_status_conversions;

/// A legal entity ("bedrijf") administered in Recras.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: i64,
    #[serde(rename = "bedrijfsnaam", default)]
    pub name: String,
    #[serde(rename = "btw_nummer", default)]
    pub vat_number: String,
}

/// A sellable product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    #[serde(rename = "leverancier_id", default)]
    pub supplier_id: Option<i64>,
    #[serde(rename = "naam", default)]
    pub name: String,
}

/// Customer snapshot embedded in an invoice (`embed=Klant`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    #[serde(default)]
    pub id: i64,
    #[serde(rename = "displaynaam", default)]
    pub display_name: String,
    #[serde(rename = "adres", default)]
    pub address: String,
    #[serde(default)]
    pub postcode: String,
    #[serde(rename = "plaats", default)]
    pub city: String,
}

/// Invoice status keywords used by the `status` filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceStatus {
    Concept,
    Sent,
    PartiallyPaid,
    Paid,
}

impl_domain_status_conversions!(InvoiceStatus {
    Concept => "concept",
    Sent => "verzonden",
    PartiallyPaid => "deels_betaald",
    Paid => "betaald",
});

impl InvoiceStatus {
    /// Statuses of invoices that are final enough to be booked.
    pub const BOOKABLE: [Self; 3] = [Self::Sent, Self::PartiallyPaid, Self::Paid];
}

/// An invoice ("factuur") with its lines and customer embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: i64,
    #[serde(rename = "klant_id", default)]
    pub customer_id: i64,
    #[serde(default)]
    pub status: String,
    #[serde(rename = "factuur_nummer")]
    pub invoice_number: String,
    #[serde(rename = "datum", default)]
    pub date: Option<NaiveDate>,
    /// Payment term in days.
    #[serde(rename = "betaaltermijn", default)]
    pub payment_term_days: i64,
    #[serde(rename = "bedrijf_id", default)]
    pub company_id: i64,
    #[serde(rename = "referentie_klant", default)]
    pub customer_reference: String,
    #[serde(rename = "regels", default)]
    pub lines: Vec<InvoiceLine>,
    #[serde(rename = "Klant", default)]
    pub customer: Customer,
    #[serde(rename = "pdf_locatie", default)]
    pub pdf_location: String,
    /// Gross total; a negative value marks a credit note.
    #[serde(rename = "calculated_totaalbedrag_inclusief_btw", default)]
    pub total_incl_vat: f64,
}

/// One line of an invoice, discriminated by its `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InvoiceLine {
    #[serde(rename = "groep")]
    Group(GroupLine),
    #[serde(rename = "item")]
    Item(ItemLine),
    /// Text and other line kinds that carry no amount.
    #[serde(other)]
    Other,
}

/// A group of nested lines sharing one discount.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupLine {
    #[serde(default)]
    pub id: i64,
    #[serde(rename = "naam", default)]
    pub name: String,
    #[serde(rename = "kortingspercentage", default)]
    pub discount_percentage: f64,
    #[serde(rename = "regels", default)]
    pub lines: Vec<InvoiceLine>,
}

/// A leaf line referencing a product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemLine {
    #[serde(default)]
    pub id: i64,
    #[serde(rename = "naam", default)]
    pub name: String,
    #[serde(rename = "kortingspercentage", default)]
    pub discount_percentage: f64,
    #[serde(rename = "aantal", default)]
    pub quantity: f64,
    /// Unit price.
    #[serde(rename = "bedrag", default)]
    pub amount: f64,
    #[serde(rename = "btw_percentage", default)]
    pub vat_percentage: f64,
    #[serde(default)]
    pub product_id: i64,
    #[serde(rename = "boekingsregel_id", default)]
    pub booking_line_id: Option<i64>,
}

/// Query for `GET /api2/facturen`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceFilter {
    pub statuses: Vec<InvoiceStatus>,
    /// Only invoices dated on or after this day.
    pub date_from: NaiveDate,
    pub company_id: i64,
}

impl InvoiceFilter {
    /// Bookable invoices of `company_id` since `date_from`.
    #[must_use]
    pub fn bookable(company_id: i64, date_from: NaiveDate) -> Self {
        Self { statuses: InvoiceStatus::BOOKABLE.to_vec(), date_from, company_id }
    }

    /// Comma separated status keywords.
    #[must_use]
    pub fn status_param(&self) -> String {
        self.statuses.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
    }
}

/// The staff member ("personeel") the API credentials belong to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Staff {
    #[serde(default)]
    pub id: i64,
    #[serde(rename = "displaynaam", default)]
    pub display_name: String,
    #[serde(rename = "contactpersoon_id", default)]
    pub contact_person_id: i64,
}

/// A role a user belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    #[serde(default)]
    pub id: i64,
}

/// A user ("gebruiker") with embedded roles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: i64,
    #[serde(rename = "rollen", default)]
    pub roles: Vec<Role>,
}

impl User {
    /// Id of the first role, or 0 when the user has none.
    #[must_use]
    pub fn first_role_id(&self) -> i64 {
        self.roles.first().map_or(0, |role| role.id)
    }
}

/// A note ("contactmoment") attached to a contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "soort_contact")]
    pub kind: String,
    #[serde(rename = "contact_id")]
    pub contact_id: i64,
    #[serde(rename = "contactpersoon_id")]
    pub contact_person_id: i64,
    #[serde(rename = "onderwerp")]
    pub subject: String,
    #[serde(rename = "bericht")]
    pub message: String,
    #[serde(rename = "ondertekening", default)]
    pub signature: String,
    #[serde(default)]
    pub sticky: bool,
    #[serde(rename = "contact_opnemen", default)]
    pub follow_up_at: Option<DateTime<Utc>>,
    #[serde(rename = "contact_opnemen_group", default)]
    pub follow_up_group: i64,
    #[serde(rename = "contact_opnemen_opmerking", default)]
    pub follow_up_remark: String,
}

/// A single Recras setting ("instelling").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    #[serde(rename = "waarde", default)]
    pub value: String,
}

impl Setting {
    /// Split a comma separated setting value into trimmed, non-empty parts.
    #[must_use]
    pub fn list_values(&self) -> Vec<String> {
        self.value
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(ToString::to_string)
            .collect()
    }
}
