use chrono::NaiveDate;
use koppeling_domain::types::recras::{
    Company, Customer, GroupLine, Invoice, InvoiceLine, ItemLine, Product,
};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn company(id: i64, name: &str, vat_number: &str) -> Company {
    Company { id, name: name.into(), vat_number: vat_number.into() }
}

pub fn product(id: i64, name: &str) -> Product {
    Product { id, supplier_id: None, name: name.into() }
}

pub fn item_line(product_id: i64, quantity: f64, amount: f64, vat: f64) -> InvoiceLine {
    InvoiceLine::Item(ItemLine {
        name: format!("Product {product_id}"),
        quantity,
        amount,
        vat_percentage: vat,
        product_id,
        ..ItemLine::default()
    })
}

pub fn group(discount: f64, lines: Vec<InvoiceLine>) -> InvoiceLine {
    InvoiceLine::Group(GroupLine { name: "Arrangement".into(), discount_percentage: discount, lines, ..GroupLine::default() })
}

pub fn invoice(id: i64, company_id: i64, number: &str, lines: Vec<InvoiceLine>) -> Invoice {
    Invoice {
        id,
        customer_id: 500 + id,
        status: "verzonden".into(),
        invoice_number: number.into(),
        date: Some(date(2024, 3, 1)),
        payment_term_days: 14,
        company_id,
        customer_reference: format!("ref-{id}"),
        lines,
        customer: Customer {
            id: 500 + id,
            display_name: format!("Klant {id}"),
            address: "Dorpsstraat 1".into(),
            postcode: "1234 AB".into(),
            city: "Utrecht".into(),
        },
        pdf_location: String::new(),
        total_incl_vat: 121.0,
    }
}
