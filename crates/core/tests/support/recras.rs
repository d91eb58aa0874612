use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use koppeling_core::RecrasApi;
use koppeling_domain::types::recras::{
    Company, Invoice, InvoiceFilter, Note, Product, Role, Staff, User,
};
use koppeling_domain::{ApiError, ApiResult};

#[derive(Debug, Default)]
pub struct RecrasState {
    pub companies: Vec<Company>,
    pub products: Vec<Product>,
    pub invoices: Vec<Invoice>,
    pub staff: Staff,
    pub user: Option<User>,
    pub pdfs: HashMap<String, Vec<u8>>,
    pub vat_percentages: Vec<String>,
    pub notes: Vec<Note>,
    pub fail_list_companies: Option<ApiError>,
    pub fail_list_invoices: Option<ApiError>,
    pub filters: Vec<InvoiceFilter>,
}

/// In-memory Recras.
#[derive(Clone, Default)]
pub struct FakeRecras {
    pub state: Arc<Mutex<RecrasState>>,
}

impl FakeRecras {
    pub fn new() -> Self {
        let fake = Self::default();
        {
            let mut state = fake.state.lock().unwrap();
            state.staff = Staff { id: 7, display_name: "Koppeling".into(), contact_person_id: 70 };
            state.user = Some(User { id: 7, roles: vec![Role { id: 3 }] });
            state.vat_percentages = vec!["21".into(), "9".into()];
        }
        fake
    }

    pub fn with_company(self, company: Company) -> Self {
        self.state.lock().unwrap().companies.push(company);
        self
    }

    pub fn with_product(self, product: Product) -> Self {
        self.state.lock().unwrap().products.push(product);
        self
    }

    pub fn with_invoice(self, invoice: Invoice) -> Self {
        self.state.lock().unwrap().invoices.push(invoice);
        self
    }

    pub fn with_pdf(self, location: &str, bytes: &[u8]) -> Self {
        self.state.lock().unwrap().pdfs.insert(location.to_string(), bytes.to_vec());
        self
    }

    pub fn notes(&self) -> Vec<Note> {
        self.state.lock().unwrap().notes.clone()
    }
}

#[async_trait]
impl RecrasApi for FakeRecras {
    async fn list_companies(&self) -> ApiResult<Vec<Company>> {
        let state = self.state.lock().unwrap();
        match &state.fail_list_companies {
            Some(err) => Err(err.clone()),
            None => Ok(state.companies.clone()),
        }
    }

    async fn list_products(&self) -> ApiResult<Vec<Product>> {
        Ok(self.state.lock().unwrap().products.clone())
    }

    async fn list_invoices(&self, filter: &InvoiceFilter) -> ApiResult<Vec<Invoice>> {
        let mut state = self.state.lock().unwrap();
        state.filters.push(filter.clone());
        if let Some(err) = &state.fail_list_invoices {
            return Err(err.clone());
        }
        let statuses: Vec<String> = filter.statuses.iter().map(ToString::to_string).collect();
        Ok(state
            .invoices
            .iter()
            .filter(|invoice| invoice.company_id == filter.company_id)
            .filter(|invoice| invoice.date.is_some_and(|date| date >= filter.date_from))
            .filter(|invoice| statuses.contains(&invoice.status))
            .cloned()
            .collect())
    }

    async fn current_staff(&self) -> ApiResult<Staff> {
        Ok(self.state.lock().unwrap().staff.clone())
    }

    async fn user_with_roles(&self, staff_id: i64) -> ApiResult<User> {
        self.state
            .lock()
            .unwrap()
            .user
            .clone()
            .filter(|user| user.id == staff_id)
            .ok_or_else(|| ApiError::not_found("User", staff_id))
    }

    async fn post_note(&self, note: &Note) -> ApiResult<()> {
        self.state.lock().unwrap().notes.push(note.clone());
        Ok(())
    }

    async fn fetch_pdf(&self, location: &str) -> ApiResult<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .pdfs
            .get(location)
            .cloned()
            .ok_or_else(|| ApiError::Http {
                status: 404,
                method: "GET".into(),
                url: location.to_string(),
                body: String::new(),
            })
    }

    async fn vat_percentages(&self) -> ApiResult<Vec<String>> {
        Ok(self.state.lock().unwrap().vat_percentages.clone())
    }

    async fn validate_credentials(&self) -> ApiResult<()> {
        Ok(())
    }
}
