use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use koppeling_core::sync::mapper::item_code;
use koppeling_core::ExactApi;
use koppeling_domain::types::exact::{
    Account, Division, Document, DocumentAttachment, DocumentType, Item, ItemGroup, Journal,
    PaymentCondition, SalesEntry, VatCode,
};
use koppeling_domain::{ApiError, ApiResult};

/// Everything stored in one fake division.
#[derive(Debug, Clone, Default)]
pub struct DivisionState {
    pub vat_number: String,
    pub payment_condition: Option<PaymentCondition>,
    pub journal: Option<Journal>,
    pub item_group: Option<ItemGroup>,
    pub vat_codes: Vec<VatCode>,
    pub document_type: Option<DocumentType>,
    pub items: Vec<Item>,
    pub accounts: Vec<Account>,
    pub documents: Vec<Document>,
    pub attachments: Vec<DocumentAttachment>,
    pub sales_entries: Vec<SalesEntry>,
}

impl DivisionState {
    /// A division with every reference entity prepared.
    pub fn prepared(vat_number: &str) -> Self {
        Self {
            vat_number: vat_number.to_string(),
            payment_condition: Some(PaymentCondition {
                id: "pc-guid".into(),
                code: "14".into(),
                description: "recras".into(),
            }),
            journal: Some(Journal { id: "j-guid".into(), code: "recras".into(), description: "Recras verkoop".into() }),
            item_group: Some(ItemGroup { id: "ig-guid".into(), code: "recras".into(), description: "Recras".into() }),
            vat_codes: vec![
                VatCode { id: "v1".into(), code: "2".into(), description: "recras:21".into() },
                VatCode { id: "v2".into(), code: "7".into(), description: "recras:9".into() },
            ],
            document_type: Some(DocumentType { id: 10, description: "Sales invoice".into() }),
            ..Self::default()
        }
    }
}

#[derive(Debug, Default)]
pub struct ExactState {
    pub current_division: i64,
    /// Divisions by code; each one sees only itself through `hrm/Divisions`.
    pub divisions: HashMap<i64, DivisionState>,
    /// Revenue account given to newly created items.
    pub revenue_account_on_create: String,
    pub fail_current_division: Option<ApiError>,
    /// Fail `create_sales_entry` for descriptions containing the key.
    pub fail_sales_entry: Option<(String, ApiError)>,
    /// Fail `create_item` for the item with this code.
    pub fail_item: Option<(String, ApiError)>,
    pub calls: Vec<String>,
    next_id: u64,
}

/// In-memory Exact Online.
#[derive(Clone, Default)]
pub struct FakeExact {
    pub state: Arc<Mutex<ExactState>>,
}

impl FakeExact {
    pub fn new(current_division: i64) -> Self {
        let fake = Self::default();
        {
            let mut state = fake.state.lock().unwrap();
            state.current_division = current_division;
            state.revenue_account_on_create = "8000".into();
        }
        fake
    }

    pub fn with_division(self, code: i64, division: DivisionState) -> Self {
        self.state.lock().unwrap().divisions.insert(code, division);
        self
    }

    pub fn division(&self, code: i64) -> DivisionState {
        self.state.lock().unwrap().divisions.get(&code).cloned().unwrap_or_default()
    }

    pub fn update_division(&self, code: i64, update: impl FnOnce(&mut DivisionState)) {
        let mut state = self.state.lock().unwrap();
        update(state.divisions.entry(code).or_default());
    }

    fn with_state<T>(
        &self,
        division: i64,
        call: &str,
        f: impl FnOnce(&mut DivisionState, &mut u64) -> ApiResult<T>,
    ) -> ApiResult<T> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("{call}@{division}"));
        let ExactState { divisions, next_id, .. } = &mut *state;
        let division_state = divisions.get_mut(&division).ok_or_else(|| ApiError::Http {
            status: 403,
            method: "GET".into(),
            url: format!("/api/v1/{division}"),
            body: "Forbidden".into(),
        })?;
        f(division_state, next_id)
    }
}

fn new_id(next_id: &mut u64, prefix: &str) -> String {
    *next_id += 1;
    format!("{prefix}-{next_id}")
}

#[async_trait]
impl ExactApi for FakeExact {
    async fn current_division(&self) -> ApiResult<i64> {
        let state = self.state.lock().unwrap();
        match &state.fail_current_division {
            Some(err) => Err(err.clone()),
            None => Ok(state.current_division),
        }
    }

    async fn find_division_by_vat_number(&self, division: i64, vat_number: &str) -> ApiResult<Division> {
        self.with_state(division, "find_division", |state, _| {
            if state.vat_number == vat_number {
                Ok(Division { code: division, vat_number: vat_number.to_string(), ..Division::default() })
            } else {
                Err(ApiError::not_found("Division", vat_number))
            }
        })
    }

    async fn list_divisions(&self, division: i64) -> ApiResult<Vec<Division>> {
        let state = self.state.lock().unwrap();
        if !state.divisions.contains_key(&division) {
            return Err(ApiError::not_found("Division", division));
        }
        let mut codes: Vec<_> = state.divisions.keys().copied().collect();
        codes.sort_unstable();
        Ok(codes.into_iter().map(|code| Division { code, ..Division::default() }).collect())
    }

    async fn find_account_by_external_key(&self, division: i64, customer_id: i64) -> ApiResult<Account> {
        self.with_state(division, "find_account", |state, _| {
            state
                .accounts
                .iter()
                .find(|account| account.search_code == format!("K{customer_id}"))
                .cloned()
                .ok_or_else(|| ApiError::not_found("Account", customer_id))
        })
    }

    async fn create_account(&self, division: i64, account: &Account) -> ApiResult<Account> {
        account.validate()?;
        self.with_state(division, "create_account", |state, next_id| {
            let created = Account { id: new_id(next_id, "acc"), ..account.clone() };
            state.accounts.push(created.clone());
            Ok(created)
        })
    }

    async fn find_item_by_external_key(&self, division: i64, product_id: i64) -> ApiResult<Item> {
        self.with_state(division, "find_item", |state, _| {
            state
                .items
                .iter()
                .find(|item| item.code == item_code(product_id))
                .cloned()
                .ok_or_else(|| ApiError::not_found("Item", item_code(product_id)))
        })
    }

    async fn create_item(&self, division: i64, item: &Item) -> ApiResult<Item> {
        item.validate()?;
        let (revenue, failure) = {
            let state = self.state.lock().unwrap();
            (state.revenue_account_on_create.clone(), state.fail_item.clone())
        };
        if let Some((code, err)) = failure {
            if item.code == code {
                return Err(err);
            }
        }
        self.with_state(division, "create_item", |state, next_id| {
            let created = Item { id: new_id(next_id, "item"), gl_revenue: revenue, ..item.clone() };
            state.items.push(created.clone());
            Ok(created)
        })
    }

    async fn get_all_items(&self, division: i64) -> ApiResult<Vec<Item>> {
        self.with_state(division, "get_all_items", |state, _| Ok(state.items.clone()))
    }

    async fn find_payment_condition_by_description(
        &self,
        division: i64,
        description: &str,
    ) -> ApiResult<PaymentCondition> {
        self.with_state(division, "find_payment_condition", |state, _| {
            state
                .payment_condition
                .clone()
                .filter(|condition| condition.description == description)
                .ok_or_else(|| ApiError::not_found("PaymentCondition", description))
        })
    }

    async fn find_journal_by_code(&self, division: i64, code: &str) -> ApiResult<Journal> {
        self.with_state(division, "find_journal", |state, _| {
            state
                .journal
                .clone()
                .filter(|journal| journal.code == code)
                .ok_or_else(|| ApiError::not_found("Journal", code))
        })
    }

    async fn find_default_item_group(&self, division: i64) -> ApiResult<ItemGroup> {
        self.with_state(division, "find_item_group", |state, _| {
            state.item_group.clone().ok_or_else(|| ApiError::not_found("ItemGroup", "recras"))
        })
    }

    async fn vat_codes_matching_convention(&self, division: i64) -> ApiResult<Vec<VatCode>> {
        self.with_state(division, "vat_codes", |state, _| {
            Ok(state.vat_codes.iter().filter(|code| code.description.contains("recras:")).cloned().collect())
        })
    }

    async fn find_document_type_by_description(
        &self,
        division: i64,
        description: &str,
    ) -> ApiResult<DocumentType> {
        self.with_state(division, "find_document_type", |state, _| {
            state
                .document_type
                .clone()
                .filter(|kind| kind.description == description)
                .ok_or_else(|| ApiError::not_found("DocumentType", description))
        })
    }

    async fn create_document(&self, division: i64, document: &Document) -> ApiResult<Document> {
        document.validate()?;
        self.with_state(division, "create_document", |state, next_id| {
            let created = Document { id: new_id(next_id, "doc"), ..document.clone() };
            state.documents.push(created.clone());
            Ok(created)
        })
    }

    async fn create_document_attachment(
        &self,
        division: i64,
        attachment: &DocumentAttachment,
    ) -> ApiResult<DocumentAttachment> {
        attachment.validate()?;
        self.with_state(division, "create_attachment", |state, next_id| {
            let created = DocumentAttachment { id: new_id(next_id, "att"), ..attachment.clone() };
            state.attachments.push(created.clone());
            Ok(created)
        })
    }

    async fn find_sales_entry_by_invoice_number(
        &self,
        division: i64,
        invoice_number: &str,
    ) -> ApiResult<SalesEntry> {
        self.with_state(division, "find_sales_entry", |state, _| {
            state
                .sales_entries
                .iter()
                .find(|entry| entry.payment_reference == invoice_number)
                .cloned()
                .ok_or_else(|| ApiError::not_found("SalesEntry", invoice_number))
        })
    }

    async fn create_sales_entry(&self, division: i64, entry: &SalesEntry) -> ApiResult<SalesEntry> {
        entry.validate()?;
        let failure = self.state.lock().unwrap().fail_sales_entry.clone();
        if let Some((key, err)) = failure {
            if entry.description.contains(&key) {
                return Err(err);
            }
        }
        self.with_state(division, "create_sales_entry", |state, next_id| {
            let created = SalesEntry { id: new_id(next_id, "entry"), ..entry.clone() };
            state.sales_entries.push(created.clone());
            Ok(created)
        })
    }
}
