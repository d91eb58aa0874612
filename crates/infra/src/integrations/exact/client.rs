//! Exact Online REST client
//!
//! Talks to the OData endpoints under `/api/v1/<division>/`. Lists arrive as
//! `{"d":{"results":[...]}}`, created entities as `{"d":{...}}`.

use std::sync::Arc;

use async_trait::async_trait;
use koppeling_core::sync::mapper::{account_search_code, item_code};
use koppeling_core::ExactApi;
use koppeling_domain::constants::{
    ITEM_GROUP_CODE, LEGACY_ACCOUNT_CODE_PREFIX, VAT_CODE_DESCRIPTION_PREFIX,
};
use koppeling_domain::types::exact::{
    Account, Division, Document, DocumentAttachment, DocumentType, Item, ItemGroup, Journal, Me,
    PaymentCondition, SalesEntry, VatCode,
};
use koppeling_domain::{ApiError, ApiResult};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::api::errors::{decode_json, expect_status};
use crate::api::AccessTokenProvider;
use crate::http::HttpClient;

#[derive(Deserialize)]
struct ListEnvelope<T> {
    d: ListBody<T>,
}

#[derive(Deserialize)]
struct ListBody<T> {
    results: Vec<T>,
}

#[derive(Deserialize)]
struct EntityEnvelope<T> {
    d: T,
}

/// Quote a literal for use inside an OData `$filter`.
fn literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Exact Online client bound to one access-token provider.
pub struct ExactClient {
    http: HttpClient,
    base_url: String,
    auth: Arc<dyn AccessTokenProvider>,
}

impl ExactClient {
    pub fn new(
        http: HttpClient,
        base_url: impl Into<String>,
        auth: Arc<dyn AccessTokenProvider>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url, auth }
    }

    fn division_url(&self, division: i64, resource: &str) -> ApiResult<String> {
        if division <= 0 {
            return Err(ApiError::NoDivision);
        }
        Ok(format!("{}/api/v1/{division}/{resource}", self.base_url))
    }

    async fn authorized(&self, method: Method, url: &str) -> ApiResult<RequestBuilder> {
        let token = self.auth.access_token().await?;
        Ok(self
            .http
            .request(method, url)
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, format!("Bearer {token}")))
    }

    async fn list<T: DeserializeOwned>(&self, url: &str, filter: Option<&str>) -> ApiResult<Vec<T>> {
        let mut request = self.authorized(Method::GET, url).await?;
        if let Some(filter) = filter {
            request = request.query(&[("$filter", filter)]);
        }

        debug!(url, filter, "Exact Online GET");
        let response = self.http.send(request).await.map_err(ApiError::from)?;
        let response = expect_status(response, StatusCode::OK, &Method::GET).await?;
        let envelope: ListEnvelope<T> = decode_json(response).await?;
        Ok(envelope.d.results)
    }

    async fn find_first<T: DeserializeOwned>(
        &self,
        url: &str,
        filter: &str,
        entity: &str,
        key: impl ToString,
    ) -> ApiResult<T> {
        self.list(url, Some(filter))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::not_found(entity, key))
    }

    async fn create<T>(&self, url: &str, body: &T) -> ApiResult<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let request = self
            .authorized(Method::POST, url)
            .await?
            .header("Prefer", "return=representation")
            .json(body);

        debug!(url, "Exact Online POST");
        let response = self.http.send(request).await.map_err(ApiError::from)?;
        let response = expect_status(response, StatusCode::CREATED, &Method::POST).await?;
        let envelope: EntityEnvelope<T> = decode_json(response).await?;
        Ok(envelope.d)
    }
}

#[async_trait]
impl ExactApi for ExactClient {
    async fn current_division(&self) -> ApiResult<i64> {
        let url = format!("{}/api/v1/current/Me", self.base_url);
        let me: Me = self
            .list(&url, None)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::not_found("Me", "current"))?;
        if me.current_division <= 0 {
            return Err(ApiError::NoDivision);
        }
        Ok(me.current_division)
    }

    #[instrument(skip(self))]
    async fn find_division_by_vat_number(
        &self,
        division: i64,
        vat_number: &str,
    ) -> ApiResult<Division> {
        let url = self.division_url(division, "hrm/Divisions")?;
        let filter = format!("VATNumber eq {}", literal(vat_number));
        self.find_first(&url, &filter, "Division", vat_number).await
    }

    async fn list_divisions(&self, division: i64) -> ApiResult<Vec<Division>> {
        let url = self.division_url(division, "system/Divisions")?;
        self.list(&url, None).await
    }

    #[instrument(skip(self))]
    async fn find_account_by_external_key(
        &self,
        division: i64,
        customer_id: i64,
    ) -> ApiResult<Account> {
        let url = self.division_url(division, "crm/Accounts")?;
        let search_code = account_search_code(customer_id);
        let filter = format!("SearchCode eq {}", literal(&search_code));
        match self.find_first(&url, &filter, "Account", customer_id).await {
            Err(err) if err.is_not_found() => {
                // Accounts created before search codes were used carry the id in their code.
                let legacy = format!("{LEGACY_ACCOUNT_CODE_PREFIX}{customer_id:012}");
                let filter = format!("Code eq {}", literal(&legacy));
                self.find_first(&url, &filter, "Account", customer_id).await
            }
            other => other,
        }
    }

    async fn create_account(&self, division: i64, account: &Account) -> ApiResult<Account> {
        account.validate()?;
        let url = self.division_url(division, "crm/Accounts")?;
        self.create(&url, account).await
    }

    async fn find_item_by_external_key(&self, division: i64, product_id: i64) -> ApiResult<Item> {
        let url = self.division_url(division, "logistics/Items")?;
        let code = item_code(product_id);
        let filter = format!("Code eq {}", literal(&code));
        self.find_first(&url, &filter, "Item", code).await
    }

    async fn create_item(&self, division: i64, item: &Item) -> ApiResult<Item> {
        item.validate()?;
        let url = self.division_url(division, "logistics/Items")?;
        self.create(&url, item).await
    }

    async fn get_all_items(&self, division: i64) -> ApiResult<Vec<Item>> {
        let url = self.division_url(division, "logistics/Items")?;
        self.list(&url, None).await
    }

    async fn find_payment_condition_by_description(
        &self,
        division: i64,
        description: &str,
    ) -> ApiResult<PaymentCondition> {
        let url = self.division_url(division, "cashflow/PaymentConditions")?;
        let filter = format!("Description eq {}", literal(description));
        self.find_first(&url, &filter, "PaymentCondition", description).await
    }

    async fn find_journal_by_code(&self, division: i64, code: &str) -> ApiResult<Journal> {
        let url = self.division_url(division, "financial/Journals")?;
        let filter = format!("Code eq {}", literal(code));
        self.find_first(&url, &filter, "Journal", code).await
    }

    async fn find_default_item_group(&self, division: i64) -> ApiResult<ItemGroup> {
        let url = self.division_url(division, "logistics/ItemGroups")?;
        let filter = format!("Code eq {}", literal(ITEM_GROUP_CODE));
        self.find_first(&url, &filter, "ItemGroup", ITEM_GROUP_CODE).await
    }

    async fn vat_codes_matching_convention(&self, division: i64) -> ApiResult<Vec<VatCode>> {
        let url = self.division_url(division, "vat/VATCodes")?;
        let filter =
            format!("substringof({}, Description) eq true", literal(VAT_CODE_DESCRIPTION_PREFIX));
        let codes: Vec<VatCode> = self.list(&url, Some(&filter)).await?;
        // substringof matches anywhere; only a leading prefix counts.
        Ok(codes
            .into_iter()
            .filter(|code| code.description.trim_start().starts_with(VAT_CODE_DESCRIPTION_PREFIX))
            .collect())
    }

    async fn find_document_type_by_description(
        &self,
        division: i64,
        description: &str,
    ) -> ApiResult<DocumentType> {
        let url = self.division_url(division, "documents/DocumentTypes")?;
        let filter = format!("Description eq {}", literal(description));
        self.find_first(&url, &filter, "DocumentType", description).await
    }

    async fn create_document(&self, division: i64, document: &Document) -> ApiResult<Document> {
        document.validate()?;
        let url = self.division_url(division, "documents/Documents")?;
        self.create(&url, document).await
    }

    async fn create_document_attachment(
        &self,
        division: i64,
        attachment: &DocumentAttachment,
    ) -> ApiResult<DocumentAttachment> {
        attachment.validate()?;
        let url = self.division_url(division, "documents/DocumentAttachments")?;
        self.create(&url, attachment).await
    }

    #[instrument(skip(self))]
    async fn find_sales_entry_by_invoice_number(
        &self,
        division: i64,
        invoice_number: &str,
    ) -> ApiResult<SalesEntry> {
        let url = self.division_url(division, "salesentry/SalesEntries")?;
        let filter = format!("substringof({}, Description) eq true", literal(invoice_number));
        self.find_first(&url, &filter, "SalesEntry", invoice_number).await
    }

    async fn create_sales_entry(
        &self,
        division: i64,
        entry: &SalesEntry,
    ) -> ApiResult<SalesEntry> {
        entry.validate()?;
        let url = self.division_url(division, "salesentry/SalesEntries")?;
        self.create(&url, entry).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::NaiveDate;
    use koppeling_domain::types::exact::{SalesEntryLine, SalesEntryType};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    struct StaticToken;

    #[async_trait]
    impl AccessTokenProvider for StaticToken {
        async fn access_token(&self) -> Result<String, ApiError> {
            Ok("toegang".into())
        }
    }

    struct RejectedToken;

    #[async_trait]
    impl AccessTokenProvider for RejectedToken {
        async fn access_token(&self) -> Result<String, ApiError> {
            Err(ApiError::Auth("token refresh failed".into()))
        }
    }

    fn client(server: &MockServer) -> ExactClient {
        let http = HttpClient::builder()
            .base_backoff(Duration::from_millis(1))
            .max_attempts(1)
            .build()
            .expect("http client");
        ExactClient::new(http, server.uri(), Arc::new(StaticToken))
    }

    fn results(items: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({"d": {"results": items}}))
    }

    #[tokio::test]
    async fn current_division_comes_from_me() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/current/Me"))
            .and(header("accept", "application/json"))
            .and(header("authorization", "Bearer toegang"))
            .respond_with(results(json!([{"CurrentDivision": 12345, "FullName": "Recras"}])))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(client(&server).current_division().await.unwrap(), 12345);
    }

    #[tokio::test]
    async fn division_is_found_by_vat_number() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/100/hrm/Divisions"))
            .and(query_param("$filter", "VATNumber eq 'NL001B01'"))
            .respond_with(results(json!([
                {"Code": 200, "HID": "42", "VATNumber": "NL001B01", "Main": false, "Country": "NL"}
            ])))
            .mount(&server)
            .await;

        let division = client(&server).find_division_by_vat_number(100, "NL001B01").await.unwrap();
        assert_eq!(division.code, 200);
        assert_eq!(division.hid, 42);
    }

    #[tokio::test]
    async fn empty_result_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/100/cashflow/PaymentConditions"))
            .and(query_param("$filter", "Description eq 'recras'"))
            .respond_with(results(json!([])))
            .mount(&server)
            .await;

        let err = client(&server)
            .find_payment_condition_by_description(100, "recras")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "PaymentCondition not found for `recras`");
    }

    #[tokio::test]
    async fn account_lookup_falls_back_to_legacy_code() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/100/crm/Accounts"))
            .and(query_param("$filter", "SearchCode eq 'K42'"))
            .respond_with(results(json!([])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/100/crm/Accounts"))
            .and(query_param("$filter", "Code eq '732727000000000042'"))
            .respond_with(results(json!([{"ID": "acc-1", "Name": "Jansen", "Code": "732727000000000042"}])))
            .expect(1)
            .mount(&server)
            .await;

        let account = client(&server).find_account_by_external_key(100, 42).await.unwrap();
        assert_eq!(account.id, "acc-1");
    }

    #[tokio::test]
    async fn account_not_found_by_either_code() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/100/crm/Accounts"))
            .respond_with(results(json!([])))
            .expect(2)
            .mount(&server)
            .await;

        let err = client(&server).find_account_by_external_key(100, 42).await.unwrap_err();
        assert_eq!(err, ApiError::not_found("Account", 42));
    }

    #[tokio::test]
    async fn create_posts_with_representation_and_expects_created() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/100/crm/Accounts"))
            .and(header("prefer", "return=representation"))
            .and(header("accept", "application/json"))
            .and(body_partial_json(json!({"Name": "K42 Jansen", "SearchCode": "K42"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "d": {"ID": "acc-9", "Name": "K42 Jansen", "SearchCode": "K42"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let account = Account {
            name: "K42 Jansen".into(),
            search_code: "K42".into(),
            ..Account::default()
        };
        let created = client(&server).create_account(100, &account).await.unwrap();
        assert_eq!(created.id, "acc-9");
    }

    #[tokio::test]
    async fn rejected_create_is_an_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/100/logistics/Items"))
            .respond_with(ResponseTemplate::new(400).set_body_string("Code bestaat al"))
            .mount(&server)
            .await;

        let item = Item {
            code: "recras1".into(),
            description: "Kanoën".into(),
            unit: "recras".into(),
            ..Item::default()
        };
        let err = client(&server).create_item(100, &item).await.unwrap_err();
        match err {
            ApiError::Http { status, method, url, body } => {
                assert_eq!(status, 400);
                assert_eq!(method, "POST");
                assert!(url.ends_with("/api/v1/100/logistics/Items"));
                assert_eq!(body, "Code bestaat al");
            }
            other => panic!("expected http error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_entities_are_never_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(201)).expect(0).mount(&server).await;

        let err = client(&server).create_account(100, &Account::default()).await.unwrap_err();
        assert_eq!(err, ApiError::validation("Account", "Name"));

        let err = client(&server).create_sales_entry(100, &SalesEntry::default()).await.unwrap_err();
        assert_eq!(err, ApiError::validation("SalesEntry", "SalesEntryLines"));
    }

    #[tokio::test]
    async fn division_scoped_calls_need_a_division() {
        let server = MockServer::start().await;
        let err = client(&server).get_all_items(0).await.unwrap_err();
        assert_eq!(err, ApiError::NoDivision);
    }

    #[tokio::test]
    async fn vat_codes_keep_only_the_prefix_convention() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/100/vat/VATCodes"))
            .and(query_param("$filter", "substringof('recras:', Description) eq true"))
            .respond_with(results(json!([
                {"ID": "v1", "Code": "2", "Description": "recras:21"},
                {"ID": "v2", "Code": "9", "Description": "oud recras:6"}
            ])))
            .mount(&server)
            .await;

        let codes = client(&server).vat_codes_matching_convention(100).await.unwrap();
        assert_eq!(codes.len(), 1);
        assert_eq!(codes[0].code, "2");
    }

    #[tokio::test]
    async fn sales_entry_is_found_by_invoice_number() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/100/salesentry/SalesEntries"))
            .and(query_param("$filter", "substringof('2024-0012', Description) eq true"))
            .respond_with(results(json!([{
                "EntryID": "se-1",
                "Customer": "acc-1",
                "Description": "Recras factuur: 2024-0012",
                "EntryDate": "/Date(1709251200000)/",
                "DueDate": null,
                "Type": 20,
                "SalesEntryLines": {"__deferred": {"uri": "https://example.invalid"}}
            }])))
            .mount(&server)
            .await;

        let entry = client(&server).find_sales_entry_by_invoice_number(100, "2024-0012").await.unwrap();
        assert_eq!(entry.id, "se-1");
        assert_eq!(entry.entry_date, NaiveDate::from_ymd_opt(2024, 3, 1));
        assert!(entry.sales_entry_lines.is_empty());
    }

    #[tokio::test]
    async fn sales_entry_is_created_with_inline_lines() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/100/salesentry/SalesEntries"))
            .and(body_partial_json(json!({
                "Customer": "acc-1",
                "Journal": "recras",
                "EntryDate": "2024-03-01",
                "Type": 21,
                "SalesEntryLines": [{"AmountFC": -10.0, "GLAccount": "8000", "VATCode": "2"}]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "d": {"EntryID": "se-2", "Customer": "acc-1", "Type": 21}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let entry = SalesEntry {
            customer: "acc-1".into(),
            description: "Recras factuur: 7".into(),
            entry_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            journal: "recras".into(),
            payment_condition: "14".into(),
            sales_entry_lines: vec![SalesEntryLine {
                amount_fc: -10.0,
                gl_account: "8000".into(),
                vat_code: "2".into(),
                quantity: 1.0,
                ..SalesEntryLine::default()
            }],
            entry_type: SalesEntryType::CreditNote,
            ..SalesEntry::default()
        };
        let created = client(&server).create_sales_entry(100, &entry).await.unwrap();
        assert_eq!(created.id, "se-2");
        assert_eq!(created.entry_type, SalesEntryType::CreditNote);
    }

    #[tokio::test]
    async fn slow_sales_entry_creation_is_posted_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/100/salesentry/SalesEntries"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!({"d": {"EntryID": "se-3", "Customer": "acc-1"}}))
                    .set_delay(Duration::from_millis(500)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let http = HttpClient::builder()
            .timeout(Duration::from_millis(100))
            .base_backoff(Duration::from_millis(1))
            .max_attempts(3)
            .build()
            .expect("http client");
        let exact = ExactClient::new(http, server.uri(), Arc::new(StaticToken));

        let entry = SalesEntry {
            customer: "acc-1".into(),
            journal: "recras".into(),
            payment_condition: "14".into(),
            sales_entry_lines: vec![SalesEntryLine {
                amount_fc: 10.0,
                gl_account: "8000".into(),
                vat_code: "2".into(),
                quantity: 1.0,
                ..SalesEntryLine::default()
            }],
            ..SalesEntry::default()
        };
        let result = exact.create_sales_entry(100, &entry).await;

        assert!(matches!(result, Err(ApiError::Transport(_))), "got {result:?}");
        let posts = server.received_requests().await.unwrap_or_default();
        assert_eq!(posts.len(), 1);
    }

    #[tokio::test]
    async fn filter_literals_escape_quotes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/100/documents/DocumentTypes"))
            .and(query_param("$filter", "Description eq 'Klant''s factuur'"))
            .respond_with(results(json!([{"ID": 10, "Description": "Klant's factuur"}])))
            .mount(&server)
            .await;

        let document_type =
            client(&server).find_document_type_by_description(100, "Klant's factuur").await.unwrap();
        assert_eq!(document_type.id, 10);
    }

    #[tokio::test]
    async fn token_failure_stops_before_the_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(results(json!([]))).expect(0).mount(&server).await;

        let http = HttpClient::builder().max_attempts(1).build().unwrap();
        let client = ExactClient::new(http, server.uri(), Arc::new(RejectedToken));
        let err = client.find_journal_by_code(100, "recras").await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn undecodable_body_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/100/financial/Journals"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>onderhoud</html>"))
            .mount(&server)
            .await;

        let err = client(&server).find_journal_by_code(100, "recras").await.unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)), "got {err:?}");
    }
}
