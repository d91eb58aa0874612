//! Recras `api2` client
//!
//! Every request carries HTTP basic auth for the tenant's API user.

use async_trait::async_trait;
use koppeling_core::RecrasApi;
use koppeling_domain::types::recras::{
    Company, Invoice, InvoiceFilter, Note, Product, Setting, Staff, User,
};
use koppeling_domain::{ApiError, ApiResult};
use reqwest::header::ACCEPT;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::api::errors::{decode_json, expect_status, read_bytes};
use crate::http::HttpClient;

/// Base URL for a tenant hostname; `https://` unless a scheme is given.
#[must_use]
pub fn base_url_for(hostname: &str) -> String {
    let hostname = hostname.trim().trim_end_matches('/');
    if hostname.starts_with("http://") || hostname.starts_with("https://") {
        hostname.to_string()
    } else {
        format!("https://{hostname}")
    }
}

/// Client for one Recras tenant.
pub struct RecrasClient {
    http: HttpClient,
    base_url: String,
    username: String,
    password: String,
}

impl RecrasClient {
    pub fn new(
        http: HttpClient,
        hostname: &str,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url_for(hostname),
            username: username.into(),
            password: password.into(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.base_url))
            .header(ACCEPT, "application/json")
            .basic_auth(&self.username, Some(&self.password))
    }

    async fn send(&self, request: RequestBuilder, expected: StatusCode, method: &Method) -> ApiResult<Response> {
        let response = self.http.send(request).await.map_err(ApiError::from)?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Auth(format!(
                "Recras rejected the credentials for {}",
                self.base_url
            )));
        }
        expect_status(response, expected, method).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> ApiResult<T> {
        debug!(path, "Recras GET");
        let request = self.request(Method::GET, path).query(query);
        let response = self.send(request, StatusCode::OK, &Method::GET).await?;
        decode_json(response).await
    }
}

#[async_trait]
impl RecrasApi for RecrasClient {
    async fn list_companies(&self) -> ApiResult<Vec<Company>> {
        self.get_json("/api2/bedrijven", &[]).await
    }

    async fn list_products(&self) -> ApiResult<Vec<Product>> {
        self.get_json("/api2/producten", &[]).await
    }

    #[instrument(skip(self, filter), fields(company = filter.company_id))]
    async fn list_invoices(&self, filter: &InvoiceFilter) -> ApiResult<Vec<Invoice>> {
        let query = [
            ("regelsformat", "exactonline".to_string()),
            ("status", filter.status_param()),
            ("datumNa", filter.date_from.format("%Y-%m-%d").to_string()),
            ("embed", "regels,Klant".to_string()),
            ("bedrijf_id", filter.company_id.to_string()),
        ];
        self.get_json("/api2/facturen", &query).await
    }

    async fn current_staff(&self) -> ApiResult<Staff> {
        self.get_json("/api2/personeel/me", &[]).await
    }

    async fn user_with_roles(&self, staff_id: i64) -> ApiResult<User> {
        let path = format!("/api2/gebruikers/{staff_id}");
        self.get_json(&path, &[("embed", "rollen".to_string())]).await
    }

    async fn post_note(&self, note: &Note) -> ApiResult<()> {
        if note.kind.is_empty() {
            return Err(ApiError::validation("Note", "soort_contact"));
        }

        debug!(contact = note.contact_id, "Recras POST note");
        let request = self.request(Method::POST, "/api2/contactmomenten").json(note);
        self.send(request, StatusCode::CREATED, &Method::POST).await?;
        Ok(())
    }

    async fn fetch_pdf(&self, pdf_location: &str) -> ApiResult<Vec<u8>> {
        let path = format!("/facturen/{}", pdf_location.trim_start_matches('/'));
        debug!(path = %path, "Recras GET pdf");
        let request = self.request(Method::GET, &path);
        let response = self.send(request, StatusCode::OK, &Method::GET).await?;
        read_bytes(response).await
    }

    async fn vat_percentages(&self) -> ApiResult<Vec<String>> {
        let setting: Setting = self.get_json("/api2/instellingen/btw_percentages", &[]).await?;
        Ok(setting.list_values())
    }

    async fn validate_credentials(&self) -> ApiResult<()> {
        let request = self.request(Method::GET, "/api2/personeel/me");
        self.send(request, StatusCode::OK, &Method::GET).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::NaiveDate;
    use koppeling_domain::types::recras::InvoiceLine;
    use serde_json::json;
    use wiremock::matchers::{basic_auth, body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(server: &MockServer) -> RecrasClient {
        let http = HttpClient::builder()
            .base_backoff(Duration::from_millis(1))
            .max_attempts(1)
            .build()
            .expect("http client");
        RecrasClient::new(http, &server.uri(), "api", "geheim")
    }

    #[test]
    fn hostname_without_scheme_gets_https() {
        assert_eq!(base_url_for("demo.recras.nl"), "https://demo.recras.nl");
        assert_eq!(base_url_for("http://localhost:8080/"), "http://localhost:8080");
        assert_eq!(base_url_for("https://demo.recras.nl"), "https://demo.recras.nl");
    }

    #[tokio::test]
    async fn companies_are_listed_with_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api2/bedrijven"))
            .and(basic_auth("api", "geheim"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 1, "bedrijfsnaam": "Speeltuin", "btw_nummer": "NL001B01"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let companies = client(&server).list_companies().await.unwrap();
        assert_eq!(companies, vec![Company { id: 1, name: "Speeltuin".into(), vat_number: "NL001B01".into() }]);
    }

    #[tokio::test]
    async fn invoices_are_queried_with_the_full_filter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api2/facturen"))
            .and(query_param("regelsformat", "exactonline"))
            .and(query_param("status", "verzonden,deels_betaald,betaald"))
            .and(query_param("datumNa", "2024-01-15"))
            .and(query_param("embed", "regels,Klant"))
            .and(query_param("bedrijf_id", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": 7,
                "factuur_nummer": "2024-0012",
                "datum": "2024-03-01",
                "bedrijf_id": 3,
                "regels": [{"type": "item", "aantal": 1, "bedrag": 10, "btw_percentage": 21, "product_id": 5}]
            }])))
            .expect(1)
            .mount(&server)
            .await;

        let filter = InvoiceFilter::bookable(3, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        let invoices = client(&server).list_invoices(&filter).await.unwrap();

        assert_eq!(invoices.len(), 1);
        assert_eq!(invoices[0].invoice_number, "2024-0012");
        assert!(matches!(&invoices[0].lines[0], InvoiceLine::Item(line) if line.product_id == 5));
    }

    #[tokio::test]
    async fn unauthorized_is_an_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api2/producten"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client(&server).list_products().await.unwrap_err();
        assert!(matches!(err, ApiError::Auth(_)), "got {err:?}");
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn credentials_are_validated_against_personeel_me() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api2/personeel/me"))
            .and(basic_auth("api", "geheim"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api2/personeel/me"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        assert!(client(&server).validate_credentials().await.is_ok());

        let http = HttpClient::builder().max_attempts(1).build().unwrap();
        let wrong = RecrasClient::new(http, &server.uri(), "api", "fout");
        assert!(matches!(wrong.validate_credentials().await, Err(ApiError::Auth(_))));
    }

    #[tokio::test]
    async fn staff_and_roles_are_read() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api2/personeel/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 7, "displaynaam": "Beheerder", "contactpersoon_id": 70
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api2/gebruikers/7"))
            .and(query_param("embed", "rollen"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 7, "rollen": [{"id": 3}, {"id": 4}]
            })))
            .mount(&server)
            .await;

        let client = client(&server);
        let staff = client.current_staff().await.unwrap();
        assert_eq!(staff.contact_person_id, 70);
        let user = client.user_with_roles(staff.id).await.unwrap();
        assert_eq!(user.first_role_id(), 3);
    }

    fn note(kind: &str) -> Note {
        Note {
            id: None,
            kind: kind.into(),
            contact_id: 70,
            contact_person_id: 70,
            subject: "Synchronisatierapport".into(),
            message: "Alles goed<br>\n".into(),
            signature: String::new(),
            sticky: false,
            follow_up_at: None,
            follow_up_group: 3,
            follow_up_remark: "Synchronisatierapport Exact Online".into(),
        }
    }

    #[tokio::test]
    async fn note_is_posted_and_must_be_created() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api2/contactmomenten"))
            .and(body_partial_json(json!({"soort_contact": "noot", "contact_id": 70, "contact_opnemen_group": 3})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 1})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server).post_note(&note("noot")).await.unwrap();
    }

    #[tokio::test]
    async fn note_answered_with_ok_is_an_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api2/contactmomenten"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let err = client(&server).post_note(&note("noot")).await.unwrap_err();
        assert!(matches!(err, ApiError::Http { status: 200, .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn note_without_kind_is_not_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(201)).expect(0).mount(&server).await;

        let err = client(&server).post_note(&note("")).await.unwrap_err();
        assert_eq!(err, ApiError::validation("Note", "soort_contact"));
    }

    #[tokio::test]
    async fn pdf_is_downloaded_as_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/facturen/abc.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4".to_vec()))
            .mount(&server)
            .await;

        let pdf = client(&server).fetch_pdf("abc.pdf").await.unwrap();
        assert_eq!(pdf, b"%PDF-1.4");
    }

    #[tokio::test]
    async fn vat_percentages_are_split() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api2/instellingen/btw_percentages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"waarde": "21,9,0"})))
            .mount(&server)
            .await;

        let percentages = client(&server).vat_percentages().await.unwrap();
        assert_eq!(percentages, vec!["21", "9", "0"]);
    }
}
