//! Conversions from external infrastructure errors into domain errors.

use koppeling_domain::{ApiError, KoppelingError};
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub KoppelingError);

impl From<InfraError> for KoppelingError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<KoppelingError> for InfraError {
    fn from(value: KoppelingError) -> Self {
        Self(value)
    }
}

impl From<InfraError> for ApiError {
    fn from(value: InfraError) -> Self {
        value.0.into()
    }
}

trait IntoKoppelingError {
    fn into_koppeling(self) -> KoppelingError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → KoppelingError */
/* -------------------------------------------------------------------------- */

impl IntoKoppelingError for SqlError {
    fn into_koppeling(self) -> KoppelingError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        fn looks_like_wrong_key(message: &str) -> bool {
            let lower = message.to_ascii_lowercase();
            lower.contains("not a database") || lower.contains("encrypted")
        }

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        KoppelingError::Database("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        KoppelingError::Database("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 2067 | 1555) => {
                        KoppelingError::Database("unique constraint violation".into())
                    }
                    (ErrorCode::NotADatabase, _) => KoppelingError::Config(
                        "database encryption key rejected or database not encrypted".into(),
                    ),
                    (_, _) if looks_like_wrong_key(&message) => KoppelingError::Config(
                        "database encryption key rejected or database not encrypted".into(),
                    ),
                    _ => KoppelingError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => KoppelingError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                KoppelingError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, name, ty) => {
                KoppelingError::Database(format!("invalid column type {ty} for `{name}`"))
            }
            RE::InvalidPath(path) => KoppelingError::Config(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            other => KoppelingError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        Self(value.into_koppeling())
    }
}

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        let message = value.to_string();
        let lower = message.to_ascii_lowercase();
        if lower.contains("not a database") || lower.contains("encrypted") {
            return Self(KoppelingError::Config(
                "database encryption key rejected or database not encrypted".into(),
            ));
        }
        Self(KoppelingError::Database(format!("connection pool: {message}")))
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → KoppelingError */
/* -------------------------------------------------------------------------- */

impl IntoKoppelingError for HttpError {
    fn into_koppeling(self) -> KoppelingError {
        if self.is_timeout() {
            return KoppelingError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return KoppelingError::Network("HTTP connection failure".into());
        }

        if self.is_decode() {
            return KoppelingError::InvalidInput(format!("HTTP response could not be decoded: {self}"));
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                401 | 403 => KoppelingError::Auth(message),
                404 => KoppelingError::NotFound(message),
                400..=499 => KoppelingError::InvalidInput(message),
                _ => KoppelingError::Network(message),
            };
        }

        KoppelingError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        Self(value.into_koppeling())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use reqwest::{Client, StatusCode};
    use rusqlite::ffi::{Error as FfiError, ErrorCode};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn sqlite_busy_maps_to_database_error() {
        let err = SqlError::SqliteFailure(
            FfiError { code: ErrorCode::DatabaseBusy, extended_code: 5 },
            Some("database is locked".into()),
        );

        let mapped: KoppelingError = InfraError::from(err).into();
        match mapped {
            KoppelingError::Database(msg) => {
                assert!(msg.contains("busy") || msg.contains("locked"));
            }
            other => panic!("expected database error, got {other:?}"),
        }
    }

    #[test]
    fn wrong_key_maps_to_config_error() {
        let err = SqlError::SqliteFailure(
            FfiError { code: ErrorCode::NotADatabase, extended_code: 26 },
            Some("file is not a database".into()),
        );

        let mapped: KoppelingError = InfraError::from(err).into();
        assert!(matches!(mapped, KoppelingError::Config(_)), "got {mapped:?}");
    }

    #[test]
    fn missing_row_maps_to_not_found() {
        let mapped: KoppelingError = InfraError::from(SqlError::QueryReturnedNoRows).into();
        assert!(matches!(mapped, KoppelingError::NotFound(_)));
    }

    #[tokio::test]
    async fn http_status_401_maps_to_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(StatusCode::UNAUTHORIZED))
            .mount(&server)
            .await;

        let client = Client::builder().no_proxy().build().unwrap();
        let error = client.get(server.uri()).send().await.unwrap().error_for_status().unwrap_err();

        let mapped: KoppelingError = InfraError::from(error).into();
        match mapped {
            KoppelingError::Auth(msg) => assert!(msg.contains("401")),
            other => panic!("expected auth error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn connection_refused_becomes_transport_api_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = Client::builder().no_proxy().build().unwrap();
        let error = client.get(format!("http://{addr}")).send().await.unwrap_err();

        let mapped: ApiError = InfraError::from(error).into();
        assert!(matches!(mapped, ApiError::Transport(_)), "got {mapped:?}");
        assert!(mapped.is_fatal());
    }
}
