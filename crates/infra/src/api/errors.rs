//! Status and body handling shared by the Exact Online and Recras clients
//!
//! Both systems answer a read with 200 and a create with 201. Anything else
//! becomes [`ApiError::Http`] carrying the method, URL and response body.

use koppeling_domain::{ApiError, ApiResult};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::errors::InfraError;

/// Build the error for an unexpected status code.
pub fn status_error(status: StatusCode, method: &Method, url: &str, body: String) -> ApiError {
    ApiError::Http { status: status.as_u16(), method: method.to_string(), url: url.to_string(), body }
}

/// Return the response when its status is `expected`, otherwise drain the
/// body into an [`ApiError::Http`].
///
/// # Errors
/// [`ApiError::Http`] for any other status code.
pub async fn expect_status(
    response: Response,
    expected: StatusCode,
    method: &Method,
) -> ApiResult<Response> {
    let status = response.status();
    if status == expected {
        return Ok(response);
    }

    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, method, &url, body))
}

/// Decode a JSON body.
///
/// # Errors
/// [`ApiError::Decode`] when the body is not the expected shape, or
/// [`ApiError::Transport`] when it could not be read.
pub async fn decode_json<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    let bytes = response.bytes().await.map_err(|err| ApiError::from(InfraError::from(err)))?;
    serde_json::from_slice(&bytes).map_err(|err| ApiError::Decode(err.to_string()))
}

/// Read a raw body.
///
/// # Errors
/// [`ApiError::Transport`] when the body could not be read.
pub async fn read_bytes(response: Response) -> ApiResult<Vec<u8>> {
    response
        .bytes()
        .await
        .map(|bytes| bytes.to_vec())
        .map_err(|err| ApiError::from(InfraError::from(err)))
}
