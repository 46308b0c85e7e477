//! JSON encoding of request bodies and validation/decoding of responses.
//!
//! The status code is always checked before the body is looked at, so a
//! non-success response is reported as `UnexpectedStatus` even when its body
//! happens to be valid JSON of the expected shape.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ClientError;
use crate::http::HttpResponse;

/// Serialize an optional body. `None` means the request carries no body.
pub fn encode<T: Serialize + ?Sized>(body: Option<&T>) -> Result<Option<String>, ClientError> {
    body.map(|b| serde_json::to_string(b).map_err(|e| ClientError::Encode(e.to_string())))
        .transpose()
}

/// Check the status, then deserialize the body into `T`.
pub fn decode<T: DeserializeOwned>(response: &HttpResponse, expected: u16) -> Result<T, ClientError> {
    check_status(response, expected)?;
    serde_json::from_str(&response.body).map_err(|e| ClientError::Decode(e.to_string()))
}

/// Check the status of an acknowledge-only response; the body is ignored.
pub fn expect_ack(response: &HttpResponse, expected: u16) -> Result<(), ClientError> {
    check_status(response, expected)
}

fn check_status(response: &HttpResponse, expected: u16) -> Result<(), ClientError> {
    if response.status == expected {
        return Ok(());
    }
    Err(ClientError::UnexpectedStatus {
        status: response.status,
        body: response.body.clone(),
    })
}
