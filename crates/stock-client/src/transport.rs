//! Request transport for the action protocol

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use stock_core::{ApiPayload, ApiResponse, StockItem};

use crate::error::ClientError;

/// Carries one action to the backend and returns the aggregated collection.
pub trait Transport: Send + Sync {
    fn call(
        &self,
        payload: &ApiPayload,
    ) -> impl Future<Output = Result<Vec<StockItem>, ClientError>> + Send;
}

/// HTTP transport: POSTs `payload=<json>` as a url-encoded form.
pub struct HttpTransport {
    client: Client,
    url: String,
}

impl HttpTransport {
    pub fn new(url: &str) -> Result<Self, ClientError> {
        if url.trim().is_empty() {
            return Err(ClientError::NotConfigured);
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ClientError::RequestFailed {
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            url: url.trim().to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Transport for HttpTransport {
    async fn call(&self, payload: &ApiPayload) -> Result<Vec<StockItem>, ClientError> {
        let json = payload.to_json()?;
        let response = self
            .client
            .post(&self.url)
            .form(&[("payload", json)])
            .send()
            .await
            .map_err(|e| ClientError::RequestFailed {
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| ClientError::Decode {
            message: e.to_string(),
        })?;

        if !status.is_success() {
            tracing::error!(status = status.as_u16(), body = %body, "server returned an error status");
            // A gate timeout still carries a descriptor worth surfacing.
            if let Ok(ApiResponse::Error { error, code }) = serde_json::from_str(&body) {
                return Err(ClientError::Backend {
                    code,
                    message: error,
                });
            }
            return Err(ClientError::Http {
                status: status.as_u16(),
                body,
            });
        }

        decode_response(&body)
    }
}

/// Interpret a response body: the item array or an error descriptor.
pub fn decode_response(body: &str) -> Result<Vec<StockItem>, ClientError> {
    let response: ApiResponse = serde_json::from_str(body).map_err(|e| ClientError::Decode {
        message: e.to_string(),
    })?;
    match response {
        ApiResponse::Items(items) => Ok(items),
        ApiResponse::Error { error, code } => Err(ClientError::Backend {
            code,
            message: error,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stock_core::ErrorCode;

    #[test]
    fn decodes_item_array() {
        let items = decode_response(
            r#"[{"id":"x","marca":"Nike","modelo":"Air","tamanho":"42","cor":"Preto","quantidade":8}]"#,
        )
        .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantidade, 8);
    }

    #[test]
    fn decodes_error_descriptor() {
        let err = decode_response(r#"{"error":"item with id 'x' not found","code":"lookup"}"#)
            .unwrap_err();
        assert_eq!(
            err,
            ClientError::Backend {
                code: Some(ErrorCode::Lookup),
                message: "item with id 'x' not found".into()
            }
        );
    }

    #[test]
    fn malformed_body_is_decode_error() {
        let err = decode_response("<html>oops</html>").unwrap_err();
        assert!(matches!(err, ClientError::Decode { .. }));
    }

    #[test]
    fn blank_url_is_not_configured() {
        assert!(matches!(
            HttpTransport::new("  "),
            Err(ClientError::NotConfigured)
        ));
    }
}
