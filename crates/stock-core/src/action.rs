//! Request/response action protocol.
//!
//! A request names one action (`getItems`, `addItem`, `updateItem`,
//! `deleteItem`) and optional data. A response is either the full
//! aggregated collection or one error descriptor.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::engine::StockEngine;
use crate::error::{ErrorCode, Result, StockError};
use crate::item::{ItemRef, NewItem, QuantityUpdate, StockItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ApiAction {
    GetItems,
    AddItem,
    UpdateItem,
    DeleteItem,
}

impl ApiAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ApiAction::GetItems => "getItems",
            ApiAction::AddItem => "addItem",
            ApiAction::UpdateItem => "updateItem",
            ApiAction::DeleteItem => "deleteItem",
        }
    }

    /// Whether the action writes to the store.
    pub fn is_mutation(self) -> bool {
        !matches!(self, ApiAction::GetItems)
    }
}

impl fmt::Display for ApiAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApiAction {
    type Err = StockError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "getItems" => Ok(ApiAction::GetItems),
            "addItem" => Ok(ApiAction::AddItem),
            "updateItem" => Ok(ApiAction::UpdateItem),
            "deleteItem" => Ok(ApiAction::DeleteItem),
            other => Err(StockError::UnknownAction(other.to_string())),
        }
    }
}

/// One request. `action` stays a plain string on the wire so that unknown
/// values surface as [`StockError::UnknownAction`] rather than a decode error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiPayload {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ApiPayload {
    pub fn new(action: ApiAction, data: Option<serde_json::Value>) -> Self {
        Self {
            action: action.as_str().to_string(),
            data,
        }
    }

    pub fn get_items() -> Self {
        Self::new(ApiAction::GetItems, None)
    }

    pub fn add_item(item: &NewItem) -> Result<Self> {
        Ok(Self::new(ApiAction::AddItem, Some(serde_json::to_value(item)?)))
    }

    pub fn update_item(update: &QuantityUpdate) -> Result<Self> {
        Ok(Self::new(ApiAction::UpdateItem, Some(serde_json::to_value(update)?)))
    }

    pub fn delete_item(target: &ItemRef) -> Result<Self> {
        Ok(Self::new(ApiAction::DeleteItem, Some(serde_json::to_value(target)?)))
    }

    pub fn parse(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    fn data<T: DeserializeOwned>(&self, action: ApiAction) -> Result<T> {
        match &self.data {
            None | Some(serde_json::Value::Null) => Err(StockError::validation(format!(
                "{} requires item data",
                action
            ))),
            Some(value) => Ok(serde_json::from_value(value.clone())?),
        }
    }
}

/// Response body: the aggregated collection or an error descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApiResponse {
    Items(Vec<StockItem>),
    Error {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<ErrorCode>,
    },
}

impl ApiResponse {
    pub fn error(err: &StockError) -> Self {
        ApiResponse::Error {
            error: err.to_string(),
            code: Some(err.code()),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ApiResponse::Error { .. })
    }
}

impl From<Result<Vec<StockItem>>> for ApiResponse {
    fn from(result: Result<Vec<StockItem>>) -> Self {
        match result {
            Ok(items) => ApiResponse::Items(items),
            Err(err) => ApiResponse::error(&err),
        }
    }
}

/// Health probe body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub status: String,
    pub message: String,
}

impl ServiceStatus {
    pub fn up() -> Self {
        Self {
            status: "success".to_string(),
            message: "stock inventory API is up".to_string(),
        }
    }
}

/// Run one request against the engine.
pub fn dispatch(engine: &StockEngine, payload: &ApiPayload) -> Result<Vec<StockItem>> {
    let action: ApiAction = payload.action.parse()?;
    tracing::debug!(%action, "dispatching request");
    match action {
        ApiAction::GetItems => engine.get_items(),
        ApiAction::AddItem => engine.add_item(&payload.data(action)?),
        ApiAction::UpdateItem => engine.update_item(&payload.data(action)?),
        ApiAction::DeleteItem => engine.delete_item(&payload.data(action)?),
    }
}

/// Decode a raw JSON request, run it and build the response body.
pub fn handle(engine: &StockEngine, raw: &str) -> ApiResponse {
    respond(ApiPayload::parse(raw).and_then(|payload| dispatch(engine, &payload)))
}

fn respond(result: Result<Vec<StockItem>>) -> ApiResponse {
    if let Err(err) = &result {
        match err.code() {
            ErrorCode::Storage => tracing::error!(error = %err, "request failed"),
            _ => tracing::warn!(error = %err, "request rejected"),
        }
    }
    result.into()
}
