//! Stateful client façade.
//!
//! Holds the last known collection, sorted by brand for presentation. A
//! failed request leaves that collection untouched and records the error;
//! only a failed first load leaves the collection empty. Requests are never
//! retried.

use stock_core::{derive_id, ApiPayload, ItemRef, NewItem, QuantityUpdate, StockItem};

use crate::error::ClientError;
use crate::transport::Transport;

/// Raw form fields as typed by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemForm {
    pub marca: String,
    pub modelo: String,
    pub tamanho: String,
    pub cor: String,
    pub quantidade: String,
}

impl ItemForm {
    /// Pre-filled form for editing an existing item.
    pub fn from_item(item: &StockItem) -> Self {
        Self {
            marca: item.marca.clone(),
            modelo: item.modelo.clone(),
            tamanho: item.tamanho.clone(),
            cor: item.cor.clone(),
            quantidade: item.quantidade.to_string(),
        }
    }

    pub fn derived_id(&self) -> String {
        derive_id(&self.marca, &self.modelo, &self.tamanho, &self.cor)
    }

    /// Quantity as a number; anything that is not a non-negative number is 0,
    /// fractions truncate.
    pub fn quantity(&self) -> u64 {
        let text = self.quantidade.trim();
        if text.is_empty() {
            return 0;
        }
        match text.parse::<f64>() {
            Ok(n) if n.is_finite() && n > 0.0 => n.trunc() as u64,
            _ => 0,
        }
    }

    fn to_new_item(&self) -> NewItem {
        NewItem {
            id: Some(self.derived_id()),
            marca: self.marca.clone(),
            modelo: self.modelo.clone(),
            tamanho: self.tamanho.clone(),
            cor: self.cor.clone(),
            quantidade: self.quantity(),
        }
    }
}

pub struct StockClient<T> {
    transport: T,
    items: Vec<StockItem>,
    error: Option<String>,
    loaded: bool,
}

impl<T: Transport> StockClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            items: Vec::new(),
            error: None,
            loaded: false,
        }
    }

    /// Items sorted by brand.
    pub fn items(&self) -> &[StockItem] {
        &self.items
    }

    /// Message of the last failed request, cleared when a new one starts.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Reload the full collection.
    pub async fn refresh(&mut self) -> Result<&[StockItem], ClientError> {
        let first_load = !self.loaded;
        self.loaded = true;
        let result = self.execute(ApiPayload::get_items()).await.map(|_| ());
        if result.is_err() && first_load {
            self.items.clear();
        }
        result.map(|()| self.items.as_slice())
    }

    /// Add a new item; its id is derived from the form's descriptive fields.
    pub async fn add(&mut self, form: &ItemForm) -> Result<&[StockItem], ClientError> {
        let payload = ApiPayload::add_item(&form.to_new_item())?;
        self.execute(payload).await
    }

    /// Set the quantity of `selected` to the form's quantity.
    pub async fn update(
        &mut self,
        selected: &StockItem,
        form: &ItemForm,
    ) -> Result<&[StockItem], ClientError> {
        let payload = ApiPayload::update_item(&QuantityUpdate {
            id: selected.id.clone(),
            quantidade: form.quantity(),
        })?;
        self.execute(payload).await
    }

    pub async fn delete(&mut self, item: &StockItem) -> Result<&[StockItem], ClientError> {
        let payload = ApiPayload::delete_item(&ItemRef::from(item))?;
        self.execute(payload).await
    }

    async fn execute(&mut self, payload: ApiPayload) -> Result<&[StockItem], ClientError> {
        self.error = None;
        tracing::debug!(action = %payload.action, "calling backend");
        match self.transport.call(&payload).await {
            Ok(mut items) => {
                sort_by_brand(&mut items);
                self.items = items;
                Ok(&self.items)
            }
            Err(e) => {
                tracing::warn!(action = %payload.action, error = %e, "request failed");
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }
}

/// Case-insensitive brand order; ties keep backend order.
pub fn sort_by_brand(items: &mut [StockItem]) {
    items.sort_by_cached_key(|item| item.marca.to_lowercase());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use stock_core::{ApiAction, ErrorCode};

    #[derive(Default)]
    struct ScriptedTransport {
        replies: Mutex<VecDeque<Result<Vec<StockItem>, ClientError>>>,
        sent: Mutex<Vec<ApiPayload>>,
    }

    impl ScriptedTransport {
        fn with(replies: Vec<Result<Vec<StockItem>, ClientError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                sent: Mutex::default(),
            }
        }

        fn sent(&self) -> Vec<ApiPayload> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Transport for ScriptedTransport {
        async fn call(&self, payload: &ApiPayload) -> Result<Vec<StockItem>, ClientError> {
            self.sent.lock().unwrap().push(payload.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn item(id: &str, marca: &str, quantidade: u64) -> StockItem {
        StockItem {
            id: id.into(),
            marca: marca.into(),
            modelo: "M".into(),
            tamanho: "40".into(),
            cor: "Preto".into(),
            quantidade,
        }
    }

    fn busy() -> ClientError {
        ClientError::Backend {
            code: Some(ErrorCode::Timeout),
            message: "store busy".into(),
        }
    }

    #[tokio::test]
    async fn refresh_sorts_by_brand() {
        let transport = ScriptedTransport::with(vec![Ok(vec![
            item("p", "puma", 1),
            item("a", "Adidas", 2),
            item("n", "Nike", 3),
        ])]);
        let mut client = StockClient::new(transport);
        client.refresh().await.unwrap();
        let brands: Vec<&str> = client.items().iter().map(|i| i.marca.as_str()).collect();
        assert_eq!(brands, ["Adidas", "Nike", "puma"]);
        assert_eq!(client.error(), None);
    }

    #[tokio::test]
    async fn failed_first_load_leaves_empty_collection() {
        let mut client = StockClient::new(ScriptedTransport::with(vec![Err(busy())]));
        let err = client.refresh().await.unwrap_err();
        assert!(err.is_contention());
        assert!(client.items().is_empty());
        assert!(client.error().unwrap().contains("store busy"));
    }

    #[tokio::test]
    async fn later_failures_keep_previous_collection() {
        let transport = ScriptedTransport::with(vec![
            Ok(vec![item("x", "Nike", 3)]),
            Err(ClientError::Http {
                status: 500,
                body: "boom".into(),
            }),
            Err(busy()),
        ]);
        let mut client = StockClient::new(transport);
        client.refresh().await.unwrap();

        assert!(client.refresh().await.is_err());
        assert_eq!(client.items().len(), 1);

        let form = ItemForm {
            marca: "Nike".into(),
            modelo: "Air".into(),
            tamanho: "42".into(),
            cor: "Preto".into(),
            quantidade: "1".into(),
        };
        assert!(client.add(&form).await.is_err());
        assert_eq!(client.items().len(), 1);
        assert!(client.error().is_some());
    }

    #[tokio::test]
    async fn add_sends_derived_id_and_coerced_quantity() {
        let mut client = StockClient::new(ScriptedTransport::default());
        let form = ItemForm {
            marca: "Nike".into(),
            modelo: "Air Max".into(),
            tamanho: "42".into(),
            cor: "Preto".into(),
            quantidade: "abc".into(),
        };
        client.add(&form).await.unwrap();

        let sent = client.transport().sent();
        assert_eq!(sent[0].action, ApiAction::AddItem.as_str());
        let data = sent[0].data.as_ref().unwrap();
        assert_eq!(data["id"], "nike-air-max-42-preto");
        assert_eq!(data["quantidade"], 0);
    }

    #[tokio::test]
    async fn update_and_delete_address_selected_item() {
        let mut client = StockClient::new(ScriptedTransport::default());
        let selected = item("nike-m-40-preto", "Nike", 2);
        let mut form = ItemForm::from_item(&selected);
        form.quantidade = "10".into();

        client.update(&selected, &form).await.unwrap();
        client.delete(&selected).await.unwrap();

        let sent = client.transport().sent();
        assert_eq!(sent[0].action, "updateItem");
        assert_eq!(sent[0].data.as_ref().unwrap()["id"], "nike-m-40-preto");
        assert_eq!(sent[0].data.as_ref().unwrap()["quantidade"], 10);
        assert_eq!(sent[1].action, "deleteItem");
        assert_eq!(sent[1].data.as_ref().unwrap()["cor"], "Preto");
    }

    #[tokio::test]
    async fn error_cleared_on_next_success() {
        let transport = ScriptedTransport::with(vec![Err(busy()), Ok(vec![item("x", "Nike", 1)])]);
        let mut client = StockClient::new(transport);
        assert!(client.refresh().await.is_err());
        client.refresh().await.unwrap();
        assert_eq!(client.error(), None);
        assert_eq!(client.items().len(), 1);
    }

    #[test]
    fn form_quantity_coercion() {
        let mut form = ItemForm::default();
        for (text, expected) in [("", 0), ("  12 ", 12), ("3.7", 3), ("-4", 0), ("x1", 0)] {
            form.quantidade = text.into();
            assert_eq!(form.quantity(), expected, "input {text:?}");
        }
    }
}
