use serde::{Deserialize, Serialize};

/// A customer order as written to the log.
///
/// The `id` is supplied by the caller and never checked for uniqueness: two calls
/// with the same `id` produce two records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub item_name: String,
}

impl Order {
    pub fn new(id: impl Into<String>, item_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            item_name: item_name.into(),
        }
    }

    /// Encodes the order as the UTF-8 JSON record payload (`{"id":..,"item_name":..}`).
    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_payload(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}

impl From<OrderRequest> for Order {
    fn from(request: OrderRequest) -> Self {
        Self {
            id: request.id,
            item_name: request.item_name,
        }
    }
}

/// Inbound `Order` call. Both fields must be present; empty strings are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub id: String,
    pub item_name: String,
}

/// Reply to a successful `Order` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderResponse {
    pub message: String,
    pub success: bool,
}

impl OrderResponse {
    pub fn ordered(order: &Order) -> Self {
        Self {
            message: format!("Successfully ordered {}: {}", order.id, order.item_name),
            success: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_uses_wire_field_names() {
        let order = Order::new("42", "keyboard");
        let payload = order.to_payload().unwrap();
        assert_eq!(
            String::from_utf8(payload).unwrap(),
            r#"{"id":"42","item_name":"keyboard"}"#
        );
    }

    #[test]
    fn test_payload_round_trip_with_empty_and_unicode_fields() {
        for order in [Order::new("", ""), Order::new("ç-7", "thé vert 🍵")] {
            let decoded = Order::from_payload(&order.to_payload().unwrap()).unwrap();
            assert_eq!(decoded, order);
        }
    }

    #[test]
    fn test_success_message() {
        let response = OrderResponse::ordered(&Order::new("7", "lamp"));
        assert_eq!(response.message, "Successfully ordered 7: lamp");
        assert!(response.success);
    }
}
