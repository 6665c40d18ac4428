//! Order submissions and the loyalty-points payload derived from them.

use serde::{Deserialize, Serialize};

/// An order placed through `POST /cart/orders`.
///
/// The id is assigned by the order store; everything else comes from the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    #[serde(default)]
    pub id: Option<i32>,
    pub coffee: String,
    pub username: String,
    pub quantity: u32,
}

impl Order {
    /// Creates an unsaved order.
    pub fn new(coffee: impl Into<String>, username: impl Into<String>, quantity: u32) -> Self {
        Self {
            id: None,
            coffee: coffee.into(),
            username: username.into(),
            quantity,
        }
    }

    /// Returns a copy carrying the id assigned by the store.
    pub fn with_id(mut self, id: i32) -> Self {
        self.id = Some(id);
        self
    }

    /// Builds the body sent to the points sink. One unit ordered earns one point.
    pub fn points_payload(&self) -> PointsPayload {
        PointsPayload {
            username: self.username.clone(),
            amount: i64::from(self.quantity),
        }
    }
}

/// Wire body posted to the downstream points sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsPayload {
    pub username: String,
    pub amount: i64,
}
