// ================
// common/src/lib.rs
// ================
//! Common types and structures
//! shared between the `QuickBite` client core and the platform API.
//! This module defines the REST envelope, the realtime protocol frames,
//! and the supporting domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account role, as carried in profiles and JWT claims
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Orders food
    Customer,
    /// Manages one restaurant's menu and incoming orders
    RestaurantOwner,
    /// Picks up and delivers orders
    DeliveryPerson,
    /// Platform operator
    Admin,
}

impl Role {
    /// Whether this role receives restaurant-side order traffic
    #[must_use]
    pub fn is_restaurant_owner(self) -> bool {
        self == Self::RestaurantOwner
    }

    /// Whether this role receives delivery assignments and reports positions
    #[must_use]
    pub fn is_delivery_person(self) -> bool {
        self == Self::DeliveryPerson
    }
}

/// Authenticated user profile as returned by the API
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Server-assigned user id
    pub id: String,
    /// Display name
    pub name: String,
    /// Login email
    pub email: String,
    /// Account role
    pub role: Role,
    /// Whether the email address has been verified
    pub verified: bool,
    /// Optional avatar image URL
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Restaurant owned by this user, when the role is `RestaurantOwner`
    #[serde(default)]
    pub restaurant_id: Option<String>,
}

/// Order lifecycle states
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    ReadyForPickup,
    OutForDelivery,
    Delivered,
    Cancelled,
}

/// Every successful REST response wraps its payload in this envelope
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ApiEnvelope<T> {
    pub result: T,
}

/// Body shape of a non-2xx REST response
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ApiErrorBody {
    /// Human-readable failure description, when the server provides one
    #[serde(default)]
    pub message: Option<String>,
}

/// Token material issued by login, registration, and refresh
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    /// Short-lived bearer token
    pub access_token: String,
    /// Long-lived rotation token
    pub refresh_token: String,
    /// Profile of the authenticated user; absent on plain refresh responses
    #[serde(default)]
    pub user: Option<UserProfile>,
}

/// Registration request body
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

/// Partial profile update; absent fields are left untouched by the server
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// A single geographic fix
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocationSample {
    pub lat: f64,
    pub lng: f64,
    /// When the fix was acquired
    pub captured_at: DateTime<Utc>,
}

/// The delivery address the user last picked, persisted across restarts
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SelectedAddress {
    /// Display label, e.g. "Home"
    pub label: String,
    pub lat: f64,
    pub lng: f64,
}

/// Frames sent from the client to the realtime endpoint
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum ClientFrame {
    /// First frame on every connection; authenticates the socket
    #[serde(rename = "auth")]
    Auth { token: String },
    /// Subscribe to events addressed to this user
    #[serde(rename = "join:user")]
    JoinUser,
    /// Subscribe to order traffic for an owned restaurant
    #[serde(rename = "join:restaurant", rename_all = "camelCase")]
    JoinRestaurant { restaurant_id: String },
    /// Subscribe to delivery assignments
    #[serde(rename = "join:delivery")]
    JoinDelivery,
    /// Report an order status change
    #[serde(rename = "order:status", rename_all = "camelCase")]
    OrderStatus {
        order_id: String,
        status: OrderStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// Report the courier position for an in-flight order
    #[serde(rename = "location:update", rename_all = "camelCase")]
    LocationUpdate { order_id: String, lat: f64, lng: f64 },
}

/// Frames pushed from the realtime endpoint to the client
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum ServerFrame {
    /// An order the user placed changed state
    #[serde(rename = "order:status_updated", rename_all = "camelCase")]
    OrderStatusUpdated {
        order_id: String,
        status: OrderStatus,
        #[serde(default)]
        reason: Option<String>,
    },
    /// A new order arrived for the joined restaurant
    #[serde(rename = "order:new", rename_all = "camelCase")]
    OrderNew {
        order_id: String,
        #[serde(default)]
        restaurant_id: Option<String>,
    },
    /// An order for the joined restaurant was cancelled
    #[serde(rename = "order:cancelled", rename_all = "camelCase")]
    OrderCancelled {
        order_id: String,
        #[serde(default)]
        reason: Option<String>,
    },
    /// Courier position relayed for a tracked order
    #[serde(rename = "location:updated", rename_all = "camelCase")]
    LocationUpdated { order_id: String, lat: f64, lng: f64 },
    /// A delivery job was assigned to this courier
    #[serde(rename = "order:assigned", rename_all = "camelCase")]
    OrderAssigned {
        order_id: String,
        #[serde(default)]
        restaurant_id: Option<String>,
    },
}

impl ServerFrame {
    /// Stable label stored on buffered update records
    #[must_use]
    pub fn record_type(&self) -> &'static str {
        match self {
            Self::OrderStatusUpdated { .. } => "status_update",
            Self::OrderNew { .. } => "new_order",
            Self::OrderCancelled { .. } => "order_cancelled",
            Self::LocationUpdated { .. } => "location_update",
            Self::OrderAssigned { .. } => "order_assigned",
        }
    }

    /// The order this frame refers to
    #[must_use]
    pub fn order_id(&self) -> &str {
        match self {
            Self::OrderStatusUpdated { order_id, .. }
            | Self::OrderNew { order_id, .. }
            | Self::OrderCancelled { order_id, .. }
            | Self::LocationUpdated { order_id, .. }
            | Self::OrderAssigned { order_id, .. } => order_id,
        }
    }
}
