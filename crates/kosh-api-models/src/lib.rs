#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    unreachable_pub,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
//! Shared HTTP DTOs for the Conch inventory API.
//!
//! These types are re-used by the core engines and the CLI for request/response
//! encoding so the wire contract lives in one place. Field names follow the
//! server's snake_case JSON.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

/// Error document returned by the inventory service on non-2xx responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    /// Human-readable error message.
    pub error: String,
}

/// Hardware product (a SKU that can occupy rack units).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HardwareProduct {
    /// Canonical identifier.
    pub id: Uuid,
    /// Unique product name.
    pub name: String,
    /// Unique short alias.
    pub alias: String,
    /// Stock keeping unit, when recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    /// Number of rack units the product occupies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rack_unit_size: Option<u32>,
}

/// Datacenter room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Room {
    /// Canonical identifier.
    pub id: Uuid,
    /// Owning datacenter.
    pub datacenter_id: Uuid,
    /// Availability zone label.
    pub az: String,
    /// Unique room alias.
    pub alias: String,
    /// Vendor-assigned room name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_name: Option<String>,
    /// Creation timestamp.
    pub created: DateTime<Utc>,
    /// Last update timestamp.
    pub updated: DateTime<Utc>,
}

/// Rack role (rack height and purpose).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RackRole {
    /// Canonical identifier.
    pub id: Uuid,
    /// Unique role name.
    pub name: String,
    /// Height of racks with this role, in rack units.
    pub rack_size: u32,
    /// Creation timestamp.
    pub created: DateTime<Utc>,
    /// Last update timestamp.
    pub updated: DateTime<Utc>,
}

/// Rack record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rack {
    /// Canonical identifier.
    pub id: Uuid,
    /// Rack name, unique within its room.
    pub name: String,
    /// Room the rack lives in.
    pub datacenter_room_id: Uuid,
    /// Role applied to the rack.
    pub rack_role_id: Uuid,
    /// Vendor serial number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    /// Asset tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_tag: Option<String>,
    /// Lifecycle phase (e.g. `integration`, `production`).
    pub phase: String,
    /// Build the rack belongs to, when any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_id: Option<Uuid>,
    /// Creation timestamp.
    pub created: DateTime<Utc>,
    /// Last update timestamp.
    pub updated: DateTime<Utc>,
}

/// Payload for `POST /rack`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RackCreate {
    /// Rack name.
    pub name: String,
    /// Room the rack is placed in.
    pub datacenter_room_id: Uuid,
    /// Role applied to the rack.
    pub rack_role_id: Uuid,
    /// Optional lifecycle phase.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

/// Payload for `POST /rack/{id}`.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RackUpdate {
    /// Replacement name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Replacement room.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datacenter_room_id: Option<Uuid>,
    /// Replacement role.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rack_role_id: Option<Uuid>,
    /// Replacement phase.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    /// Serial number change.
    #[serde(skip_serializing_if = "FieldPatch::is_unchanged")]
    pub serial_number: FieldPatch<String>,
    /// Asset tag change.
    #[serde(skip_serializing_if = "FieldPatch::is_unchanged")]
    pub asset_tag: FieldPatch<String>,
}

impl RackUpdate {
    /// Returns `true` when the update would not change anything.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.datacenter_room_id.is_none()
            && self.rack_role_id.is_none()
            && self.phase.is_none()
            && self.serial_number.is_unchanged()
            && self.asset_tag.is_unchanged()
    }
}

/// Three-state change for an optional server field.
///
/// `Unchanged` omits the field from the payload, `Clear` sends JSON `null`,
/// and `Set` sends the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FieldPatch<T> {
    /// Leave the stored value untouched.
    #[default]
    Unchanged,
    /// Remove the stored value.
    Clear,
    /// Replace the stored value.
    Set(T),
}

impl<T> FieldPatch<T> {
    /// Returns `true` for [`FieldPatch::Unchanged`].
    #[must_use]
    pub const fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged)
    }
}

impl<T: Serialize> Serialize for FieldPatch<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Unchanged | Self::Clear => serializer.serialize_none(),
            Self::Set(value) => serializer.serialize_some(value),
        }
    }
}

/// One occupied rack-unit position in a rack layout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LayoutSlot {
    /// Server-assigned slot identifier.
    pub id: Uuid,
    /// Owning rack.
    pub rack_id: Uuid,
    /// Product installed in the slot.
    pub hardware_product_id: Uuid,
    /// First (lowest) rack unit, 1-based.
    pub rack_unit_start: u32,
    /// Height in rack units, derived from the product.
    pub rack_unit_size: u32,
    /// Creation timestamp.
    pub created: DateTime<Utc>,
    /// Last update timestamp.
    pub updated: DateTime<Utc>,
}

/// Payload for `POST /layout`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LayoutSlotCreate {
    /// Owning rack.
    pub rack_id: Uuid,
    /// Product to install.
    pub hardware_product_id: Uuid,
    /// First rack unit, 1-based.
    pub rack_unit_start: u32,
}

/// A device occupying rack units, as reported by `GET /rack/{id}/assignment`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RackAssignment {
    /// Assigned device.
    pub device_id: Uuid,
    /// Device asset tag (display hint).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_asset_tag: Option<String>,
    /// Product name of the slot (display hint).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardware_product_name: Option<String>,
    /// First rack unit, 1-based.
    pub rack_unit_start: u32,
    /// Height in rack units.
    pub rack_unit_size: u32,
}

/// One entry of the `POST /rack/{id}/assignment` payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceAssignment {
    /// Device to place.
    pub device_id: Uuid,
    /// Rack unit the device is placed at.
    pub rack_unit_start: u32,
    /// Asset tag to record on the device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_asset_tag: Option<String>,
}

/// Device record as returned by `GET /device/{id}` and `GET /device?key=value`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Device {
    /// Canonical identifier.
    pub id: Uuid,
    /// Vendor serial number; the service also accepts it in place of the id.
    pub serial_number: String,
    /// Asset tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_tag: Option<String>,
    /// Hostname reported by the device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Installed hardware product.
    pub hardware_product_id: Uuid,
    /// Result of the latest validation run (`pass`, `fail`, `error`, `unknown`).
    pub health: String,
    /// Lifecycle phase.
    pub phase: DevicePhase,
    /// Rack the device is assigned to, when any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rack_id: Option<Uuid>,
    /// First rack unit the device occupies, when assigned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rack_unit_start: Option<u32>,
    /// Creation timestamp.
    pub created: DateTime<Utc>,
    /// Last update timestamp.
    pub updated: DateTime<Utc>,
    /// Last time the device reported in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
    /// Last successful validation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validated: Option<DateTime<Utc>>,
}

/// Device lifecycle phase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DevicePhase {
    /// Being racked and burned in.
    Integration,
    /// Being provisioned on site.
    Installation,
    /// Serving traffic.
    Production,
    /// Pulled for troubleshooting.
    Diagnostics,
    /// Retired.
    Decommissioned,
}

impl DevicePhase {
    /// Every phase, in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::Integration,
        Self::Installation,
        Self::Production,
        Self::Diagnostics,
        Self::Decommissioned,
    ];

    /// Wire name of the phase.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Integration => "integration",
            Self::Installation => "installation",
            Self::Production => "production",
            Self::Diagnostics => "diagnostics",
            Self::Decommissioned => "decommissioned",
        }
    }
}

impl std::fmt::Display for DevicePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of `GET /device/{id}/phase` and `POST /device/{id}/phase`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DevicePhaseBody {
    /// Device the phase belongs to.
    pub id: Uuid,
    /// Current or requested phase.
    pub phase: DevicePhase,
}

/// Device settings map as returned by `GET /device/{id}/settings`.
pub type DeviceSettings = BTreeMap<String, Value>;
