//! Entity builders with fixed timestamps.

use chrono::{DateTime, TimeZone, Utc};
use kosh_api_models::{HardwareProduct, LayoutSlot, Rack, RackRole, Room};
use uuid::Uuid;

/// Timestamp stamped on every fixture.
#[must_use]
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Hardware product with a random id.
#[must_use]
pub fn product(name: &str, alias: &str, rack_unit_size: u32) -> HardwareProduct {
    product_with_id(Uuid::new_v4(), name, alias, rack_unit_size)
}

/// Hardware product with a caller-chosen id.
#[must_use]
pub fn product_with_id(id: Uuid, name: &str, alias: &str, rack_unit_size: u32) -> HardwareProduct {
    HardwareProduct {
        id,
        name: name.to_string(),
        alias: alias.to_string(),
        sku: None,
        rack_unit_size: Some(rack_unit_size),
    }
}

/// Room with a random id.
#[must_use]
pub fn room(alias: &str) -> Room {
    Room {
        id: Uuid::new_v4(),
        datacenter_id: Uuid::new_v4(),
        az: "us-east-1a".to_string(),
        alias: alias.to_string(),
        vendor_name: None,
        created: epoch(),
        updated: epoch(),
    }
}

/// Rack role with a random id.
#[must_use]
pub fn rack_role(name: &str, rack_size: u32) -> RackRole {
    RackRole {
        id: Uuid::new_v4(),
        name: name.to_string(),
        rack_size,
        created: epoch(),
        updated: epoch(),
    }
}

/// Rack with a random id in phase `integration`.
#[must_use]
pub fn rack(name: &str, room: &Room, role: &RackRole) -> Rack {
    rack_with_id(Uuid::new_v4(), name, room, role)
}

/// Rack with a caller-chosen id.
#[must_use]
pub fn rack_with_id(id: Uuid, name: &str, room: &Room, role: &RackRole) -> Rack {
    Rack {
        id,
        name: name.to_string(),
        datacenter_room_id: room.id,
        rack_role_id: role.id,
        serial_number: None,
        asset_tag: None,
        phase: "integration".to_string(),
        build_id: None,
        created: epoch(),
        updated: epoch(),
    }
}

/// Layout slot occupying `product` at `rack_unit_start`.
#[must_use]
pub fn slot(rack_id: Uuid, product: &HardwareProduct, rack_unit_start: u32) -> LayoutSlot {
    LayoutSlot {
        id: Uuid::new_v4(),
        rack_id,
        hardware_product_id: product.id,
        rack_unit_start,
        rack_unit_size: product.rack_unit_size.unwrap_or(1),
        created: epoch(),
        updated: epoch(),
    }
}
