//! Export/import document shapes for rack layouts and assignments.
//!
//! A layout document is a JSON array of `{ru_start, product_id,
//! product_name, product_alias}` records. Export fills every reference the
//! product has and sorts by `ru_start`, highest first. Import accepts exactly
//! one of name or alias, or a product id with whatever labels accompany it.

use std::collections::HashMap;

use kosh_api_models::{DeviceAssignment, HardwareProduct, LayoutSlot};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

/// One record of a layout document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredLayoutEntry {
    /// First rack unit, 1-based.
    pub ru_start: u32,
    /// Canonical product id.
    #[serde(
        default,
        deserialize_with = "optional_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub product_id: Option<Uuid>,
    /// Product name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    /// Product alias.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_alias: Option<String>,
}

/// The product reference a layout record carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductRef {
    /// Canonical id only.
    Id(Uuid),
    /// Name only.
    Name(String),
    /// Alias only.
    Alias(String),
    /// Id plus labels, as written by export. The id is authoritative and
    /// the labels are informational.
    Exported {
        /// Canonical id.
        id: Uuid,
        /// Product name at export time.
        name: Option<String>,
        /// Product alias at export time.
        alias: Option<String>,
    },
}

fn populated(value: Option<&String>) -> Option<String> {
    value
        .map(|raw| raw.trim())
        .filter(|trimmed| !trimmed.is_empty())
        .map(str::to_string)
}

impl DesiredLayoutEntry {
    /// Validate the record and extract its product reference.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] naming `row` when `ru_start` is
    /// zero, when no reference is populated, or when both name and alias are
    /// given without an id.
    pub fn reference(&self, row: usize) -> CoreResult<ProductRef> {
        if self.ru_start == 0 {
            return Err(CoreError::invalid(Some(row), "ru_start", "must be at least 1"));
        }
        let id = self.product_id.filter(|id| !id.is_nil());
        let name = populated(self.product_name.as_ref());
        let alias = populated(self.product_alias.as_ref());

        match (id, name, alias) {
            (Some(id), None, None) => Ok(ProductRef::Id(id)),
            (Some(id), name, alias) => Ok(ProductRef::Exported { id, name, alias }),
            (None, Some(name), None) => Ok(ProductRef::Name(name)),
            (None, None, Some(alias)) => Ok(ProductRef::Alias(alias)),
            (None, None, None) => Err(CoreError::invalid(
                Some(row),
                "product",
                "no product id, name, or alias",
            )),
            (None, Some(_), Some(_)) => Err(CoreError::invalid(
                Some(row),
                "product",
                "more than one product reference",
            )),
        }
    }
}

/// Parse a layout document.
///
/// # Errors
///
/// Returns [`CoreError::MalformedDocument`] when the bytes are not a JSON
/// array of layout records.
pub fn decode_layout(bytes: &[u8]) -> CoreResult<Vec<DesiredLayoutEntry>> {
    serde_json::from_slice(bytes).map_err(|source| CoreError::MalformedDocument { source })
}

/// Build the export document for `slots`, highest rack unit first.
///
/// Products absent from `products` are exported by id only, and empty
/// labels are omitted.
#[must_use]
pub fn encode_layout(
    slots: &[LayoutSlot],
    products: &HashMap<Uuid, HardwareProduct>,
) -> Vec<DesiredLayoutEntry> {
    let mut records: Vec<DesiredLayoutEntry> = slots
        .iter()
        .map(|slot| {
            let product = products.get(&slot.hardware_product_id);
            DesiredLayoutEntry {
                ru_start: slot.rack_unit_start,
                product_id: Some(slot.hardware_product_id),
                product_name: product
                    .map(|p| p.name.clone())
                    .filter(|name| !name.is_empty()),
                product_alias: product
                    .map(|p| p.alias.clone())
                    .filter(|alias| !alias.is_empty()),
            }
        })
        .collect();
    records.sort_by(|a, b| b.ru_start.cmp(&a.ru_start));
    records
}

/// One record of an assignment document.
///
/// Matches the output of the assignment listing; display-only fields are
/// ignored on input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AssignmentRecord {
    /// Device to place.
    #[serde(default, deserialize_with = "optional_id")]
    pub device_id: Option<Uuid>,
    /// First rack unit, 1-based.
    pub rack_unit_start: u32,
    /// Asset tag to record on the device.
    #[serde(default)]
    pub device_asset_tag: Option<String>,
}

impl AssignmentRecord {
    /// Validate the record and convert it into the wire payload.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] naming `row` when the device id is
    /// missing or `rack_unit_start` is zero.
    pub fn assignment(&self, row: usize) -> CoreResult<DeviceAssignment> {
        let device_id = self
            .device_id
            .filter(|id| !id.is_nil())
            .ok_or_else(|| CoreError::invalid(Some(row), "device_id", "missing device id"))?;
        if self.rack_unit_start == 0 {
            return Err(CoreError::invalid(
                Some(row),
                "rack_unit_start",
                "must be at least 1",
            ));
        }
        Ok(DeviceAssignment {
            device_id,
            rack_unit_start: self.rack_unit_start,
            device_asset_tag: populated(self.device_asset_tag.as_ref()),
        })
    }
}

/// Parse an assignment document.
///
/// # Errors
///
/// Returns [`CoreError::MalformedDocument`] when the bytes are not a JSON
/// array of assignment records.
pub fn decode_assignments(bytes: &[u8]) -> CoreResult<Vec<AssignmentRecord>> {
    serde_json::from_slice(bytes).map_err(|source| CoreError::MalformedDocument { source })
}

/// Accept `null`, `""`, or a UUID string.
fn optional_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Uuid>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => Uuid::parse_str(text)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
