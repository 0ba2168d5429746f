//! Output renderers and formatting helpers for CLI commands.

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use kosh_api_models::{
    Device, DevicePhaseBody, DeviceSettings, HardwareProduct, LayoutSlot, Rack, RackAssignment,
};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};

/// A rack joined with the labels of its room and role.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct RackView<'a> {
    #[serde(flatten)]
    pub(crate) rack: &'a Rack,
    pub(crate) room_alias: Option<&'a str>,
    pub(crate) rack_role_name: Option<&'a str>,
}

/// A layout slot joined with its product.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct LayoutRow<'a> {
    #[serde(flatten)]
    pub(crate) slot: &'a LayoutSlot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) hardware_product: Option<&'a HardwareProduct>,
}

/// A device joined with its hardware product.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct DeviceRow<'a> {
    #[serde(flatten)]
    pub(crate) device: &'a Device,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) hardware_product: Option<&'a HardwareProduct>,
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
    println!("{text}");
    Ok(())
}

pub(crate) fn render_racks(racks: &[RackView<'_>], format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(racks)?,
        OutputFormat::Table => {
            println!(
                "{:<8} {:<16} {:<14} {:<16} {:<12} SERIAL",
                "ID", "NAME", "ROOM", "ROLE", "PHASE"
            );
            for view in racks {
                println!(
                    "{:<8} {:<16} {:<14} {:<16} {:<12} {}",
                    short_id(&view.rack.id.to_string()),
                    view.rack.name,
                    view.room_alias.unwrap_or("-"),
                    view.rack_role_name.unwrap_or("-"),
                    view.rack.phase,
                    view.rack.serial_number.as_deref().unwrap_or("")
                );
            }
        }
    }
    Ok(())
}

pub(crate) fn render_rack_detail(view: &RackView<'_>, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(view)?,
        OutputFormat::Table => {
            let rack = view.rack;
            println!("id: {}", rack.id);
            println!("name: {}", rack.name);
            println!(
                "room: {} ({})",
                view.room_alias.unwrap_or("-"),
                rack.datacenter_room_id
            );
            println!(
                "role: {} ({})",
                view.rack_role_name.unwrap_or("-"),
                rack.rack_role_id
            );
            println!("phase: {}", rack.phase);
            if let Some(serial) = &rack.serial_number {
                println!("serial number: {serial}");
            }
            if let Some(tag) = &rack.asset_tag {
                println!("asset tag: {tag}");
            }
            if let Some(build) = rack.build_id {
                println!("build: {build}");
            }
            println!("created: {}", format_time(&rack.created));
            println!("updated: {}", format_time(&rack.updated));
        }
    }
    Ok(())
}

pub(crate) fn render_layout(rows: &[LayoutRow<'_>], format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(rows)?,
        OutputFormat::Table => {
            println!("{:>4} {:>4} {:<8} PRODUCT", "RU", "SIZE", "SLOT");
            for row in rows {
                println!(
                    "{:>4} {:>4} {:<8} {}",
                    row.slot.rack_unit_start,
                    row.slot.rack_unit_size,
                    short_id(&row.slot.id.to_string()),
                    row.hardware_product.map_or_else(
                        || row.slot.hardware_product_id.to_string(),
                        product_label
                    )
                );
            }
        }
    }
    Ok(())
}

/// `serials` maps device ids to serial numbers for the table view.
pub(crate) fn render_assignments(
    assignments: &[RackAssignment],
    serials: &HashMap<Uuid, String>,
    format: OutputFormat,
) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(assignments)?,
        OutputFormat::Table => {
            println!(
                "{:>4} {:>4} {:<20} {:<36} {:<16} PRODUCT",
                "RU", "SIZE", "SERIAL", "DEVICE", "ASSET TAG"
            );
            for assignment in assignments {
                println!(
                    "{:>4} {:>4} {:<20} {:<36} {:<16} {}",
                    assignment.rack_unit_start,
                    assignment.rack_unit_size,
                    serials
                        .get(&assignment.device_id)
                        .map_or("", String::as_str),
                    assignment.device_id,
                    assignment.device_asset_tag.as_deref().unwrap_or(""),
                    assignment.hardware_product_name.as_deref().unwrap_or("")
                );
            }
        }
    }
    Ok(())
}

pub(crate) fn render_devices(rows: &[DeviceRow<'_>], format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(rows)?,
        OutputFormat::Table => {
            println!(
                "{:<20} {:<24} {:<16} {:<20} {:<15} {:<23} VALIDATED",
                "SERIAL", "HOSTNAME", "ASSET TAG", "PRODUCT", "PHASE", "UPDATED"
            );
            for row in rows {
                let device = row.device;
                println!(
                    "{:<20} {:<24} {:<16} {:<20} {:<15} {:<23} {}",
                    device.serial_number,
                    device.hostname.as_deref().unwrap_or(""),
                    device.asset_tag.as_deref().unwrap_or(""),
                    row.hardware_product
                        .map_or_else(|| device.hardware_product_id.to_string(), |p| p.name.clone()),
                    device.phase,
                    format_time(&device.updated),
                    device.validated.as_ref().map(format_time).unwrap_or_default()
                );
            }
        }
    }
    Ok(())
}

pub(crate) fn render_device(row: &DeviceRow<'_>, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(row)?,
        OutputFormat::Table => {
            let device = row.device;
            println!("id: {}", device.id);
            println!("serial number: {}", device.serial_number);
            if let Some(hostname) = &device.hostname {
                println!("hostname: {hostname}");
            }
            if let Some(tag) = &device.asset_tag {
                println!("asset tag: {tag}");
            }
            match row.hardware_product {
                Some(product) => println!("product: {}", product_label(product)),
                None => println!("product: {}", device.hardware_product_id),
            }
            println!("phase: {}", device.phase);
            println!("health: {}", device.health);
            if let (Some(rack), Some(ru)) = (device.rack_id, device.rack_unit_start) {
                println!("location: rack {rack}, RU {ru}");
            }
            println!("created: {}", format_time(&device.created));
            println!("updated: {}", format_time(&device.updated));
            if let Some(seen) = &device.last_seen {
                println!("last seen: {}", format_time(seen));
            }
            if let Some(validated) = &device.validated {
                println!("validated: {}", format_time(validated));
            }
        }
    }
    Ok(())
}

pub(crate) fn render_phase(phase: &DevicePhaseBody, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(phase)?,
        OutputFormat::Table => println!("{}", phase.phase),
    }
    Ok(())
}

pub(crate) fn render_product(product: &HardwareProduct, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(product)?,
        OutputFormat::Table => {
            println!("id: {}", product.id);
            println!("name: {}", product.name);
            println!("alias: {}", product.alias);
            if let Some(sku) = &product.sku {
                println!("sku: {sku}");
            }
            if let Some(size) = product.rack_unit_size {
                println!("rack units: {size}");
            }
        }
    }
    Ok(())
}

pub(crate) fn render_settings(settings: &DeviceSettings, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(settings)?,
        OutputFormat::Table => {
            for (key, value) in settings {
                println!("{key}: {}", format_value(value));
            }
        }
    }
    Ok(())
}

pub(crate) fn render_setting(key: &str, value: &Value, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => {
            let mut single = DeviceSettings::new();
            single.insert(key.to_string(), value.clone());
            print_json(&single)?;
        }
        OutputFormat::Table => println!("{}", format_value(value)),
    }
    Ok(())
}

/// `alias (name)`, the product form used in layout tables.
#[must_use]
pub(crate) fn product_label(product: &HardwareProduct) -> String {
    format!("{} ({})", product.alias, product.name)
}

/// First block of a UUID, enough to address most entities by prefix.
#[must_use]
pub(crate) fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

#[must_use]
pub(crate) fn format_time(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Strings print bare; everything else prints as JSON.
#[must_use]
pub(crate) fn format_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
