use std::collections::HashMap;

use kosh_api_models::{HardwareProduct, LayoutSlot};
use kosh_core::{
    LayoutReconciler, ReplacePolicy, Resolver, decode_layout, export_layout, products_for,
    validate_entries,
};
use tracing::info;
use uuid::Uuid;

use crate::cli::{LayoutImportArgs, OutputFormat};
use crate::client::{AppContext, CliError, CliResult};
use crate::commands::read_input;
use crate::output::{LayoutRow, print_json, render_layout};

pub(crate) async fn handle_layout_get(
    ctx: &AppContext,
    key: &str,
    format: OutputFormat,
) -> CliResult<()> {
    let mut resolver = Resolver::new(ctx.inventory());
    let rack = resolver.rack(key).await?;
    let slots = fetch_layout(ctx, rack.id).await?;
    let products = products_for(&mut resolver, &slots).await?;
    render_slots(&slots, &products, format)
}

/// Export is always JSON so the output can be fed back into `import`.
pub(crate) async fn handle_layout_export(ctx: &AppContext, key: &str) -> CliResult<()> {
    let mut resolver = Resolver::new(ctx.inventory());
    let rack = resolver.rack(key).await?;
    let slots = fetch_layout(ctx, rack.id).await?;
    print_json(&export_layout(&mut resolver, &slots).await?)
}

pub(crate) async fn handle_layout_import(
    ctx: &AppContext,
    key: &str,
    args: LayoutImportArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let bytes = read_input(&args.file)?;
    let entries = decode_layout(&bytes)?;
    validate_entries(&entries)?;

    let mut resolver = Resolver::new(ctx.inventory());
    let rack = resolver.rack(key).await?;
    info!(rack_id = %rack.id, records = entries.len(), "importing rack layout");

    let mut reconciler = LayoutReconciler::with_resolver(resolver);
    let slots = reconciler
        .reconcile(rack.id, &entries, ReplacePolicy::from_overwrite(args.overwrite))
        .await?;
    let mut resolver = reconciler.into_resolver();
    let products = products_for(&mut resolver, &slots).await?;
    render_slots(&slots, &products, format)
}

async fn fetch_layout(ctx: &AppContext, rack_id: Uuid) -> CliResult<Vec<LayoutSlot>> {
    ctx.inventory()
        .rack_layout(rack_id)
        .await
        .map_err(|err| CliError::client("fetch rack layout", &err))
}

fn render_slots(
    slots: &[LayoutSlot],
    products: &HashMap<Uuid, HardwareProduct>,
    format: OutputFormat,
) -> CliResult<()> {
    let mut rows: Vec<LayoutRow<'_>> = slots
        .iter()
        .map(|slot| LayoutRow {
            slot,
            hardware_product: products.get(&slot.hardware_product_id),
        })
        .collect();
    rows.sort_by(|a, b| b.slot.rack_unit_start.cmp(&a.slot.rack_unit_start));
    render_layout(&rows, format)
}
