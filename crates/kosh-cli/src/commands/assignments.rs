use std::collections::HashMap;

use kosh_api_models::RackAssignment;
use kosh_core::{
    ClientError, Resolver, decode_assignments, replace_assignments, validate_assignments,
};
use tracing::info;
use uuid::Uuid;

use crate::cli::{InputArgs, OutputFormat};
use crate::client::{AppContext, CliError, CliResult};
use crate::commands::read_input;
use crate::output::render_assignments;

pub(crate) async fn handle_assignments_get(
    ctx: &AppContext,
    key: &str,
    format: OutputFormat,
) -> CliResult<()> {
    let mut resolver = Resolver::new(ctx.inventory());
    let rack = resolver.rack(key).await?;
    let assignments = ctx
        .inventory()
        .rack_assignments(rack.id)
        .await
        .map_err(|err| CliError::client("fetch rack assignments", &err))?;
    render(ctx, assignments, format).await
}

pub(crate) async fn handle_assign(
    ctx: &AppContext,
    key: &str,
    args: InputArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let bytes = read_input(&args.file)?;
    let records = decode_assignments(&bytes)?;
    validate_assignments(&records)?;

    let mut resolver = Resolver::new(ctx.inventory());
    let rack = resolver.rack(key).await?;
    let assignments = replace_assignments(ctx.inventory(), rack.id, &records).await?;
    info!(rack_id = %rack.id, assignments = assignments.len(), "rack assignments replaced");
    render(ctx, assignments, format).await
}

async fn render(
    ctx: &AppContext,
    mut assignments: Vec<RackAssignment>,
    format: OutputFormat,
) -> CliResult<()> {
    assignments.sort_by(|a, b| b.rack_unit_start.cmp(&a.rack_unit_start));
    let serials = match format {
        OutputFormat::Table => device_serials(ctx, &assignments).await?,
        OutputFormat::Json => HashMap::new(),
    };
    render_assignments(&assignments, &serials, format)
}

/// Serial numbers of the assigned devices, for the table view. A device the
/// service no longer knows is left without one.
async fn device_serials(
    ctx: &AppContext,
    assignments: &[RackAssignment],
) -> CliResult<HashMap<Uuid, String>> {
    let mut serials = HashMap::new();
    for assignment in assignments {
        let id = assignment.device_id;
        if id.is_nil() || serials.contains_key(&id) {
            continue;
        }
        match ctx.inventory().device(&id.to_string()).await {
            Ok(device) => {
                serials.insert(id, device.serial_number);
            }
            Err(ClientError::NotFound { .. }) => {}
            Err(err) => return Err(CliError::client("fetch device", &err)),
        }
    }
    Ok(serials)
}
