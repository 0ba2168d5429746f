use std::collections::HashMap;

use kosh_api_models::{FieldPatch, Rack, RackCreate, RackRole, RackUpdate, Room};
use kosh_core::{Inventory, Resolver};
use tracing::info;
use uuid::Uuid;

use crate::cli::{OutputFormat, RackCreateArgs, RackUpdateArgs};
use crate::client::{AppContext, CliError, CliResult, HttpResourceClient};
use crate::commands::found_or_none;
use crate::output::{RackView, render_rack_detail, render_racks};

/// Room aliases and role names keyed by id, fetched once per invocation.
struct Labels {
    rooms: HashMap<Uuid, Room>,
    roles: HashMap<Uuid, RackRole>,
}

impl Labels {
    async fn fetch(inventory: Inventory<'_, HttpResourceClient>) -> CliResult<Self> {
        let rooms = inventory
            .rooms()
            .await
            .map_err(|err| CliError::client("list rooms", &err))?;
        let roles = inventory
            .rack_roles()
            .await
            .map_err(|err| CliError::client("list rack roles", &err))?;
        Ok(Self {
            rooms: rooms.into_iter().map(|room| (room.id, room)).collect(),
            roles: roles.into_iter().map(|role| (role.id, role)).collect(),
        })
    }

    fn view<'a>(&'a self, rack: &'a Rack) -> RackView<'a> {
        RackView {
            rack,
            room_alias: self
                .rooms
                .get(&rack.datacenter_room_id)
                .map(|room| room.alias.as_str()),
            rack_role_name: self
                .roles
                .get(&rack.rack_role_id)
                .map(|role| role.name.as_str()),
        }
    }
}

pub(crate) async fn handle_rack_list(ctx: &AppContext, format: OutputFormat) -> CliResult<()> {
    let inventory = ctx.inventory();
    let mut racks = inventory
        .racks()
        .await
        .map_err(|err| CliError::client("list racks", &err))?;
    racks.sort_by(|a, b| a.name.cmp(&b.name));
    let labels = Labels::fetch(inventory).await?;
    let views: Vec<RackView<'_>> = racks.iter().map(|rack| labels.view(rack)).collect();
    render_racks(&views, format)
}

pub(crate) async fn handle_rack_create(
    ctx: &AppContext,
    args: RackCreateArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let name = args.name.trim();
    if name.is_empty() {
        return Err(CliError::validation("rack name must not be empty"));
    }
    let phase = non_empty(args.phase, "phase")?;

    let mut resolver = Resolver::new(ctx.inventory());
    let room = resolver.room(&args.room).await?;
    let role = resolver.rack_role(&args.role).await?;

    let request = RackCreate {
        name: name.to_string(),
        datacenter_room_id: room.id,
        rack_role_id: role.id,
        phase,
    };
    let rack = ctx
        .inventory()
        .create_rack(&request)
        .await
        .map_err(|err| CliError::client("create rack", &err))?;
    info!(rack_id = %rack.id, "rack created");

    let view = RackView {
        rack: &rack,
        room_alias: Some(room.alias.as_str()),
        rack_role_name: Some(role.name.as_str()),
    };
    render_rack_detail(&view, format)
}

pub(crate) async fn handle_rack_get(
    ctx: &AppContext,
    key: &str,
    format: OutputFormat,
) -> CliResult<()> {
    let mut resolver = Resolver::new(ctx.inventory());
    let rack = resolver.rack(key).await?;
    render_one(&mut resolver, &rack, format).await
}

pub(crate) async fn handle_rack_update(
    ctx: &AppContext,
    key: &str,
    args: RackUpdateArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let mut resolver = Resolver::new(ctx.inventory());
    let update = build_update(&mut resolver, args).await?;
    let rack = resolver.rack(key).await?;

    let rack = if update.is_empty() {
        ctx.inventory()
            .rack(rack.id)
            .await
            .map_err(|err| CliError::client("fetch rack", &err))?
    } else {
        let updated = ctx
            .inventory()
            .update_rack(rack.id, &update)
            .await
            .map_err(|err| CliError::client("update rack", &err))?;
        info!(rack_id = %updated.id, "rack updated");
        updated
    };
    render_one(&mut resolver, &rack, format).await
}

pub(crate) async fn handle_rack_delete(
    ctx: &AppContext,
    key: &str,
    format: OutputFormat,
) -> CliResult<()> {
    let mut resolver = Resolver::new(ctx.inventory());
    let rack = resolver.rack(key).await?;
    ctx.inventory()
        .delete_rack(rack.id)
        .await
        .map_err(|err| CliError::client("delete rack", &err))?;
    info!(rack_id = %rack.id, "rack deleted");
    handle_rack_list(ctx, format).await
}

async fn render_one(
    resolver: &mut Resolver<'_, HttpResourceClient>,
    rack: &Rack,
    format: OutputFormat,
) -> CliResult<()> {
    let room = found_or_none(resolver.room(&rack.datacenter_room_id.to_string()).await)?;
    let role = found_or_none(resolver.rack_role(&rack.rack_role_id.to_string()).await)?;
    let view = RackView {
        rack,
        room_alias: room.as_ref().map(|room| room.alias.as_str()),
        rack_role_name: role.as_ref().map(|role| role.name.as_str()),
    };
    render_rack_detail(&view, format)
}

async fn build_update(
    resolver: &mut Resolver<'_, HttpResourceClient>,
    args: RackUpdateArgs,
) -> CliResult<RackUpdate> {
    let datacenter_room_id = match args.room {
        Some(room) => Some(resolver.room(&room).await?.id),
        None => None,
    };
    let rack_role_id = match args.role {
        Some(role) => Some(resolver.rack_role(&role).await?.id),
        None => None,
    };
    Ok(RackUpdate {
        name: non_empty(args.name, "name")?,
        datacenter_room_id,
        rack_role_id,
        phase: non_empty(args.phase, "phase")?,
        serial_number: field_patch(args.serial_number, args.clear_serial_number, "serial number")?,
        asset_tag: field_patch(args.asset_tag, args.clear_asset_tag, "asset tag")?,
    })
}

fn non_empty(value: Option<String>, label: &str) -> CliResult<Option<String>> {
    match value {
        Some(value) if value.trim().is_empty() => {
            Err(CliError::validation(format!("{label} must not be empty")))
        }
        other => Ok(other.map(|value| value.trim().to_string())),
    }
}

/// Three-state patch from a value flag and its `--clear-*` counterpart.
pub(crate) fn field_patch(
    value: Option<String>,
    clear: bool,
    label: &str,
) -> CliResult<FieldPatch<String>> {
    match (value, clear) {
        (Some(_), true) => Err(CliError::validation(format!(
            "{label} cannot be set and cleared at once"
        ))),
        (Some(value), false) if value.trim().is_empty() => Err(CliError::validation(format!(
            "{label} must not be empty; pass --clear-{} to remove it",
            label.replace(' ', "-")
        ))),
        (Some(value), false) => Ok(FieldPatch::Set(value.trim().to_string())),
        (None, true) => Ok(FieldPatch::Clear),
        (None, false) => Ok(FieldPatch::Unchanged),
    }
}
