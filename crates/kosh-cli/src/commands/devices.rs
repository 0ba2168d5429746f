use std::collections::HashMap;

use kosh_api_models::{Device, DevicePhase, HardwareProduct};
use kosh_core::Resolver;
use kosh_core::settings::{split_settings, tag_key};
use tracing::info;
use uuid::Uuid;

use crate::cli::{OutputFormat, SearchCommand, SettingAction, SettingArgs};
use crate::client::{AppContext, CliError, CliResult, HttpResourceClient};
use crate::commands::found_or_none;
use crate::output::{
    DeviceRow, render_device, render_devices, render_phase, render_setting, render_settings,
};

pub(crate) async fn handle_device_get(
    ctx: &AppContext,
    device: &str,
    format: OutputFormat,
) -> CliResult<()> {
    let device = ctx
        .inventory()
        .device(device)
        .await
        .map_err(|err| CliError::client("fetch device", &err))?;
    let mut resolver = Resolver::new(ctx.inventory());
    let products = products_for(&mut resolver, std::slice::from_ref(&device)).await?;
    render_device(&row(&device, &products), format)
}

pub(crate) async fn handle_phase_get(
    ctx: &AppContext,
    device: &str,
    format: OutputFormat,
) -> CliResult<()> {
    let phase = ctx
        .inventory()
        .device_phase(device)
        .await
        .map_err(|err| CliError::client("fetch device phase", &err))?;
    render_phase(&phase, format)
}

/// Set the phase, then print it as the service now reports it.
pub(crate) async fn handle_phase_set(
    ctx: &AppContext,
    device: &str,
    phase: DevicePhase,
    format: OutputFormat,
) -> CliResult<()> {
    let inventory = ctx.inventory();
    inventory
        .set_device_phase(device, phase)
        .await
        .map_err(|err| CliError::client("update device phase", &err))?;
    info!(device, %phase, "device phase updated");
    handle_phase_get(ctx, device, format).await
}

/// Exact-match search; tags are stored as `tag.`-prefixed settings.
pub(crate) async fn handle_search(
    ctx: &AppContext,
    search: SearchCommand,
    format: OutputFormat,
) -> CliResult<()> {
    let (field, value) = match search {
        SearchCommand::Setting { key, value } => (non_empty_key(&key, "setting key")?, value),
        SearchCommand::Tag { key, value } => (tag_key(&non_empty_key(&key, "tag name")?), value),
        SearchCommand::Hostname { hostname } => ("hostname".to_string(), hostname),
    };
    let mut devices = ctx
        .inventory()
        .find_devices(&field, &value)
        .await
        .map_err(|err| CliError::client("search devices", &err))?;
    devices.sort_by(|a, b| a.serial_number.cmp(&b.serial_number));

    let mut resolver = Resolver::new(ctx.inventory());
    let products = products_for(&mut resolver, &devices).await?;
    let rows: Vec<DeviceRow<'_>> = devices.iter().map(|device| row(device, &products)).collect();
    render_devices(&rows, format)
}

fn non_empty_key(raw: &str, label: &str) -> CliResult<String> {
    let key = raw.trim();
    if key.is_empty() {
        return Err(CliError::validation(format!("{label} must not be empty")));
    }
    Ok(key.to_string())
}

/// Products of `devices`, one lookup per distinct id. A product that no
/// longer exists is left out and the device shows its raw id.
async fn products_for(
    resolver: &mut Resolver<'_, HttpResourceClient>,
    devices: &[Device],
) -> CliResult<HashMap<Uuid, HardwareProduct>> {
    let mut products = HashMap::new();
    for device in devices {
        let id = device.hardware_product_id;
        if products.contains_key(&id) {
            continue;
        }
        if let Some(product) = found_or_none(resolver.product_by_id(id).await)? {
            products.insert(id, product);
        }
    }
    Ok(products)
}

fn row<'a>(device: &'a Device, products: &'a HashMap<Uuid, HardwareProduct>) -> DeviceRow<'a> {
    DeviceRow {
        device,
        hardware_product: products.get(&device.hardware_product_id),
    }
}

pub(crate) async fn handle_settings(
    ctx: &AppContext,
    device: &str,
    format: OutputFormat,
) -> CliResult<()> {
    let settings = ctx
        .inventory()
        .device_settings(device)
        .await
        .map_err(|err| CliError::client("fetch device settings", &err))?;
    let (plain, _) = split_settings(settings);
    render_settings(&plain, format)
}

pub(crate) async fn handle_tags(
    ctx: &AppContext,
    device: &str,
    format: OutputFormat,
) -> CliResult<()> {
    let settings = ctx
        .inventory()
        .device_settings(device)
        .await
        .map_err(|err| CliError::client("fetch device settings", &err))?;
    let (_, tags) = split_settings(settings);
    render_settings(&tags, format)
}

pub(crate) async fn handle_setting(
    ctx: &AppContext,
    device: &str,
    args: SettingArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let key = args.key.trim();
    if key.is_empty() {
        return Err(CliError::validation("setting key must not be empty"));
    }
    apply(ctx, device, key, key, args.action, format).await
}

pub(crate) async fn handle_tag(
    ctx: &AppContext,
    device: &str,
    args: SettingArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let name = args.key.trim();
    if name.is_empty() {
        return Err(CliError::validation("tag name must not be empty"));
    }
    let key = tag_key(name);
    apply(ctx, device, &key, name, args.action, format).await
}

/// Run `action` against the setting stored under `key`; `label` is the name
/// shown to the user.
async fn apply(
    ctx: &AppContext,
    device: &str,
    key: &str,
    label: &str,
    action: SettingAction,
    format: OutputFormat,
) -> CliResult<()> {
    let inventory = ctx.inventory();
    match action {
        SettingAction::Get => {
            let value = inventory
                .device_setting(device, key)
                .await
                .map_err(|err| CliError::client("fetch device setting", &err))?
                .ok_or_else(|| {
                    CliError::validation(format!("'{label}' is not set on device {device}"))
                })?;
            render_setting(label, &value, format)
        }
        SettingAction::Set { value } => {
            inventory
                .set_device_setting(device, key, &value)
                .await
                .map_err(|err| CliError::client("update device setting", &err))?;
            info!(device, key, "device setting updated");
            Ok(())
        }
        SettingAction::Delete => {
            inventory
                .delete_device_setting(device, key)
                .await
                .map_err(|err| CliError::client("delete device setting", &err))?;
            info!(device, key, "device setting deleted");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests_support::{context, device_json, product_json};
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn tag_set_adds_prefix() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/device/HOST1/settings/tag.owner")
                .json_body(json!({"tag.owner": "ops"}));
            then.status(200);
        });

        let args = SettingArgs {
            key: "owner".into(),
            action: SettingAction::Set {
                value: "ops".into(),
            },
        };
        handle_tag(&context(&server), "HOST1", args, OutputFormat::Table)
            .await
            .expect("tag set should succeed");
        mock.assert();
    }

    #[tokio::test]
    async fn setting_get_reports_missing_keys() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/device/HOST1/settings/build.profile");
            then.status(200).json_body(json!({}));
        });

        let args = SettingArgs {
            key: "build.profile".into(),
            action: SettingAction::Get,
        };
        let err = handle_setting(&context(&server), "HOST1", args, OutputFormat::Table)
            .await
            .expect_err("missing key");
        assert_eq!(err.exit_code(), 2);
        assert_eq!(
            err.display_message(),
            "'build.profile' is not set on device HOST1"
        );
    }

    #[tokio::test]
    async fn tag_delete_issues_delete_with_prefixed_key() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(DELETE).path("/device/HOST1/settings/tag.owner");
            then.status(204);
        });

        let args = SettingArgs {
            key: "tag.owner".into(),
            action: SettingAction::Delete,
        };
        handle_tag(&context(&server), "HOST1", args, OutputFormat::Table)
            .await
            .expect("tag delete should succeed");
        mock.assert();
    }

    #[tokio::test]
    async fn unknown_device_is_a_validation_error() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/device/NOPE/settings");
            then.status(404).json_body(json!({"error": "device not found"}));
        });

        let err = handle_tags(&context(&server), "NOPE", OutputFormat::Json)
            .await
            .expect_err("unknown device");
        assert_eq!(err.exit_code(), 2);
        assert!(err.display_message().contains("device not found"));
    }

    #[tokio::test]
    async fn settings_listing_excludes_tags() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET).path("/device/HOST1/settings");
            then.status(200)
                .json_body(json!({"build.profile": "gpu", "tag.owner": "ops"}));
        });

        handle_settings(&context(&server), "HOST1", OutputFormat::Table)
            .await
            .expect("settings should render");
        mock.assert();
    }

    #[tokio::test]
    async fn device_get_accepts_serial_numbers() {
        let server = MockServer::start_async().await;
        let device = Uuid::new_v4();
        let product = Uuid::new_v4();
        let product_path = format!("/hardware_product/{product}");
        let get = server.mock(|when, then| {
            when.method(GET).path("/device/SN-1");
            then.status(200)
                .json_body(device_json(device, "SN-1", product, "production"));
        });
        let lookup = server.mock(|when, then| {
            when.method(GET).path(product_path.as_str());
            then.status(200).json_body(product_json(product, "Compute", "cmp"));
        });

        handle_device_get(&context(&server), "SN-1", OutputFormat::Table)
            .await
            .expect("device should render");
        get.assert();
        lookup.assert();
    }

    #[tokio::test]
    async fn phase_set_posts_then_reads_back() {
        let server = MockServer::start_async().await;
        let device = Uuid::new_v4();
        let set = server.mock(|when, then| {
            when.method(POST)
                .path("/device/HOST1/phase")
                .json_body(json!({"id": "HOST1", "phase": "decommissioned"}));
            then.status(204);
        });
        let get = server.mock(|when, then| {
            when.method(GET).path("/device/HOST1/phase");
            then.status(200)
                .json_body(json!({"id": device, "phase": "decommissioned"}));
        });

        handle_phase_set(
            &context(&server),
            "HOST1",
            DevicePhase::Decommissioned,
            OutputFormat::Json,
        )
        .await
        .expect("phase set should succeed");
        set.assert();
        get.assert();
    }

    #[tokio::test]
    async fn phase_get_of_unknown_device_is_a_validation_error() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/device/NOPE/phase");
            then.status(404).json_body(json!({"error": "device not found"}));
        });

        let err = handle_phase_get(&context(&server), "NOPE", OutputFormat::Table)
            .await
            .expect_err("unknown device");
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn tag_search_queries_prefixed_setting() {
        let server = MockServer::start_async().await;
        let product = Uuid::new_v4();
        let product_path = format!("/hardware_product/{product}");
        let search = server.mock(|when, then| {
            when.method(GET)
                .path("/device")
                .query_param("tag.owner", "ops");
            then.status(200).json_body(json!([
                device_json(Uuid::new_v4(), "SN-2", product, "production"),
                device_json(Uuid::new_v4(), "SN-1", product, "integration")
            ]));
        });
        let lookup = server.mock(|when, then| {
            when.method(GET).path(product_path.as_str());
            then.status(200).json_body(product_json(product, "Compute", "cmp"));
        });

        let query = SearchCommand::Tag {
            key: "owner".into(),
            value: "ops".into(),
        };
        handle_search(&context(&server), query, OutputFormat::Table)
            .await
            .expect("search should succeed");
        search.assert();
        lookup.assert_calls(1);
    }

    #[tokio::test]
    async fn setting_search_tolerates_missing_products() {
        let server = MockServer::start_async().await;
        let product = Uuid::new_v4();
        let product_path = format!("/hardware_product/{product}");
        let search = server.mock(|when, then| {
            when.method(GET)
                .path("/device")
                .query_param("build.profile", "gpu");
            then.status(200).json_body(json!([device_json(
                Uuid::new_v4(),
                "SN-1",
                product,
                "production"
            )]));
        });
        server.mock(|when, then| {
            when.method(GET).path(product_path.as_str());
            then.status(404).json_body(json!({"error": "not found"}));
        });

        let query = SearchCommand::Setting {
            key: "build.profile".into(),
            value: "gpu".into(),
        };
        handle_search(&context(&server), query, OutputFormat::Json)
            .await
            .expect("a missing product only blanks the label");
        search.assert();
    }

    #[tokio::test]
    async fn hostname_search_propagates_server_errors() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET)
                .path("/device")
                .query_param("hostname", "host1");
            then.status(502);
        });

        let query = SearchCommand::Hostname {
            hostname: "host1".into(),
        };
        let err = handle_search(&context(&server), query, OutputFormat::Table)
            .await
            .expect_err("bad gateway");
        assert_eq!(err.exit_code(), 3);
        assert!(err.display_message().starts_with("search devices failed"));
    }

    #[tokio::test]
    async fn empty_search_key_fails_before_any_request() {
        let server = MockServer::start_async().await;
        let any = server.mock(|_when, then| {
            then.status(500);
        });

        let query = SearchCommand::Setting {
            key: " ".into(),
            value: "gpu".into(),
        };
        let err = handle_search(&context(&server), query, OutputFormat::Table)
            .await
            .expect_err("empty key");
        assert_eq!(err.exit_code(), 2);
        any.assert_calls(0);
    }
}
