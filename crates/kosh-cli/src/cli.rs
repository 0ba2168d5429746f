//! Argument parsing and command dispatch for the kosh CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use kosh_api_models::DevicePhase;
use kosh_telemetry::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, command_span, init_logging};
use reqwest::Url;
use tracing::Instrument;
use uuid::Uuid;

use crate::client::{AppContext, CliDependencies, CliResult, HttpResourceClient, parse_url};
use crate::commands::assignments::{handle_assign, handle_assignments_get};
use crate::commands::devices::{
    handle_device_get, handle_phase_get, handle_phase_set, handle_search, handle_setting,
    handle_settings, handle_tag, handle_tags,
};
use crate::commands::layout::{handle_layout_export, handle_layout_get, handle_layout_import};
use crate::commands::products::handle_product_get;
use crate::commands::racks::{
    handle_rack_create, handle_rack_delete, handle_rack_get, handle_rack_list, handle_rack_update,
};

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_API_URL: &str = "http://127.0.0.1:5000";

/// Parses CLI arguments, executes the requested command, and reports
/// failures on stderr. Returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();

    let logging = LoggingConfig {
        level: &cli.log_level,
        format: cli.log_format.into(),
        build_sha: option_env!("KOSH_BUILD_SHA").unwrap_or("dev"),
    };
    if let Err(err) = init_logging(&logging) {
        eprintln!("warning: {err:#}");
    }

    let request_id = Uuid::new_v4().to_string();
    let deps = match CliDependencies::from_env(&cli, &request_id) {
        Ok(deps) => deps,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            return err.exit_code();
        }
    };

    let span = command_span(command_label(&cli.command), &request_id);
    match dispatch(cli, &deps).instrument(span).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

async fn dispatch(cli: Cli, deps: &CliDependencies) -> CliResult<()> {
    let ctx = AppContext::new(HttpResourceClient::new(deps.client.clone(), cli.url));
    let output = if cli.json { OutputFormat::Json } else { cli.output };

    match cli.command {
        Command::Racks(racks) => match racks {
            RacksCommand::Get => handle_rack_list(&ctx, output).await,
            RacksCommand::Create(args) => handle_rack_create(&ctx, args, output).await,
        },
        Command::Rack(rack) => {
            let id = rack.id;
            match rack.command {
                RackCommand::Get => handle_rack_get(&ctx, &id, output).await,
                RackCommand::Update(args) => handle_rack_update(&ctx, &id, args, output).await,
                RackCommand::Delete => handle_rack_delete(&ctx, &id, output).await,
                RackCommand::Layout(layout) => match layout {
                    LayoutCommand::Get => handle_layout_get(&ctx, &id, output).await,
                    LayoutCommand::Export => handle_layout_export(&ctx, &id).await,
                    LayoutCommand::Import(args) => {
                        handle_layout_import(&ctx, &id, args, output).await
                    }
                },
                RackCommand::Assignments => handle_assignments_get(&ctx, &id, output).await,
                RackCommand::Assign(args) => handle_assign(&ctx, &id, args, output).await,
            }
        }
        Command::Devices(DevicesCommand::Search(search)) => {
            handle_search(&ctx, search, output).await
        }
        Command::Device(device) => {
            let id = device.id;
            match device.command {
                DeviceCommand::Get => handle_device_get(&ctx, &id, output).await,
                DeviceCommand::Phase(PhaseCommand::Get) => {
                    handle_phase_get(&ctx, &id, output).await
                }
                DeviceCommand::Phase(PhaseCommand::Set { phase }) => {
                    handle_phase_set(&ctx, &id, phase.into(), output).await
                }
                DeviceCommand::Settings => handle_settings(&ctx, &id, output).await,
                DeviceCommand::Tags => handle_tags(&ctx, &id, output).await,
                DeviceCommand::Setting(args) => handle_setting(&ctx, &id, args, output).await,
                DeviceCommand::Tag(args) => handle_tag(&ctx, &id, args, output).await,
            }
        }
        Command::Product(product) => match product.command {
            ProductCommand::Get => handle_product_get(&ctx, &product.key, output).await,
        },
    }
}

#[derive(Parser)]
#[command(
    name = "kosh",
    version,
    about = "Command-line client for the Conch datacenter inventory service"
)]
pub(crate) struct Cli {
    #[arg(
        long,
        global = true,
        env = "KOSH_URL",
        value_parser = parse_url,
        default_value = DEFAULT_API_URL
    )]
    pub(crate) url: Url,
    #[arg(long, global = true, env = "KOSH_TOKEN", hide_env_values = true)]
    pub(crate) token: Option<String>,
    #[arg(
        long,
        global = true,
        env = "KOSH_HTTP_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS
    )]
    pub(crate) timeout: u64,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    pub(crate) output: OutputFormat,
    #[arg(long, global = true, help = "Shorthand for --output json")]
    pub(crate) json: bool,
    #[arg(
        long,
        global = true,
        env = "KOSH_LOG_LEVEL",
        default_value = DEFAULT_LOG_LEVEL
    )]
    pub(crate) log_level: String,
    #[arg(
        long,
        global = true,
        env = "KOSH_LOG_FORMAT",
        value_enum,
        default_value_t = LogFormatArg::Pretty
    )]
    pub(crate) log_format: LogFormatArg,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Operate on the collection of racks.
    #[command(subcommand)]
    Racks(RacksCommand),
    /// Operate on one rack, addressed by id, id prefix, or name.
    Rack(RackArgs),
    /// Search across devices.
    #[command(subcommand)]
    Devices(DevicesCommand),
    /// Operate on one device, addressed by id or serial number.
    Device(DeviceArgs),
    /// Look up a hardware product by id, name, alias, or id prefix.
    Product(ProductArgs),
}

#[derive(Subcommand)]
pub(crate) enum RacksCommand {
    /// List every rack.
    Get,
    /// Create a rack.
    Create(RackCreateArgs),
}

#[derive(Args, Debug, Clone)]
pub(crate) struct RackCreateArgs {
    #[arg(long)]
    pub(crate) name: String,
    /// Room alias or id.
    #[arg(long)]
    pub(crate) room: String,
    /// Rack role name or id.
    #[arg(long)]
    pub(crate) role: String,
    #[arg(long)]
    pub(crate) phase: Option<String>,
}

#[derive(Args)]
pub(crate) struct RackArgs {
    pub(crate) id: String,
    #[command(subcommand)]
    pub(crate) command: RackCommand,
}

#[derive(Subcommand)]
pub(crate) enum RackCommand {
    /// Show the rack.
    Get,
    /// Change rack attributes.
    Update(RackUpdateArgs),
    /// Delete the rack.
    Delete,
    /// Inspect or replace the rack layout.
    #[command(subcommand)]
    Layout(LayoutCommand),
    /// List device assignments.
    Assignments,
    /// Assign devices to rack units from a JSON document.
    Assign(InputArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub(crate) struct RackUpdateArgs {
    #[arg(long)]
    pub(crate) name: Option<String>,
    /// Room alias or id.
    #[arg(long)]
    pub(crate) room: Option<String>,
    /// Rack role name or id.
    #[arg(long)]
    pub(crate) role: Option<String>,
    #[arg(long)]
    pub(crate) phase: Option<String>,
    #[arg(long, conflicts_with = "clear_serial_number")]
    pub(crate) serial_number: Option<String>,
    #[arg(long)]
    pub(crate) clear_serial_number: bool,
    #[arg(long, conflicts_with = "clear_asset_tag")]
    pub(crate) asset_tag: Option<String>,
    #[arg(long)]
    pub(crate) clear_asset_tag: bool,
}

#[derive(Subcommand)]
pub(crate) enum LayoutCommand {
    /// Show the layout.
    Get,
    /// Write the layout as an importable JSON document.
    Export,
    /// Replace the layout with the contents of a JSON document.
    Import(LayoutImportArgs),
}

#[derive(Args, Debug, Clone)]
pub(crate) struct InputArgs {
    /// Path to the JSON document, or `-` for stdin.
    #[arg(default_value = "-")]
    pub(crate) file: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct LayoutImportArgs {
    /// Path to the JSON document, or `-` for stdin.
    #[arg(default_value = "-")]
    pub(crate) file: PathBuf,
    /// Replace an existing layout instead of refusing.
    #[arg(long)]
    pub(crate) overwrite: bool,
}

#[derive(Args)]
pub(crate) struct DeviceArgs {
    pub(crate) id: String,
    #[command(subcommand)]
    pub(crate) command: DeviceCommand,
}

#[derive(Subcommand)]
pub(crate) enum DevicesCommand {
    /// Find devices by an exact setting, tag, or hostname match.
    #[command(subcommand)]
    Search(SearchCommand),
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum SearchCommand {
    /// Match a setting value.
    Setting { key: String, value: String },
    /// Match a tag value.
    Tag { key: String, value: String },
    /// Match a hostname.
    Hostname { hostname: String },
}

#[derive(Subcommand)]
pub(crate) enum DeviceCommand {
    /// Show the device.
    Get,
    /// Read or change the lifecycle phase.
    #[command(subcommand)]
    Phase(PhaseCommand),
    /// List settings, excluding tags.
    Settings,
    /// List tags.
    Tags,
    /// Read or change one setting.
    Setting(SettingArgs),
    /// Read or change one tag.
    Tag(SettingArgs),
}

#[derive(Args, Debug, Clone)]
pub(crate) struct SettingArgs {
    pub(crate) key: String,
    #[command(subcommand)]
    pub(crate) action: SettingAction,
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum SettingAction {
    Get,
    Set { value: String },
    Delete,
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum PhaseCommand {
    Get,
    Set {
        #[arg(value_enum)]
        phase: PhaseArg,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum PhaseArg {
    Integration,
    Installation,
    Production,
    Diagnostics,
    Decommissioned,
}

impl From<PhaseArg> for DevicePhase {
    fn from(value: PhaseArg) -> Self {
        match value {
            PhaseArg::Integration => Self::Integration,
            PhaseArg::Installation => Self::Installation,
            PhaseArg::Production => Self::Production,
            PhaseArg::Diagnostics => Self::Diagnostics,
            PhaseArg::Decommissioned => Self::Decommissioned,
        }
    }
}

#[derive(Args)]
pub(crate) struct ProductArgs {
    pub(crate) key: String,
    #[command(subcommand)]
    pub(crate) command: ProductCommand,
}

#[derive(Subcommand)]
pub(crate) enum ProductCommand {
    /// Show the product.
    Get,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum LogFormatArg {
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Pretty => Self::Pretty,
            LogFormatArg::Json => Self::Json,
        }
    }
}

pub(crate) const fn command_label(command: &Command) -> &'static str {
    match command {
        Command::Racks(RacksCommand::Get) => "racks_get",
        Command::Racks(RacksCommand::Create(_)) => "racks_create",
        Command::Rack(rack) => match &rack.command {
            RackCommand::Get => "rack_get",
            RackCommand::Update(_) => "rack_update",
            RackCommand::Delete => "rack_delete",
            RackCommand::Layout(LayoutCommand::Get) => "rack_layout_get",
            RackCommand::Layout(LayoutCommand::Export) => "rack_layout_export",
            RackCommand::Layout(LayoutCommand::Import(_)) => "rack_layout_import",
            RackCommand::Assignments => "rack_assignments",
            RackCommand::Assign(_) => "rack_assign",
        },
        Command::Devices(DevicesCommand::Search(search)) => match search {
            SearchCommand::Setting { .. } => "devices_search_setting",
            SearchCommand::Tag { .. } => "devices_search_tag",
            SearchCommand::Hostname { .. } => "devices_search_hostname",
        },
        Command::Device(device) => match &device.command {
            DeviceCommand::Get => "device_get",
            DeviceCommand::Phase(PhaseCommand::Get) => "device_phase_get",
            DeviceCommand::Phase(PhaseCommand::Set { .. }) => "device_phase_set",
            DeviceCommand::Settings => "device_settings",
            DeviceCommand::Tags => "device_tags",
            DeviceCommand::Setting(_) => "device_setting",
            DeviceCommand::Tag(_) => "device_tag",
        },
        Command::Product(_) => "product_get",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("arguments should parse")
    }

    #[test]
    fn layout_import_defaults_to_stdin_without_overwrite() {
        let cli = parse(&["kosh", "rack", "A01", "layout", "import"]);
        let Command::Rack(rack) = cli.command else {
            panic!("expected rack command");
        };
        assert_eq!(rack.id, "A01");
        match rack.command {
            RackCommand::Layout(LayoutCommand::Import(args)) => {
                assert_eq!(args.file, PathBuf::from("-"));
                assert!(!args.overwrite);
            }
            _ => panic!("expected layout import"),
        }
    }

    #[test]
    fn global_flags_are_accepted_after_subcommands() {
        let cli = parse(&[
            "kosh",
            "rack",
            "c0ffee",
            "layout",
            "import",
            "layout.json",
            "--overwrite",
            "--json",
            "--url",
            "https://conch.example.com/api",
        ]);
        assert!(cli.json);
        assert_eq!(cli.url.as_str(), "https://conch.example.com/api");
        assert_eq!(command_label(&cli.command), "rack_layout_import");
    }

    #[test]
    fn format_alias_selects_output() {
        let cli = parse(&["kosh", "--format", "json", "racks", "get"]);
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(command_label(&cli.command), "racks_get");
    }

    #[test]
    fn serial_number_and_clear_conflict() {
        let result = Cli::try_parse_from([
            "kosh",
            "rack",
            "A01",
            "update",
            "--serial-number",
            "SN1",
            "--clear-serial-number",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn setting_actions_parse() {
        let cli = parse(&["kosh", "device", "HOST1", "tag", "owner", "set", "ops"]);
        let Command::Device(device) = cli.command else {
            panic!("expected device command");
        };
        match device.command {
            DeviceCommand::Tag(args) => {
                assert_eq!(args.key, "owner");
                assert!(matches!(args.action, SettingAction::Set { ref value } if value == "ops"));
            }
            _ => panic!("expected tag command"),
        }
    }

    #[test]
    fn phase_set_accepts_only_known_phases() {
        let cli = parse(&["kosh", "device", "HOST1", "phase", "set", "production"]);
        assert_eq!(command_label(&cli.command), "device_phase_set");
        let Command::Device(device) = cli.command else {
            panic!("expected device command");
        };
        match device.command {
            DeviceCommand::Phase(PhaseCommand::Set { phase }) => {
                assert_eq!(DevicePhase::from(phase), DevicePhase::Production);
            }
            _ => panic!("expected phase set"),
        }

        let result = Cli::try_parse_from(["kosh", "device", "HOST1", "phase", "set", "retired"]);
        assert!(result.is_err());
    }

    #[test]
    fn every_phase_has_an_argument() {
        let names: Vec<String> = PhaseArg::value_variants()
            .iter()
            .filter_map(|arg| arg.to_possible_value())
            .map(|value| value.get_name().to_string())
            .collect();
        let phases: Vec<&str> = DevicePhase::ALL.iter().map(|phase| phase.as_str()).collect();
        assert_eq!(names, phases);
    }

    #[test]
    fn device_search_parses_key_and_value() {
        let cli = parse(&["kosh", "devices", "search", "tag", "owner", "ops"]);
        assert_eq!(command_label(&cli.command), "devices_search_tag");
        let Command::Devices(DevicesCommand::Search(SearchCommand::Tag { key, value })) =
            cli.command
        else {
            panic!("expected tag search");
        };
        assert_eq!(key, "owner");
        assert_eq!(value, "ops");
    }

    #[test]
    fn invalid_url_is_rejected() {
        assert!(Cli::try_parse_from(["kosh", "--url", "nope", "racks", "get"]).is_err());
    }

    #[test]
    fn log_format_maps_onto_telemetry() {
        assert_eq!(LogFormat::from(LogFormatArg::Json), LogFormat::Json);
        assert_eq!(LogFormat::from(LogFormatArg::Pretty), LogFormat::Pretty);
    }
}
