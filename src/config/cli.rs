use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the shapemask binary.
#[derive(Debug, Parser)]
#[command(name = "shapemask", version, about = "Shape mask render service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "SHAPEMASK_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP render service.
    Serve(Box<ServeArgs>),
    /// Render a single mask and write it to a file.
    Render(Box<RenderArgs>),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct UpstreamOverrides {
    /// Override the access service base URL.
    #[arg(long = "upstream-access-url", value_name = "URL")]
    pub access_url: Option<String>,

    /// Override the render service base URL.
    #[arg(long = "upstream-render-url", value_name = "URL")]
    pub render_url: Option<String>,

    /// Override the upstream request timeout.
    #[arg(long = "upstream-timeout-seconds", value_name = "SECONDS")]
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub upstream: UpstreamOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Toggle the mask cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,

    /// Override the number of cached masks.
    #[arg(long = "cache-capacity", value_name = "COUNT")]
    pub cache_capacity: Option<u64>,

    /// Override how a denied access check is handled (veto|defer).
    #[arg(long = "access-policy", value_name = "POLICY")]
    pub access_policy: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub upstream: UpstreamOverrides,

    /// Shape to render.
    #[arg(value_name = "SHAPE_ID")]
    pub shape_id: String,

    /// Explicit mask color (RRGGBB or RRGGBBAA).
    #[arg(long, value_name = "HEX")]
    pub color: Option<String>,

    /// Mirror the mask horizontally.
    #[arg(long = "flip-h", action = clap::ArgAction::SetTrue)]
    pub flip_horizontal: bool,

    /// Mirror the mask vertically.
    #[arg(long = "flip-v", action = clap::ArgAction::SetTrue)]
    pub flip_vertical: bool,

    /// Session key presented to the access check.
    #[arg(
        long = "session-key",
        env = "SHAPEMASK_SESSION_KEY",
        value_name = "KEY",
        hide_env_values = true
    )]
    pub session_key: String,

    /// Override how a denied access check is handled (veto|defer).
    #[arg(long = "access-policy", value_name = "POLICY")]
    pub access_policy: Option<String>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Where to write the rendered mask.
    #[arg(
        short,
        long,
        value_name = "FILE",
        value_hint = ValueHint::FilePath,
        default_value = "mask.png"
    )]
    pub output: PathBuf,
}
