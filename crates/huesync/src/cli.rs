//! Clap derive structures for the `huesync` CLI.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// huesync -- inspect and drive a Hue-style lighting bridge
#[derive(Debug, Parser)]
#[command(
    name = "huesync",
    version,
    about = "Inspect and control a lighting bridge from the command line",
    long_about = "Mirrors the bridge's resource graph (devices, rooms, zones, scenes and\n\
        their services) and issues changes through the current resource API,\n\
        falling back to the legacy API where only it offers a feature.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Bridge profile to use
    #[arg(long, short = 'p', env = "HUESYNC_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Bridge address (overrides profile)
    #[arg(long, short = 'b', env = "HUESYNC_BRIDGE", global = true)]
    pub bridge: Option<String>,

    /// Application key
    #[arg(long, env = "HUESYNC_APP_KEY", global = true, hide_env = true)]
    pub app_key: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "HUESYNC_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept the bridge's self-signed certificate
    #[arg(long, short = 'k', env = "HUESYNC_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, env = "HUESYNC_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List resources in the bridge's graph
    #[command(alias = "ls")]
    List(ListArgs),

    /// Show one resource in detail
    Show(ShowArgs),

    /// Follow the event stream and print notifications
    Watch(WatchArgs),

    /// Control lights, rooms, zones and light devices
    #[command(alias = "l")]
    Light(LightArgs),

    /// Manage and recall scenes
    #[command(alias = "sc")]
    Scene(SceneArgs),

    /// Manage configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  LIST / SHOW
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Only resources of this type (e.g. light, room, scene)
    #[arg(long = "type", short = 't')]
    pub rtype: Option<String>,

    /// Only resources owned by or contained in this resource
    #[arg(long)]
    pub within: Option<String>,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Resource as `type/id`, or a name
    pub resource: String,

    /// Include the raw resource document
    #[arg(long)]
    pub raw: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  WATCH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Only notifications about this resource (`type/id` or name)
    #[arg(long, conflicts_with_all = ["rtype", "lifecycle", "connection"])]
    pub resource: Option<String>,

    /// Only notifications about resources of this type
    #[arg(long = "type", short = 't', conflicts_with_all = ["lifecycle", "connection"])]
    pub rtype: Option<String>,

    /// Only created / deleted notifications
    #[arg(long)]
    pub lifecycle: bool,

    /// Only connection state notifications
    #[arg(long, conflicts_with = "lifecycle")]
    pub connection: bool,

    /// Include event start/end markers
    #[arg(long)]
    pub markers: bool,

    /// Stop after this many notifications
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  LIGHT
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct LightArgs {
    #[command(subcommand)]
    pub command: LightCommand,
}

#[derive(Debug, Subcommand)]
pub enum LightCommand {
    /// Turn on
    On {
        /// Light, device, room or zone (`type/id` or name)
        target: String,
    },

    /// Turn off
    Off {
        /// Light, device, room or zone (`type/id` or name)
        target: String,
    },

    /// Change several attributes in one request
    Set {
        /// Light, device, room or zone (`type/id` or name)
        target: String,

        /// Power state
        #[arg(long)]
        on: Option<bool>,

        /// Brightness in percent (0-100)
        #[arg(long, short = 'B')]
        brightness: Option<f64>,

        /// Color temperature in mirek
        #[arg(long, short = 'm')]
        mirek: Option<u16>,

        /// CIE xy color as `x,y`
        #[arg(long, value_parser = parse_xy)]
        xy: Option<(f64, f64)>,
    },

    /// Flash the light (legacy alert effect)
    Alert {
        /// Light, room or zone (`type/id` or name)
        target: String,

        /// select (one cycle), lselect (15 s), none (stop)
        #[arg(long, default_value = "select")]
        mode: String,
    },

    /// Rename
    Rename {
        /// Resource (`type/id` or name)
        target: String,
        name: String,
    },
}

fn parse_xy(raw: &str) -> Result<(f64, f64), String> {
    let (x, y) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected `x,y`, got {raw:?}"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<f64>()
            .map_err(|e| format!("{v:?}: {e}"))
    };
    Ok((parse(x)?, parse(y)?))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SCENE
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct SceneArgs {
    #[command(subcommand)]
    pub command: SceneCommand,
}

#[derive(Debug, Subcommand)]
pub enum SceneCommand {
    /// List scenes, optionally for one room or zone
    List {
        /// Room or zone (`type/id` or name)
        #[arg(long, short = 'g')]
        group: Option<String>,
    },

    /// Recall a scene
    Recall {
        /// Scene (`type/id` or name)
        scene: String,
    },

    /// Create a scene from the group's current light states
    Create {
        /// Room or zone (`type/id` or name)
        group: String,

        /// Scene name
        name: String,
    },

    /// Delete a scene
    Delete {
        /// Scene (`type/id` or name)
        scene: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create a profile with guided setup
    Init,

    /// Display the configuration with secrets masked
    Show,

    /// Print the config file path
    Path,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store an application key in the system keyring
    SetKey {
        /// Profile name
        #[arg(long)]
        profile: Option<String>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn xy_pairs_parse() {
        assert_eq!(parse_xy("0.3, 0.4"), Ok((0.3, 0.4)));
        assert!(parse_xy("0.3").is_err());
        assert!(parse_xy("a,b").is_err());
    }

    #[test]
    fn command_tree_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
