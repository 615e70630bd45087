//! Command dispatch: CLI args -> bridge operations -> output formatting.

pub mod config_cmd;
pub mod lights;
pub mod resources;
pub mod scenes;
pub mod util;
pub mod watch;

use huesync_core::Bridge;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a bridge-bound command. `watch` manages its own connection;
/// everything else loads the snapshot first and closes afterwards.
pub async fn dispatch(cmd: Command, bridge: &Bridge, global: &GlobalOpts) -> Result<(), CliError> {
    if let Command::Watch(args) = cmd {
        return watch::handle(bridge, args, global).await;
    }

    util::connect(bridge, global).await?;
    let result = match cmd {
        Command::List(args) => resources::list(bridge, &args, global),
        Command::Show(args) => resources::show(bridge, &args, global),
        Command::Light(args) => lights::handle(bridge, args, global).await,
        Command::Scene(args) => scenes::handle(bridge, args, global).await,
        Command::Watch(_) | Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "command dispatched to the bridge by mistake".into(),
        )),
    };
    bridge.close().await;
    result
}
