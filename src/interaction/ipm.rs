//! The Infini Package Manager (IPM): chat commands that manage which
//! rule-packages are mounted into the core.
//!
//! ```text
//! .ipm                   show the version banner
//! .ipm hmr               hot-reload the core
//! .ipm add <package>     mount a package
//! .ipm remove <package>  unmount a package
//! .ipm clear             unmount every package
//! .ipm show              list mounted packages
//! ```
//!
//! The mounted list never holds duplicates, and `remove` reloads the core just
//! like `add` and `clear` do.

use clap::{Parser, Subcommand};
use tracing::{Instrument, error, info, instrument, warn};

use crate::{
    base::{
        messages,
        types::{ChatEvent, Res, Void},
    },
    runtime::Runtime,
    service::{
        engine::{CoreClient, ReloadReport},
        status::StatusClient,
    },
};

/// Arguments following the IPM prefix.
#[derive(Parser, Debug)]
#[command(name = "ipm", no_binary_name = true, disable_version_flag = true, about = "Infini Package Manager: manage the rule packages mounted into the core.")]
pub struct IpmArgs {
    #[command(subcommand)]
    pub command: Option<IpmCommand>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum IpmCommand {
    /// Hot-reload the core from the mounted packages.
    Hmr,
    /// Mount a rule package.
    Add { package: String },
    /// Unmount a rule package.
    Remove { package: String },
    /// Unmount every rule package.
    Clear,
    /// List the mounted rule packages.
    Show,
}

/// Parse an IPM message.
///
/// On failure (including `help`), the error holds the text to reply with.
pub fn parse_ipm(text: &str, prefix: &str) -> Result<Option<IpmCommand>, String> {
    let args = text.trim_start().strip_prefix(prefix).unwrap_or(text);

    IpmArgs::try_parse_from(args.split_whitespace()).map(|a| a.command).map_err(|e| e.render().to_string())
}

fn with_failures(reply: String, report: &ReloadReport) -> String {
    if report.failed.is_empty() {
        reply
    } else {
        reply + &messages::load_failures(&report.failed)
    }
}

/// Run an IPM command, returning the reply.
#[instrument(skip(status, core))]
pub async fn execute(command: Option<IpmCommand>, prefix: &str, status: &StatusClient, core: &CoreClient) -> Res<String> {
    let Some(command) = command else {
        return Ok(messages::banner(prefix));
    };

    match command {
        IpmCommand::Hmr => {
            let report = core.hot_reload(status).await?;

            Ok(with_failures(messages::HOT_RELOAD_COMPLETE.to_string(), &report))
        }
        IpmCommand::Add { package } => {
            let report = core
                .update_packages(status, |packages| {
                    if packages.contains(&package) {
                        return false;
                    }

                    packages.push(package.clone());
                    true
                })
                .await?;

            match report {
                Some(report) => Ok(with_failures(messages::package_mounted(&package), &report)),
                None => Ok(messages::package_already_mounted(&package)),
            }
        }
        IpmCommand::Clear => {
            core.update_packages(status, |packages| {
                packages.clear();
                true
            })
            .await?;

            Ok(messages::PACKAGES_CLEARED.to_string())
        }
        IpmCommand::Show => {
            let packages = status.packages().await?;

            Ok(messages::packages_shown(&packages))
        }
        IpmCommand::Remove { package } => {
            let report = core
                .update_packages(status, |packages| {
                    let Some(position) = packages.iter().position(|p| *p == package) else {
                        return false;
                    };

                    packages.remove(position);
                    true
                })
                .await?;

            match report {
                Some(report) => Ok(with_failures(messages::package_unmounted(&package), &report)),
                None => Ok(messages::package_not_mounted(&package)),
            }
        }
    }
}

/// Handles an IPM message in the background.
#[instrument(skip_all)]
pub fn handle_ipm_command(event: ChatEvent, runtime: Runtime) {
    tokio::spawn(
        async move {
            let result = process_ipm_command(event, &runtime).await;

            if let Err(err) = &result {
                error!("Error while handling: {}", err);
            }
        }
        .in_current_span(),
    );
}

/// Check permissions, run the command, and reply.
#[instrument(skip_all, fields(user = %event.user_id))]
pub async fn process_ipm_command(event: ChatEvent, runtime: &Runtime) -> Void {
    let config = &runtime.config;

    if !config.admin_users.is_empty() && !config.admin_users.contains(&event.user_id) {
        warn!("User `{}` may not manage rule packages.", event.user_id);
        return runtime.chat.send_message(&event.target, messages::PERMISSION_DENIED).await;
    }

    let reply = match parse_ipm(&event.plain_text, &config.ipm_prefix) {
        Ok(command) => {
            info!("Running IPM command {:?} ...", command);
            execute(command, &config.ipm_prefix, &runtime.status, &runtime.core).await?
        }
        Err(usage) => usage,
    };

    runtime.chat.send_message(&event.target, &reply).await
}

// Tests.
