//! Reply texts used by the package manager.

/// Version of the package manager itself.
pub const IPM_VERSION: &str = "1.0.0-beta.1";

/// Reply after a hot reload.
pub const HOT_RELOAD_COMPLETE: &str = "Infini hot reload complete";

/// Reply after the mounted package list has been emptied.
pub const PACKAGES_CLEARED: &str = "Mounted rule packages cleared";

/// Reply to a user who may not manage packages.
pub const PERMISSION_DENIED: &str = "You are not allowed to manage rule packages.";

/// Banner shown when the package manager is called without a command.
pub fn banner(prefix: &str) -> String {
    format!(
        "Infini Package Manager version {IPM_VERSION} [IPM for infini-bot v{}]\nWelcome to IPM, use `{prefix} help` to see how to use it.",
        env!("CARGO_PKG_VERSION")
    )
}

pub fn package_mounted(package: &str) -> String {
    format!("Rule package [{package}] mounted")
}

pub fn package_already_mounted(package: &str) -> String {
    format!("Rule package [{package}] is already mounted")
}

pub fn package_unmounted(package: &str) -> String {
    format!("Rule package [{package}] unmounted")
}

pub fn package_not_mounted(package: &str) -> String {
    format!("Rule package [{package}] is not mounted")
}

pub fn packages_shown(packages: &[String]) -> String {
    format!("Mounted rule packages: {packages:?}")
}

/// Suffix appended to a reply when some packages failed to load.
pub fn load_failures(failed: &[String]) -> String {
    format!("\nFailed to load: {failed:?}")
}
