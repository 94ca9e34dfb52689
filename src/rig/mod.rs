//! Remote shell driver for the device under test
//!
//! A rig is reached through a [`Transport`] and driven line by line through
//! [`RigShell`]. [`launch_app`] starts the vendor CLI on it.

pub mod shell;
pub mod transport;

use std::fmt;

pub use shell::{PromptSettings, RigShell};
pub use transport::Transport;

use crate::common::Result;

/// Switch family behind an xp type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    Ac3xfs,
    Aldrin2xlfl,
    Falcon,
}

impl DeviceType {
    /// Map the `xp_type` argument to a device
    pub fn from_xp_type(xp_type: &str) -> Self {
        match xp_type {
            "esal-fs" => DeviceType::Ac3xfs,
            "esal-fl" => DeviceType::Aldrin2xlfl,
            _ => DeviceType::Falcon,
        }
    }

    /// Whether the device runs the ESAL application rather than the SAI one
    pub fn runs_esal_app(self) -> bool {
        !matches!(self, DeviceType::Falcon)
    }

    /// Falcon reports one port more than is usable
    pub fn usable_ports(self, reported: u32) -> u32 {
        match self {
            DeviceType::Falcon => reported.saturating_sub(1),
            _ => reported,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeviceType::Ac3xfs => "AC3XFS",
            DeviceType::Aldrin2xlfl => "ALDRIN2XLFL",
            DeviceType::Falcon => "Falcon",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Start the vendor application on the rig and switch to its prompt
pub async fn launch_app(
    shell: &mut RigShell,
    device: DeviceType,
    xdk_path: &str,
    app_prompt: &str,
) -> Result<String> {
    shell.cmd(&format!("cd {}", xdk_path)).await?;
    shell.set_prompt(app_prompt)?;

    let command = if device.runs_esal_app() {
        "./esalApp"
    } else {
        tracing::warn!("Falcon Device is not supported");
        "./dist/xpSaiApp -g FALCON128 -u"
    };

    tracing::info!("Launching {} on {}", command, device);
    shell.cmd_settled(command).await
}
