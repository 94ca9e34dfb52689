//! How a rig session is reached
//!
//! The production rig is an SSH host. Tests and bench setups without SSH
//! run a local program that speaks the same line protocol.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;

use crate::common::{Error, Result};

/// Session transport
#[derive(Debug, Clone)]
pub enum Transport {
    /// Interactive SSH session through the system client
    Ssh {
        host: String,
        user: String,
        password: Option<String>,
        ssh: String,
        connect_timeout_secs: u64,
    },
    /// Local program whose stdin/stdout act as the terminal
    Local {
        program: PathBuf,
        args: Vec<String>,
        env: Vec<(String, String)>,
    },
}

impl Transport {
    /// Build the child process command for this transport
    pub fn command(&self) -> Result<Command> {
        let mut cmd = match self {
            Transport::Ssh {
                host,
                user,
                password,
                ssh,
                connect_timeout_secs,
            } => {
                let ssh_path = which::which(ssh).map_err(|e| {
                    Error::SessionStartFailed(format!("SSH client '{}' not found: {}", ssh, e))
                })?;

                let ssh_args = ssh_args(host, user, *connect_timeout_secs);

                match password.as_deref().filter(|p| !p.is_empty()) {
                    Some(password) => {
                        let sshpass = which::which("sshpass").map_err(|_| {
                            Error::SessionStartFailed(
                                "A password was given but 'sshpass' is not installed. \
                                 Install it or use key authentication"
                                    .to_string(),
                            )
                        })?;
                        let mut cmd = Command::new(sshpass);
                        cmd.arg("-e").env("SSHPASS", password).arg(ssh_path).args(ssh_args);
                        cmd
                    }
                    None => {
                        let mut cmd = Command::new(ssh_path);
                        cmd.args(ssh_args);
                        cmd
                    }
                }
            }
            Transport::Local { program, args, env } => {
                let mut cmd = Command::new(program);
                cmd.args(args);
                for (key, value) in env {
                    cmd.env(key, value);
                }
                cmd
            }
        };

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        Ok(cmd)
    }

    /// Human-readable session target for logs
    pub fn describe(&self) -> String {
        match self {
            Transport::Ssh { host, user, .. } => format!("{}@{}", user, host),
            Transport::Local { program, .. } => program.display().to_string(),
        }
    }
}

fn ssh_args(host: &str, user: &str, connect_timeout_secs: u64) -> Vec<String> {
    vec![
        // forced TTY so the remote side prints prompts and echoes input
        "-tt".to_string(),
        "-o".to_string(),
        "StrictHostKeyChecking=no".to_string(),
        "-o".to_string(),
        "UserKnownHostsFile=/dev/null".to_string(),
        "-o".to_string(),
        format!("ConnectTimeout={}", connect_timeout_secs),
        "-l".to_string(),
        user.to_string(),
        host.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssh_args() {
        let args = ssh_args("10.0.0.5", "root", 30);
        assert_eq!(args[0], "-tt");
        assert!(args.contains(&"ConnectTimeout=30".to_string()));
        assert_eq!(&args[args.len() - 3..], &["-l", "root", "10.0.0.5"]);
    }

    #[test]
    fn test_describe() {
        let ssh = Transport::Ssh {
            host: "rig1".to_string(),
            user: "admin".to_string(),
            password: None,
            ssh: "ssh".to_string(),
            connect_timeout_secs: 5,
        };
        assert_eq!(ssh.describe(), "admin@rig1");
    }

    #[test]
    fn test_local_command_builds() {
        let local = Transport::Local {
            program: PathBuf::from("/bin/cat"),
            args: vec![],
            env: vec![("MOCK_RIG_ACL_STEP".to_string(), "1".to_string())],
        };
        assert!(local.command().is_ok());
    }
}
