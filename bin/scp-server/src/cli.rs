//! Builds one connection's configuration from CLI flags and the
//! environment, matching the hand-rolled, no-`serde` style
//! `crates/core::server::config::ServerConfig` uses for its own
//! `--server`-flavored invocation (`spec.md` §4.8).
//!
//! This binary serves one already-authenticated SSH channel per process
//! invocation (the inetd/`ForceCommand` model): the wrapper that launches
//! `scp-server` is trusted to have authenticated the user already and to
//! pass that identity down as flags.

use std::path::PathBuf;

/// Everything needed to serve one SCP command: the user's identity/limits
/// and the `scp` argv itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInvocation {
    /// The authenticated username.
    pub username: String,
    /// The uid to propagate onto files this user creates.
    pub uid: u32,
    /// The gid to propagate onto files this user creates.
    pub gid: u32,
    /// The real directory backing the user's virtual root `/`.
    pub home: PathBuf,
    /// Whether an overwritten file is pre-renamed to a backup name before
    /// the new content is opened for writing (`spec.md` §4.3.2, §9).
    pub atomic_uploads: bool,
    /// The maximum number of concurrently registered connections.
    pub max_connections: Option<usize>,
    /// The user's total on-disk byte quota.
    pub max_disk_bytes: Option<u64>,
    /// The user's per-transfer byte quota.
    pub max_transfer_bytes: Option<u64>,
    /// The user's maximum concurrent transfer count.
    pub max_concurrent_transfers: Option<usize>,
    /// Allowed filename suffixes (empty means "all except denied").
    pub allowed_suffixes: Vec<String>,
    /// Denied filename suffixes, checked before `allowed_suffixes`.
    pub denied_suffixes: Vec<String>,
    /// If `true`, uploads and directory creation are always denied.
    pub read_only: bool,
    /// The `scp` command argv (e.g. `["-t", "/dest"]`), as the SSH client
    /// would have sent it in the exec request.
    pub scp_argv: Vec<String>,
}

impl ServerInvocation {
    /// Parses `args` (this process's argv, excluding argv[0]) into a
    /// [`ServerInvocation`].
    ///
    /// Everything up to a literal `--` token configures the connection;
    /// everything after it is the `scp` argv. If no `--` token is present,
    /// `ssh_original_command` (normally sourced from the `SSH_ORIGINAL_COMMAND`
    /// environment variable sshd sets for a forced command) is split on
    /// whitespace and used instead, matching how a real deployment's forced
    /// command wrapper hands the client's requested command line down to
    /// this binary.
    ///
    /// # Errors
    ///
    /// Returns a caller-facing message if `--user` or `--home` is missing,
    /// or if a numeric flag fails to parse.
    pub fn parse(args: &[String], ssh_original_command: Option<String>) -> Result<Self, String> {
        let split = args.iter().position(|a| a == "--");
        let (config_args, trailing_argv) = match split {
            Some(i) => (&args[..i], args[i + 1..].to_vec()),
            None => (args, Vec::new()),
        };

        let mut username = None;
        let mut uid = None;
        let mut gid = None;
        let mut home = None;
        let mut atomic_uploads = true;
        let mut read_only = false;
        let mut max_connections = None;
        let mut max_disk_bytes = None;
        let mut max_transfer_bytes = None;
        let mut max_concurrent_transfers = None;
        let mut allowed_suffixes = Vec::new();
        let mut denied_suffixes = Vec::new();

        let mut iter = config_args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--user" => username = Some(next_value(&mut iter, "--user")?),
                "--uid" => uid = Some(parse_num(&next_value(&mut iter, "--uid")?, "--uid")?),
                "--gid" => gid = Some(parse_num(&next_value(&mut iter, "--gid")?, "--gid")?),
                "--home" => home = Some(PathBuf::from(next_value(&mut iter, "--home")?)),
                "--no-atomic-uploads" => atomic_uploads = false,
                "--read-only" => read_only = true,
                "--max-connections" => {
                    max_connections = Some(parse_num(&next_value(&mut iter, "--max-connections")?, "--max-connections")?);
                }
                "--max-disk-bytes" => {
                    max_disk_bytes = Some(parse_num(&next_value(&mut iter, "--max-disk-bytes")?, "--max-disk-bytes")?);
                }
                "--max-transfer-bytes" => {
                    max_transfer_bytes =
                        Some(parse_num(&next_value(&mut iter, "--max-transfer-bytes")?, "--max-transfer-bytes")?);
                }
                "--max-concurrent-transfers" => {
                    max_concurrent_transfers = Some(parse_num(
                        &next_value(&mut iter, "--max-concurrent-transfers")?,
                        "--max-concurrent-transfers",
                    )?);
                }
                "--allow" => allowed_suffixes.push(next_value(&mut iter, "--allow")?),
                "--deny" => denied_suffixes.push(next_value(&mut iter, "--deny")?),
                other => return Err(format!("unrecognized flag {other}")),
            }
        }

        let scp_argv = if split.is_some() {
            trailing_argv
        } else {
            ssh_original_command
                .as_deref()
                .unwrap_or_default()
                .split_whitespace()
                .map(str::to_owned)
                .collect()
        };
        if scp_argv.is_empty() {
            return Err("no scp command to run: pass `-- <scp argv>` or set SSH_ORIGINAL_COMMAND".to_owned());
        }

        Ok(ServerInvocation {
            username: username.ok_or("missing required flag --user")?,
            uid: uid.unwrap_or(0),
            gid: gid.unwrap_or(0),
            home: home.ok_or("missing required flag --home")?,
            atomic_uploads,
            max_connections,
            max_disk_bytes,
            max_transfer_bytes,
            max_concurrent_transfers,
            allowed_suffixes,
            denied_suffixes,
            read_only,
            scp_argv,
        })
    }
}

fn next_value(iter: &mut std::slice::Iter<'_, String>, flag: &str) -> Result<String, String> {
    iter.next().cloned().ok_or_else(|| format!("{flag} requires a value"))
}

fn parse_num<T: std::str::FromStr>(value: &str, flag: &str) -> Result<T, String> {
    value.parse().map_err(|_| format!("{flag} expects a number, got {value:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_required_flags_and_trailing_argv() {
        let args: Vec<String> = [
            "--user", "alice", "--uid", "1000", "--gid", "1000", "--home", "/srv/alice", "--", "-t", "/dest",
        ]
        .into_iter()
        .map(str::to_owned)
        .collect();
        let invocation = ServerInvocation::parse(&args, None).unwrap();
        assert_eq!(invocation.username, "alice");
        assert_eq!(invocation.uid, 1000);
        assert_eq!(invocation.home, PathBuf::from("/srv/alice"));
        assert_eq!(invocation.scp_argv, vec!["-t".to_owned(), "/dest".to_owned()]);
        assert!(invocation.atomic_uploads);
    }

    #[test]
    fn falls_back_to_ssh_original_command_without_a_separator() {
        let args: Vec<String> = ["--user", "alice", "--home", "/srv/alice"].into_iter().map(str::to_owned).collect();
        let invocation = ServerInvocation::parse(&args, Some("-f /readme.txt".to_owned())).unwrap();
        assert_eq!(invocation.scp_argv, vec!["-f".to_owned(), "/readme.txt".to_owned()]);
    }

    #[test]
    fn missing_user_is_an_error() {
        let args: Vec<String> = ["--home", "/srv/alice", "--", "-t", "/dest"].into_iter().map(str::to_owned).collect();
        assert!(ServerInvocation::parse(&args, None).is_err());
    }

    #[test]
    fn missing_scp_command_is_an_error() {
        let args: Vec<String> = ["--user", "alice", "--home", "/srv/alice"].into_iter().map(str::to_owned).collect();
        assert!(ServerInvocation::parse(&args, None).is_err());
    }

    #[test]
    fn unknown_flag_is_rejected() {
        let args: Vec<String> = ["--bogus"].into_iter().map(str::to_owned).collect();
        assert!(ServerInvocation::parse(&args, None).is_err());
    }
}
