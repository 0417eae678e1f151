//! Reference SCP server binary: wires `scp_core::dispatcher::handle` to a
//! disk-backed `scp-vfs` backend over stdio (`spec.md` §2, SPEC_FULL.md §2).
//!
//! This binary stands in for the SSH transport and authentication layer
//! `spec.md` places out of scope: it trusts the identity and limits passed
//! to it as flags (see [`cli::ServerInvocation`]), the way a forced-command
//! wrapper invoked from `sshd` would.

#![deny(unsafe_code)]

mod cli;

use std::env;
use std::io::{self, Read, Write};
use std::process::ExitCode;
use std::sync::Arc;

use scp_core::dispatcher::{self, CoreDependencies};
use scp_core::hooks::AllowAll;
use scp_core::quota::QuotaProvider;
use scp_core::registry::InProcessConnectionRegistry;
use scp_vfs::{DiskFilesystem, InMemoryQuotaStore, LoggingTransferFactory, ScpServerConfig, StaticUserContext, UserConfig};

use cli::ServerInvocation;

fn main() -> ExitCode {
    #[cfg(feature = "tracing")]
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let ssh_original_command = env::var("SSH_ORIGINAL_COMMAND").ok();

    let invocation = match ServerInvocation::parse(&args, ssh_original_command) {
        Ok(invocation) => invocation,
        Err(message) => {
            eprintln!("scp-server: {message}");
            return ExitCode::FAILURE;
        }
    };

    let mut channel = StdioChannel::new();
    let status = run(&invocation, &mut channel);
    exit_code_from(status)
}

/// Serves one [`ServerInvocation`] over `channel`, returning the SSH exit
/// status `scp_core::dispatcher::handle` produces.
fn run<C: Read + Write>(invocation: &ServerInvocation, channel: &mut C) -> u8 {
    let user_config = UserConfig {
        username: invocation.username.clone(),
        uid: invocation.uid,
        gid: invocation.gid,
        home: invocation.home.clone(),
        read_only: invocation.read_only,
        allowed_suffixes: invocation.allowed_suffixes.clone(),
        denied_suffixes: invocation.denied_suffixes.clone(),
        max_disk_bytes: invocation.max_disk_bytes,
        max_transfer_bytes: invocation.max_transfer_bytes,
        max_concurrent_transfers: invocation.max_concurrent_transfers,
    };
    let server_config = ScpServerConfig {
        atomic_uploads: invocation.atomic_uploads,
        max_connections: invocation.max_connections,
        users: vec![user_config.clone()],
    };

    let home: Arc<dyn scp_core::vfs::Filesystem> = Arc::new(
        DiskFilesystem::new(invocation.home.clone(), "/", invocation.atomic_uploads).with_owner(invocation.uid, invocation.gid),
    );
    let user = StaticUserContext::new(user_config, home, Vec::new());

    let quota: Arc<dyn QuotaProvider> = Arc::new(InMemoryQuotaStore::new(server_config));
    let hooks = AllowAll;
    let transfer_factory = LoggingTransferFactory::new(Arc::clone(&quota));
    let registry = InProcessConnectionRegistry::new(invocation.max_connections);

    let deps = CoreDependencies {
        registry: &registry,
        quota: quota.as_ref(),
        hooks: &hooks,
        transfer_factory: &transfer_factory,
    };

    dispatcher::handle(&invocation.scp_argv, &user, channel, &deps)
}

fn exit_code_from(status: u8) -> ExitCode {
    if status == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(status)
    }
}

/// Bridges the process's stdin/stdout into the single `Read + Write`
/// channel `scp_core::framer::ChannelFramer` expects.
struct StdioChannel {
    stdin: io::Stdin,
    stdout: io::Stdout,
}

impl StdioChannel {
    fn new() -> Self {
        StdioChannel {
            stdin: io::stdin(),
            stdout: io::stdout(),
        }
    }
}

impl Read for StdioChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stdin.read(buf)
    }
}

impl Write for StdioChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stdout.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stdout.flush()
    }
}
