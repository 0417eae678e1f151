//! End-to-end scenarios from `spec.md` §8, driving
//! [`scp_core::dispatcher::handle`] over an in-memory duplex byte stream
//! against the `scp-vfs` disk-backed implementation of every boundary trait.
//!
//! The channel is scripted rather than truly concurrent: because the SCP
//! protocol is a strict lockstep request/ack exchange, the peer's entire
//! side of the conversation can be queued up front into a single input
//! buffer and the server's writes collected into a single output buffer.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use scp_core::dispatcher::{self, CoreDependencies};
use scp_core::hooks::AllowAll;
use scp_core::quota::QuotaProvider;
use scp_core::registry::InProcessConnectionRegistry;
use scp_core::vfs::Filesystem;
use scp_vfs::{DiskFilesystem, InMemoryQuotaStore, LoggingTransferFactory, ScpServerConfig, StaticUserContext, UserConfig};
use tempfile::TempDir;

struct MemoryChannel {
    input: io::Cursor<Vec<u8>>,
    output: Vec<u8>,
}

impl MemoryChannel {
    fn new(input: Vec<u8>) -> Self {
        MemoryChannel {
            input: io::Cursor::new(input),
            output: Vec::new(),
        }
    }
}

impl Read for MemoryChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.input.read(buf)
    }
}

impl Write for MemoryChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.output.write(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Harness bundling the owned dependencies one `dispatcher::handle` call
/// needs, so their borrows outlive the call.
struct Harness {
    home: TempDir,
    user: StaticUserContext,
    quota: Arc<InMemoryQuotaStore>,
    hooks: AllowAll,
    transfer_factory: LoggingTransferFactory,
    registry: InProcessConnectionRegistry,
}

impl Harness {
    fn new() -> Self {
        let home = TempDir::new().expect("tempdir");
        let user_config = UserConfig::unrestricted("alice", home.path().to_path_buf(), 1000, 1000);
        let server_config = ScpServerConfig {
            atomic_uploads: true,
            max_connections: None,
            users: vec![user_config.clone()],
        };
        let home_fs: Arc<dyn Filesystem> = Arc::new(DiskFilesystem::new(home.path().to_path_buf(), "/", true));
        let user = StaticUserContext::new(user_config, home_fs, Vec::new());
        let quota = Arc::new(InMemoryQuotaStore::new(server_config));
        let transfer_factory = LoggingTransferFactory::new(Arc::clone(&quota) as Arc<dyn QuotaProvider>);

        Harness {
            home,
            user,
            quota,
            hooks: AllowAll,
            transfer_factory,
            registry: InProcessConnectionRegistry::new(None),
        }
    }

    fn run(&self, argv: &[&str], channel: &mut MemoryChannel) -> u8 {
        let argv: Vec<String> = argv.iter().map(|s| (*s).to_owned()).collect();
        let deps = CoreDependencies {
            registry: &self.registry,
            quota: self.quota.as_ref(),
            hooks: &self.hooks,
            transfer_factory: &self.transfer_factory,
        };
        dispatcher::handle(&argv, &self.user, channel, &deps)
    }

    fn real(&self, relative: &str) -> PathBuf {
        self.home.path().join(relative)
    }
}

fn set_mode(path: &Path, mode: u32) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode)).unwrap();
    }
    #[cfg(not(unix))]
    let _ = (path, mode);
}

/// Scenario 1: single-file upload, non-recursive, destination is a new
/// filename.
#[test]
fn scenario_1_single_file_upload_to_new_filename() {
    let harness = Harness::new();
    let mut channel_input = b"C0644 5 a.txt\n".to_vec();
    channel_input.extend_from_slice(b"hello");
    channel_input.push(0x00);
    let mut channel = MemoryChannel::new(channel_input);

    let status = harness.run(&["-t", "/a.txt"], &mut channel);

    assert_eq!(status, 0);
    assert_eq!(fs::read(harness.real("a.txt")).unwrap(), b"hello");
    assert_eq!(channel.output, vec![0x00, 0x00, 0x00]);
}

/// Scenario 2: single-file upload where the destination is an existing
/// directory.
#[test]
fn scenario_2_single_file_upload_into_existing_directory() {
    let harness = Harness::new();
    fs::create_dir(harness.real("dir")).unwrap();

    let mut channel_input = b"C0644 3 x\n".to_vec();
    channel_input.extend_from_slice(b"abc");
    channel_input.push(0x00);
    let mut channel = MemoryChannel::new(channel_input);

    let status = harness.run(&["-t", "/dir"], &mut channel);

    assert_eq!(status, 0);
    assert_eq!(fs::read(harness.real("dir/x")).unwrap(), b"abc");
    assert_eq!(channel.output, vec![0x00, 0x00, 0x00]);
}

/// Scenario 3: recursive upload with a nested directory and a matching end.
#[test]
fn scenario_3_recursive_upload_with_nested_directory() {
    let harness = Harness::new();
    fs::create_dir(harness.real("base")).unwrap();

    let mut channel_input = b"D0755 0 sub\n".to_vec();
    channel_input.extend_from_slice(b"C0644 2 f\n");
    channel_input.extend_from_slice(b"ab");
    channel_input.push(0x00);
    channel_input.extend_from_slice(b"E\n");
    let mut channel = MemoryChannel::new(channel_input);

    let status = harness.run(&["-r", "-t", "/base"], &mut channel);

    assert_eq!(status, 0);
    assert!(harness.real("base/sub").is_dir());
    assert_eq!(fs::read(harness.real("base/sub/f")).unwrap(), b"ab");
    assert_eq!(channel.output, vec![0x00, 0x00, 0x00, 0x00, 0x00]);
}

/// Scenario 4: a malformed control line is rejected with an ERR ack and a
/// non-zero exit status.
#[test]
fn scenario_4_malformed_command_is_rejected() {
    let harness = Harness::new();
    let mut channel = MemoryChannel::new(b"Q bogus\n".to_vec());

    let status = harness.run(&["-t", "/x"], &mut channel);

    assert_ne!(status, 0);
    assert_eq!(channel.output[0], 0x00, "the initial upload-side OK is still sent");
    assert_eq!(channel.output[1], 0x02, "a protocol error is reported as ERR");
    assert_eq!(*channel.output.last().unwrap(), b'\n');
    assert!(channel.output.len() > 3, "the ERR carries a non-empty diagnostic");
}

/// Scenario 5: recursive download of a two-level tree.
#[test]
fn scenario_5_recursive_download_of_a_two_level_tree() {
    let harness = Harness::new();
    fs::create_dir(harness.real("root")).unwrap();
    fs::write(harness.real("root/a"), b"hi").unwrap();
    set_mode(&harness.real("root/a"), 0o644);
    fs::create_dir(harness.real("root/s")).unwrap();
    set_mode(&harness.real("root/s"), 0o755);
    fs::write(harness.real("root/s/b"), b"!").unwrap();
    set_mode(&harness.real("root/s/b"), 0o644);
    set_mode(&harness.real("root"), 0o755);

    // One OK per: initial start signal, D root, C a header, file a trailer,
    // D s header, C b header, file b trailer, E s, E root.
    let channel_input = vec![0x00u8; 9];
    let mut channel = MemoryChannel::new(channel_input);

    let status = harness.run(&["-f", "-r", "/root"], &mut channel);

    assert_eq!(status, 0);
    let mut expected = Vec::new();
    expected.extend_from_slice(b"D0755 0 root\n");
    expected.extend_from_slice(b"C0644 2 a\n");
    expected.extend_from_slice(b"hi");
    expected.push(0x00);
    expected.extend_from_slice(b"D0755 0 s\n");
    expected.extend_from_slice(b"C0644 1 b\n");
    expected.extend_from_slice(b"!");
    expected.push(0x00);
    expected.extend_from_slice(b"E\n");
    expected.extend_from_slice(b"E\n");
    assert_eq!(channel.output, expected);
}

/// Scenario 6: downloading a directory without `-r` fails.
#[test]
fn scenario_6_non_recursive_download_of_a_directory_fails() {
    let harness = Harness::new();
    fs::create_dir(harness.real("root")).unwrap();

    let mut channel = MemoryChannel::new(vec![0x00]); // initial peer OK
    let status = harness.run(&["-f", "/root"], &mut channel);

    assert_ne!(status, 0);
    assert_eq!(channel.output[0], 0x02);
    let text = String::from_utf8_lossy(&channel.output);
    assert!(text.contains("non recursive"));
    assert_eq!(*channel.output.last().unwrap(), b'\n');
}
