//! Integration tests for `zerotier-hosts`.
//!
//! The membership API is served by `wiremock`; the blocking client runs on
//! tokio's blocking pool. Tests marked `#[ignore]` require root:
//!
//! ```bash
//! sudo cargo test -- --ignored
//! ```

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zerotier_hosts::{
    HostIdentity, MemberRecord, MembershipClient, PairedHost, SyncConfig, SyncError, Syncer,
};

const NETWORK: &str = "8056c2e21c000001";
const API_KEY: &str = "secret-token";

const EXAMPLE_BODY: &str = r#"[
    {"name":"alice","config":{"id":"1","ipAssignments":["10.0.0.2"]}},
    {"name":"bob","config":{"id":"2","ipAssignments":[]}}
]"#;

async fn serve(status: u16, body: &'static str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/api/v1/network/{NETWORK}/member")))
        .and(header("authorization", format!("Bearer {API_KEY}").as_str()))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(&server)
        .await;
    server
}

fn config(server: &MockServer, dir: &Path) -> SyncConfig {
    SyncConfig::new(API_KEY, NETWORK, "example.lan")
        .with_api_url(format!("{}/api/v1", server.uri()))
        .with_hosts_file(dir.join("hosts"))
        .with_filter_list(dir.join("custom.list"))
}

fn client(config: &SyncConfig) -> MembershipClient {
    MembershipClient::builder(&config.api_key, &config.network_id)
        .base_url(&config.api_url)
        .build()
        .unwrap()
}

fn standalone() -> HostIdentity {
    HostIdentity {
        hostname: "laptop".to_string(),
        paired: None,
    }
}

fn paired(dir: &Path) -> HostIdentity {
    HostIdentity {
        hostname: "laptop".to_string(),
        paired: Some(PairedHost {
            hosts_file: dir.join("windows-hosts"),
            host_name: "DESKTOP-1".to_string(),
            subsystem_name: "Ubuntu".to_string(),
            address: Ipv4Addr::new(172, 20, 1, 5),
        }),
    }
}

fn read(path: impl AsRef<Path>) -> String {
    std::fs::read_to_string(path).unwrap()
}

/// Runs one full cycle against `server` on the blocking pool.
async fn cycle(
    server: &MockServer,
    dir: PathBuf,
    identity: HostIdentity,
) -> zerotier_hosts::Result<zerotier_hosts::CycleReport> {
    let config = config(server, &dir);
    tokio::task::spawn_blocking(move || {
        let client = client(&config);
        Syncer::new(&config, identity).run_cycle(&client)
    })
    .await
    .unwrap()
}

// ---------------------------------------------------------------------------
// Fetch + sync against a mock API
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread")]
async fn example_response_renders_one_filter_line() {
    let server = serve(200, EXAMPLE_BODY).await;
    let dir = tempfile::tempdir().unwrap();

    let report = cycle(&server, dir.path().to_path_buf(), standalone()).await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.entries, ["10.0.0.2  alice  #ZeroTier"]);

    let list = read(dir.path().join("custom.list"));
    let entries: Vec<_> = list.lines().filter(|l| !l.starts_with('#')).collect();
    assert_eq!(entries, ["10.0.0.2  alice.example.lan  alice  #ZeroTier"]);
    assert!(!list.contains("bob"));

    let hosts = read(dir.path().join("hosts"));
    assert!(hosts.contains("10.0.0.2  alice  #ZeroTier\n"));
}

#[tokio::test(flavor = "multi_thread")]
async fn fetch_projects_members() {
    let server = serve(200, EXAMPLE_BODY).await;
    let dir = tempfile::tempdir().unwrap();
    let config = config(&server, dir.path());

    let members = tokio::task::spawn_blocking(move || client(&config).fetch())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        members,
        [
            MemberRecord::new("alice", "1", Some("10.0.0.2")),
            MemberRecord::new("bob", "2", None),
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn api_error_leaves_files_untouched() {
    let server = serve(401, r#"{"message":"unauthorized"}"#).await;
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("hosts"), "127.0.0.1 localhost\n").unwrap();

    let err = cycle(&server, dir.path().to_path_buf(), standalone()).await.unwrap_err();
    assert!(matches!(err, SyncError::Api { code: 401, ref message } if message == "unauthorized"));
    assert!(err.is_fetch_error());
    assert!(!err.is_fatal());
    assert_eq!(read(dir.path().join("hosts")), "127.0.0.1 localhost\n");
    assert!(!dir.path().join("custom.list").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_body_is_parse_error() {
    let server = serve(200, "<html>maintenance</html>").await;
    let dir = tempfile::tempdir().unwrap();

    let err = cycle(&server, dir.path().to_path_buf(), standalone()).await.unwrap_err();
    assert!(matches!(err, SyncError::Parse(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_api_is_fetch_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = SyncConfig::new(API_KEY, NETWORK, "example.lan")
        .with_api_url("http://127.0.0.1:9/api/v1")
        .with_hosts_file(dir.path().join("hosts"));

    let err = tokio::task::spawn_blocking(move || client(&config).fetch())
        .await
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, SyncError::Fetch(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn repeated_cycles_are_byte_identical() {
    let server = serve(200, EXAMPLE_BODY).await;
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("hosts"), "127.0.0.1 localhost\n::1 localhost\n").unwrap();
    std::fs::write(dir.path().join("windows-hosts"), "127.0.0.1 localhost\r\n").unwrap();

    cycle(&server, dir.path().to_path_buf(), paired(dir.path())).await.unwrap();
    let first = [
        read(dir.path().join("hosts")),
        read(dir.path().join("windows-hosts")),
        read(dir.path().join("custom.list")),
    ];

    cycle(&server, dir.path().to_path_buf(), paired(dir.path())).await.unwrap();
    let second = [
        read(dir.path().join("hosts")),
        read(dir.path().join("windows-hosts")),
        read(dir.path().join("custom.list")),
    ];

    assert_eq!(first, second);
}

// ---------------------------------------------------------------------------
// File properties (no network)
// ---------------------------------------------------------------------------

fn offline_config(dir: &Path) -> SyncConfig {
    SyncConfig::new(API_KEY, NETWORK, "example.lan")
        .with_hosts_file(dir.join("hosts"))
        .with_filter_list(dir.join("custom.list"))
}

#[test]
fn old_block_replaced_and_trailing_content_kept() {
    let dir = tempfile::tempdir().unwrap();
    let hosts = dir.path().join("hosts");
    std::fs::write(
        &hosts,
        "127.0.0.1 localhost\n\n\
         # ZeroTier entries managed by zerotier-hosts #ZeroTier\n\
         10.0.0.7  stale  #ZeroTier\n\n\
         # added by hand\n192.168.1.10 printer\n",
    )
    .unwrap();

    let config = offline_config(dir.path());
    let report = Syncer::new(&config, standalone())
        .run_with_members(&[MemberRecord::new("alice", "1", Some("10.0.0.2"))]);
    assert!(report.is_success());

    let content = read(&hosts);
    assert!(content.starts_with("127.0.0.1 localhost\n\n# added by hand\n192.168.1.10 printer\n"));
    assert_eq!(content.matches("#ZeroTier\n").count(), 2);
    assert!(!content.contains("stale"));
    assert!(content.ends_with("\n10.0.0.2  alice  #ZeroTier\n"));
}

#[test]
fn own_hostname_never_written_locally() {
    let dir = tempfile::tempdir().unwrap();
    let config = offline_config(dir.path());
    let members = [
        MemberRecord::new("laptop", "1", Some("10.0.0.2")),
        MemberRecord::new("server", "2", Some("10.0.0.3")),
    ];

    let _ = Syncer::new(&config, standalone()).run_with_members(&members);

    let hosts = read(dir.path().join("hosts"));
    assert!(!hosts.contains("laptop"));
    assert!(hosts.contains("10.0.0.3  server  #ZeroTier"));
    // The filter list serves every member, this machine included.
    assert!(read(dir.path().join("custom.list")).contains("laptop.example.lan"));
}

#[test]
fn line_endings_match_each_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("hosts"), "127.0.0.1 localhost\n").unwrap();
    std::fs::write(dir.path().join("windows-hosts"), "127.0.0.1 localhost\r\n").unwrap();
    let config = offline_config(dir.path());

    let report = Syncer::new(&config, paired(dir.path())).run_with_members(&[
        MemberRecord::new("alice", "1", Some("10.0.0.2")),
        MemberRecord::new("bob", "2", None),
    ]);
    assert!(report.is_success());
    assert_eq!(report.announcements.len(), 2);

    let windows = read(dir.path().join("windows-hosts"));
    assert!(windows.split_inclusive('\n').all(|l| l.ends_with("\r\n")));
    assert!(windows.contains("172.20.1.5 Ubuntu #WSL\r\n"));
    assert!(windows.ends_with("10.0.0.2  alice  #ZeroTier\r\n"));

    for file in ["hosts", "custom.list"] {
        let content = read(dir.path().join(file));
        assert!(!content.contains('\r'), "{file} has CR");
        assert!(!content.contains("bob"), "{file} lists bob");
    }
}

#[test]
fn similarly_tagged_user_entries_survive() {
    let dir = tempfile::tempdir().unwrap();
    let user = "127.0.0.1 localhost\n\n# my WSLg notes #WSLg\n10.1.1.1 gpu-box\n\n10.9.9.9 nas #ZeroTierNAS\n";
    std::fs::write(dir.path().join("hosts"), user).unwrap();
    std::fs::write(dir.path().join("windows-hosts"), "").unwrap();
    let config = offline_config(dir.path());
    let syncer = Syncer::new(&config, paired(dir.path()));

    let members = [MemberRecord::new("alice", "1", Some("10.0.0.2"))];
    let _ = syncer.run_with_members(&members);
    let _ = syncer.run_with_members(&members);

    let hosts = read(dir.path().join("hosts"));
    assert!(hosts.starts_with(user));
    assert_eq!(hosts.matches("#WSL\n").count(), 2);
}

// ---------------------------------------------------------------------------
// Root-only tests
// ---------------------------------------------------------------------------

#[test]
#[ignore = "requires root to write /etc/hosts"]
fn real_sync_and_clean() {
    let config = SyncConfig::new(API_KEY, NETWORK, "example.lan").with_tag("ZeroTierTest");
    let syncer = Syncer::new(&config, standalone());
    let before = read("/etc/hosts");

    let report = syncer.run_with_members(&[MemberRecord::new("zt-test", "1", Some("10.250.0.1"))]);
    assert!(report.is_success());
    assert!(read("/etc/hosts").contains("10.250.0.1  zt-test  #ZeroTierTest"));

    assert!(syncer.clean().iter().all(|o| o.result.is_ok()));
    assert_eq!(read("/etc/hosts").trim_end(), before.trim_end());
}
