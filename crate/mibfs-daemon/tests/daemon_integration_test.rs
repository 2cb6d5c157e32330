use assert_fs::TempDir;
use assert_fs::prelude::*;
use mibfs_snmp::Value;
use mibfs_snmp::testing::ScriptedAgent;
use mibfs_types::Oid;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::os::unix::fs::MetadataExt as _;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncBufReadExt as _;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

fn command_path() -> PathBuf {
    assert_cmd::cargo::cargo_bin("mibfsd")
}

/// Mounting requires the FUSE device; skip mount tests where it is
/// not available, such as minimal containers.
fn fuse_available() -> bool {
    Path::new("/dev/fuse").exists()
}

fn agent_values() -> anyhow::Result<HashMap<Oid, Value>> {
    let mut values = HashMap::new();
    values.insert(
        Oid::parse("1.3.6.1.2.1.1.5.0")?,
        Value::OctetString(b"router1.example.com".to_vec()),
    );

    Ok(values)
}

struct Fixture {
    config_file: PathBuf,
    mountpoint: PathBuf,
    debug_output: bool,
    _tempdir: TempDir,
}

impl Fixture {
    /// Write a config file pointing at `agent_addr` and prepare a
    /// mountpoint, both in a temp directory.
    ///
    /// To debug, set env variable TEST_DEBUG to get output from the
    /// daemon and pass --nocapture.
    fn setup(agent_addr: &str) -> anyhow::Result<Fixture> {
        let _ = env_logger::try_init();
        let debug = env::var("TEST_DEBUG").is_ok_and(|v| !v.is_empty());

        let tempdir = TempDir::new()?;
        let mountpoint = tempdir.child("mnt");
        mountpoint.create_dir_all()?;

        let config_file = tempdir.child("mibfs.toml");
        config_file.write_str(&format!(
            r#"
            [agent]
            address = "{agent_addr}"
            community = "public"
            timeout_ms = 500
            retries = 1

            [[entry]]
            path = "system/sysName"
            oid = "1.3.6.1.2.1.1.5.0"

            [[entry]]
            path = "greeting"
            oid = "1.3.6.1.4.1.2680.1.1"
            content = "Hello world!"
            "#
        ))?;

        Ok(Fixture {
            config_file: config_file.to_path_buf(),
            mountpoint: mountpoint.to_path_buf(),
            debug_output: debug,
            _tempdir: tempdir,
        })
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(command_path());
        cmd.arg("--config")
            .arg(&self.config_file)
            .arg("--mountpoint")
            .arg(&self.mountpoint)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        if self.debug_output {
            cmd.env("RUST_LOG", "debug");
        } else {
            cmd.env_remove("RUST_LOG");
        }

        cmd
    }

    /// Collect stderr from the daemon, optionally printing it out.
    ///
    /// Call it as early as possible, just after creating the process,
    /// so process output is immediately available.
    fn collect_stderr(
        &self,
        name: &'static str,
        daemon: &mut Child,
    ) -> JoinHandle<anyhow::Result<String>> {
        let debug_output = self.debug_output;
        let mut stderr = daemon
            .stderr
            .take()
            .expect("call Command::stderr(Stdio::piped())");
        tokio::spawn(async move {
            let reader = tokio::io::BufReader::new(&mut stderr);
            let mut lines = reader.lines();
            let mut all_lines = vec![];

            while let Ok(Some(line)) = lines.next_line().await {
                if debug_output {
                    eprintln!("[{name}] STDERR: {line}");
                }
                all_lines.push(line);
            }

            Ok(all_lines.join("\n"))
        })
    }

    /// Wait until the mountpoint reports being on another device.
    async fn wait_mounted(&self) -> anyhow::Result<()> {
        let original_dev = fs::metadata(&self.mountpoint)?.dev();
        let limit = Instant::now() + Duration::from_secs(15);
        while fs::metadata(&self.mountpoint)?.dev() == original_dev && Instant::now() < limit {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        if fs::metadata(&self.mountpoint)?.dev() == original_dev {
            anyhow::bail!("filesystem never got mounted on {:?}", self.mountpoint);
        }

        Ok(())
    }
}

fn kill(pid: Option<u32>) -> anyhow::Result<()> {
    nix::sys::signal::kill(
        nix::unistd::Pid::from_raw(pid.expect("no pid") as i32),
        nix::sys::signal::Signal::SIGTERM,
    )?;

    Ok(())
}

#[test]
fn daemon_help() -> anyhow::Result<()> {
    assert_cmd::Command::new(command_path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicates::str::contains("--mountpoint"));

    Ok(())
}

#[tokio::test]
async fn daemon_fails_on_missing_config() -> anyhow::Result<()> {
    let fixture = Fixture::setup("127.0.0.1:16161")?;
    fs::remove_file(&fixture.config_file)?;

    let output = fixture.command().output().await?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success(), "stderr<<EOF\n{stderr}\nEOF");
    assert!(
        stderr.contains("failed to read TOML config file"),
        "stderr<<EOF\n{stderr}\nEOF"
    );

    Ok(())
}

#[tokio::test]
async fn daemon_fails_on_invalid_oid_in_config() -> anyhow::Result<()> {
    let fixture = Fixture::setup("127.0.0.1:16161")?;
    fs::write(
        &fixture.config_file,
        r#"
        [agent]
        address = "127.0.0.1:16161"
        community = "public"

        [[entry]]
        path = "system/sysName"
        oid = "not an oid"
        "#,
    )?;

    let output = fixture.command().output().await?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success(), "stderr<<EOF\n{stderr}\nEOF");
    assert!(
        stderr.contains("failed to read TOML config file"),
        "stderr<<EOF\n{stderr}\nEOF"
    );

    Ok(())
}

#[tokio::test]
async fn daemon_fails_on_missing_mountpoint() -> anyhow::Result<()> {
    let fixture = Fixture::setup("127.0.0.1:16161")?;
    fs::remove_dir(&fixture.mountpoint)?;

    let output = fixture.command().output().await?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success(), "stderr<<EOF\n{stderr}\nEOF");
    assert!(stderr.contains("mountpoint"), "stderr<<EOF\n{stderr}\nEOF");

    Ok(())
}

#[tokio::test]
async fn daemon_mounts_and_serves_values() -> anyhow::Result<()> {
    if !fuse_available() {
        eprintln!("skipping: /dev/fuse not available");
        return Ok(());
    }
    let agent = ScriptedAgent::spawn("public", agent_values()?).await?;
    let fixture = Fixture::setup(&agent.addr().to_string())?;

    let mut daemon = fixture.command().stderr(Stdio::piped()).spawn()?;
    let pid = daemon.id();
    scopeguard::defer! { let _ = kill(pid); }

    fixture.collect_stderr("daemon", &mut daemon);
    fixture.wait_mounted().await?;

    let mut names: Vec<String> = fs::read_dir(&fixture.mountpoint)?
        .filter_map(|entry| {
            entry
                .ok()
                .and_then(|e| e.file_name().to_str().map(|s| s.to_string()))
        })
        .collect();
    names.sort();
    assert_eq!(vec!["greeting".to_string(), "system".to_string()], names);

    assert_eq!(
        "Hello world!",
        fs::read_to_string(fixture.mountpoint.join("greeting"))?
    );
    assert_eq!(
        "router1.example.com",
        fs::read_to_string(fixture.mountpoint.join("system/sysName"))?
    );

    // The filesystem is mounted read-only.
    assert!(fs::write(fixture.mountpoint.join("greeting"), "nope").is_err());
    assert!(fs::create_dir(fixture.mountpoint.join("newdir")).is_err());

    kill(daemon.id())?;
    let status = daemon.wait().await?;
    assert_eq!(Some(0), status.code());

    Ok(())
}

#[tokio::test]
async fn daemon_mounts_even_when_agent_unreachable() -> anyhow::Result<()> {
    if !fuse_available() {
        eprintln!("skipping: /dev/fuse not available");
        return Ok(());
    }
    // Nothing listens on this port; the connected entry starts out
    // empty and reading it reports an error.
    let fixture = Fixture::setup("127.0.0.1:16161")?;

    let mut daemon = fixture.command().stderr(Stdio::piped()).spawn()?;
    let pid = daemon.id();
    scopeguard::defer! { let _ = kill(pid); }

    fixture.collect_stderr("daemon", &mut daemon);
    fixture.wait_mounted().await?;

    assert_eq!(
        "Hello world!",
        fs::read_to_string(fixture.mountpoint.join("greeting"))?
    );
    assert!(fs::read_to_string(fixture.mountpoint.join("system/sysName")).is_err());

    Ok(())
}

#[tokio::test]
async fn daemon_interrupted() -> anyhow::Result<()> {
    if !fuse_available() {
        eprintln!("skipping: /dev/fuse not available");
        return Ok(());
    }
    let agent = ScriptedAgent::spawn("public", agent_values()?).await?;
    let fixture = Fixture::setup(&agent.addr().to_string())?;

    let mut daemon = fixture.command().stderr(Stdio::piped()).spawn()?;
    let pid = daemon.id();
    scopeguard::defer! { let _ = kill(pid); }

    let stderr = fixture.collect_stderr("daemon", &mut daemon);
    fixture.wait_mounted().await?;

    kill(daemon.id())?;

    let status = daemon.wait().await?;
    assert_eq!(Some(0), status.code());

    let stderr = stderr.await??;
    assert!(stderr.contains("Interrupted"), "stderr<<EOF\n{stderr}\nEOF");

    Ok(())
}

#[tokio::test]
async fn daemon_systemd_log_output_format() -> anyhow::Result<()> {
    if !fuse_available() {
        eprintln!("skipping: /dev/fuse not available");
        return Ok(());
    }
    let agent = ScriptedAgent::spawn("public", agent_values()?).await?;
    let fixture = Fixture::setup(&agent.addr().to_string())?;

    let mut daemon = fixture
        .command()
        .env("RUST_LOG_FORMAT", "SYSTEMD")
        .env("RUST_LOG", "mibfs_=info,mibfsd=info")
        .stderr(Stdio::piped())
        .spawn()?;
    let pid = daemon.id();
    scopeguard::defer! { let _ = kill(pid); }

    let stderr = fixture.collect_stderr("daemon", &mut daemon);
    fixture.wait_mounted().await?;

    // Kill to make sure stderr ends
    kill(daemon.id())?;
    daemon.wait().await?;

    let stderr = stderr.await??;
    assert!(
        stderr.contains("<5>mibfs") || stderr.contains("<7>mibfs"),
        "stderr<<EOF\n{stderr}\nEOF"
    );

    Ok(())
}
