// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use flate2::Compression;
use flate2::write::GzEncoder;
use pybrew::build::{BuildLog, CommandStatus, ShellRunner, StepRunner};
use pybrew::fetch::{Fetched, RemoteMetadata, SourceFetcher};
use pybrew::{BrewConfig, Error, InstallationPipeline, ProgressStyle, ProgressTracker, Result};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tar::{Builder, EntryType, Header};
use tempfile::TempDir;

pub const MIRROR: &str = "http://mirror.test/python";
pub const BOOTSTRAP_URL: &str = "http://python-distribute.org/distribute_setup.py";

/// `configure` stand-in: remembers the prefix for the fake make
const FAKE_CONFIGURE: &str = r#"#!/bin/sh
prefix="${1#--prefix=}"
echo "configured with $*"
echo "$prefix" > .prefix
"#;

/// `make` stand-in: the install target writes a shell-script interpreter
const FAKE_MAKE: &str = r##"#!/bin/sh
prefix="$(cat .prefix)"
case "$1" in
  "") echo "compiling" ;;
  test) echo "testing" ;;
  install)
    mkdir -p "$prefix/bin"
    printf '#!/bin/sh\necho bootstrapped "$@"\n' > "$prefix/bin/python"
    chmod +x "$prefix/bin/python"
    echo "installed into $prefix"
    ;;
  *) echo "unknown target $1" >&2; exit 2 ;;
esac
"##;

/// Gzip tarball of a source tree whose toolchain is two shell scripts
pub fn python_source_tgz(name: &str) -> Vec<u8> {
    let mut builder = Builder::new(GzEncoder::new(Vec::new(), Compression::default()));

    let mut dir = Header::new_gnu();
    dir.set_entry_type(EntryType::Directory);
    dir.set_mode(0o755);
    dir.set_size(0);
    builder
        .append_data(&mut dir, format!("{name}/"), std::io::empty())
        .unwrap();

    for (file, body) in [("configure", FAKE_CONFIGURE), ("fakemake", FAKE_MAKE)] {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_mode(0o755);
        header.set_size(body.len() as u64);
        builder
            .append_data(&mut header, format!("{name}/{file}"), body.as_bytes())
            .unwrap();
    }

    builder.into_inner().unwrap().finish().unwrap()
}

/// Serves canned responses keyed by URL and counts every call
#[derive(Default)]
pub struct FakeFetcher {
    resources: Mutex<HashMap<String, (Option<String>, Vec<u8>)>>,
    probes: Mutex<Vec<String>>,
    fetches: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn serve(&self, url: &str, content_type: Option<&str>, body: Vec<u8>) {
        self.resources
            .lock()
            .unwrap()
            .insert(url.to_string(), (content_type.map(String::from), body));
    }

    pub fn fetch_count(&self, url: &str) -> usize {
        self.fetches.lock().unwrap().iter().filter(|u| *u == url).count()
    }

    pub fn probe_count(&self, url: &str) -> usize {
        self.probes.lock().unwrap().iter().filter(|u| *u == url).count()
    }

    fn lookup(&self, url: &str) -> Result<(Option<String>, Vec<u8>)> {
        self.resources
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::Download {
                url: url.to_string(),
                reason: "HTTP 404 Not Found".to_string(),
            })
    }
}

impl SourceFetcher for FakeFetcher {
    fn probe(&self, url: &str) -> Result<RemoteMetadata> {
        self.probes.lock().unwrap().push(url.to_string());
        let (content_type, body) = self.lookup(url)?;
        Ok(RemoteMetadata {
            content_type,
            content_length: Some(body.len() as u64),
        })
    }

    fn fetch(
        &self,
        url: &str,
        sink: &mut dyn Write,
        progress: &dyn ProgressTracker,
    ) -> Result<Fetched> {
        self.fetches.lock().unwrap().push(url.to_string());
        let (content_type, body) = self.lookup(url)?;
        progress.set_length(body.len() as u64);
        sink.write_all(&body)
            .map_err(|e| Error::io("Failed to write download data", e))?;
        progress.set_position(body.len() as u64);
        Ok(Fetched {
            metadata: RemoteMetadata {
                content_type,
                content_length: Some(body.len() as u64),
            },
            bytes: body.len() as u64,
        })
    }
}

/// Runs commands for real and records them; can force one command to fail
///
/// A forced failure still runs the command first, so side effects such as a
/// half-written prefix are present when the pipeline reacts.
#[derive(Default)]
pub struct RecordingRunner {
    commands: Mutex<Vec<String>>,
    fail_on: Option<String>,
}

impl RecordingRunner {
    pub fn failing_on(command: &str) -> Self {
        Self {
            fail_on: Some(command.to_string()),
            ..Default::default()
        }
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

impl StepRunner for RecordingRunner {
    fn run(&self, command: &str, workdir: &Path, log: &BuildLog) -> Result<CommandStatus> {
        self.commands.lock().unwrap().push(command.to_string());
        let status = ShellRunner.run(command, workdir, log)?;
        if self.fail_on.as_deref() == Some(command) {
            return Ok(CommandStatus::from_code(Some(2)));
        }
        Ok(status)
    }
}

/// A scratch root with fake transport and the scripted toolchain
pub struct Sandbox {
    pub dir: TempDir,
    pub config: BrewConfig,
    pub fetcher: Arc<FakeFetcher>,
    pub runner: Arc<RecordingRunner>,
}

impl Sandbox {
    pub fn new() -> Self {
        Self::with_runner(RecordingRunner::default())
    }

    pub fn with_runner(runner: RecordingRunner) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = BrewConfig::new(dir.path().join("root"));
        config.mirror = MIRROR.to_string();
        config.bootstrap_url = BOOTSTRAP_URL.to_string();
        config.make_command = "./fakemake".to_string();

        Self {
            dir,
            config,
            fetcher: Arc::new(FakeFetcher::default()),
            runner: Arc::new(runner),
        }
    }

    pub fn pipeline(&self) -> InstallationPipeline {
        InstallationPipeline::with_components(
            self.config.clone(),
            self.fetcher.clone(),
            self.runner.clone(),
        )
        .with_progress(ProgressStyle::Silent)
    }

    /// Serve a working source tarball for `version` at its mirror URL
    pub fn serve_release(&self, version: &str) -> String {
        let url = format!("{MIRROR}/{version}/Python-{version}.tgz");
        self.fetcher.serve(
            &url,
            Some("application/x-gzip"),
            python_source_tgz(&format!("Python-{version}")),
        );
        url
    }

    /// Serve a bootstrap script; the fake interpreter ignores its content
    pub fn serve_bootstrap_script(&self) {
        self.fetcher.serve(
            BOOTSTRAP_URL,
            Some("text/x-python"),
            b"print('distribute')\n".to_vec(),
        );
    }

    pub fn log_contents(&self) -> String {
        std::fs::read_to_string(self.config.log_file()).unwrap_or_default()
    }
}
