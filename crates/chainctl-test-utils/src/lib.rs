//! Testing utilities for chainctl workspace
//!
//! Shared fixtures and recording collaborators.

#![allow(missing_docs)]

use async_trait::async_trait;
use chainctl_chain::{
    CacheStorage, ChainOptions, CodeGenerator, Environment, GenerateOptions, GenerationError,
    ServeEvent, SourceRevision, StaticRevision, Toolchain,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio_util::sync::CancellationToken;

pub const APP_MODULE: &str = "github.com/tendermint/mars";
pub const SDK_VERSION: &str = "v0.45.4";

/// Node stub that stays up until killed
pub const LONG_RUNNING_NODE: &str = "exec sleep 600";

/// Node stub that exits immediately
pub const CRASHING_NODE: &str = "exit 3";

/// A throwaway Stargate application tree
pub struct AppFixture {
    dir: TempDir,
}

impl AppFixture {
    /// `go.mod`, a proto file and the watched source directories
    pub fn stargate() -> Self {
        Self::with_sdk(SDK_VERSION)
    }

    pub fn with_sdk(version: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::write(
            root.join("go.mod"),
            format!("module {APP_MODULE}\n\ngo 1.18\n\nrequire (\n\tgithub.com/cosmos/cosmos-sdk {version}\n)\n"),
        )
        .unwrap();
        for sub in ["app", "cmd/marsd", "x/mars", "proto/mars"] {
            std::fs::create_dir_all(root.join(sub)).unwrap();
        }
        std::fs::write(root.join("proto/mars/genesis.proto"), "syntax = \"proto3\";\n").unwrap();
        std::fs::create_dir_all(root.join("home")).unwrap();
        Self { dir }
    }

    /// Module without an SDK dependency
    pub fn without_sdk() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("go.mod"), format!("module {APP_MODULE}\n")).unwrap();
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn home(&self) -> PathBuf {
        self.dir.path().join("home")
    }

    pub fn write(&self, relative: &str, content: &str) {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    pub fn write_config(&self, yaml: &str) {
        self.write("config.yml", yaml);
    }

    /// Install a shell-script node and point `build.binary` at it
    pub fn install_node(&self, body: &str) -> PathBuf {
        let path = self.dir.path().join("bin").join("marsd");
        self.write("bin/marsd", &format!("#!/bin/sh\n{body}\n"));
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        self.write_config(&format!(
            "validators:\n  - name: alice\n    bonded: 100000000stake\nbuild:\n  binary: {}\n",
            path.display()
        ));
        path
    }

    /// Resolution environment rooted in the fixture
    pub fn environment(&self) -> Environment {
        Environment::empty().with("HOME", self.home().to_string_lossy())
    }

    /// Options wired to the fixture and the given collaborators
    pub fn options(&self, generator: &Arc<RecordingGenerator>, toolchain: &Arc<RecordingToolchain>) -> ChainOptions {
        ChainOptions::new()
            .with_environment(self.environment())
            .with_revision_source(Arc::new(StaticRevision(SourceRevision::default())))
            .with_generator(generator.clone())
            .with_toolchain(toolchain.clone())
            .with_cache(CacheStorage::new(self.dir.path().join("cache")))
    }
}

/// How a recording collaborator behaves on calls after its first
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Pace {
    /// Return at once
    #[default]
    Instant,
    /// Sleep before returning
    Slow(Duration),
    /// Block until cancelled, then report cancellation
    UntilCancelled,
}

impl Pace {
    async fn apply(
        self,
        stage: &'static str,
        cancel: &CancellationToken,
    ) -> Result<(), GenerationError> {
        match self {
            Self::Instant => Ok(()),
            Self::Slow(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
            Self::UntilCancelled => {
                cancel.cancelled().await;
                Err(GenerationError::Cancelled { stage })
            }
        }
    }
}

/// Code generator that only counts calls
#[derive(Debug, Default)]
pub struct RecordingGenerator {
    calls: AtomicUsize,
    failure: Mutex<Option<String>>,
    last_options: Mutex<Option<GenerateOptions>>,
    pace: Pace,
}

impl RecordingGenerator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn paced(pace: Pace) -> Arc<Self> {
        Arc::new(Self {
            pace,
            ..Self::default()
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        let generator = Self::default();
        *generator.failure.lock().unwrap() = Some(message.to_string());
        Arc::new(generator)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_options(&self) -> Option<GenerateOptions> {
        self.last_options.lock().unwrap().clone()
    }
}

#[async_trait]
impl CodeGenerator for RecordingGenerator {
    async fn generate(
        &self,
        cancel: &CancellationToken,
        _cache: &CacheStorage,
        _project: &Path,
        _proto: &Path,
        options: &GenerateOptions,
    ) -> Result<(), GenerationError> {
        if cancel.is_cancelled() {
            return Err(GenerationError::Cancelled { stage: "generate" });
        }
        let previous = self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock().unwrap() = Some(options.clone());
        if previous > 0 {
            self.pace.apply("generate", cancel).await?;
        }
        match self.failure.lock().unwrap().clone() {
            Some(message) => Err(GenerationError::failed("generate", message)),
            None => Ok(()),
        }
    }
}

/// Toolchain that only counts calls
#[derive(Debug, Default)]
pub struct RecordingToolchain {
    pub verify: AtomicUsize,
    pub tidy: AtomicUsize,
    pub format: AtomicUsize,
    pub install: AtomicUsize,
    rebuild: Pace,
}

impl RecordingToolchain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Installs after the first one follow `rebuild`
    pub fn paced(rebuild: Pace) -> Arc<Self> {
        Arc::new(Self {
            rebuild,
            ..Self::default()
        })
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Toolchain for RecordingToolchain {
    async fn verify(&self, _cancel: &CancellationToken, _project: &Path) -> Result<(), GenerationError> {
        self.verify.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn tidy(&self, _cancel: &CancellationToken, _project: &Path) -> Result<(), GenerationError> {
        self.tidy.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn format(&self, _cancel: &CancellationToken, _project: &Path) -> Result<(), GenerationError> {
        self.format.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn install(
        &self,
        cancel: &CancellationToken,
        _project: &Path,
        _main: &Path,
        _binary: &str,
    ) -> Result<(), GenerationError> {
        if self.install.fetch_add(1, Ordering::SeqCst) > 0 {
            self.rebuild.apply("install", cancel).await?;
        }
        Ok(())
    }
}

/// Event channel for serve tests
pub fn event_channel() -> (mpsc::UnboundedSender<ServeEvent>, UnboundedReceiver<ServeEvent>) {
    mpsc::unbounded_channel()
}

/// Receive events until `want` matches, failing after `timeout`
pub async fn wait_for<F>(rx: &mut UnboundedReceiver<ServeEvent>, timeout: Duration, want: F) -> ServeEvent
where
    F: Fn(&ServeEvent) -> bool,
{
    tokio::time::timeout(timeout, async {
        loop {
            let event = rx.recv().await.expect("event channel closed");
            if want(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for serve event")
}

/// Drain whatever events are queued right now
pub fn drain(rx: &mut UnboundedReceiver<ServeEvent>) -> Vec<ServeEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Whether a pid still refers to a live (non-zombie) process
#[cfg(target_os = "linux")]
pub fn process_alive(pid: u32) -> bool {
    std::fs::read_to_string(format!("/proc/{pid}/stat"))
        .map(|stat| {
            stat.rsplit(')')
                .next()
                .and_then(|rest| rest.split_whitespace().next())
                .is_some_and(|state| state != "Z")
        })
        .unwrap_or(false)
}
