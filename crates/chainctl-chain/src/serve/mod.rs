//! Serve supervisor
//!
//! Keeps a locally built node running while its sources change:
//! - Building: generate code if the proto fingerprint moved, then compile
//! - Running: node spawned, sources watched
//! - Restarting: a refresh arrived, the node is stopped and rebuilt; requests
//!   raised before the new node is up fold into this restart
//! - Idle: the node exited on its own, waiting for a refresh or shutdown
//! - Stopped: shutdown observed, node reaped, `serve` returns `Ok(())`
//!
//! One task drives the loop. The watcher thread and [`Refresher`] handles only
//! touch the single-slot refresh signal.

mod events;
mod fingerprint;
mod refresh;
mod watch;

pub use events::ServeEvent;
pub use fingerprint::Fingerprint;
pub use refresh::Refresher;
pub use watch::{SourceWatcher, WATCHED_PATHS};

use crate::chain::Chain;
use crate::codegen::{
    BufGenerator, CacheStorage, CodeGenerator, GenerateOptions, GoToolchain, Toolchain,
};
use crate::error::Result;
use crate::runner::NodeProcess;
use chainctl_config::Config;
use events::EventSink;
use refresh::RefreshSlot;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

/// Supervisor state owned by the coordinator
#[derive(Debug)]
pub(crate) struct ServeState {
    refresh: RefreshSlot,
    events: EventSink,
    last_generation: Option<Fingerprint>,
    session: Option<CancellationToken>,
}

impl ServeState {
    pub(crate) fn new(events: Option<UnboundedSender<ServeEvent>>) -> Self {
        Self {
            refresh: RefreshSlot::new(),
            events: EventSink::new(events),
            last_generation: None,
            session: None,
        }
    }
}

enum Wake {
    Shutdown,
    Refresh,
    Exited(ExitStatus),
}

struct Collaborators {
    generator: Arc<dyn CodeGenerator>,
    toolchain: Arc<dyn Toolchain>,
    cache: CacheStorage,
}

impl Chain {
    /// Handle for requesting a rebuild and restart
    #[must_use]
    pub fn refresher(&self) -> Refresher {
        self.serve.refresh.refresher()
    }

    /// Whether a serve session is active
    #[inline]
    #[must_use]
    pub fn is_serving(&self) -> bool {
        self.serve.session.is_some()
    }

    /// Fingerprint of the last successful code generation
    #[inline]
    #[must_use]
    pub fn last_generation(&self) -> Option<Fingerprint> {
        self.serve.last_generation
    }

    /// Build, run and supervise the node until `shutdown` fires
    ///
    /// # Errors
    /// - `ChainError::Generation` if code generation or compilation fails
    /// - `ChainError::Process` if the node cannot be started
    /// - any configuration or watch error hit while (re)building
    pub async fn serve(&mut self, shutdown: CancellationToken) -> Result<()> {
        let session = shutdown.child_token();
        self.serve.session = Some(session.clone());
        tracing::info!(app = self.app.name(), "serve session started");

        let result = self.supervise(&session).await;
        session.cancel();
        self.serve.session = None;
        self.serve.events.emit(ServeEvent::Stopped);

        match result {
            Err(e) if e.is_cancelled() => Ok(()),
            other => {
                tracing::info!(app = self.app.name(), ok = other.is_ok(), "serve session ended");
                other
            }
        }
    }

    async fn supervise(&mut self, session: &CancellationToken) -> Result<()> {
        let collaborators = self.collaborators();
        let mut watcher: Option<SourceWatcher> = None;

        loop {
            if session.is_cancelled() {
                return Ok(());
            }
            self.build(&collaborators, session).await?;

            let runner = self.commands()?;
            let step = runner.cmd().start(&[]);
            let mut node = runner.spawn(&step)?;
            tracing::info!(pid = node.id(), command = %step, "node started");
            self.serve.events.emit(ServeEvent::Started { pid: node.id() });

            if watcher.is_none() {
                watcher = Some(SourceWatcher::arm(self.app.path(), self.refresher())?);
            }
            self.settle_refresh().await?;

            match self.running(&mut node, session).await? {
                Wake::Shutdown => {
                    node.stop().await?;
                    return Ok(());
                }
                Wake::Refresh => {
                    tracing::info!("source change, restarting node");
                    self.serve.events.emit(ServeEvent::Restarting);
                    node.stop().await?;
                }
                Wake::Exited(status) => {
                    tracing::warn!(code = status.code(), "node exited, waiting for changes");
                    self.serve.events.emit(ServeEvent::Exited {
                        code: status.code(),
                    });
                    tokio::select! {
                        biased;
                        () = session.cancelled() => return Ok(()),
                        () = self.serve.refresh.requested() => {}
                    }
                }
            }
        }
    }

    async fn running(&mut self, node: &mut NodeProcess, session: &CancellationToken) -> Result<Wake> {
        tokio::select! {
            biased;
            () = session.cancelled() => Ok(Wake::Shutdown),
            () = self.serve.refresh.requested() => Ok(Wake::Refresh),
            status = node.wait() => status.map(Wake::Exited),
        }
    }

    /// Coalesce refresh requests raised while the node was being rebuilt
    ///
    /// The restart that just completed already covers them, unless the proto
    /// sources moved past what was last generated.
    async fn settle_refresh(&mut self) -> Result<()> {
        if !self.serve.refresh.drain() {
            return Ok(());
        }
        let fingerprint = self.proto_fingerprint(&self.config()?).await?;
        if self.serve.last_generation == Some(fingerprint) {
            tracing::debug!("coalesced refresh requests raised during rebuild");
        } else {
            tracing::info!(%fingerprint, "proto sources changed during rebuild");
            self.refresher().request();
        }
        Ok(())
    }

    async fn proto_fingerprint(&self, config: &Config) -> Result<Fingerprint> {
        let project = self.app.path();
        let roots = std::iter::once(&config.build.proto.path)
            .chain(&config.build.proto.third_party_paths)
            .map(|p| project.join(p))
            .collect();
        fingerprint::scan(self.source_revision.clone(), roots).await
    }

    async fn build(&mut self, tools: &Collaborators, cancel: &CancellationToken) -> Result<()> {
        let config = self.config()?;
        let project = self.app.path().to_path_buf();
        let proto = project.join(&config.build.proto.path);
        let fingerprint = self.proto_fingerprint(&config).await?;

        if self.serve.last_generation == Some(fingerprint) {
            tracing::debug!(%fingerprint, "proto sources unchanged, skipping code generation");
        } else {
            if self.options.check_dependencies {
                tools.toolchain.verify(cancel, &project).await?;
            }

            self.serve.events.emit(ServeEvent::Generating);
            let options =
                GenerateOptions::from_config(&self.app, &config, self.options.third_party_codegen);
            tools
                .generator
                .generate(cancel, &tools.cache, &project, &proto, &options)
                .await?;
            tools.toolchain.tidy(cancel, &project).await?;
            tools.toolchain.format(cancel, &project).await?;

            self.serve.last_generation = Some(fingerprint);
            if self.options.print_generated_paths {
                for path in options.output_paths() {
                    tracing::info!(path = %path.display(), "generated");
                }
            }
            self.serve.events.emit(ServeEvent::Generated);
            tracing::info!(%fingerprint, "code generated");
        }

        self.serve.events.emit(ServeEvent::Building);
        let main = if config.build.main.is_empty() {
            PathBuf::from("cmd").join(self.app.binary_name())
        } else {
            PathBuf::from(&config.build.main)
        };
        let binary = self.binary()?;
        tools
            .toolchain
            .install(cancel, &project, &main, &binary)
            .await?;
        tracing::info!(binary = %binary, "node binary built");
        Ok(())
    }

    fn collaborators(&self) -> Collaborators {
        Collaborators {
            generator: self
                .options
                .generator
                .clone()
                .unwrap_or_else(|| Arc::new(BufGenerator::default())),
            toolchain: self
                .options
                .toolchain
                .clone()
                .unwrap_or_else(|| Arc::new(GoToolchain::new(&self.env))),
            cache: self
                .options
                .cache
                .clone()
                .unwrap_or_else(|| CacheStorage::default_for(&self.env)),
        }
    }
}
