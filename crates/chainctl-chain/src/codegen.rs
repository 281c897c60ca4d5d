//! Code generation and Go toolchain seams
//!
//! The serve loop only talks to the [`CodeGenerator`] and [`Toolchain`]
//! traits. The default implementations shell out to `buf` and `go`; tests
//! substitute recording doubles.

use crate::app::App;
use crate::chaincmd::Step;
use crate::env::Environment;
use crate::error::{ChainError, GenerationError, ProcessError};
use crate::runner::run_step;
use async_trait::async_trait;
use chainctl_config::Config;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Cache directory shared by generation runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStorage {
    root: PathBuf,
}

impl CacheStorage {
    /// Cache rooted at `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `$HOME/.chainctl/cache`, or a temp dir without `HOME`
    #[must_use]
    pub fn default_for(env: &Environment) -> Self {
        let base = env
            .get("HOME")
            .map_or_else(std::env::temp_dir, PathBuf::from);
        Self::new(base.join(".chainctl").join("cache"))
    }

    /// Cache root
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Subdirectory for one tool
    #[must_use]
    pub fn dir(&self, tool: &str) -> PathBuf {
        self.root.join(tool)
    }
}

/// Inputs of one generation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Go module path of the application
    pub go_module_path: String,
    /// Extra proto include directories
    pub include_dirs: Vec<PathBuf>,
    /// Generate code for third-party modules too
    pub third_party_modules: bool,
    /// TypeScript client output
    pub ts_client: Option<PathBuf>,
    /// Vuex store output
    pub vuex: Option<PathBuf>,
    /// `OpenAPI` spec output
    pub openapi: Option<PathBuf>,
}

impl GenerateOptions {
    /// Derive options from the chain config
    #[must_use]
    pub fn from_config(app: &App, config: &Config, third_party_modules: bool) -> Self {
        let under_app = |p: &str| (!p.is_empty()).then(|| app.path().join(p));
        Self {
            go_module_path: app.module_path().to_string(),
            include_dirs: config
                .build
                .proto
                .third_party_paths
                .iter()
                .map(|p| app.path().join(p))
                .collect(),
            third_party_modules,
            ts_client: config
                .wants_ts_client()
                .then(|| app.path().join(config.ts_client_path())),
            vuex: under_app(&config.client.vuex.path),
            openapi: under_app(&config.client.openapi.path),
        }
    }

    /// Every output path written besides Go code
    #[must_use]
    pub fn output_paths(&self) -> Vec<&Path> {
        [&self.ts_client, &self.vuex, &self.openapi]
            .into_iter()
            .flatten()
            .map(PathBuf::as_path)
            .collect()
    }
}

/// Generates Go code (and optional clients) from proto files
#[async_trait]
pub trait CodeGenerator: Send + Sync + fmt::Debug {
    /// Generate for the project at `project`
    ///
    /// # Errors
    /// `GenerationError` on failure or cancellation.
    async fn generate(
        &self,
        cancel: &CancellationToken,
        cache: &CacheStorage,
        project: &Path,
        proto: &Path,
        options: &GenerateOptions,
    ) -> Result<(), GenerationError>;
}

/// Go toolchain steps around generation and build
#[async_trait]
pub trait Toolchain: Send + Sync + fmt::Debug {
    /// Verify module dependencies
    async fn verify(&self, cancel: &CancellationToken, project: &Path)
        -> Result<(), GenerationError>;

    /// Tidy module dependencies
    async fn tidy(&self, cancel: &CancellationToken, project: &Path)
        -> Result<(), GenerationError>;

    /// Format sources
    async fn format(&self, cancel: &CancellationToken, project: &Path)
        -> Result<(), GenerationError>;

    /// Build and install the node binary
    async fn install(
        &self,
        cancel: &CancellationToken,
        project: &Path,
        main: &Path,
        binary: &str,
    ) -> Result<(), GenerationError>;
}

async fn run_stage(
    stage: &'static str,
    step: Step,
    cancel: &CancellationToken,
) -> Result<(), GenerationError> {
    tracing::debug!(stage, command = %step, "running toolchain stage");
    match run_step(&step, cancel, None).await {
        Ok(_) => Ok(()),
        Err(ChainError::Cancelled) => Err(GenerationError::Cancelled { stage }),
        Err(ChainError::Process(ProcessError::Exit { stderr, .. })) => {
            Err(GenerationError::failed(stage, stderr))
        }
        Err(ChainError::Process(source)) => Err(GenerationError::Process { stage, source }),
        Err(other) => Err(GenerationError::failed(stage, other.to_string())),
    }
}

/// `buf`-driven generator
///
/// Expects the `buf.gen.*.yaml` templates next to the proto sources.
#[derive(Debug, Clone)]
pub struct BufGenerator {
    program: PathBuf,
}

impl Default for BufGenerator {
    fn default() -> Self {
        Self {
            program: PathBuf::from("buf"),
        }
    }
}

impl BufGenerator {
    /// Go template
    pub const GO_TEMPLATE: &'static str = "buf.gen.gogo.yaml";
    /// TypeScript template
    pub const TS_TEMPLATE: &'static str = "buf.gen.ts.yaml";
    /// Vuex template
    pub const VUEX_TEMPLATE: &'static str = "buf.gen.vuex.yaml";
    /// `OpenAPI` template
    pub const OPENAPI_TEMPLATE: &'static str = "buf.gen.swagger.yaml";

    /// Use a specific `buf` binary
    #[must_use]
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn step(&self, cache: &CacheStorage, input: &Path, proto: &Path, template: &str, out: &Path) -> Step {
        Step::new(&self.program)
            .args(["generate".to_string(), input.display().to_string()])
            .args(["--template".to_string(), proto.join(template).display().to_string()])
            .args(["--output".to_string(), out.display().to_string()])
            .env("BUF_CACHE_DIR", cache.dir("buf").display().to_string())
    }
}

#[async_trait]
impl CodeGenerator for BufGenerator {
    async fn generate(
        &self,
        cancel: &CancellationToken,
        cache: &CacheStorage,
        project: &Path,
        proto: &Path,
        options: &GenerateOptions,
    ) -> Result<(), GenerationError> {
        let mut inputs = vec![proto.to_path_buf()];
        if options.third_party_modules {
            inputs.extend(options.include_dirs.iter().filter(|d| d.is_dir()).cloned());
        }

        for input in &inputs {
            let step = self
                .step(cache, input, proto, Self::GO_TEMPLATE, project)
                .current_dir(project);
            run_stage("generate go", step, cancel).await?;
        }

        let clients = [
            ("generate typescript", Self::TS_TEMPLATE, &options.ts_client),
            ("generate vuex", Self::VUEX_TEMPLATE, &options.vuex),
            ("generate openapi", Self::OPENAPI_TEMPLATE, &options.openapi),
        ];
        for (stage, template, out) in clients {
            let Some(out) = out else { continue };
            if !proto.join(template).is_file() {
                tracing::debug!(stage, template, "template missing, skipping");
                continue;
            }
            let step = self.step(cache, proto, proto, template, out).current_dir(project);
            run_stage(stage, step, cancel).await?;
        }

        Ok(())
    }
}

/// `go`-driven toolchain
#[derive(Debug, Clone)]
pub struct GoToolchain {
    program: PathBuf,
    bin_dir: PathBuf,
}

impl GoToolchain {
    /// Toolchain installing into the first Go binary directory of `env`
    #[must_use]
    pub fn new(env: &Environment) -> Self {
        let bin_dir = env
            .go_bin_dirs()
            .into_iter()
            .next()
            .unwrap_or_else(|| PathBuf::from("bin"));
        Self {
            program: PathBuf::from("go"),
            bin_dir,
        }
    }

    /// Install directory
    #[inline]
    #[must_use]
    pub fn bin_dir(&self) -> &Path {
        &self.bin_dir
    }

    fn go(&self, project: &Path) -> Step {
        Step::new(&self.program).current_dir(project)
    }
}

#[async_trait]
impl Toolchain for GoToolchain {
    async fn verify(&self, cancel: &CancellationToken, project: &Path) -> Result<(), GenerationError> {
        run_stage("go mod verify", self.go(project).args(["mod", "verify"]), cancel).await
    }

    async fn tidy(&self, cancel: &CancellationToken, project: &Path) -> Result<(), GenerationError> {
        run_stage("go mod tidy", self.go(project).args(["mod", "tidy"]), cancel).await
    }

    async fn format(&self, cancel: &CancellationToken, project: &Path) -> Result<(), GenerationError> {
        run_stage("go fmt", self.go(project).args(["fmt", "./..."]), cancel).await
    }

    async fn install(
        &self,
        cancel: &CancellationToken,
        project: &Path,
        main: &Path,
        binary: &str,
    ) -> Result<(), GenerationError> {
        let output = self.bin_dir.join(binary);
        let package = format!("./{}", main.display());
        let step = self.go(project).args([
            "build".to_string(),
            "-mod=readonly".to_string(),
            "-o".to_string(),
            output.display().to_string(),
            package,
        ]);
        run_stage("go build", step, cancel).await
    }
}
