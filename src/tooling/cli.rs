//! CLI Tooling
//!
//! Command-line interface over a [`Session`]. `open` loads a container and
//! keeps it in sync until interrupted; the other commands attach to the cache
//! a running `open` maintains, or create it when there is none.

use crate::codec::{ArchiveCodec, ZipCodec};
use crate::config::{ConfigLoader, PartMirrorConfig};
use crate::error::{ApiError, StorageError};
use crate::session::Session;
use crate::tooling::format::{format_report, format_status_json, format_status_text, format_tree};
use crate::tree::PartTree;
use crate::watch::{DaemonHandle, EditorSurface, SyncDaemon, TreeView};
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// partmirror - edit the parts of zip-based documents as ordinary files
#[derive(Debug, Parser)]
#[command(name = "partmirror")]
#[command(about = "Mirror the parts of a zip-based document into editable cache files")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (overrides default config loading)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, global = true, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long, global = true)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Load a container into its cache and keep both in sync until Ctrl-C
    Open {
        container: PathBuf,
        /// Quiet period before a batch of changes is processed
        #[arg(long)]
        debounce_ms: Option<u64>,
        /// Longest a batch of changes may wait
        #[arg(long)]
        batch_window_ms: Option<u64>,
        /// Leave the cache in place on exit
        #[arg(long)]
        keep_cache: bool,
    },
    /// Print the editable cache file of a part
    View { container: PathBuf, part: String },
    /// Print the two cache files to diff for a part
    Diff { container: PathBuf, part: String },
    /// Show how every part compares to the container
    Status {
        container: PathBuf,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Discard the cache, including unsaved edits, and load again
    Reset {
        container: PathBuf,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Delete the cache of a container
    Close { container: PathBuf },
}

impl Commands {
    pub fn container(&self) -> &Path {
        match self {
            Commands::Open { container, .. }
            | Commands::View { container, .. }
            | Commands::Diff { container, .. }
            | Commands::Status { container, .. }
            | Commands::Reset { container, .. }
            | Commands::Close { container } => container,
        }
    }
}

impl Cli {
    /// Load configuration for the command's container and apply logging flags.
    pub fn load_config(&self) -> Result<PartMirrorConfig, ApiError> {
        let mut config = match &self.config {
            Some(path) => ConfigLoader::load_from_file(path).map_err(|e| {
                ApiError::ConfigError(format!(
                    "Failed to load config from {}: {}",
                    path.display(),
                    e
                ))
            })?,
            None => ConfigLoader::load(self.command.container())?,
        };
        if self.verbose {
            config.logging.level = "debug".to_string();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.logging.format = format.clone();
        }
        if let Some(output) = &self.log_output {
            config.logging.output = output.clone();
        }
        if let Some(file) = &self.log_file {
            config.logging.file = Some(file.clone());
        }
        Ok(config)
    }
}

/// Editor surface for a terminal: prints what a GUI host would render
#[derive(Debug, Default)]
pub struct TerminalEditor {
    /// Print the tree after every pass
    live: bool,
}

impl TerminalEditor {
    pub fn live() -> Self {
        Self { live: true }
    }
}

impl EditorSurface for TerminalEditor {
    fn open(&self, path: &Path) {
        tracing::debug!(path = %path.display(), "Open requested");
    }

    fn diff(&self, left: &Path, right: &Path, title: &str) {
        tracing::debug!(left = %left.display(), right = %right.display(), title, "Diff requested");
    }

    fn close_all_tabs_under(&self, prefix: &Path) {
        if self.live {
            eprintln!("Close any files open under {}", prefix.display());
        }
    }

    fn force_dirty(&self, path: &Path) {
        eprintln!("{} {}", "Save again:".yellow(), path.display());
    }

    fn show_warning(&self, message: &str) {
        eprintln!("{} {}", "warning:".yellow().bold(), message);
    }
}

impl TreeView for TerminalEditor {
    fn refresh(&self, tree: &PartTree) {
        if self.live && !tree.is_empty() {
            eprint!("{}", format_tree(tree));
        }
    }
}

/// Stops a running `open` from another thread. A trigger that arrives before
/// the daemon starts is remembered.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    inner: Arc<Mutex<ShutdownState>>,
}

#[derive(Debug, Default)]
struct ShutdownState {
    requested: bool,
    daemon: Option<DaemonHandle>,
}

impl ShutdownSignal {
    pub fn trigger(&self) {
        let mut state = self.inner.lock();
        state.requested = true;
        if let Some(handle) = &state.daemon {
            handle.stop();
        }
    }

    fn attach(&self, handle: DaemonHandle) {
        let mut state = self.inner.lock();
        if state.requested {
            handle.stop();
        }
        state.daemon = Some(handle);
    }
}

/// CLI context for running commands against one configuration
pub struct CliContext {
    config: PartMirrorConfig,
    codec: Arc<dyn ArchiveCodec>,
    shutdown: ShutdownSignal,
}

impl CliContext {
    pub fn new(config: PartMirrorConfig) -> Self {
        Self {
            config,
            codec: Arc::new(ZipCodec::new()),
            shutdown: ShutdownSignal::default(),
        }
    }

    pub fn config(&self) -> &PartMirrorConfig {
        &self.config
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Run a command and return what to print on stdout.
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Open {
                container,
                debounce_ms,
                batch_window_ms,
                keep_cache,
            } => {
                let mut watch_config = self.config.watch.clone();
                if let Some(ms) = debounce_ms {
                    watch_config.debounce_ms = *ms;
                }
                if let Some(ms) = batch_window_ms {
                    watch_config.batch_window_ms = *ms;
                }
                if *keep_cache {
                    watch_config.purge_on_exit = false;
                }

                let editor = Arc::new(TerminalEditor::live());
                let mut session = self.session(container, editor)?;
                let report = session.open()?;
                println!("{}", format_report(&report));
                println!("Cache: {}", session.store().root().display());

                let rt = tokio::runtime::Runtime::new()
                    .map_err(|e| ApiError::WatchError(format!("Failed to create runtime: {}", e)))?;
                let daemon = SyncDaemon::new(session, watch_config);
                let handle = daemon.handle();
                self.shutdown.attach(handle.clone());

                info!("Starting sync daemon");
                rt.block_on(async {
                    let run = daemon.run();
                    tokio::pin!(run);
                    tokio::select! {
                        result = &mut run => result,
                        _ = tokio::signal::ctrl_c() => {
                            info!("Interrupted; shutting down");
                            handle.stop();
                            run.await
                        }
                    }
                })?;
                Ok("Stopped watching".to_string())
            }
            Commands::View { container, part } => {
                let mut session = self.session(container, Arc::new(TerminalEditor::default()))?;
                session.attach()?;
                let path = session.view_part(part)?;
                Ok(path.display().to_string())
            }
            Commands::Diff { container, part } => {
                let mut session = self.session(container, Arc::new(TerminalEditor::default()))?;
                session.attach()?;
                let target = session.diff_part(part)?;
                Ok(format!(
                    "{}\n{}\n{}",
                    target.title,
                    target.left.display(),
                    target.right.display()
                ))
            }
            Commands::Status { container, format } => {
                let mut session = self.session(container, Arc::new(TerminalEditor::default()))?;
                session.attach()?;
                let parts = session.status()?;
                match format.as_str() {
                    "json" => format_status_json(session.container(), &parts),
                    "text" => Ok(format_status_text(session.container(), &parts)),
                    other => Err(ApiError::ConfigError(format!(
                        "Invalid format: {} (must be 'text' or 'json')",
                        other
                    ))),
                }
            }
            Commands::Reset { container, yes } => {
                if !*yes {
                    use dialoguer::Confirm;
                    let confirmed = Confirm::new()
                        .with_prompt(format!(
                            "Discard the cache of {} and every unsaved edit in it?",
                            container.display()
                        ))
                        .interact()
                        .map_err(|e| {
                            ApiError::ConfigError(format!("Failed to get user input: {}", e))
                        })?;
                    if !confirmed {
                        return Ok("Reset cancelled".to_string());
                    }
                }
                let mut session = self.session(container, Arc::new(TerminalEditor::default()))?;
                let report = session.reset()?;
                Ok(format_report(&report))
            }
            Commands::Close { container } => {
                let mut session = self.session(container, Arc::new(TerminalEditor::default()))?;
                let root = session.store().root().to_path_buf();
                session.close()?;
                Ok(format!("Removed {}", root.display()))
            }
        }
    }

    fn session(&self, container: &Path, editor: Arc<TerminalEditor>) -> Result<Session, ApiError> {
        let container = dunce::canonicalize(container).map_err(|e| StorageError::at(container, e))?;
        Ok(Session::from_config(
            container,
            &self.config,
            Arc::clone(&self.codec),
            Arc::clone(&editor) as Arc<dyn EditorSurface>,
            editor,
        ))
    }
}
