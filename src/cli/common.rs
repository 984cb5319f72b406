//! Arguments and plumbing shared by the commands that resolve a graph.

use anyhow::{Context, Result, anyhow};
use clap::Args;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::GlobalConfig;
use crate::core::CpkgError;
use crate::graph::{GraphManager, GraphRequest, PackageIdAnalyzer, Resolution, RootTarget};
use crate::loader::{ConsumerOptions, TomlRecipeLoader};
use crate::lockfile::GraphLockFile;
use crate::model::{Profile, Reference};

/// What to resolve and how.
#[derive(Args, Debug, Clone)]
pub struct ResolveArgs {
    /// Recipe file or folder, or one or more package references
    ///
    /// A single target is a path when it exists or contains no `/`.
    #[arg(required = true, value_name = "TARGET")]
    pub targets: Vec<String>,

    /// Profile file (defaults to the configured default profile)
    #[arg(short = 'p', long)]
    pub profile: Option<PathBuf>,

    /// Build policy: never, missing, cascade, or a package pattern
    ///
    /// May be repeated. A bare `--build` builds every package.
    #[arg(short = 'b', long = "build", value_name = "POLICY", num_args = 0..=1, default_missing_value = "*")]
    pub build: Vec<String>,

    /// Resolve against an existing lock
    #[arg(short = 'l', long)]
    pub lockfile: Option<PathBuf>,

    /// Look for newer recipes and binaries in the remotes
    #[arg(short = 'u', long)]
    pub update: bool,

    /// Do not expand build requirements
    #[arg(long)]
    pub no_build_requires: bool,

    /// Folder with the state of a previous install of the recipe
    #[arg(long, value_name = "DIR")]
    pub install_folder: Option<PathBuf>,

    /// Resolve the recipe as the test consumer of this package
    #[arg(long, value_name = "REFERENCE")]
    pub test_reference: Option<String>,
}

/// A resolution with the profile it ran with.
#[derive(Debug)]
pub struct ResolvedGraph {
    pub resolution: Resolution,
    pub profile: Profile,
    /// The `--lockfile` input, kept so rewriting it preserves fields this
    /// version does not know.
    pub lockfile: Option<GraphLockFile>,
}

impl ResolveArgs {
    /// Resolve on a blocking thread. Ctrl-C abandons the resolution before
    /// anything is written.
    pub async fn resolve(&self, config: &GlobalConfig) -> Result<ResolvedGraph> {
        let args = self.clone();
        let config = config.clone();
        let task = tokio::task::spawn_blocking(move || args.resolve_blocking(&config));

        tokio::select! {
            joined = task => joined.context("Resolution task failed")?,
            _ = tokio::signal::ctrl_c() => Err(CpkgError::Other {
                message: "Interrupted, nothing was written".to_string(),
            }
            .into()),
        }
    }

    fn resolve_blocking(&self, config: &GlobalConfig) -> Result<ResolvedGraph> {
        let target = parse_targets(&self.targets)?;
        let registry = config.registry()?;
        let loader = TomlRecipeLoader::new();
        let mut profile = config.profile(self.profile.as_deref())?;
        let mut consumer = ConsumerOptions::default();

        if let (RootTarget::Path(path), Some(folder)) = (&target, &self.install_folder) {
            let analyzer = PackageIdAnalyzer::new(profile.clone(), config.package_id_mode);
            let local = GraphManager::new(&loader, &registry, &analyzer)
                .load_consumer_recipe(path, Some(folder), &profile)?;
            debug!("Loaded {} with the state of {}", local.recipe.display_name(), folder.display());
            profile = local.profile;
            consumer = local.options;
        }

        let lockfile = match &self.lockfile {
            Some(path) => {
                if self.profile.is_some() {
                    return Err(anyhow!(
                        "--profile cannot be combined with --lockfile, the lock carries its own profile"
                    ));
                }
                let lockfile = GraphLockFile::load(path)?
                    .ok_or_else(|| anyhow!("Lockfile {} not found", path.display()))?;
                profile = lockfile.profile.clone();
                Some(lockfile)
            }
            None => None,
        };

        let analyzer = PackageIdAnalyzer::new(profile.clone(), config.package_id_mode);
        let manager = GraphManager::new(&loader, &registry, &analyzer)
            .with_editables(config.editable_paths()?)
            .with_revisions(config.revisions_enabled);

        let mut request = GraphRequest::new(target, profile.clone())
            .with_consumer(consumer)
            .with_build_patterns(self.build.iter().cloned())
            .with_lock(lockfile.as_ref().map(|file| file.graph_lock.clone()))
            .with_update(self.update)
            .with_build_requires(!self.no_build_requires);
        if let Some(reference) = &self.test_reference {
            request = request.with_create_reference(Reference::parse(reference)?);
        }

        let resolution = manager.load_graph(request)?;
        Ok(ResolvedGraph {
            resolution,
            profile,
            lockfile,
        })
    }
}

/// Interpret the positional targets.
pub fn parse_targets(targets: &[String]) -> Result<RootTarget> {
    if let [single] = targets {
        let path = Path::new(single);
        if path.exists() || !single.contains('/') {
            return Ok(RootTarget::Path(path.to_path_buf()));
        }
        return Ok(RootTarget::Reference(Reference::parse(single)?));
    }

    let references = targets.iter().map(|target| Reference::parse(target)).collect::<Result<Vec<_>>>()?;
    Ok(RootTarget::References(references))
}
