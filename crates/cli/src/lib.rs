use anyhow::{Context, Result};
use boundary_artifacts::{
    load_embeddings, load_traces, load_translation, write_json, CodebaseLayout, DendrogramExport,
    FileCutCache,
};
use boundary_cluster::{
    decompose_by_similarity, decompose_features, decompose_traces_to_entities, short_signature,
    sweep_weights, AccessAggregator, Cut, CutType, Decomposition, GranularitySearch,
    HierarchicalClusterer, Linkage, SimilarityMatrixBuilder, SimilarityWeights, SweepEntry,
    WeightGrid,
};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::io;
use std::path::PathBuf;

use crate::config::Settings;
use crate::flags::DendrogramSource;

mod config;
mod flags;

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    print_stdout(&serde_json::to_string_pretty(value)?)
}

#[derive(Parser)]
#[command(name = "boundary")]
#[command(about = "Service boundary discovery from runtime access traces", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,

    /// Root directory holding one directory per codebase
    /// (overrides BOUNDARY_CODEBASES_PATH and the config file)
    #[arg(long, global = true)]
    codebases_path: Option<PathBuf>,

    /// Config file (default: ./boundary.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Cluster entities by weighted access-trace similarity
    #[command(name = "similarity-cut")]
    SimilarityCut(SimilarityCutArgs),

    /// Cluster features by their embeddings
    #[command(name = "features-cut")]
    FeaturesCut(EmbeddingCutArgs),

    /// Cluster feature traces by embedding, then attribute entities to clusters
    #[command(name = "traces-cut")]
    TracesCut(EmbeddingCutArgs),

    /// Export a merge tree without cutting it
    Dendrogram(DendrogramArgs),

    /// Search entity cuts of growing size until the plausibility ceiling
    Analyse(AnalyseArgs),

    /// Evaluate every access/read-write/sequence weight combination
    #[command(name = "weight-sweep")]
    WeightSweep(WeightSweepArgs),
}

#[derive(Args)]
struct TargetArgs {
    /// Codebase directory name under the codebases path
    codebase: String,

    /// Dendrogram name (results directory inside the codebase)
    dendrogram: String,

    /// Decomposition name (default: derived from the cut, e.g. N3 or H0.5)
    graph: Option<String>,
}

#[derive(Args)]
struct CutArgs {
    /// Cut type: H|height or N|count
    #[arg(long)]
    cut_type: CutType,

    /// Height threshold, or number of clusters for a count cut
    #[arg(long)]
    cut_value: f64,
}

impl CutArgs {
    fn cut(&self) -> Cut {
        Cut {
            kind: self.cut_type,
            value: self.cut_value,
        }
    }
}

#[derive(Args)]
struct WeightArgs {
    /// Weight of the shared-controller metric
    #[arg(long)]
    access: Option<f64>,

    /// Weight of the shared-writer metric
    #[arg(long)]
    read_write: Option<f64>,

    /// Weight of the consecutive-access metric
    #[arg(long)]
    sequence: Option<f64>,
}

impl WeightArgs {
    fn resolve(&self, defaults: SimilarityWeights) -> Result<SimilarityWeights> {
        SimilarityWeights::new(
            self.access.unwrap_or(defaults.access),
            self.read_write.unwrap_or(defaults.read_write),
            self.sequence.unwrap_or(defaults.sequence),
        )
        .context("Invalid similarity weights")
    }
}

#[derive(Args)]
struct SimilarityCutArgs {
    #[command(flatten)]
    target: TargetArgs,

    #[command(flatten)]
    cut: CutArgs,

    /// Linkage method (default from config, else average)
    #[arg(long)]
    linkage: Option<Linkage>,

    #[command(flatten)]
    weights: WeightArgs,
}

#[derive(Args)]
struct EmbeddingCutArgs {
    #[command(flatten)]
    target: TargetArgs,

    #[command(flatten)]
    cut: CutArgs,
}

#[derive(Args)]
struct DendrogramArgs {
    codebase: String,

    dendrogram: String,

    /// Artifact the merge tree is built from
    #[arg(long, value_enum, default_value = "features")]
    source: DendrogramSource,

    /// Linkage method (overrides the embedding file's; similarity default from config)
    #[arg(long)]
    linkage: Option<Linkage>,

    #[command(flatten)]
    weights: WeightArgs,
}

#[derive(Args)]
struct AnalyseArgs {
    codebase: String,
}

#[derive(Args)]
struct WeightSweepArgs {
    codebase: String,

    dendrogram: String,

    #[command(flatten)]
    cut: CutArgs,

    /// Linkage method (default from config, else average)
    #[arg(long)]
    linkage: Option<Linkage>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DecompositionSummary {
    codebase: String,
    dendrogram: String,
    graph: String,
    cut: String,
    cluster_count: usize,
    quality_score: f64,
    clusters_path: PathBuf,
    dendrogram_path: PathBuf,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DendrogramSummary {
    codebase: String,
    dendrogram: String,
    source: &'static str,
    linkage_method: Linkage,
    leaf_count: usize,
    max_height: f64,
    path: PathBuf,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SweepSummary {
    path: PathBuf,
    entries: Vec<SweepEntry>,
}

pub fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let settings = Settings::resolve(cli.codebases_path.as_deref(), cli.config.as_deref())?;

    match cli.command {
        Commands::SimilarityCut(args) => run_similarity_cut(args, &settings),
        Commands::FeaturesCut(args) => run_features_cut(args, &settings),
        Commands::TracesCut(args) => run_traces_cut(args, &settings),
        Commands::Dendrogram(args) => run_dendrogram(args, &settings),
        Commands::Analyse(args) => run_analyse(args, &settings),
        Commands::WeightSweep(args) => run_weight_sweep(args, &settings),
    }
}

fn run_similarity_cut(args: SimilarityCutArgs, settings: &Settings) -> Result<()> {
    let layout = CodebaseLayout::new(&settings.codebases_path, &args.target.codebase);
    let traces = load_traces(&layout.datafile())?;
    let linkage = args.linkage.unwrap_or(settings.default_linkage);
    let weights = args.weights.resolve(settings.weights)?;
    let cut = args.cut.cut();

    let decomposition = decompose_by_similarity(&traces, linkage, cut, weights)
        .with_context(|| format!("Similarity decomposition of {} failed", layout.dir().display()))?;
    persist_decomposition(&layout, &args.target, cut, &decomposition)
}

fn run_features_cut(args: EmbeddingCutArgs, settings: &Settings) -> Result<()> {
    let layout = CodebaseLayout::new(&settings.codebases_path, &args.target.codebase);
    let features = load_embeddings(&layout.features_embeddings())?;
    let cut = args.cut.cut();

    let decomposition = decompose_features(&features, cut)
        .with_context(|| format!("Feature decomposition of {} failed", layout.dir().display()))?;
    persist_decomposition(&layout, &args.target, cut, &decomposition)
}

fn run_traces_cut(args: EmbeddingCutArgs, settings: &Settings) -> Result<()> {
    let layout = CodebaseLayout::new(&settings.codebases_path, &args.target.codebase);
    let feature_traces = load_embeddings(&layout.traces_embeddings())?;
    let accesses = load_traces(&layout.datafile())?;
    let translation = load_translation(&layout.translation())?;
    let cut = args.cut.cut();

    let decomposition = decompose_traces_to_entities(
        &feature_traces,
        &accesses,
        translation.entities(),
        cut,
    )
    .with_context(|| format!("Trace decomposition of {} failed", layout.dir().display()))?;
    persist_decomposition(&layout, &args.target, cut, &decomposition)
}

fn persist_decomposition(
    layout: &CodebaseLayout,
    target: &TargetArgs,
    cut: Cut,
    decomposition: &Decomposition,
) -> Result<()> {
    let graph = match &target.graph {
        Some(graph) => graph.clone(),
        None => {
            let existing = layout.existing_graphs(&target.dendrogram);
            cut.unique_name(existing.iter().map(String::as_str))
        }
    };

    let clusters_path = layout.clusters(&target.dendrogram, &graph);
    write_json(&clusters_path, &decomposition.result)?;

    let dendrogram_path = layout.dendrogram_export(&target.dendrogram);
    let export = DendrogramExport::new(&decomposition.tree, decomposition.leaves.clone());
    write_json(&dendrogram_path, &export)?;

    log::info!(
        "Decomposition {graph}: {} clusters, quality {:.2}",
        decomposition.cluster_count(),
        decomposition.result.quality_score
    );

    print_json(&DecompositionSummary {
        codebase: target.codebase.clone(),
        dendrogram: target.dendrogram.clone(),
        graph,
        cut: cut.name(),
        cluster_count: decomposition.cluster_count(),
        quality_score: decomposition.result.quality_score,
        clusters_path,
        dendrogram_path,
    })
}

fn run_dendrogram(args: DendrogramArgs, settings: &Settings) -> Result<()> {
    let layout = CodebaseLayout::new(&settings.codebases_path, &args.codebase);

    let export = match args.source {
        DendrogramSource::Similarity => {
            let traces = load_traces(&layout.datafile())?;
            let weights = args.weights.resolve(settings.weights)?;
            let linkage = args.linkage.unwrap_or(settings.default_linkage);
            let profile = AccessAggregator::aggregate(&traces);
            let matrix = SimilarityMatrixBuilder::new(weights)?.build(&profile, &traces)?;
            let tree = HierarchicalClusterer::new(linkage).cluster(&matrix.values)?;
            DendrogramExport::new(&tree, matrix.labels)
        }
        source => {
            let path = match source {
                DendrogramSource::Features => layout.features_embeddings(),
                DendrogramSource::Entities => layout.entities_embeddings(),
                _ => layout.traces_embeddings(),
            };
            let set = load_embeddings(&path)?;
            let linkage = args.linkage.unwrap_or(set.linkage);
            let tree = HierarchicalClusterer::new(linkage).cluster(&set.matrix()?)?;
            let labels = set
                .names()
                .map(|name| match source {
                    DendrogramSource::Features => short_signature(name).to_string(),
                    _ => name.to_string(),
                })
                .collect();
            DendrogramExport::new(&tree, labels)
        }
    };

    let path = layout.dendrogram_export(&args.dendrogram);
    write_json(&path, &export)?;

    print_json(&DendrogramSummary {
        codebase: args.codebase,
        dendrogram: args.dendrogram,
        source: args.source.as_str(),
        linkage_method: export.linkage_method,
        leaf_count: export.labels.len(),
        max_height: export.max_height(),
        path,
    })
}

fn run_analyse(args: AnalyseArgs, settings: &Settings) -> Result<()> {
    let layout = CodebaseLayout::new(&settings.codebases_path, &args.codebase);
    let entities = load_embeddings(&layout.entities_embeddings())?;
    let mut cache = FileCutCache::new(layout.clone());

    let report = GranularitySearch::new(&mut cache)
        .run(&entities)
        .with_context(|| format!("Granularity search of {} failed", layout.dir().display()))?;

    match report.last_persisted() {
        Some(size) => log::info!(
            "Recorded cuts up to {size} clusters under {}",
            layout.cuts_dir().display()
        ),
        None => log::info!("No new cuts recorded for {}", args.codebase),
    }
    print_json(&report)
}

fn run_weight_sweep(args: WeightSweepArgs, settings: &Settings) -> Result<()> {
    let layout = CodebaseLayout::new(&settings.codebases_path, &args.codebase);
    let traces = load_traces(&layout.datafile())?;
    let linkage = args.linkage.unwrap_or(settings.default_linkage);

    let entries = sweep_weights(
        &traces,
        linkage,
        args.cut.cut(),
        &WeightGrid::default(),
        &args.dendrogram,
    )
    .with_context(|| format!("Weight sweep of {} failed", layout.dir().display()))?;

    let path = layout.weight_sweep(&args.dendrogram);
    write_json(&path, &entries)?;
    log::info!("Evaluated {} weight combinations", entries.len());

    print_json(&SweepSummary { path, entries })
}
