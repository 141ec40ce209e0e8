//! RDD - Reference Data-Driven counts CLI
//!
//! Command-line interface for building RDD count tables from molecular
//! networks and deriving flows, proportions and PCA from them.

use clap::{Args, Parser, Subcommand, ValueEnum};
use gnps_rdd::analysis::perform_pca;
use gnps_rdd::data::SampleTypeFilter;
use gnps_rdd::error::Result;
use gnps_rdd::filter::GroupSelection;
use gnps_rdd::flow::NoiseFloor;
use gnps_rdd::pipeline::{DirectorySource, NetworkSource, RddConfig, RddCounts};
use log::info;
use std::path::{Path, PathBuf};

/// CLI-friendly sample type enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliSampleType {
    /// Every reference file
    All,
    /// Single-ingredient references only
    Simple,
    /// Multi-ingredient references only
    Complex,
}

impl From<CliSampleType> for SampleTypeFilter {
    fn from(value: CliSampleType) -> Self {
        match value {
            CliSampleType::All => SampleTypeFilter::All,
            CliSampleType::Simple => SampleTypeFilter::Simple,
            CliSampleType::Complex => SampleTypeFilter::Complex,
        }
    }
}

/// Reference Data-Driven counts for molecular networks
#[derive(Parser)]
#[command(name = "rdd")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Inputs shared by every subcommand. Flags override the config file.
#[derive(Args, Debug)]
struct InputArgs {
    /// YAML or JSON run configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Network clustering table (CSV/TSV)
    #[arg(short, long)]
    network: Option<PathBuf>,

    /// Network task id, resolved in --network-dir
    #[arg(long)]
    task_id: Option<String>,

    /// Directory holding downloaded network tables named <task_id>.tsv
    #[arg(long, default_value = ".")]
    network_dir: PathBuf,

    /// Reference metadata (default: bundled foodomics ontology)
    #[arg(short, long)]
    reference: Option<PathBuf>,

    /// Sample metadata (default: derived from DefaultGroups)
    #[arg(short, long)]
    sample_metadata: Option<PathBuf>,

    /// Grouping column of the sample metadata
    #[arg(long)]
    group_column: Option<String>,

    /// Sample groups to include (comma-separated)
    #[arg(long, value_delimiter = ',')]
    sample_groups: Vec<String>,

    /// Reference groups to include (comma-separated)
    #[arg(long, value_delimiter = ',')]
    reference_groups: Vec<String>,

    /// Reference sample type
    #[arg(long, value_enum)]
    sample_type: Option<CliSampleType>,

    /// Ontology depth
    #[arg(short, long)]
    levels: Option<usize>,

    /// Custom ontology columns, level 1 first (comma-separated)
    #[arg(long, value_delimiter = ',')]
    ontology_columns: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the long-form count table
    Counts {
        #[command(flatten)]
        input: InputArgs,

        /// Output path for the count table TSV
        #[arg(short, long)]
        output: PathBuf,

        /// Only write this level
        #[arg(long)]
        level: Option<usize>,

        /// Keep the N reference types with the highest total (requires --level)
        #[arg(long, requires = "level")]
        top_n: Option<usize>,
    },

    /// Write flow edge and node tables
    Flows {
        #[command(flatten)]
        input: InputArgs,

        /// Output directory
        #[arg(short, long)]
        output_dir: PathBuf,

        /// File name prefix
        #[arg(long, default_value = "flow")]
        prefix: String,

        /// Deepest ontology level in the flow
        #[arg(long, default_value = "3")]
        max_level: usize,

        /// Restrict to one sample file (count-table flows only)
        #[arg(long)]
        filename: Option<String>,

        /// Build from the network clusters instead of the count table
        #[arg(long)]
        from_network: bool,

        /// Background category for noise-floor pruning (network flows only)
        #[arg(long, requires = "from_network")]
        noise_floor: Option<String>,

        /// Ontology level of the background category
        #[arg(long, default_value = "1")]
        noise_level: usize,
    },

    /// Write a wide proportion table, or CLR values with --clr-offset
    Proportions {
        #[command(flatten)]
        input: InputArgs,

        /// Ontology level
        #[arg(long, default_value = "3")]
        level: usize,

        /// Apply CLR to raw counts with this offset
        #[arg(long)]
        clr_offset: Option<f64>,

        /// Output path for the wide TSV
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Principal component analysis of one level
    Pca {
        #[command(flatten)]
        input: InputArgs,

        /// Ontology level
        #[arg(long, default_value = "3")]
        level: usize,

        /// Number of components
        #[arg(long, default_value = "2")]
        n_components: usize,

        /// Apply CLR with this offset before PCA
        #[arg(long)]
        clr_offset: Option<f64>,

        /// Output path for the scores TSV
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Apply a filename -> group mapping file and write the count table
    Regroup {
        #[command(flatten)]
        input: InputArgs,

        /// Mapping file with a filename column
        #[arg(short, long)]
        mapping: PathBuf,

        /// Mapping column holding the new group labels
        #[arg(long)]
        value_column: String,

        /// Output path for the count table TSV
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Generate an example run configuration
    Example {
        /// Output path for the example YAML
        #[arg(short, long, default_value = "rdd.yaml")]
        output: PathBuf,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Counts {
            input,
            output,
            level,
            top_n,
        } => cmd_counts(&input, &output, level, top_n),

        Commands::Flows {
            input,
            output_dir,
            prefix,
            max_level,
            filename,
            from_network,
            noise_floor,
            noise_level,
        } => {
            let noise_floor = noise_floor.map(|category| NoiseFloor {
                category,
                level: noise_level,
            });
            cmd_flows(
                &input,
                &output_dir,
                &prefix,
                max_level,
                filename.as_deref(),
                from_network,
                noise_floor.as_ref(),
            )
        }

        Commands::Proportions {
            input,
            level,
            clr_offset,
            output,
        } => cmd_proportions(&input, level, clr_offset, &output),

        Commands::Pca {
            input,
            level,
            n_components,
            clr_offset,
            output,
        } => cmd_pca(&input, level, n_components, clr_offset, &output),

        Commands::Regroup {
            input,
            mapping,
            value_column,
            output,
        } => cmd_regroup(&input, &mapping, &value_column, &output),

        Commands::Example { output } => cmd_example(&output),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Merge the config file with command-line overrides.
fn resolve_config(input: &InputArgs) -> Result<RddConfig> {
    let mut config = match &input.config {
        Some(path) => RddConfig::from_path(path)?,
        None => RddConfig::default(),
    };
    if input.network.is_some() {
        config.network = input.network.clone();
    }
    if input.task_id.is_some() {
        config.task_id = input.task_id.clone();
    }
    if input.reference.is_some() {
        config.reference_metadata = input.reference.clone();
    }
    if input.sample_metadata.is_some() {
        config.sample_metadata = input.sample_metadata.clone();
    }
    if let Some(column) = &input.group_column {
        config.sample_group_column = column.clone();
    }
    if !input.sample_groups.is_empty() || !input.reference_groups.is_empty() {
        config.groups =
            GroupSelection::new(input.sample_groups.clone(), input.reference_groups.clone());
    }
    if let Some(sample_type) = input.sample_type {
        config.sample_type = sample_type.into();
    }
    if let Some(levels) = input.levels {
        config.levels = levels;
    }
    if !input.ontology_columns.is_empty() {
        config.ontology_columns = Some(input.ontology_columns.clone());
    }
    Ok(config)
}

fn load_rdd(input: &InputArgs) -> Result<RddCounts> {
    build_rdd(input, &resolve_config(input)?)
}

fn build_rdd(input: &InputArgs, config: &RddConfig) -> Result<RddCounts> {
    let source = DirectorySource::new(&input.network_dir);
    let rdd = RddCounts::from_config(config, Some(&source as &dyn NetworkSource))?;
    eprint!("{}", rdd.filter_summary());
    if rdd.levels() < rdd.requested_levels() {
        eprintln!(
            "Using {} ontology levels ({} requested)",
            rdd.levels(),
            rdd.requested_levels()
        );
    }
    Ok(rdd)
}

/// Build and write the count table
fn cmd_counts(
    input: &InputArgs,
    output: &Path,
    level: Option<usize>,
    top_n: Option<usize>,
) -> Result<()> {
    let rdd = load_rdd(input)?;
    let table = match level {
        Some(level) => rdd.filter_counts(level, None, top_n),
        None => rdd.counts().clone(),
    };
    table.to_tsv(output)?;
    info!("Wrote {} rows to {:?}", table.len(), output);
    Ok(())
}

/// Build and write a flow graph
fn cmd_flows(
    input: &InputArgs,
    output_dir: &Path,
    prefix: &str,
    max_level: usize,
    filename: Option<&str>,
    from_network: bool,
    noise_floor: Option<&NoiseFloor>,
) -> Result<()> {
    let rdd = load_rdd(input)?;
    let graph = if from_network {
        rdd.network_flows(max_level, noise_floor)?
    } else {
        rdd.flows(max_level, filename)?
    };
    std::fs::create_dir_all(output_dir)?;
    graph.to_tsv(output_dir, prefix)?;
    info!(
        "Wrote {} nodes and {} edges to {:?}",
        graph.nodes().len(),
        graph.edges().len(),
        output_dir
    );
    Ok(())
}

/// Write proportions or CLR values at one level
fn cmd_proportions(
    input: &InputArgs,
    level: usize,
    clr_offset: Option<f64>,
    output: &Path,
) -> Result<()> {
    let rdd = load_rdd(input)?;
    let wide = match clr_offset {
        Some(offset) => rdd.clr(level, offset)?,
        None => rdd.proportions(level)?,
    };
    wide.to_tsv(output)?;
    info!(
        "Wrote {} files x {} reference types to {:?}",
        wide.n_rows(),
        wide.n_columns(),
        output
    );
    Ok(())
}

/// Run PCA and write the scores
fn cmd_pca(
    input: &InputArgs,
    level: usize,
    n_components: usize,
    clr_offset: Option<f64>,
    output: &Path,
) -> Result<()> {
    let rdd = load_rdd(input)?;
    let result = perform_pca(&rdd, level, n_components, clr_offset)?;
    result.to_tsv(output)?;
    for (name, ratio) in result
        .component_names()
        .iter()
        .zip(&result.explained_variance_ratio)
    {
        eprintln!("  {}: {:.1}% of variance", name, ratio * 100.0);
    }
    Ok(())
}

/// Relabel groups from a mapping file
fn cmd_regroup(input: &InputArgs, mapping: &Path, value_column: &str, output: &Path) -> Result<()> {
    let mut rdd = load_rdd(input)?;
    rdd.update_groups_from_path(mapping, value_column)?;
    rdd.to_tsv(output)?;
    info!("Wrote regrouped counts to {:?}", output);
    Ok(())
}

/// Write an example configuration
fn cmd_example(output: &Path) -> Result<()> {
    let config = RddConfig {
        network: Some(PathBuf::from("network.tsv")),
        sample_metadata: Some(PathBuf::from("samples.csv")),
        groups: GroupSelection::new(vec!["G1".to_string()], vec!["G4".to_string()]),
        levels: 5,
        noise_floor: Some(NoiseFloor::default()),
        ..Default::default()
    };
    std::fs::write(output, config.to_yaml()?)?;
    eprintln!("Example configuration written to {:?}", output);
    Ok(())
}
