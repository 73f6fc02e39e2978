//! taxolink CLI: compile networks, evaluate evidence, match classifications.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use taxolink::calibrate::Calibrator;
use taxolink::config::{MatcherConfig, SearcherKind};
use taxolink::infer::{Evidence, NetworkVariants, Parameters};
use taxolink::matcher::{Classification, ClassificationMatcher};
use taxolink::network::{NetworkDefinition, ObservableId};
use taxolink::store::{DurableStore, Record, open_searcher};

#[derive(Parser)]
#[command(name = "taxolink", version, about = "Probabilistic taxonomic record linkage")]
struct Cli {
    /// Matcher configuration (TOML, or JSON by extension).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a network and print horizons, factors and the parameter schema.
    Compile {
        /// Network definition file.
        #[arg(long)]
        network: PathBuf,

        /// Erasure variant signature (defaults to the full network).
        #[arg(long)]
        variant: Option<String>,
    },

    /// Evaluate evidence against one parameter vector.
    Evaluate {
        #[arg(long)]
        network: PathBuf,

        /// Parameters JSON as written by `calibrate`.
        #[arg(long, conflicts_with = "values")]
        parameters: Option<PathBuf>,

        /// Comma-separated base parameter values for `--variant`.
        #[arg(long)]
        values: Option<String>,

        #[arg(long)]
        variant: Option<String>,

        /// Evidence as a JSON object, e.g. '{"wet": true, "sprinkler": false}'.
        #[arg(long, default_value = "{}")]
        evidence: String,
    },

    /// Estimate parameters from fully observed samples.
    Calibrate {
        #[arg(long)]
        network: PathBuf,

        /// JSON array of objects mapping observable to boolean.
        #[arg(long)]
        samples: PathBuf,

        #[arg(long)]
        variant: Option<String>,

        /// Additive smoothing (overrides the config).
        #[arg(long)]
        smoothing: Option<f64>,

        /// Write parameters here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Find the best matching record for a query.
    Match {
        #[arg(long)]
        network: PathBuf,

        /// Query as a JSON object, e.g. '{"scientificName": "Acacia congesta"}'.
        #[arg(long)]
        query: String,

        /// Records JSON file (overrides the configured searcher).
        #[arg(long)]
        records: Option<PathBuf>,

        /// Minimum posterior (overrides the config).
        #[arg(long)]
        min_posterior: Option<f64>,

        /// Do not broaden the query when nothing valid is found.
        #[arg(long)]
        no_broaden: bool,
    },

    /// Load records from a JSON file into a durable store.
    Ingest {
        /// JSON array of records.
        #[arg(long)]
        records: PathBuf,

        /// Store directory.
        #[arg(long)]
        store: PathBuf,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => MatcherConfig::load(path)?,
        None => MatcherConfig::default(),
    };

    match cli.command {
        Commands::Compile { network, variant } => {
            let variants = load_variants(&network)?;
            let signature = variant.unwrap_or_else(|| variants.full_signature());
            let inferencer = variants.variant(&signature)?;
            let compiled = inferencer.network();
            let graph = compiled.graph();

            println!(
                "Network \"{}\" variant \"{}\" ({} vertices, {} parameters)",
                compiled.name(),
                signature,
                graph.len(),
                compiled.parameters().len()
            );
            let name = |v| graph.observable(v).id.to_string();
            for &v in compiled.order() {
                let node = compiled.node(v);
                let mut flags = Vec::new();
                if node.input {
                    flags.push("input");
                }
                if node.source {
                    flags.push("source");
                }
                if node.output {
                    flags.push("output");
                }
                let interior: Vec<String> = node.horizon.interior().iter().map(|w| name(*w)).collect();
                let horizon: Vec<String> = node.horizon.horizon().iter().map(|w| name(*w)).collect();
                println!(
                    "\n{} [{}] interior=[{}] horizon=[{}]",
                    node.observable.id,
                    flags.join(", "),
                    interior.join(", "),
                    horizon.join(", ")
                );
                if let Some((prior, _)) = node.prior {
                    println!("  {}", compiled.parameter(prior));
                }
                for factor in node.factors() {
                    println!("  {}", compiled.parameter(factor.parameter));
                }
            }

            let schema = compiled.schema();
            println!("\nSchema {} ({} base parameters):", schema.tag, schema.len());
            for (i, id) in schema.base.iter().enumerate() {
                println!("  [{i}] {}", compiled.formula(*id));
            }
        }

        Commands::Evaluate {
            network,
            parameters,
            values,
            variant,
            evidence,
        } => {
            let variants = load_variants(&network)?;
            let parameters = match (parameters, values) {
                (Some(path), _) => read_json::<Parameters>(&path)?,
                (None, Some(values)) => {
                    let signature = variant.unwrap_or_else(|| variants.full_signature());
                    let inferencer = variants.variant(&signature)?;
                    let values = values
                        .split(',')
                        .map(|v| v.trim().parse::<f64>())
                        .collect::<std::result::Result<Vec<_>, _>>()
                        .into_diagnostic()?;
                    Parameters::new(inferencer.schema(), values)?
                }
                (None, None) => miette::bail!("either --parameters or --values is required"),
            };
            let evidence: Evidence = serde_json::from_str(&evidence).into_diagnostic()?;
            let inferencer = variants.variant(parameters.signature())?;
            let inference = inferencer.infer(&evidence, &parameters)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&inference).into_diagnostic()?
            );
        }

        Commands::Calibrate {
            network,
            samples,
            variant,
            smoothing,
            output,
        } => {
            let variants = load_variants(&network)?;
            let signature = variant.unwrap_or_else(|| variants.full_signature());
            let inferencer = variants.variant(&signature)?;
            let samples: Vec<HashMap<ObservableId, bool>> = read_json(&samples)?;

            let mut calibrator = Calibrator::new(
                inferencer.network().clone(),
                smoothing.unwrap_or(config.smoothing),
            );
            calibrator.observe_all(&samples);
            let parameters = calibrator.parameters();
            let json = serde_json::to_string_pretty(&parameters).into_diagnostic()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json).into_diagnostic()?;
                    println!(
                        "Wrote {} parameters from {} samples to {}",
                        parameters.len(),
                        calibrator.samples(),
                        path.display()
                    );
                }
                None => println!("{json}"),
            }
        }

        Commands::Match {
            network,
            query,
            records,
            min_posterior,
            no_broaden,
        } => {
            let variants = Arc::new(load_variants(&network)?);
            let mut config = config;
            if let Some(records) = records {
                config.searcher = SearcherKind::Memory { records };
            }
            let searcher = open_searcher(&config.searcher)?;
            let matcher = ClassificationMatcher::new(variants, searcher, config)?;

            let query: Classification = serde_json::from_str(&query).into_diagnostic()?;
            let mut options = matcher.options();
            if let Some(min) = min_posterior {
                options.min_posterior = min;
            }
            options.broaden = !no_broaden;

            let found = matcher.find_match(&query, &options)?;
            println!("{}", serde_json::to_string_pretty(&found).into_diagnostic()?);
        }

        Commands::Ingest { records, store } => {
            let records: Vec<Record> = read_json(&records)?;
            let durable = DurableStore::open(&store)?;
            durable.put_all(&records)?;
            println!(
                "Ingested {} records into {} ({} total)",
                records.len(),
                store.display(),
                durable.len()?
            );
        }
    }

    Ok(())
}

fn load_variants(path: &Path) -> Result<NetworkVariants> {
    let definition = NetworkDefinition::load(path)?;
    Ok(NetworkVariants::compile(&definition)?)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).into_diagnostic()?;
    serde_json::from_str(&text).into_diagnostic()
}
