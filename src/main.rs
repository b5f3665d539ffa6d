// main.rs

// --- External Crate Imports ---
use anyhow::{anyhow, Context, Error, Result};
use clap::Parser;
use env_logger;
use log::{error, info};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use spatial_gwas::{
    pca::EfficientPcaEmbedder,
    sampling::{ExternalSampler, SamplingStrategy},
    tools::{PlinkRunner, VcftoolsConverter},
    Pipeline, PhenotypeModel, RunConfig,
};
use std::time::Instant;

// --- Main Function ---
fn main() -> Result<(), Error> {
    let total_time_start = Instant::now();
    let cli_args = cli::CliArgs::parse();

    // Initialize logger
    let log_level = cli_args
        .log_level
        .parse::<log::LevelFilter>()
        .unwrap_or_else(|_| {
            eprintln!(
                "Warning: Invalid log level '{}' provided. Defaulting to Info.",
                cli_args.log_level
            );
            log::LevelFilter::Info
        });
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp_micros()
        .init();

    info!("Starting spatial_gwas with args: {:?}", cli_args);

    let model = PhenotypeModel::from_name(&cli_args.phenotype, &cli_args.model_params())
        .context("Invalid phenotype model configuration")?;
    let strategy: SamplingStrategy = cli_args
        .sampling
        .parse()
        .context("Invalid sampling strategy")?;
    if cli_args.n_samples == 0 {
        return Err(anyhow!("--n-samples must be > 0."));
    }

    let config = RunConfig {
        record: cli_args.infile.clone(),
        outdir: cli_args.outdir.clone(),
        sample_count: cli_args.n_samples,
        mutation_rate: cli_args.mu,
        strategy,
        seed: cli_args.seed,
        model,
        keep_intermediates: cli_args.keep_intermediates,
    };

    let pipeline = Pipeline {
        sampler: Box::new(ExternalSampler {
            program: cli_args.sampler_path.clone(),
        }),
        embedder: Box::new(EfficientPcaEmbedder::new(cli_args.pca_components, Some(cli_args.seed))),
        converter: Box::new(VcftoolsConverter {
            program: cli_args.vcftools_path.clone(),
        }),
        association: Box::new(PlinkRunner {
            program: cli_args.plink_path.clone(),
        }),
    };

    // One stream for the whole run.
    let mut rng = ChaCha8Rng::seed_from_u64(cli_args.seed);
    let artifacts = pipeline.run(&config, &mut rng).map_err(|e| {
        error!("{} (intermediate files left in {} for inspection)", e, config.outdir.display());
        anyhow!(e)
    })?;

    info!("Phenotypes written to {}", artifacts.paths.phenotypes.display());
    if let Some(truth) = &artifacts.truth_file {
        info!("Ground truth written to {}", truth.display());
    }
    info!(
        "spatial_gwas finished successfully in {:.2?}.",
        total_time_start.elapsed()
    );
    Ok(())
}

// --- Module Implementations ---

mod cli {
    use clap::Parser;
    use spatial_gwas::{pca::DEFAULT_COMPONENTS, ModelParams};
    use std::path::PathBuf;

    #[derive(Parser, Debug)]
    #[command(author, version, about = "Run a GWAS in plink on individuals sampled from a spatial simulation.", long_about = None, propagate_version = true)]
    pub(crate) struct CliArgs {
        /// Path to the simulation tree sequence.
        #[arg(long, required = true)]
        pub(crate) infile: PathBuf,

        #[arg(long, required = true)]
        pub(crate) outdir: PathBuf,

        /// Program that samples individuals and overlays mutations.
        #[arg(long, required = true)]
        pub(crate) sampler_path: PathBuf,

        #[arg(long, default_value = "plink")]
        pub(crate) plink_path: PathBuf,

        #[arg(long, default_value = "vcftools")]
        pub(crate) vcftools_path: PathBuf,

        #[arg(short = 'n', long, required = true)]
        pub(crate) n_samples: usize,

        /// random, point or pair
        #[arg(long, default_value = "random")]
        pub(crate) sampling: String,

        /// Mutation rate per base per unit time.
        #[arg(long, required = true)]
        pub(crate) mu: f64,

        /// gaussian, transform_coord, corner_bimodal, patchy, random_snps or one_snp
        #[arg(long, required = true)]
        pub(crate) phenotype: String,

        #[arg(long, allow_hyphen_values = true)]
        pub(crate) phenotype_mean: Option<f64>,

        #[arg(long)]
        pub(crate) phenotype_sd: Option<f64>,

        #[arg(long, required = true)]
        pub(crate) seed: u64,

        #[arg(long)]
        pub(crate) coord_divisor: Option<f64>,

        #[arg(long, allow_hyphen_values = true)]
        pub(crate) coord_multiplier: Option<f64>,

        #[arg(long)]
        pub(crate) corner_bound: Option<f64>,

        #[arg(long)]
        pub(crate) map_width: Option<f64>,

        #[arg(long)]
        pub(crate) hotspot_count: Option<usize>,

        #[arg(long)]
        pub(crate) hotspot_radius: Option<f64>,

        #[arg(long)]
        pub(crate) causal_snps: Option<usize>,

        #[arg(long)]
        pub(crate) effect_divisor: Option<f64>,

        #[arg(long)]
        pub(crate) snp_freq_min: Option<f64>,

        #[arg(long)]
        pub(crate) snp_freq_max: Option<f64>,

        /// Draws allowed when searching for the one_snp causal site.
        #[arg(long)]
        pub(crate) max_attempts: Option<usize>,

        #[arg(long, default_value_t = DEFAULT_COMPONENTS)]
        pub(crate) pca_components: usize,

        /// Keep the VCF, PED and MAP files after a successful run.
        #[arg(long)]
        pub(crate) keep_intermediates: bool,

        #[arg(long, default_value = "Info")]
        pub(crate) log_level: String,
    }

    impl CliArgs {
        pub(crate) fn model_params(&self) -> ModelParams {
            ModelParams {
                mean: self.phenotype_mean,
                sd: self.phenotype_sd,
                coord_divisor: self.coord_divisor,
                coord_multiplier: self.coord_multiplier,
                corner_bound: self.corner_bound,
                map_width: self.map_width,
                hotspot_count: self.hotspot_count,
                hotspot_radius: self.hotspot_radius,
                causal_snps: self.causal_snps,
                effect_divisor: self.effect_divisor,
                snp_freq_min: self.snp_freq_min,
                snp_freq_max: self.snp_freq_max,
                max_attempts: self.max_attempts,
                ..ModelParams::default()
            }
        }
    }

}
