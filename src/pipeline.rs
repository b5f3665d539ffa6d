// pipeline.rs

use crate::error::{GwasSimError, PipelineError, Stage};
use crate::genotype::AlleleCounts;
use crate::output;
use crate::pca::CovariateEmbedder;
use crate::phenotype::{self, GroundTruth, PhenotypeDraw, PhenotypeModel};
use crate::sampling::{SampleProvider, SampleRequest, SamplingStrategy};
use crate::tools::{AssociationInputs, AssociationRunner, PedConverter};
use log::{info, warn};
use rand::Rng;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Instant;

type StageResult<T> = std::result::Result<T, PipelineError>;

fn at(stage: Stage, artifact: &Path) -> impl FnOnce(GwasSimError) -> PipelineError {
    let artifact = artifact.to_path_buf();
    move |source| PipelineError {
        stage,
        artifact,
        source,
    }
}

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut joined: OsString = prefix.as_os_str().to_owned();
    joined.push(suffix);
    PathBuf::from(joined)
}

/// Every file a run reads or writes, named after the input record's base name.
#[derive(Clone, Debug, PartialEq)]
pub struct ArtifactPaths {
    pub prefix: PathBuf,
    pub locations: PathBuf,
    pub covariates: PathBuf,
    pub phenotypes: PathBuf,
    pub causal_sites: PathBuf,
    pub hotspots: PathBuf,
    pub vcf: PathBuf,
    pub ped: PathBuf,
    pub map: PathBuf,
    pub nosex: PathBuf,
}

impl ArtifactPaths {
    pub fn new(outdir: &Path, record: &Path) -> Self {
        let name = record
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| OsString::from("simulation"));
        let prefix = outdir.join(name);
        Self {
            locations: with_suffix(&prefix, "_locs.txt"),
            covariates: with_suffix(&prefix, ".pca"),
            phenotypes: with_suffix(&prefix, ".phenotypes"),
            causal_sites: with_suffix(&prefix, "phenotype_snp_indices.txt"),
            hotspots: with_suffix(&prefix, "_hotspots.txt"),
            vcf: with_suffix(&prefix, ".vcf"),
            ped: with_suffix(&prefix, ".ped"),
            map: with_suffix(&prefix, ".map"),
            nosex: with_suffix(&prefix, ".nosex"),
            prefix,
        }
    }

    /// Large per-run files removed after a successful run.
    pub fn intermediates(&self) -> [&Path; 4] {
        [&self.vcf, &self.ped, &self.map, &self.nosex]
    }
}

#[derive(Clone, Debug)]
pub struct RunConfig {
    pub record: PathBuf,
    pub outdir: PathBuf,
    pub sample_count: usize,
    pub mutation_rate: f64,
    pub strategy: SamplingStrategy,
    pub seed: u64,
    pub model: PhenotypeModel,
    pub keep_intermediates: bool,
}

/// Outcome of a successful run.
#[derive(Clone, Debug)]
pub struct RunArtifacts {
    pub paths: ArtifactPaths,
    pub draw: PhenotypeDraw,
    /// Ground-truth file written for the model, if any.
    pub truth_file: Option<PathBuf>,
    pub removed: Vec<PathBuf>,
}

pub struct Pipeline {
    pub sampler: Box<dyn SampleProvider>,
    pub embedder: Box<dyn CovariateEmbedder>,
    pub converter: Box<dyn PedConverter>,
    pub association: Box<dyn AssociationRunner>,
}

impl Pipeline {
    /// Runs sampling, summary, conversion, phenotype generation and association in order.
    ///
    /// Stops at the first failing stage and leaves every intermediate file in place.
    pub fn run<R: Rng>(&self, config: &RunConfig, rng: &mut R) -> StageResult<RunArtifacts> {
        let started = Instant::now();
        let paths = ArtifactPaths::new(&config.outdir, &config.record);

        if !config.outdir.exists() {
            std::fs::create_dir_all(&config.outdir)
                .map_err(|e| GwasSimError::io(&config.outdir, e))
                .map_err(at(Stage::Sampling, &config.outdir))?;
            info!("Created output directory: {}", config.outdir.display());
        }

        // --- 1. Sample individuals ---
        let request = SampleRequest {
            record: config.record.clone(),
            sample_count: config.sample_count,
            mutation_rate: config.mutation_rate,
            strategy: config.strategy,
            seed: config.seed,
            vcf_path: paths.vcf.clone(),
        };
        let population = self.sampler.sample(&request).map_err(at(Stage::Sampling, &config.record))?;
        if population.sample_count() != config.sample_count
            || population.haplotypes.num_individuals() != config.sample_count
        {
            return Err(at(Stage::Sampling, &config.record)(GwasSimError::upstream(format!(
                "Expected {} individuals, got {} locations and {} genotyped individuals.",
                config.sample_count,
                population.sample_count(),
                population.haplotypes.num_individuals()
            ))));
        }
        output::write_locations(&paths.locations, &population.locations)
            .map_err(at(Stage::Sampling, &paths.locations))?;

        // --- 2. Allele counts and covariates ---
        let allele_counts = AlleleCounts::from_haplotypes(&population.haplotypes);
        let covariates = self
            .embedder
            .embed(&allele_counts)
            .map_err(at(Stage::Summarizing, &paths.covariates))?;
        if covariates.nrows() != config.sample_count {
            return Err(at(Stage::Summarizing, &paths.covariates)(GwasSimError::upstream(format!(
                "Covariate embedding has {} rows for {} individuals.",
                covariates.nrows(),
                config.sample_count
            ))));
        }
        output::write_covariates(&paths.covariates, &covariates)
            .map_err(at(Stage::Summarizing, &paths.covariates))?;

        // --- 3. PED/MAP for the association tool ---
        self.converter
            .convert(&population.vcf_path, &paths.prefix)
            .map_err(at(Stage::PedConversion, &population.vcf_path))?;

        // --- 4. Phenotypes ---
        let draw = phenotype::generate(
            &config.model,
            &population.locations,
            Some(&allele_counts),
            config.sample_count,
            rng,
        )
        .map_err(at(Stage::PhenotypeGeneration, &paths.phenotypes))?;
        output::write_phenotypes(&paths.phenotypes, &draw.phenotypes)
            .map_err(at(Stage::PhenotypeGeneration, &paths.phenotypes))?;

        let truth_file = match &draw.truth {
            GroundTruth::None => None,
            GroundTruth::CausalSites(sites) => {
                output::write_causal_sites(&paths.causal_sites, sites)
                    .map_err(at(Stage::PhenotypeGeneration, &paths.causal_sites))?;
                Some(paths.causal_sites.clone())
            }
            GroundTruth::Hotspots(points) => {
                output::write_hotspots(&paths.hotspots, points)
                    .map_err(at(Stage::PhenotypeGeneration, &paths.hotspots))?;
                Some(paths.hotspots.clone())
            }
        };

        // --- 5. Association ---
        let inputs = AssociationInputs {
            ped_prefix: paths.prefix.clone(),
            phenotypes: paths.phenotypes.clone(),
            covariates: paths.covariates.clone(),
        };
        self.association
            .run_adjusted(&inputs)
            .map_err(at(Stage::Association, &paths.prefix))?;
        self.association
            .run_unadjusted(&inputs)
            .map_err(at(Stage::Association, &paths.prefix))?;

        // --- 6. Cleanup ---
        let removed = if config.keep_intermediates {
            info!("Keeping intermediate VCF/PED/MAP files as requested.");
            Vec::new()
        } else {
            remove_intermediates(&paths)?
        };

        info!("Run for {} finished in {:.2?}.", config.record.display(), started.elapsed());
        Ok(RunArtifacts {
            paths,
            draw,
            truth_file,
            removed,
        })
    }
}

fn remove_intermediates(paths: &ArtifactPaths) -> StageResult<Vec<PathBuf>> {
    let mut removed = Vec::new();
    for path in paths.intermediates() {
        match std::fs::remove_file(path) {
            Ok(()) => {
                info!("Removed intermediate file {}", path.display());
                removed.push(path.to_path_buf());
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Intermediate file {} not present, nothing to remove.", path.display());
            }
            Err(e) => return Err(at(Stage::Cleanup, path)(GwasSimError::io(path, e))),
        }
    }
    Ok(removed)
}
