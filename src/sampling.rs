// sampling.rs

use crate::error::{GwasSimError, Result};
use crate::genotype::{HaplotypeMatrix, Location};
use crate::tools::run_tool;
use crate::vcf;
use log::info;
use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// How individuals are chosen from the simulated population.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SamplingStrategy {
    /// Uniformly random individuals.
    #[default]
    Random,
    /// Individuals closest to a sampling location.
    Point,
    /// Individuals closest to a sampling location and its reflection over the x axis.
    Pair,
}

impl SamplingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::Point => "point",
            Self::Pair => "pair",
        }
    }
}

impl fmt::Display for SamplingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SamplingStrategy {
    type Err = GwasSimError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "random" => Ok(Self::Random),
            "point" => Ok(Self::Point),
            "pair" => Ok(Self::Pair),
            other => Err(GwasSimError::invalid_parameter(
                "sampling",
                format!("'{}' is not one of random, point, pair", other),
            )),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SampleRequest {
    pub record: PathBuf,
    pub sample_count: usize,
    pub mutation_rate: f64,
    pub strategy: SamplingStrategy,
    pub seed: u64,
    /// Where the sampler must write the diploid VCF.
    pub vcf_path: PathBuf,
}

/// Sampled individuals, in the order shared by every downstream artifact.
#[derive(Clone, Debug)]
pub struct SampledPopulation {
    pub locations: Vec<Location>,
    pub haplotypes: HaplotypeMatrix,
    pub vcf_path: PathBuf,
}

impl SampledPopulation {
    pub fn sample_count(&self) -> usize {
        self.locations.len()
    }
}

pub trait SampleProvider {
    fn sample(&self, request: &SampleRequest) -> Result<SampledPopulation>;
}

/// Delegates sampling and mutation overlay to an external program.
///
/// The program is called as
/// `<program> --infile <record> --n-samples <n> --mu <mu> --sampling <strategy> --seed <seed> --vcf <vcf> --locs <locs>`
/// and must write a diploid VCF plus one `x y` line per individual, both in the same order.
pub struct ExternalSampler {
    pub program: PathBuf,
}

impl ExternalSampler {
    fn locations_path(request: &SampleRequest) -> PathBuf {
        request.vcf_path.with_extension("sampled_locs")
    }
}

impl SampleProvider for ExternalSampler {
    fn sample(&self, request: &SampleRequest) -> Result<SampledPopulation> {
        let locs_path = Self::locations_path(request);
        info!(
            "Sampling {} individuals ({} sampling) from {} with mu={}",
            request.sample_count,
            request.strategy,
            request.record.display(),
            request.mutation_rate
        );
        let n_samples = request.sample_count.to_string();
        let mu = request.mutation_rate.to_string();
        let seed = request.seed.to_string();
        let args: [&OsStr; 14] = [
            OsStr::new("--infile"),
            request.record.as_os_str(),
            OsStr::new("--n-samples"),
            OsStr::new(&n_samples),
            OsStr::new("--mu"),
            OsStr::new(&mu),
            OsStr::new("--sampling"),
            OsStr::new(request.strategy.as_str()),
            OsStr::new("--seed"),
            OsStr::new(&seed),
            OsStr::new("--vcf"),
            request.vcf_path.as_os_str(),
            OsStr::new("--locs"),
            locs_path.as_os_str(),
        ];
        run_tool(&self.program, args)?;

        let locations = read_locations(&locs_path)?;
        if locations.len() != request.sample_count {
            return Err(GwasSimError::upstream(format!(
                "Requested {} individuals but the sampler returned {}; the record may hold fewer individuals.",
                request.sample_count,
                locations.len()
            )));
        }
        std::fs::remove_file(&locs_path).map_err(|e| GwasSimError::io(&locs_path, e))?;

        let parsed = vcf::read_haplotypes(&request.vcf_path, request.sample_count)?;
        Ok(SampledPopulation {
            locations,
            haplotypes: parsed.haplotypes,
            vcf_path: request.vcf_path.clone(),
        })
    }
}

/// Parses whitespace-separated `x y` rows; blank lines and `#` comments are ignored.
pub fn read_locations(path: &Path) -> Result<Vec<Location>> {
    let content = std::fs::read_to_string(path).map_err(|e| GwasSimError::io(path, e))?;
    let mut locations = Vec::new();
    for (line_num, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let parts: Vec<&str> = trimmed.split_whitespace().collect();
        if parts.len() < 2 {
            return Err(GwasSimError::upstream(format!(
                "{} line {}: expected 'x y', found '{}'",
                path.display(),
                line_num + 1,
                trimmed
            )));
        }
        let parse = |field: &str| {
            field.parse::<f64>().map_err(|e| {
                GwasSimError::upstream(format!(
                    "{} line {}: cannot parse coordinate '{}': {}",
                    path.display(),
                    line_num + 1,
                    field,
                    e
                ))
            })
        };
        locations.push(Location::new(parse(parts[0])?, parse(parts[1])?));
    }
    Ok(locations)
}
