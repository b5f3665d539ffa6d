// phenotype.rs

// --- External Crate Imports ---
use crate::error::{GwasSimError, Result};
use crate::genotype::{AlleleCounts, Location};
use log::{debug, info, warn};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use statrs::statistics::Statistics;

// --- Model Names ---

pub const GAUSSIAN: &str = "gaussian";
pub const TRANSFORM_COORD: &str = "transform_coord";
pub const CORNER_BIMODAL: &str = "corner_bimodal";
pub const PATCHY: &str = "patchy";
pub const RANDOM_SNPS: &str = "random_snps";
pub const ONE_SNP: &str = "one_snp";

pub const MODEL_NAMES: [&str; 6] = [GAUSSIAN, TRANSFORM_COORD, CORNER_BIMODAL, PATCHY, RANDOM_SNPS, ONE_SNP];

// --- Raw Parameters ---

/// Parameter values as supplied by the user. Only `mean` and `sd` are required;
/// every other field falls back to the model's default when `None`.
#[derive(Clone, Debug, Default)]
pub struct ModelParams {
    pub mean: Option<f64>,
    pub sd: Option<f64>,
    pub coord_divisor: Option<f64>,
    pub coord_multiplier: Option<f64>,
    pub corner_bound: Option<f64>,
    pub corner_shift: Option<f64>,
    pub hotspot_count: Option<usize>,
    pub map_width: Option<f64>,
    pub hotspot_radius: Option<f64>,
    pub peak_shift: Option<f64>,
    pub causal_snps: Option<usize>,
    pub effect_divisor: Option<f64>,
    pub snp_freq_min: Option<f64>,
    pub snp_freq_max: Option<f64>,
    pub max_attempts: Option<usize>,
}

impl ModelParams {
    pub fn with_mean_sd(mean: f64, sd: f64) -> Self {
        Self {
            mean: Some(mean),
            sd: Some(sd),
            ..Self::default()
        }
    }
}

fn finite(parameter: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(GwasSimError::invalid_parameter(parameter, format!("{} is not finite", value)))
    }
}

fn positive(parameter: &'static str, value: f64) -> Result<f64> {
    if finite(parameter, value)? > 0.0 {
        Ok(value)
    } else {
        Err(GwasSimError::invalid_parameter(parameter, format!("{} must be > 0", value)))
    }
}

fn nonzero_count(parameter: &'static str, value: usize) -> Result<usize> {
    if value == 0 {
        Err(GwasSimError::invalid_parameter(parameter, "must be at least 1"))
    } else {
        Ok(value)
    }
}

// --- Per-Model Parameter Sets ---

/// Mean and standard deviation shared by every model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BaseNoise {
    pub mean: f64,
    pub sd: f64,
}

impl BaseNoise {
    fn from_params(model: &'static str, params: &ModelParams) -> Result<Self> {
        let mean = params.mean.ok_or(GwasSimError::MissingParameter {
            model,
            parameter: "phenotype-mean",
        })?;
        let sd = params.sd.ok_or(GwasSimError::MissingParameter {
            model,
            parameter: "phenotype-sd",
        })?;
        let mean = finite("phenotype-mean", mean)?;
        let sd = finite("phenotype-sd", sd)?;
        if sd < 0.0 {
            return Err(GwasSimError::invalid_parameter("phenotype-sd", format!("{} is negative", sd)));
        }
        Ok(Self { mean, sd })
    }

    /// One draw from Normal(mean + shift_in_sd * sd, sd).
    fn draw_shifted<R: Rng>(&self, shift_in_sd: f64, rng: &mut R) -> Result<f64> {
        let normal = Normal::new(self.mean + shift_in_sd * self.sd, self.sd)
            .map_err(|e| GwasSimError::invalid_parameter("phenotype-sd", e.to_string()))?;
        Ok(normal.sample(rng))
    }
}

/// Linear gradient along the x axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoordGradient {
    pub noise: BaseNoise,
    /// Half-width of the simulated map.
    pub divisor: f64,
    pub multiplier: f64,
}

impl CoordGradient {
    pub fn shift_in_sd(&self, location: &Location) -> f64 {
        (location.x / self.divisor) * self.multiplier
    }

    fn generate<R: Rng>(&self, locations: &[Location], rng: &mut R) -> Result<Vec<f64>> {
        locations
            .iter()
            .map(|loc| self.noise.draw_shifted(self.shift_in_sd(loc), rng))
            .collect()
    }
}

/// Lower-left corner versus the rest of the map.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CornerBimodal {
    pub noise: BaseNoise,
    pub corner_bound: f64,
    /// Mean shift, in standard deviations, applied outside the corner.
    pub outside_shift: f64,
}

impl CornerBimodal {
    pub fn in_corner(&self, location: &Location) -> bool {
        location.x < self.corner_bound && location.y < self.corner_bound
    }

    fn generate<R: Rng>(&self, locations: &[Location], rng: &mut R) -> Result<Vec<f64>> {
        locations
            .iter()
            .map(|loc| {
                let shift = if self.in_corner(loc) { 0.0 } else { self.outside_shift };
                self.noise.draw_shifted(shift, rng)
            })
            .collect()
    }
}

/// Phenotype mean raised near randomly placed hotspots, decaying linearly with distance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PatchyHotspots {
    pub noise: BaseNoise,
    pub hotspot_count: usize,
    pub map_width: f64,
    pub radius: f64,
    /// Shift, in standard deviations, at distance zero.
    pub peak_shift: f64,
}

impl PatchyHotspots {
    /// Hotspots are uniform on `[0, map_width)` in both axes, x drawn before y.
    pub fn draw_hotspots<R: Rng>(&self, rng: &mut R) -> Vec<Location> {
        (0..self.hotspot_count)
            .map(|_| {
                let x = rng.random_range(0.0..self.map_width);
                let y = rng.random_range(0.0..self.map_width);
                Location::new(x, y)
            })
            .collect()
    }

    pub fn nearest_distance(location: &Location, hotspots: &[Location]) -> f64 {
        hotspots
            .iter()
            .map(|h| location.distance_to(h))
            .fold(f64::INFINITY, f64::min)
    }

    /// Mean shift in standard deviations: `peak` at distance 0, falling to 0 at `radius` and beyond.
    pub fn scale(&self, min_distance: f64) -> f64 {
        if min_distance > self.radius {
            0.0
        } else {
            self.peak_shift - (min_distance / self.radius) * self.peak_shift
        }
    }

    fn generate<R: Rng>(&self, locations: &[Location], rng: &mut R) -> Result<(Vec<f64>, Vec<Location>)> {
        let hotspots = self.draw_hotspots(rng);
        debug!("Drew {} hotspots: {:?}", hotspots.len(), hotspots);
        let phenotypes = locations
            .iter()
            .map(|loc| {
                let min_distance = Self::nearest_distance(loc, &hotspots);
                self.noise.draw_shifted(self.scale(min_distance), rng)
            })
            .collect::<Result<Vec<f64>>>()?;
        Ok((phenotypes, hotspots))
    }
}

/// Additive polygenic score over sites drawn with replacement, without residual noise.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RandomSnps {
    pub noise: BaseNoise,
    pub causal_site_count: usize,
    /// Each alternate copy adds `sd / effect_divisor`.
    pub effect_divisor: f64,
}

impl RandomSnps {
    pub fn effect_size(&self) -> f64 {
        self.noise.sd / self.effect_divisor
    }

    fn generate<R: Rng>(&self, allele_counts: &AlleleCounts, rng: &mut R) -> (Vec<f64>, Vec<usize>) {
        let num_sites = allele_counts.num_sites();
        let causal_sites: Vec<usize> = (0..self.causal_site_count)
            .map(|_| rng.random_range(0..num_sites))
            .collect();

        let effect = self.effect_size();
        let phenotypes = (0..allele_counts.num_individuals())
            .map(|ind| {
                let score: u32 = causal_sites
                    .iter()
                    .map(|&site| allele_counts.alt_count(site, ind) as u32)
                    .sum();
                self.noise.mean + score as f64 * effect
            })
            .collect();
        (phenotypes, causal_sites)
    }
}

/// Single additive locus with alternate-allele frequency in `[freq_min, freq_max)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OneSnp {
    pub noise: BaseNoise,
    pub freq_min: f64,
    pub freq_max: f64,
    pub max_attempts: usize,
}

impl OneSnp {
    pub fn qualifies(&self, frequency: f64) -> bool {
        frequency >= self.freq_min && frequency < self.freq_max
    }

    /// Rejection-samples a causal site uniformly among all sites.
    pub fn select_site<R: Rng>(&self, allele_counts: &AlleleCounts, rng: &mut R) -> Result<usize> {
        let num_sites = allele_counts.num_sites();
        let any_qualifying = (0..num_sites).any(|site| self.qualifies(allele_counts.alt_frequency(site)));
        if !any_qualifying {
            warn!(
                "None of the {} sites has alternate-allele frequency in [{}, {}).",
                num_sites, self.freq_min, self.freq_max
            );
            return Err(GwasSimError::NoQualifyingSite {
                lower: self.freq_min,
                upper: self.freq_max,
                attempts: 0,
            });
        }

        for attempt in 1..=self.max_attempts {
            let site = rng.random_range(0..num_sites);
            let frequency = allele_counts.alt_frequency(site);
            if self.qualifies(frequency) {
                debug!(
                    "Selected causal site {} (frequency {:.4}) after {} attempt(s).",
                    site, frequency, attempt
                );
                return Ok(site);
            }
        }

        Err(GwasSimError::NoQualifyingSite {
            lower: self.freq_min,
            upper: self.freq_max,
            attempts: self.max_attempts,
        })
    }

    fn generate<R: Rng>(&self, allele_counts: &AlleleCounts, rng: &mut R) -> Result<(Vec<f64>, usize)> {
        let site = self.select_site(allele_counts, rng)?;
        let phenotypes = allele_counts
            .alt_counts_at(site)
            .iter()
            .map(|&copies| self.noise.draw_shifted(copies as f64, rng))
            .collect::<Result<Vec<f64>>>()?;
        Ok((phenotypes, site))
    }
}

// --- Model Dispatch ---

#[derive(Clone, Debug, PartialEq)]
pub enum PhenotypeModel {
    Gaussian(BaseNoise),
    TransformCoord(CoordGradient),
    CornerBimodal(CornerBimodal),
    Patchy(PatchyHotspots),
    RandomSnps(RandomSnps),
    OneSnp(OneSnp),
}

impl PhenotypeModel {
    /// Validates `params` for the model called `name` and fills in defaults.
    pub fn from_name(name: &str, params: &ModelParams) -> Result<Self> {
        let model = match name {
            GAUSSIAN => Self::Gaussian(BaseNoise::from_params(GAUSSIAN, params)?),
            TRANSFORM_COORD => Self::TransformCoord(CoordGradient {
                noise: BaseNoise::from_params(TRANSFORM_COORD, params)?,
                divisor: positive("coord-divisor", params.coord_divisor.unwrap_or(50.0))?,
                multiplier: finite("coord-multiplier", params.coord_multiplier.unwrap_or(3.0))?,
            }),
            CORNER_BIMODAL => Self::CornerBimodal(CornerBimodal {
                noise: BaseNoise::from_params(CORNER_BIMODAL, params)?,
                corner_bound: finite("corner-bound", params.corner_bound.unwrap_or(20.0))?,
                outside_shift: finite("corner-shift", params.corner_shift.unwrap_or(2.0))?,
            }),
            PATCHY => Self::Patchy(PatchyHotspots {
                noise: BaseNoise::from_params(PATCHY, params)?,
                hotspot_count: nonzero_count("hotspot-count", params.hotspot_count.unwrap_or(10))?,
                map_width: positive("map-width", params.map_width.unwrap_or(50.0))?,
                radius: positive("hotspot-radius", params.hotspot_radius.unwrap_or(5.0))?,
                peak_shift: finite("peak-shift", params.peak_shift.unwrap_or(2.0))?,
            }),
            RANDOM_SNPS => Self::RandomSnps(RandomSnps {
                noise: BaseNoise::from_params(RANDOM_SNPS, params)?,
                causal_site_count: nonzero_count("causal-snps", params.causal_snps.unwrap_or(100))?,
                effect_divisor: positive("effect-divisor", params.effect_divisor.unwrap_or(10.0))?,
            }),
            ONE_SNP => {
                let freq_min = finite("snp-freq-min", params.snp_freq_min.unwrap_or(0.1))?;
                let freq_max = finite("snp-freq-max", params.snp_freq_max.unwrap_or(0.2))?;
                if !(0.0..=1.0).contains(&freq_min) || !(0.0..=1.0).contains(&freq_max) || freq_min >= freq_max {
                    return Err(GwasSimError::invalid_parameter(
                        "snp-freq-min",
                        format!("frequency window [{}, {}) is empty or outside [0, 1]", freq_min, freq_max),
                    ));
                }
                Self::OneSnp(OneSnp {
                    noise: BaseNoise::from_params(ONE_SNP, params)?,
                    freq_min,
                    freq_max,
                    max_attempts: nonzero_count("max-attempts", params.max_attempts.unwrap_or(10_000))?,
                })
            }
            other => {
                return Err(GwasSimError::InvalidModel {
                    name: other.to_string(),
                })
            }
        };
        Ok(model)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Gaussian(_) => GAUSSIAN,
            Self::TransformCoord(_) => TRANSFORM_COORD,
            Self::CornerBimodal(_) => CORNER_BIMODAL,
            Self::Patchy(_) => PATCHY,
            Self::RandomSnps(_) => RANDOM_SNPS,
            Self::OneSnp(_) => ONE_SNP,
        }
    }

    pub fn noise(&self) -> BaseNoise {
        match self {
            Self::Gaussian(noise) => *noise,
            Self::TransformCoord(m) => m.noise,
            Self::CornerBimodal(m) => m.noise,
            Self::Patchy(m) => m.noise,
            Self::RandomSnps(m) => m.noise,
            Self::OneSnp(m) => m.noise,
        }
    }

    /// Whether the model reads allele counts.
    pub fn uses_genotypes(&self) -> bool {
        matches!(self, Self::RandomSnps(_) | Self::OneSnp(_))
    }
}

// --- Generation ---

/// Auxiliary record of what drove the phenotype, kept for evaluating the association test.
#[derive(Clone, Debug, PartialEq)]
pub enum GroundTruth {
    None,
    Hotspots(Vec<Location>),
    CausalSites(Vec<usize>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct PhenotypeDraw {
    pub phenotypes: Vec<f64>,
    pub truth: GroundTruth,
}

impl PhenotypeDraw {
    pub fn causal_sites(&self) -> Option<&[usize]> {
        match &self.truth {
            GroundTruth::CausalSites(sites) => Some(sites),
            _ => None,
        }
    }

    pub fn hotspots(&self) -> Option<&[Location]> {
        match &self.truth {
            GroundTruth::Hotspots(points) => Some(points),
            _ => None,
        }
    }
}

fn require_genotypes<'a>(
    model: &PhenotypeModel,
    allele_counts: Option<&'a AlleleCounts>,
    sample_count: usize,
) -> Result<&'a AlleleCounts> {
    let counts = allele_counts.ok_or_else(|| {
        GwasSimError::upstream(format!("Model '{}' requires allele counts but none were supplied.", model.name()))
    })?;
    if counts.num_individuals() != sample_count {
        return Err(GwasSimError::upstream(format!(
            "Allele counts cover {} individuals but sample count is {}.",
            counts.num_individuals(),
            sample_count
        )));
    }
    if counts.num_sites() == 0 {
        return Err(GwasSimError::upstream("No variant sites present."));
    }
    Ok(counts)
}

/// Generates one phenotype per individual, in individual order.
///
/// All randomness is taken from `rng`, so identical seeds and inputs reproduce identical output.
pub fn generate<R: Rng>(
    model: &PhenotypeModel,
    locations: &[Location],
    allele_counts: Option<&AlleleCounts>,
    sample_count: usize,
    rng: &mut R,
) -> Result<PhenotypeDraw> {
    if locations.len() != sample_count {
        return Err(GwasSimError::upstream(format!(
            "Got {} locations for {} individuals.",
            locations.len(),
            sample_count
        )));
    }
    info!("Generating '{}' phenotypes for {} individuals.", model.name(), sample_count);

    let draw = match model {
        PhenotypeModel::Gaussian(noise) => PhenotypeDraw {
            phenotypes: (0..sample_count)
                .map(|_| noise.draw_shifted(0.0, rng))
                .collect::<Result<Vec<f64>>>()?,
            truth: GroundTruth::None,
        },
        PhenotypeModel::TransformCoord(m) => PhenotypeDraw {
            phenotypes: m.generate(locations, rng)?,
            truth: GroundTruth::None,
        },
        PhenotypeModel::CornerBimodal(m) => PhenotypeDraw {
            phenotypes: m.generate(locations, rng)?,
            truth: GroundTruth::None,
        },
        PhenotypeModel::Patchy(m) => {
            let (phenotypes, hotspots) = m.generate(locations, rng)?;
            PhenotypeDraw {
                phenotypes,
                truth: GroundTruth::Hotspots(hotspots),
            }
        }
        PhenotypeModel::RandomSnps(m) => {
            let counts = require_genotypes(model, allele_counts, sample_count)?;
            let (phenotypes, sites) = m.generate(counts, rng);
            PhenotypeDraw {
                phenotypes,
                truth: GroundTruth::CausalSites(sites),
            }
        }
        PhenotypeModel::OneSnp(m) => {
            let counts = require_genotypes(model, allele_counts, sample_count)?;
            let (phenotypes, site) = m.generate(counts, rng)?;
            PhenotypeDraw {
                phenotypes,
                truth: GroundTruth::CausalSites(vec![site]),
            }
        }
    };

    if !draw.phenotypes.is_empty() {
        info!(
            "Phenotype summary: n={}, mean={:.4}, sd={:.4}",
            draw.phenotypes.len(),
            draw.phenotypes.iter().mean(),
            draw.phenotypes.iter().std_dev()
        );
    }
    Ok(draw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use ndarray::Array2;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn model(name: &str, mean: f64, sd: f64) -> PhenotypeModel {
        PhenotypeModel::from_name(name, &ModelParams::with_mean_sd(mean, sd)).unwrap()
    }

    fn grid_locations(n: usize) -> Vec<Location> {
        (0..n)
            .map(|i| Location::new((i % 50) as f64, ((i / 50) % 50) as f64))
            .collect()
    }

    fn mean_of(values: &[f64]) -> f64 {
        values.iter().mean()
    }

    /// Alternate dosages laid out as `sites x individuals`.
    fn counts_from(rows: Vec<Vec<u8>>) -> AlleleCounts {
        let n = rows[0].len();
        let flat: Vec<u8> = rows.iter().flatten().copied().collect();
        AlleleCounts::from_alt_dosages(&Array2::from_shape_vec((rows.len(), n), flat).unwrap()).unwrap()
    }

    #[test]
    fn every_model_returns_one_value_per_individual() {
        let n = 40;
        let locations = grid_locations(n);
        let counts = counts_from(vec![
            (0..n).map(|i| if i < 12 { 1 } else { 0 }).collect(),
            (0..n).map(|i| (i % 3) as u8).collect(),
        ]);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for name in MODEL_NAMES {
            let draw = generate(&model(name, 100.0, 10.0), &locations, Some(&counts), n, &mut rng).unwrap();
            assert_eq!(draw.phenotypes.len(), n, "model {}", name);
            assert!(draw.phenotypes.iter().all(|p| p.is_finite()));
        }
    }

    #[test]
    fn unknown_model_name_is_a_configuration_error() {
        let err = PhenotypeModel::from_name("height", &ModelParams::with_mean_sd(1.0, 1.0)).unwrap_err();
        assert!(matches!(err, GwasSimError::InvalidModel { ref name } if name == "height"));
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn missing_sd_is_reported_by_name() {
        let params = ModelParams {
            mean: Some(100.0),
            ..ModelParams::default()
        };
        let err = PhenotypeModel::from_name(PATCHY, &params).unwrap_err();
        assert!(matches!(
            err,
            GwasSimError::MissingParameter { model: PATCHY, parameter: "phenotype-sd" }
        ));
    }

    #[test]
    fn negative_sd_and_empty_frequency_window_are_rejected() {
        assert!(PhenotypeModel::from_name(GAUSSIAN, &ModelParams::with_mean_sd(0.0, -1.0)).is_err());
        let params = ModelParams {
            snp_freq_min: Some(0.3),
            snp_freq_max: Some(0.2),
            ..ModelParams::with_mean_sd(0.0, 1.0)
        };
        let err = PhenotypeModel::from_name(ONE_SNP, &params).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn defaults_match_documented_constants() {
        match model(PATCHY, 0.0, 1.0) {
            PhenotypeModel::Patchy(p) => {
                assert_eq!(p.hotspot_count, 10);
                assert_eq!(p.map_width, 50.0);
                assert_eq!(p.radius, 5.0);
                assert_eq!(p.peak_shift, 2.0);
            }
            other => panic!("unexpected model {:?}", other),
        }
        match model(ONE_SNP, 0.0, 1.0) {
            PhenotypeModel::OneSnp(m) => {
                assert_eq!((m.freq_min, m.freq_max), (0.1, 0.2));
                assert_eq!(m.max_attempts, 10_000);
            }
            other => panic!("unexpected model {:?}", other),
        }
    }

    #[test]
    fn gaussian_matches_configured_moments() {
        let n = 20_000;
        let locations = vec![Location::new(0.0, 0.0); n];
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let draw = generate(&model(GAUSSIAN, 100.0, 10.0), &locations, None, n, &mut rng).unwrap();
        let mean = mean_of(&draw.phenotypes);
        let sd = draw.phenotypes.iter().std_dev();
        // 5 standard errors
        assert!((mean - 100.0).abs() < 5.0 * 10.0 / (n as f64).sqrt(), "mean {}", mean);
        assert!((sd - 10.0).abs() < 0.3, "sd {}", sd);
        assert_eq!(draw.truth, GroundTruth::None);
    }

    #[test]
    fn transform_coord_mean_increases_with_x() {
        let per_group = 4_000;
        let xs = [0.0, 12.5, 25.0, 50.0];
        let locations: Vec<Location> = xs
            .iter()
            .flat_map(|&x| std::iter::repeat(Location::new(x, 30.0)).take(per_group))
            .collect();
        let n = locations.len();
        let m = model(TRANSFORM_COORD, 0.0, 1.0);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let draw = generate(&m, &locations, None, n, &mut rng).unwrap();

        let group_means: Vec<f64> = draw.phenotypes.chunks(per_group).map(mean_of).collect();
        for pair in group_means.windows(2) {
            assert!(pair[0] < pair[1], "group means {:?}", group_means);
        }
        if let PhenotypeModel::TransformCoord(gradient) = m {
            for (&x, &observed) in xs.iter().zip(&group_means) {
                let expected = gradient.shift_in_sd(&Location::new(x, 0.0));
                assert!((observed - expected).abs() < 0.1, "x={} observed {}", x, observed);
            }
            assert_eq!(gradient.shift_in_sd(&Location::new(50.0, 0.0)), 3.0);
        }
    }

    #[test]
    fn corner_bimodal_shifts_everything_outside_the_corner() {
        let per_group = 5_000;
        let mut locations = vec![Location::new(5.0, 5.0); per_group];
        locations.extend(vec![Location::new(5.0, 35.0); per_group]);
        locations.extend(vec![Location::new(20.0, 5.0); per_group]);
        let n = locations.len();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let draw = generate(&model(CORNER_BIMODAL, 100.0, 10.0), &locations, None, n, &mut rng).unwrap();

        let means: Vec<f64> = draw.phenotypes.chunks(per_group).map(mean_of).collect();
        let tolerance = 5.0 * 10.0 / (per_group as f64).sqrt();
        assert!((means[0] - 100.0).abs() < tolerance, "corner mean {}", means[0]);
        assert!((means[1] - 120.0).abs() < tolerance, "outside mean {}", means[1]);
        // bound is exclusive
        assert!((means[2] - 120.0).abs() < tolerance, "edge mean {}", means[2]);
    }

    #[test]
    fn patchy_scale_decays_linearly_to_zero() {
        let PhenotypeModel::Patchy(patchy) = model(PATCHY, 0.0, 1.0) else {
            panic!("expected patchy model");
        };
        assert_eq!(patchy.scale(0.0), 2.0);
        assert!((patchy.scale(2.5) - 1.0).abs() < 1e-12);
        assert_eq!(patchy.scale(5.0), 0.0);
        assert_eq!(patchy.scale(5.0001), 0.0);
        assert_eq!(patchy.scale(40.0), 0.0);

        let mut previous = patchy.scale(0.0);
        for step in 1..=100 {
            let d = step as f64 * 0.06;
            let current = patchy.scale(d);
            assert!(current <= previous);
            assert!(previous - current < 0.03, "jump at distance {}", d);
            previous = current;
        }
    }

    #[test]
    fn patchy_raises_mean_at_hotspots_only() {
        let m = model(PATCHY, 0.0, 1.0);
        let PhenotypeModel::Patchy(patchy) = m.clone() else {
            panic!("expected patchy model");
        };
        let rng = ChaCha8Rng::seed_from_u64(99);
        let expected_hotspots = patchy.draw_hotspots(&mut rng.clone());
        assert_eq!(expected_hotspots.len(), 10);
        assert!(expected_hotspots
            .iter()
            .all(|h| (0.0..50.0).contains(&h.x) && (0.0..50.0).contains(&h.y)));

        let per_group = 4_000;
        let mut locations = vec![expected_hotspots[0]; per_group];
        locations.extend(vec![Location::new(1_000.0, 1_000.0); per_group]);
        let n = locations.len();
        let draw = generate(&m, &locations, None, n, &mut rng.clone()).unwrap();

        assert_eq!(draw.hotspots(), Some(expected_hotspots.as_slice()));
        let means: Vec<f64> = draw.phenotypes.chunks(per_group).map(mean_of).collect();
        assert!((means[0] - 2.0).abs() < 0.1, "hotspot mean {}", means[0]);
        assert!(means[1].abs() < 0.1, "far mean {}", means[1]);
    }

    #[test]
    fn random_snps_is_exactly_affine_in_alt_copies() {
        let n = 30;
        let rows: Vec<Vec<u8>> = (0..25)
            .map(|site| (0..n).map(|ind| ((site + ind) % 3) as u8).collect())
            .collect();
        let counts = counts_from(rows);
        let locations = grid_locations(n);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let draw = generate(&model(RANDOM_SNPS, 100.0, 10.0), &locations, Some(&counts), n, &mut rng).unwrap();

        let sites = draw.causal_sites().unwrap();
        assert_eq!(sites.len(), 100);
        assert!(sites.iter().all(|&s| s < 25));
        for ind in 0..n {
            let score: u32 = sites.iter().map(|&s| counts.alt_count(s, ind) as u32).sum();
            assert_eq!(draw.phenotypes[ind], 100.0 + score as f64 * (10.0 / 10.0));
        }
    }

    #[test]
    fn one_snp_picks_the_only_site_in_the_window() {
        // site 0: frequency 0, site 1: 900 / 6000 = 0.15, site 2: 0.5
        let n = 3_000;
        let site1: Vec<u8> = (0..n)
            .map(|i| if i < 300 { 1 } else if i < 600 { 2 } else { 0 })
            .collect();
        let counts = counts_from(vec![vec![0; n], site1, vec![1; n]]);
        let locations = vec![Location::new(0.0, 0.0); n];
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let draw = generate(&model(ONE_SNP, 0.0, 1.0), &locations, Some(&counts), n, &mut rng).unwrap();

        assert_eq!(draw.causal_sites(), Some(&[1usize][..]));
        let freq = counts.alt_frequency(1);
        assert!((0.1..0.2).contains(&freq));

        let het = mean_of(&draw.phenotypes[..300]);
        let hom = mean_of(&draw.phenotypes[300..600]);
        let reference = mean_of(&draw.phenotypes[600..]);
        assert!((reference - 0.0).abs() < 0.1, "0 copies {}", reference);
        assert!((het - 1.0).abs() < 0.3, "1 copy {}", het);
        assert!((hom - 2.0).abs() < 0.3, "2 copies {}", hom);
    }

    #[test]
    fn one_snp_upper_bound_is_exclusive() {
        // 2 copies of 10 chromosomes = 0.2, 1 copy = 0.1
        let counts = counts_from(vec![vec![2, 0, 0, 0, 0], vec![1, 0, 0, 0, 0]]);
        let m = model(ONE_SNP, 100.0, 10.0);
        let PhenotypeModel::OneSnp(one_snp) = m else {
            panic!("expected one_snp model");
        };
        assert!(!one_snp.qualifies(counts.alt_frequency(0)));
        assert!(one_snp.qualifies(counts.alt_frequency(1)));
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(one_snp.select_site(&counts, &mut rng).unwrap(), 1);
    }

    #[test]
    fn one_snp_without_qualifying_site_fails_fast() {
        let counts = counts_from(vec![vec![1; 10], vec![2; 10]]);
        let locations = vec![Location::new(0.0, 0.0); 10];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let err = generate(&model(ONE_SNP, 100.0, 10.0), &locations, Some(&counts), 10, &mut rng).unwrap_err();
        assert!(matches!(err, GwasSimError::NoQualifyingSite { attempts: 0, .. }));
        assert_eq!(err.kind(), ErrorKind::RejectionLoopExhausted);
    }

    #[test]
    fn one_snp_gives_up_after_max_attempts() {
        let num_sites = 10_000;
        let n = 10;
        let mut rows = vec![vec![0u8; n]; num_sites];
        rows[num_sites - 1][0] = 2;
        let counts = counts_from(rows);
        let params = ModelParams {
            max_attempts: Some(1),
            ..ModelParams::with_mean_sd(0.0, 1.0)
        };
        let m = PhenotypeModel::from_name(ONE_SNP, &params).unwrap();
        let locations = vec![Location::new(0.0, 0.0); n];
        let mut rng = ChaCha8Rng::seed_from_u64(2024);
        let err = generate(&m, &locations, Some(&counts), n, &mut rng).unwrap_err();
        assert!(matches!(err, GwasSimError::NoQualifyingSite { attempts: 1, .. }));
    }

    #[test]
    fn genetic_models_need_aligned_sites() {
        let locations = vec![Location::new(0.0, 0.0); 4];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let err = generate(&model(RANDOM_SNPS, 0.0, 1.0), &locations, None, 4, &mut rng).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamData);

        let three = counts_from(vec![vec![0, 1, 2]]);
        let err = generate(&model(RANDOM_SNPS, 0.0, 1.0), &locations, Some(&three), 4, &mut rng).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamData);

        let no_sites = AlleleCounts::from_alt_dosages(&Array2::<u8>::zeros((0, 4))).unwrap();
        let err = generate(&model(ONE_SNP, 0.0, 1.0), &locations, Some(&no_sites), 4, &mut rng).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamData);
    }

    #[test]
    fn location_count_must_match_sample_count() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let err = generate(&model(GAUSSIAN, 0.0, 1.0), &grid_locations(3), None, 4, &mut rng).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamData);
    }

    #[test]
    fn same_seed_reproduces_identical_phenotypes() {
        let n = 60;
        let locations = grid_locations(n);
        let counts = counts_from(vec![
            (0..n).map(|i| if i % 4 == 0 { 1 } else { 0 }).collect(),
            (0..n).map(|i| (i % 3) as u8).collect(),
        ]);
        for name in MODEL_NAMES {
            let m = model(name, 100.0, 10.0);
            let first = generate(&m, &locations, Some(&counts), n, &mut ChaCha8Rng::seed_from_u64(42)).unwrap();
            let second = generate(&m, &locations, Some(&counts), n, &mut ChaCha8Rng::seed_from_u64(42)).unwrap();
            assert_eq!(first, second, "model {}", name);
            let bits_a: Vec<u64> = first.phenotypes.iter().map(|p| p.to_bits()).collect();
            let bits_b: Vec<u64> = second.phenotypes.iter().map(|p| p.to_bits()).collect();
            assert_eq!(bits_a, bits_b);
        }
    }
}
