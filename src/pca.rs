// pca.rs

use crate::error::{GwasSimError, Result};
use crate::genotype::AlleleCounts;
use efficient_pca::PCA as EfficientPcaModel;
use log::{info, warn};
use ndarray::{s, Array2};

/// Number of principal components written to the covariate file.
pub const DEFAULT_COMPONENTS: usize = 10;

/// Computes the per-individual covariate block used to adjust association tests.
pub trait CovariateEmbedder {
    /// Returns an `individuals x components` matrix, one row per individual in input order.
    fn embed(&self, allele_counts: &AlleleCounts) -> Result<Array2<f64>>;
}

pub struct EfficientPcaEmbedder {
    pub components: usize,
    pub n_oversamples: usize,
    pub seed: Option<u64>,
}

impl EfficientPcaEmbedder {
    pub fn new(components: usize, seed: Option<u64>) -> Self {
        Self {
            components,
            n_oversamples: 10,
            seed,
        }
    }
}

impl CovariateEmbedder for EfficientPcaEmbedder {
    fn embed(&self, allele_counts: &AlleleCounts) -> Result<Array2<f64>> {
        let genotype_matrix = allele_counts.reference_dosage_matrix();
        let transformed_pcs = run_genomic_pca(genotype_matrix, self.components, self.n_oversamples, self.seed)?;
        Ok(pad_components(transformed_pcs, self.components))
    }
}

fn run_genomic_pca(
    genotype_matrix: Array2<f64>,
    components: usize,
    n_oversamples: usize,
    seed: Option<u64>,
) -> Result<Array2<f64>> {
    if components == 0 {
        return Err(GwasSimError::invalid_parameter("pca-components", "must be > 0"));
    }

    let num_samples = genotype_matrix.nrows();
    let num_features = genotype_matrix.ncols();

    if num_samples < 2 {
        return Err(GwasSimError::upstream(format!(
            "PCA requires at least 2 samples, found {}.",
            num_samples
        )));
    }
    if num_features == 0 {
        return Err(GwasSimError::upstream("PCA requires at least 1 variant site, found 0."));
    }

    let mut k_actual = components;
    let max_possible_k = num_samples.min(num_features);
    if k_actual > max_possible_k {
        warn!(
            "Requested k={} exceeds max possible ({}), adjusting to {}.",
            k_actual, max_possible_k, max_possible_k
        );
        k_actual = max_possible_k;
    }

    info!(
        "Running efficient_pca rfit: k={}, oversamples={}, seed={:?}, tolerance=None",
        k_actual, n_oversamples, seed
    );

    let mut pca_model = EfficientPcaModel::new();
    pca_model
        .rfit(genotype_matrix.clone(), k_actual, n_oversamples, seed, None)
        .map_err(|e| GwasSimError::upstream(format!("PCA fit failed: {}", e)))?;

    let computed_k_in_model = pca_model.rotation().map_or(0, |r| r.ncols());
    if computed_k_in_model == 0 {
        warn!("PCA model resulted in 0 components despite requesting {}.", k_actual);
        return Ok(Array2::<f64>::zeros((num_samples, 0)));
    } else if computed_k_in_model < k_actual {
        info!("PCA model computed {} components (requested/capped at {}).", computed_k_in_model, k_actual);
    }

    pca_model
        .transform(genotype_matrix)
        .map_err(|e| GwasSimError::upstream(format!("PCA transform failed: {}", e)))
}

/// Widens `pcs` with zero columns until it has `components` columns.
pub fn pad_components(pcs: Array2<f64>, components: usize) -> Array2<f64> {
    if pcs.ncols() >= components {
        return pcs.slice(s![.., ..components]).to_owned();
    }
    warn!(
        "Only {} principal component(s) available; padding covariates to {} with zeros.",
        pcs.ncols(),
        components
    );
    let mut padded = Array2::<f64>::zeros((pcs.nrows(), components));
    padded.slice_mut(s![.., ..pcs.ncols()]).assign(&pcs);
    padded
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn padding_keeps_existing_columns() {
        let padded = pad_components(array![[1.0, 2.0], [3.0, 4.0]], 4);
        assert_eq!(padded.dim(), (2, 4));
        assert_eq!(padded[[1, 1]], 4.0);
        assert_eq!(padded[[1, 3]], 0.0);
    }

    #[test]
    fn extra_columns_are_truncated() {
        let trimmed = pad_components(array![[1.0, 2.0, 3.0]], 2);
        assert_eq!(trimmed, array![[1.0, 2.0]]);
    }

    #[test]
    fn embedding_has_one_row_per_individual() {
        use rand::{Rng, SeedableRng};
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(17);
        let alt = Array2::from_shape_fn((60, 30), |_| rng.random_range(0..3u8));
        let counts = AlleleCounts::from_alt_dosages(&alt).unwrap();
        let pcs = EfficientPcaEmbedder::new(DEFAULT_COMPONENTS, Some(17)).embed(&counts).unwrap();
        assert_eq!(pcs.dim(), (30, DEFAULT_COMPONENTS));
        assert!(pcs.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn single_sample_is_rejected() {
        let counts = AlleleCounts::from_alt_dosages(&array![[1], [0]]).unwrap();
        let err = EfficientPcaEmbedder::new(DEFAULT_COMPONENTS, Some(1)).embed(&counts).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::UpstreamData);
    }
}
