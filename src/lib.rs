//! Simulated GWAS on individuals sampled from spatial population-genetic simulations.
//!
//! The crate samples individuals through an external sampler, summarizes their genotypes
//! into allele counts and principal components, draws a phenotype under one of several
//! spatial or genetic models, and hands everything to plink for association testing.

pub mod error;
pub mod genotype;
pub mod output;
pub mod pca;
pub mod phenotype;
pub mod pipeline;
pub mod sampling;
pub mod tools;
pub mod vcf;

pub use error::{ErrorKind, GwasSimError, PipelineError, Stage};
pub use genotype::{AlleleCounts, HaplotypeMatrix, Location};
pub use phenotype::{generate, GroundTruth, ModelParams, PhenotypeDraw, PhenotypeModel};
pub use pipeline::{ArtifactPaths, Pipeline, RunArtifacts, RunConfig};
