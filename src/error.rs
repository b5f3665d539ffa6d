// error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Broad classification used when reporting a failed run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    UpstreamData,
    RejectionLoopExhausted,
    ExternalTool,
    Io,
}

#[derive(Error, Debug)]
pub enum GwasSimError {
    #[error("Unknown phenotype model '{name}'. Expected one of: gaussian, transform_coord, corner_bimodal, patchy, random_snps, one_snp")]
    InvalidModel { name: String },

    #[error("Phenotype model '{model}' requires parameter '{parameter}'")]
    MissingParameter {
        model: &'static str,
        parameter: &'static str,
    },

    #[error("Invalid value for '{parameter}': {message}")]
    InvalidParameter {
        parameter: &'static str,
        message: String,
    },

    #[error("Upstream data error: {message}")]
    UpstreamData { message: String },

    #[error("No site with alternate-allele frequency in [{lower}, {upper}) found after {attempts} attempt(s)")]
    NoQualifyingSite {
        lower: f64,
        upper: f64,
        attempts: usize,
    },

    #[error("External tool '{program}' failed ({status}): {stderr}")]
    ExternalTool {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, GwasSimError>;

impl GwasSimError {
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::UpstreamData {
            message: message.into(),
        }
    }

    pub fn invalid_parameter(parameter: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter,
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidModel { .. }
            | Self::MissingParameter { .. }
            | Self::InvalidParameter { .. } => ErrorKind::Configuration,
            Self::UpstreamData { .. } => ErrorKind::UpstreamData,
            Self::NoQualifyingSite { .. } => ErrorKind::RejectionLoopExhausted,
            Self::ExternalTool { .. } => ErrorKind::ExternalTool,
            Self::Io { .. } => ErrorKind::Io,
        }
    }
}

/// Pipeline stage at which a run failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Sampling,
    Summarizing,
    PedConversion,
    PhenotypeGeneration,
    Association,
    Cleanup,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Sampling => "sampling",
            Stage::Summarizing => "genotype summary",
            Stage::PedConversion => "VCF to PED conversion",
            Stage::PhenotypeGeneration => "phenotype generation",
            Stage::Association => "association testing",
            Stage::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
#[error("Stage '{stage}' failed on {}: {source}", .artifact.display())]
pub struct PipelineError {
    pub stage: Stage,
    pub artifact: PathBuf,
    #[source]
    pub source: GwasSimError,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }
}
