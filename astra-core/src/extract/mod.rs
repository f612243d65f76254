//! Format extractors: one per input kind, each turning a raw log into a
//! [`RecordStream`].

pub mod attestation;
pub mod buildinfo;
pub mod git;
pub mod signature;

use crate::config::AstraConfig;
use crate::error::{ExtractError, FormatError};
use crate::record::RecordStream;
use std::str::FromStr;

pub use attestation::{InTotoExtractor, SlsaExtractor};
pub use buildinfo::BuildinfoExtractor;
pub use git::GitExtractor;

/// The contract every extractor satisfies.
pub trait Extractor {
    /// Source tag stamped on emitted streams.
    fn source(&self) -> &'static str;

    /// Extract records from a path or URL. Errors are fatal to the run.
    fn parse(&self, input: &str) -> Result<RecordStream, ExtractError>;
}

/// Declared input format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Git,
    InToto,
    Slsa,
    Buildinfo,
}

impl Format {
    pub const ALL: [Format; 4] = [Format::Git, Format::InToto, Format::Slsa, Format::Buildinfo];

    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Git => "git",
            Format::InToto => "in-toto",
            Format::Slsa => "slsa",
            Format::Buildinfo => "buildinfo",
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "git" => Ok(Format::Git),
            "in-toto" | "intoto" => Ok(Format::InToto),
            "slsa" => Ok(Format::Slsa),
            "buildinfo" | "build-info" => Ok(Format::Buildinfo),
            _ => Err(FormatError(s.to_string())),
        }
    }
}

/// Select the extractor for `format`.
pub fn extractor_for(format: Format, config: &AstraConfig) -> Box<dyn Extractor> {
    match format {
        Format::Git => Box::new(GitExtractor::new(config.git.clone())),
        Format::InToto => Box::new(InTotoExtractor),
        Format::Slsa => Box::new(SlsaExtractor),
        Format::Buildinfo => Box::new(BuildinfoExtractor::new(config.buildinfo.clone())),
    }
}

/// Route `input` to the extractor for `format` and run it.
pub fn extract(
    format: Format,
    input: &str,
    config: &AstraConfig,
) -> Result<RecordStream, ExtractError> {
    let extractor = extractor_for(format, config);
    tracing::info!(format = %format, input, "extracting");
    let stream = extractor.parse(input)?;
    tracing::info!(
        source = %stream.source,
        records = stream.records.len(),
        "extraction finished"
    );
    Ok(stream)
}
