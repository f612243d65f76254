//! in-toto link and SLSA provenance extractors.
//!
//! Both read their input so that unreadable files fail the run like every
//! other extractor, then return an empty stream tagged with their source.

use super::Extractor;
use crate::error::ExtractError;
use crate::record::RecordStream;
use std::path::Path;

fn read_attestation(source: &'static str, input: &str) -> Result<RecordStream, ExtractError> {
    let bytes = std::fs::read(input).map_err(|err| ExtractError::Read {
        path: Path::new(input).to_path_buf(),
        source: err,
    })?;
    tracing::debug!(source, input, bytes = bytes.len(), "attestation read, no records mapped");
    Ok(RecordStream::new(source))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InTotoExtractor;

impl Extractor for InTotoExtractor {
    fn source(&self) -> &'static str {
        "in-toto"
    }

    fn parse(&self, input: &str) -> Result<RecordStream, ExtractError> {
        read_attestation(self.source(), input)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SlsaExtractor;

impl Extractor for SlsaExtractor {
    fn source(&self) -> &'static str {
        "SLSA"
    }

    fn parse(&self, input: &str) -> Result<RecordStream, ExtractError> {
        read_attestation(self.source(), input)
    }
}
