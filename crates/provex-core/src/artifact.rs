//! Pipeline artifacts
//!
//! Every stage reads exactly one artifact and writes a new one; nothing is
//! rewritten in place. The role records where in the pipeline a file belongs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Logical role of an intermediate file in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactRole {
    /// Original user source
    Source,
    /// Source after the transform chain
    NormalizedSource,
    /// Output of the slicer stage
    SlicedBitcode,
    /// Output of the instrumenter stage
    InstrumentedBitcode,
    /// Final linked bitcode handed to the back end
    LinkedBitcode,
}

impl fmt::Display for ArtifactRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArtifactRole::Source => "source",
            ArtifactRole::NormalizedSource => "normalized-source",
            ArtifactRole::SlicedBitcode => "sliced-bitcode",
            ArtifactRole::InstrumentedBitcode => "instrumented-bitcode",
            ArtifactRole::LinkedBitcode => "linked-bitcode",
        };
        f.write_str(name)
    }
}

/// A named file on disk plus its logical role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineArtifact {
    path: PathBuf,
    role: ArtifactRole,
}

impl PipelineArtifact {
    /// Register a file produced by a stage
    pub fn new(path: impl Into<PathBuf>, role: ArtifactRole) -> Self {
        PipelineArtifact {
            path: path.into(),
            role,
        }
    }

    /// Location of the file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Logical role in the pipeline
    pub fn role(&self) -> ArtifactRole {
        self.role
    }

    /// Read the file contents for bookkeeping (fixed-point checks)
    pub fn read_bytes(&self) -> std::io::Result<Vec<u8>> {
        std::fs::read(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_names_are_stable() {
        assert_eq!(ArtifactRole::NormalizedSource.to_string(), "normalized-source");
        assert_eq!(ArtifactRole::LinkedBitcode.to_string(), "linked-bitcode");
    }

    #[test]
    fn artifact_keeps_path_and_role() {
        let artifact = PipelineArtifact::new("/tmp/x.bc", ArtifactRole::SlicedBitcode);
        assert_eq!(artifact.path(), Path::new("/tmp/x.bc"));
        assert_eq!(artifact.role(), ArtifactRole::SlicedBitcode);
    }
}
