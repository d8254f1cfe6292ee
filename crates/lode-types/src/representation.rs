use lode_stream::GuardedStream;

use crate::identifier::ResourceIdentifier;
use crate::metadata::RepresentationMetadata;

/// An identifier, its metadata and, when present, a data stream.
///
/// A representation without data only describes metadata (an existence check
/// or a container description). `binary` marks representations whose data is
/// an opaque byte stream, which is what storage accessors accept.
#[derive(Debug)]
pub struct Representation {
    metadata: RepresentationMetadata,
    data: Option<GuardedStream>,
    binary: bool,
}

impl Representation {
    /// A binary representation carrying `data`.
    pub fn new(metadata: RepresentationMetadata, data: GuardedStream) -> Self {
        Self {
            metadata,
            data: Some(data),
            binary: true,
        }
    }

    /// A representation with metadata only.
    pub fn metadata_only(metadata: RepresentationMetadata) -> Self {
        Self {
            metadata,
            data: None,
            binary: false,
        }
    }

    /// Override the binary flag.
    pub fn with_binary(mut self, binary: bool) -> Self {
        self.binary = binary;
        self
    }

    pub fn identifier(&self) -> &ResourceIdentifier {
        self.metadata.identifier()
    }

    pub fn metadata(&self) -> &RepresentationMetadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut RepresentationMetadata {
        &mut self.metadata
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    pub fn is_binary(&self) -> bool {
        self.binary
    }

    /// Split into metadata and the (single-consumer) data stream.
    pub fn into_parts(self) -> (RepresentationMetadata, Option<GuardedStream>) {
        (self.metadata, self.data)
    }
}
