//! Decoder limits.

/// Parts larger than this are spilled to a temporary file.
pub const DEFAULT_MEMORY_THRESHOLD: usize = 1 << 20; // 1 MiB
/// Maximum total size of one part's header block.
pub const DEFAULT_MAX_HEADER_SIZE: usize = 10 << 20; // 10 MiB
/// Maximum number of header lines per part.
pub const DEFAULT_MAX_HEADERS: usize = 10000;

/// Configuration for multipart decoding.
///
/// ```
/// use tokio_mime_entity::DecoderConfig;
///
/// let config = DecoderConfig::new().memory_threshold(64 * 1024);
/// assert_eq!(config.get_memory_threshold(), 64 * 1024);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfig {
    memory_threshold: usize,
    max_header_size: usize,
    max_headers: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            memory_threshold: DEFAULT_MEMORY_THRESHOLD,
            max_header_size: DEFAULT_MAX_HEADER_SIZE,
            max_headers: DEFAULT_MAX_HEADERS,
        }
    }
}

impl DecoderConfig {
    /// Creates a config with the default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the part size above which content is written to a temporary file.
    #[must_use]
    pub fn memory_threshold(mut self, size: usize) -> Self {
        self.memory_threshold = size;
        self
    }

    /// Set the maximum size of a part's header block.
    #[must_use]
    pub fn max_header_size(mut self, size: usize) -> Self {
        self.max_header_size = size;
        self
    }

    /// Set the maximum number of header lines per part.
    #[must_use]
    pub fn max_headers(mut self, count: usize) -> Self {
        self.max_headers = count;
        self
    }

    /// Returns the spill threshold in bytes.
    #[must_use]
    pub fn get_memory_threshold(&self) -> usize {
        self.memory_threshold
    }

    /// Returns the header block size limit.
    #[must_use]
    pub fn get_max_header_size(&self) -> usize {
        self.max_header_size
    }

    /// Returns the header count limit.
    #[must_use]
    pub fn get_max_headers(&self) -> usize {
        self.max_headers
    }
}
