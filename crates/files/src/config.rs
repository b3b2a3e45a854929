use micro_serve::codec::DEFAULT_MAX_HEADER_SIZE;
use micro_serve::handler::DEFAULT_INBOUND_BUFFER_SIZE;

/// Default size of one response write, 1 MiB.
pub const DEFAULT_OUTPUT_BUFFER_SIZE: usize = 1024 * 1024;

/// Buffer sizes of a [`FileStreamHandler`](crate::FileStreamHandler).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHandlerConfig {
    inbound_buffer_size: usize,
    output_buffer_size: usize,
    max_header_size: usize,
}

impl FileHandlerConfig {
    pub fn new() -> Self {
        Self {
            inbound_buffer_size: DEFAULT_INBOUND_BUFFER_SIZE,
            output_buffer_size: DEFAULT_OUTPUT_BUFFER_SIZE,
            max_header_size: DEFAULT_MAX_HEADER_SIZE,
        }
    }

    /// Size of every read from the connection. Zero is replaced by one.
    #[must_use]
    pub fn with_inbound_buffer_size(mut self, size: usize) -> Self {
        self.inbound_buffer_size = size.max(1);
        self
    }

    /// Maximum size of one write. The first write carries the response head and
    /// the start of the file. Zero is replaced by one.
    #[must_use]
    pub fn with_output_buffer_size(mut self, size: usize) -> Self {
        self.output_buffer_size = size.max(1);
        self
    }

    #[must_use]
    pub fn with_max_header_size(mut self, size: usize) -> Self {
        self.max_header_size = size;
        self
    }

    pub fn inbound_buffer_size(&self) -> usize {
        self.inbound_buffer_size
    }

    pub fn output_buffer_size(&self) -> usize {
        self.output_buffer_size
    }

    pub fn max_header_size(&self) -> usize {
        self.max_header_size
    }
}

impl Default for FileHandlerConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = FileHandlerConfig::default();

        assert_eq!(config.inbound_buffer_size(), 1024);
        assert_eq!(config.output_buffer_size(), 1024 * 1024);
        assert_eq!(config.max_header_size(), 8 * 1024);
    }

    #[test]
    fn zero_buffer_sizes_are_raised() {
        let config = FileHandlerConfig::new().with_inbound_buffer_size(0).with_output_buffer_size(0);

        assert_eq!(config.inbound_buffer_size(), 1);
        assert_eq!(config.output_buffer_size(), 1);
    }
}
