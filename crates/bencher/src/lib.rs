/// A request fixture fed to the parser in chunks of `chunk_size` bytes.
#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    file: TestFile,
    chunk_size: Option<usize>,
}

impl TestCase {
    /// The whole fixture arrives in a single chunk.
    pub fn whole(name: &'static str, file: TestFile) -> Self {
        Self { name, file, chunk_size: None }
    }

    /// The fixture arrives in chunks of at most `chunk_size` bytes, the way an
    /// inbound stream with that read buffer size delivers it.
    pub fn chunked(name: &'static str, file: TestFile, chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk size must be positive");
        Self { name, file, chunk_size: Some(chunk_size) }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn file(&self) -> &TestFile {
        &self.file
    }

    pub fn chunks(&self) -> impl Iterator<Item = &'static [u8]> + use<> {
        let content = self.file.content().as_bytes();
        let chunk_size = self.chunk_size.unwrap_or(content.len().max(1));
        content.chunks(chunk_size)
    }
}

#[derive(Debug, Copy, Clone)]
pub struct TestFile {
    file_name: &'static str,
    content: &'static str,
}

impl TestFile {
    pub const fn new(file_name: &'static str, content: &'static str) -> Self {
        Self { file_name, content }
    }

    pub fn content(&self) -> &'static str {
        self.content
    }

    pub fn file_name(&self) -> &'static str {
        self.file_name
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}
