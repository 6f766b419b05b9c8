/// Controls how a schema file is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// When true, a missing schema file is created from the built-in template.
    pub materialize_template: bool,
    /// Maximum schema file size in bytes.
    pub max_file_size: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            materialize_template: true,
            max_file_size: 256 * 1024,
        }
    }
}
