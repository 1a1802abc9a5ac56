mod backend;

pub use backend::MemoryMetadataBackend;
