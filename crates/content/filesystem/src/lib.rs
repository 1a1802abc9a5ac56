mod store;

pub use store::FilesystemContentStore;
