pub mod dropbox;
pub mod local;
pub mod memory;
pub mod qdrant;

pub use dropbox::DropboxStore;
pub use local::LocalStore;
pub use memory::MemoryIndex;
pub use qdrant::QdrantStore;
