pub mod archive;
pub mod cache;
pub mod download;
pub mod store;
pub mod version;

pub use archive::*;
pub use cache::*;
pub use download::*;
pub use store::*;
pub use version::*;
