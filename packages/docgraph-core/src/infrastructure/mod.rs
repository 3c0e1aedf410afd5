//! Reference adapters for the ports in [`crate::ports`]

mod fs_loader;
mod memory_loader;
mod package_resolver;

pub use fs_loader::FsUrlLoader;
pub use memory_loader::InMemoryUrlLoader;
pub use package_resolver::PackageUrlResolver;
