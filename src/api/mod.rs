pub mod catalog;
pub mod client;
pub mod models;
pub mod storage;
pub mod upload;

#[cfg(test)]
pub(crate) mod memory;

use catalog::CatalogStore;
use storage::MediaStore;

/// Everything the application needs from the hosted backend.
pub trait Backend: CatalogStore + MediaStore + 'static {}

impl<T> Backend for T where T: CatalogStore + MediaStore + 'static {}
