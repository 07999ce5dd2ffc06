mod mongodb;
mod repository;

pub use self::mongodb::MongoCatalogRepository;
pub use repository::{CatalogRepository, ProductStream};

#[cfg(test)]
pub use repository::MockCatalogRepository;
