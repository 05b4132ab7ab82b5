use sea_orm::DatabaseConnection;
use std::sync::Arc;

pub mod catalog_repository;
pub mod order_repository;

pub use catalog_repository::CatalogRepository;
pub use order_repository::OrderRepository;

/// Gives repositories uniform access to the shared connection
pub trait Repository {
    fn get_db(&self) -> &DatabaseConnection;
}

#[derive(Debug, Clone)]
pub struct BaseRepository {
    db: Arc<DatabaseConnection>,
}

impl BaseRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl Repository for BaseRepository {
    fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }
}
