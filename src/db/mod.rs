pub mod memory;
pub mod postgres;
pub mod store;

pub use memory::MemoryFavoritesStore;
pub use postgres::{create_pool, run_migrations, PgFavoritesStore};
pub use store::FavoritesStore;
