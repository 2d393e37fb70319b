pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryDispatchStore;
pub use postgres::PostgresDispatchStore;
