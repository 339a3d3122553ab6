pub mod schema_gen;
pub mod sqlite;
pub mod value;

pub use schema_gen::{generate_create_table, generate_indexes};
pub use sqlite::{Store, Table};
pub use value::SqlValue;
