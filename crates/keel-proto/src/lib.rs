pub mod lower;
pub mod schema;

pub use lower::lower;
pub use schema::*;
