pub mod dataset;
pub mod schema;

pub use dataset::*;
pub use schema::*;
