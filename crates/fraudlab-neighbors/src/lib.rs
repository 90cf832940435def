pub mod search;
pub mod knn;

pub use search::*;
pub use knn::*;
