pub mod csv_io;
pub mod error;
pub mod report;

pub use csv_io::*;
pub use error::*;
pub use report::*;
