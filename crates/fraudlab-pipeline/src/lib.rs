pub mod settings;
pub mod error;
pub mod models;
pub mod evaluate;
pub mod runner;

pub use settings::*;
pub use error::*;
pub use models::*;
pub use evaluate::*;
pub use runner::*;
