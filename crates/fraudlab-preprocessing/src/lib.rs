pub mod dedupe;
pub mod pca;
pub mod scaler;
pub mod transform;
pub mod smote;
pub mod split;

pub use dedupe::*;
pub use pca::*;
pub use scaler::*;
pub use transform::*;
pub use smote::*;
pub use split::*;
