pub mod tensor;
pub mod shape;
pub mod dtype;
pub mod error;
pub mod estimator;

pub use tensor::Tensor;
pub use shape::Shape;
pub use dtype::Float;
pub use error::{TensorError, TensorResult};
pub use estimator::{Estimator, Transformer};
