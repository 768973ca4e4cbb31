pub mod loader;
pub mod model;

pub use loader::MatrixLoader;
pub use model::SampleMatrix;
