pub mod kalman;
pub mod landmark;
pub mod one_euro;
pub mod pointer;

pub use kalman::{ConstantVelocityFilter, NoiseParams};
pub use landmark::LandmarkSmoother;
pub use one_euro::{OneEuroFilter, OneEuroParams};
pub use pointer::PointerSmoother;
