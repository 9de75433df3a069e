pub mod generate;
pub mod sampling_params;

pub use generate::*;
pub use sampling_params::*;
