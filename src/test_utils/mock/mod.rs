mod failing_codec;
mod faulty_engine;

pub use failing_codec::*;
pub use faulty_engine::*;
