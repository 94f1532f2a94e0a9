//! Probabilistic counting structures
//!
//! - [`CountMinSketch`]: bounded-memory frequency estimation with one-sided error
//! - [`SketchKey`]: tagged node / edge keys used to index the sketches

mod count_min;
mod key;

pub use count_min::CountMinSketch;
pub use key::SketchKey;
