//! Built-in visualizers. Each one owns its simulation state and audio
//! feature extraction; only schema-declared parameters survive switches.

pub mod bars;
pub mod kaleidoscope;
pub mod particles;
pub mod plasma;
pub mod scope;
