mod light_tracer;
mod mmlt;
mod path_tracer;
mod sbdpt;

pub use self::light_tracer::light_trace;
pub use self::mmlt::{MarkovChain, MmltSampler};
pub use self::path_tracer::path_trace;
pub use self::sbdpt::{sample_sbdpt, SbdptSample};

use crate::float::*;

/// Balance heuristic between two sampling techniques
pub fn balance_heuristic(pdf_a: Float, pdf_b: Float) -> Float {
    if pdf_a <= 0.0 {
        0.0
    } else {
        pdf_a / (pdf_a + pdf_b)
    }
}
