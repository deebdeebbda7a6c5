/// The scorer's verdict for one frame.
///
/// `detected` is `true` for scorer variants that carry no face-presence
/// signal, so their results flow through the same decision rule.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Observation {
    pub similarity: f64,
    pub verified: bool,
    pub detected: bool,
}

impl Observation {
    pub fn new(similarity: f64, verified: bool) -> Self {
        Self {
            similarity,
            verified,
            detected: true,
        }
    }

    /// An observation for a frame in which no face was found.
    pub fn no_face() -> Self {
        Self {
            similarity: 0.0,
            verified: false,
            detected: false,
        }
    }

    /// Similarity on the 0-100 scale shown to users.
    pub fn similarity_percent(&self) -> f64 {
        self.similarity * 100.0
    }
}
