use std::fmt;

/// Summary of which sinks passed the startup probe. Only used for logging and
/// reporting; dispatch always tries every available sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingMode {
    Standalone,
    Hybrid,
    Full,
}

impl OperatingMode {
    pub fn classify(available: usize, total: usize) -> Self {
        if available == 0 {
            Self::Standalone
        } else if available < total {
            Self::Hybrid
        } else {
            Self::Full
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standalone => "STANDALONE",
            Self::Hybrid => "HYBRID",
            Self::Full => "FULL",
        }
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
