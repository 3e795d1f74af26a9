use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Finding severity, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// Numeric rank used for impact scoring (INFO=0 .. CRITICAL=4).
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Info => 0,
            Severity::Low => 1,
            Severity::Medium => 2,
            Severity::High => 3,
            Severity::Critical => 4,
        }
    }

    fn from_rank(rank: u8) -> Severity {
        match rank {
            0 => Severity::Info,
            1 => Severity::Low,
            2 => Severity::Medium,
            3 => Severity::High,
            _ => Severity::Critical,
        }
    }

    /// Escalate severity by the number of additional risk factors other
    /// detectors contributed: one factor bumps a level (saturating), two or
    /// more go straight to CRITICAL.
    pub fn escalate(self, risk_factors: usize) -> Severity {
        match risk_factors {
            0 => self,
            1 => Severity::from_rank(self.rank().saturating_add(1).min(4)),
            _ => Severity::Critical,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Node labels of the code graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeLabel {
    File,
    Module,
    Class,
    Function,
    Attribute,
    /// Placeholder for relationship targets that do not exist in the repo.
    External,
    /// Transient per-detector annotation node (FLAGGED_BY target).
    DetectorMetadata,
}

impl NodeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeLabel::File => "File",
            NodeLabel::Module => "Module",
            NodeLabel::Class => "Class",
            NodeLabel::Function => "Function",
            NodeLabel::Attribute => "Attribute",
            NodeLabel::External => "External",
            NodeLabel::DetectorMetadata => "DetectorMetadata",
        }
    }
}

impl fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NodeLabel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "File" => Ok(NodeLabel::File),
            "Module" => Ok(NodeLabel::Module),
            "Class" => Ok(NodeLabel::Class),
            "Function" => Ok(NodeLabel::Function),
            "Attribute" => Ok(NodeLabel::Attribute),
            "External" => Ok(NodeLabel::External),
            "DetectorMetadata" => Ok(NodeLabel::DetectorMetadata),
            other => Err(format!("unknown node label: {other}")),
        }
    }
}

/// Relationship types of the code graph. The identifier spliced into any
/// internal index is always taken from this closed enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelType {
    Contains,
    Imports,
    Calls,
    Inherits,
    Overrides,
    Uses,
    FlaggedBy,
}

impl RelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelType::Contains => "CONTAINS",
            RelType::Imports => "IMPORTS",
            RelType::Calls => "CALLS",
            RelType::Inherits => "INHERITS",
            RelType::Overrides => "OVERRIDES",
            RelType::Uses => "USES",
            RelType::FlaggedBy => "FLAGGED_BY",
        }
    }

    pub const ALL: [RelType; 7] = [
        RelType::Contains,
        RelType::Imports,
        RelType::Calls,
        RelType::Inherits,
        RelType::Overrides,
        RelType::Uses,
        RelType::FlaggedBy,
    ];
}

impl fmt::Display for RelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RelType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "CONTAINS" => Ok(RelType::Contains),
            "IMPORTS" => Ok(RelType::Imports),
            "CALLS" => Ok(RelType::Calls),
            "INHERITS" => Ok(RelType::Inherits),
            "OVERRIDES" => Ok(RelType::Overrides),
            "USES" => Ok(RelType::Uses),
            "FLAGGED_BY" => Ok(RelType::FlaggedBy),
            other => Err(format!("unknown relationship type: {other}")),
        }
    }
}

/// Source languages the extractor registry recognizes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    Python,
    Other(String),
}

impl Language {
    pub fn as_str(&self) -> &str {
        match self {
            Language::Python => "python",
            Language::Other(s) => s.as_str(),
        }
    }
}

/// Letter grade of the overall health score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }

    /// Rank for monotonicity checks: F=0 < D=1 < C=2 < B=3 < A=4.
    pub fn rank(&self) -> u8 {
        match self {
            Grade::F => 0,
            Grade::D => 1,
            Grade::C => 2,
            Grade::B => 3,
            Grade::A => 4,
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
