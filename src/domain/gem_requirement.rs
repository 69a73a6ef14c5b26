//! RubyGems-compatible version requirements
//!
//! Handles:
//! - Operators: `=`, `!=`, `>`, `<`, `>=`, `<=`, `~>`
//! - Bare versions, which mean `=`
//! - Compound requirements: `>= 1.0, < 2.0`
//! - The empty requirement, which means `>= 0`

use super::gem_version::GemVersion;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static CLAUSE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(=|!=|>=|<=|>|<|~>)?\s*([0-9][0-9a-zA-Z.\-]*)\s*$").unwrap()
});

/// Comparison operator of a single requirement clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    NotEq,
    Gt,
    Lt,
    Gte,
    Lte,
    Pessimistic,
}

impl Operator {
    pub const ALL: [Operator; 7] = [
        Operator::Eq,
        Operator::NotEq,
        Operator::Gt,
        Operator::Lt,
        Operator::Gte,
        Operator::Lte,
        Operator::Pessimistic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Gte => ">=",
            Operator::Lte => "<=",
            Operator::Pessimistic => "~>",
        }
    }

    fn parse(op: &str) -> Option<Self> {
        match op {
            "=" => Some(Operator::Eq),
            "!=" => Some(Operator::NotEq),
            ">" => Some(Operator::Gt),
            "<" => Some(Operator::Lt),
            ">=" => Some(Operator::Gte),
            "<=" => Some(Operator::Lte),
            "~>" => Some(Operator::Pessimistic),
            _ => None,
        }
    }

    /// Upper-bound operators (`<`, `<=`)
    pub fn is_ceiling(&self) -> bool {
        matches!(self, Operator::Lt | Operator::Lte)
    }

    /// Lower-bound operators (`>`, `>=`)
    pub fn is_floor(&self) -> bool {
        matches!(self, Operator::Gt | Operator::Gte)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for a requirement string that cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illformed requirement \"{0}\"")]
pub struct IllformedRequirement(pub String);

/// One `(operator, version)` pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Clause {
    pub op: Operator,
    pub version: GemVersion,
}

impl Clause {
    pub fn new(op: Operator, version: GemVersion) -> Self {
        Self { op, version }
    }

    /// Parse one clause such as `~> 1.4.0` or `1.2`
    pub fn parse(input: &str) -> Result<Self, IllformedRequirement> {
        let caps = CLAUSE_RE
            .captures(input)
            .ok_or_else(|| IllformedRequirement(input.to_string()))?;
        let op = caps
            .get(1)
            .and_then(|m| Operator::parse(m.as_str()))
            .unwrap_or(Operator::Eq);
        let version = caps
            .get(2)
            .map(|m| GemVersion::parse(m.as_str()))
            .transpose()
            .map_err(|_| IllformedRequirement(input.to_string()))?
            .ok_or_else(|| IllformedRequirement(input.to_string()))?;
        Ok(Self { op, version })
    }

    pub fn satisfied_by(&self, candidate: &GemVersion) -> bool {
        let v = &self.version;
        match self.op {
            Operator::Eq => candidate == v,
            Operator::NotEq => candidate != v,
            Operator::Gt => candidate > v,
            Operator::Lt => candidate < v,
            Operator::Gte => candidate >= v,
            Operator::Lte => candidate <= v,
            Operator::Pessimistic => candidate >= v && candidate.release() < v.bump(),
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.op, self.version)
    }
}

/// A set of clauses that must all hold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GemRequirement {
    clauses: Vec<Clause>,
}

impl GemRequirement {
    /// The unconstrained requirement `>= 0`
    pub fn default_requirement() -> Self {
        Self {
            clauses: vec![Clause::new(Operator::Gte, GemVersion::from_numbers(&[0]))],
        }
    }

    /// Parse a comma-separated requirement string
    pub fn parse(input: &str) -> Result<Self, IllformedRequirement> {
        Self::from_parts(input.split(','))
    }

    /// Parse a list of clause strings, each of which may itself hold commas
    pub fn from_parts<'a>(
        parts: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, IllformedRequirement> {
        let mut clauses: Vec<Clause> = Vec::new();
        for part in parts {
            for piece in part.split(',') {
                if piece.trim().is_empty() {
                    continue;
                }
                let clause = Clause::parse(piece)?;
                if !clauses.contains(&clause) {
                    clauses.push(clause);
                }
            }
        }
        Ok(Self::from_clauses(clauses))
    }

    pub fn from_clauses(clauses: Vec<Clause>) -> Self {
        if clauses.is_empty() {
            Self::default_requirement()
        } else {
            Self { clauses }
        }
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// True for a single `=` clause
    pub fn is_exact(&self) -> bool {
        self.clauses.len() == 1 && self.clauses[0].op == Operator::Eq
    }

    pub fn satisfied_by(&self, candidate: &GemVersion) -> bool {
        self.clauses.iter().all(|c| c.satisfied_by(candidate))
    }

    /// True if any clause names a prerelease version
    pub fn mentions_prerelease(&self) -> bool {
        self.clauses.iter().any(|c| c.version.is_prerelease())
    }
}

impl FromStr for GemRequirement {
    type Err = IllformedRequirement;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for GemRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.clauses.iter().map(|c| c.to_string()).collect();
        f.write_str(&parts.join(", "))
    }
}
