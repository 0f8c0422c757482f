//! Principals, reference entities and the relations that connect them
//!
//! A relation is a junction table keyed by (principal id, reference id) with at
//! most one optional scalar attribute. Everything the engine needs to know about
//! a relation (tables, columns, request field names, strategy) is answered here,
//! so strategies and stores never special-case a concrete relation.

use serde::Serialize;
use std::fmt;

use super::strategy::Strategy;

/// Entity that owns links
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrincipalKind {
    Engineer,
    CareerRecord,
}

impl PrincipalKind {
    pub const ALL: [PrincipalKind; 2] = [Self::Engineer, Self::CareerRecord];

    /// Principal collection mounted at `/{segment}`
    pub fn from_segment(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.segment() == segment)
    }

    pub fn table(self) -> &'static str {
        match self {
            Self::Engineer => "engineers",
            Self::CareerRecord => "career_histories",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Engineer => "Engineer",
            Self::CareerRecord => "Career history",
        }
    }

    pub fn plural(self) -> &'static str {
        match self {
            Self::Engineer => "engineers",
            Self::CareerRecord => "career histories",
        }
    }

    /// Path segment of the principal collection
    pub fn segment(self) -> &'static str {
        match self {
            Self::Engineer => "engineers",
            Self::CareerRecord => "career-histories",
        }
    }

    /// JSON field carrying the principal id in link projections
    pub fn id_field(self) -> &'static str {
        match self {
            Self::Engineer => "engineerId",
            Self::CareerRecord => "careerId",
        }
    }
}

impl fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How a reference entity is keyed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdShape {
    /// Short text code such as `rust` or `aws-saa`
    Code,
    /// Small positive integer
    Sequence,
}

/// Master-data entity that principals link to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    Skill,
    Qualification,
    ProcessStage,
}

impl ReferenceKind {
    pub fn table(self) -> &'static str {
        match self {
            Self::Skill => "skills",
            Self::Qualification => "qualifications",
            Self::ProcessStage => "process_stages",
        }
    }

    pub fn id_shape(self) -> IdShape {
        match self {
            Self::Skill | Self::Qualification => IdShape::Code,
            Self::ProcessStage => IdShape::Sequence,
        }
    }

    /// Object key of the embedded entity in link projections
    pub fn noun(self) -> &'static str {
        match self {
            Self::Skill => "skill",
            Self::Qualification => "qualification",
            Self::ProcessStage => "process",
        }
    }

    pub fn plural(self) -> &'static str {
        match self {
            Self::Skill => "skills",
            Self::Qualification => "qualifications",
            Self::ProcessStage => "processes",
        }
    }

    pub fn id_field(self) -> &'static str {
        match self {
            Self::Skill => "skillId",
            Self::Qualification => "qualificationId",
            Self::ProcessStage => "processId",
        }
    }

    pub fn ids_field(self) -> &'static str {
        match self {
            Self::Skill => "skillIds",
            Self::Qualification => "qualificationIds",
            Self::ProcessStage => "processIds",
        }
    }

    pub fn not_found_field(self) -> &'static str {
        match self {
            Self::Skill => "notFoundSkills",
            Self::Qualification => "notFoundQualifications",
            Self::ProcessStage => "notFoundProcesses",
        }
    }
}

/// Identifier of a reference entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum RefId {
    Code(String),
    Seq(i64),
}

impl RefId {
    /// Interpret a raw path token according to the kind's id shape.
    ///
    /// Tokens that cannot be a valid id of that shape stay as codes, so they
    /// are reported back verbatim as not found instead of being rejected.
    pub fn parse(shape: IdShape, raw: &str) -> Self {
        match shape {
            IdShape::Sequence => raw
                .parse::<i64>()
                .map(Self::Seq)
                .unwrap_or_else(|_| Self::Code(raw.to_string())),
            IdShape::Code => Self::Code(raw.to_string()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Code(code) => serde_json::Value::String(code.clone()),
            Self::Seq(n) => serde_json::Value::from(*n),
        }
    }
}

impl fmt::Display for RefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => f.write_str(code),
            Self::Seq(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for RefId {
    fn from(code: &str) -> Self {
        Self::Code(code.to_string())
    }
}

impl From<i64> for RefId {
    fn from(n: i64) -> Self {
        Self::Seq(n)
    }
}

impl From<i32> for RefId {
    fn from(n: i32) -> Self {
        Self::Seq(i64::from(n))
    }
}

/// Value type of a link attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    Text,
    /// Calendar date, stored as `YYYY-MM-DD`
    Date,
}

/// The optional scalar carried by a link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attribute {
    pub column: &'static str,
    pub field: &'static str,
    pub kind: AttrKind,
}

const VERSION: Attribute = Attribute {
    column: "version",
    field: "version",
    kind: AttrKind::Text,
};

const ACQUIRED_AT: Attribute = Attribute {
    column: "acquired_at",
    field: "acquiredAt",
    kind: AttrKind::Date,
};

/// A principal-to-reference relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Relation {
    EngineerSkills,
    EngineerQualifications,
    CareerSkills,
    CareerProcesses,
}

impl Relation {
    pub const ALL: [Relation; 4] = [
        Self::EngineerSkills,
        Self::EngineerQualifications,
        Self::CareerSkills,
        Self::CareerProcesses,
    ];

    pub fn principal(self) -> PrincipalKind {
        match self {
            Self::EngineerSkills | Self::EngineerQualifications => PrincipalKind::Engineer,
            Self::CareerSkills | Self::CareerProcesses => PrincipalKind::CareerRecord,
        }
    }

    pub fn reference(self) -> ReferenceKind {
        match self {
            Self::EngineerSkills | Self::CareerSkills => ReferenceKind::Skill,
            Self::EngineerQualifications => ReferenceKind::Qualification,
            Self::CareerProcesses => ReferenceKind::ProcessStage,
        }
    }

    /// Reconciliation strategy used when a caller posts links
    pub fn strategy(self) -> Strategy {
        match self {
            Self::CareerProcesses => Strategy::Replace,
            _ => Strategy::Merge,
        }
    }

    pub fn table(self) -> &'static str {
        match self {
            Self::EngineerSkills => "engineer_skills",
            Self::EngineerQualifications => "engineer_qualifications",
            Self::CareerSkills => "career_skills",
            Self::CareerProcesses => "career_processes",
        }
    }

    pub fn principal_column(self) -> &'static str {
        match self.principal() {
            PrincipalKind::Engineer => "engineer_id",
            PrincipalKind::CareerRecord => "career_id",
        }
    }

    pub fn reference_column(self) -> &'static str {
        match self.reference() {
            ReferenceKind::Skill => "skill_id",
            ReferenceKind::Qualification => "qualification_id",
            ReferenceKind::ProcessStage => "process_id",
        }
    }

    pub fn attribute(self) -> Option<Attribute> {
        match self {
            Self::EngineerSkills | Self::CareerSkills => Some(VERSION),
            Self::EngineerQualifications => Some(ACQUIRED_AT),
            Self::CareerProcesses => None,
        }
    }

    /// Human-readable name used in response messages
    pub fn describe(self) -> &'static str {
        match self {
            Self::EngineerSkills => "engineer skills",
            Self::EngineerQualifications => "engineer qualifications",
            Self::CareerSkills => "career skills",
            Self::CareerProcesses => "career processes",
        }
    }

    /// Find the relation mounted under `/{principal}/{id}/{segment}`
    pub fn resolve(principal: PrincipalKind, segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|relation| {
            relation.principal() == principal && relation.reference().plural() == segment
        })
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}
