use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

/// Entity families that own an ordered image collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Activity,
    Vehicle,
}

impl EntityKind {
    /// Table holding the `images` and `images_version` columns for this family.
    pub fn table_name(&self) -> &'static str {
        match self {
            EntityKind::Activity => "activities",
            EntityKind::Vehicle => "vehicles",
        }
    }
}

impl FromStr for EntityKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "activity" | "activities" => Ok(EntityKind::Activity),
            "vehicle" | "vehicles" => Ok(EntityKind::Vehicle),
            _ => Err(anyhow::anyhow!("Invalid entity kind: {}", s)),
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            EntityKind::Activity => write!(f, "activity"),
            EntityKind::Vehicle => write!(f, "vehicle"),
        }
    }
}

/// Identifies the single entity owning an image collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: Uuid,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: Uuid) -> Self {
        Self { kind, id }
    }

    pub fn activity(id: Uuid) -> Self {
        Self::new(EntityKind::Activity, id)
    }

    pub fn vehicle(id: Uuid) -> Self {
        Self::new(EntityKind::Vehicle, id)
    }
}

impl Display for EntityRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}:{}", self.kind, self.id)
    }
}
