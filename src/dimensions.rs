//! Dimension classification.
//!
//! Every dimension is matched, case-sensitively, against fixed alias lists.
//! When several dimensions claim the same role the last one scanned wins; the
//! full candidate list is kept in a [`RoleDecision`] so the choice can be
//! inspected.

use serde::Serialize;
use std::fmt;

use crate::error::{GridError, Result};
use crate::store::Schema;

const X_ALIASES: &[&str] = &["x", "X", "lon", "longitude"];
const Y_ALIASES: &[&str] = &["y", "Y", "lat", "latitude"];
const T_ALIASES: &[&str] = &["time", "time_counter", "rec"];
const Z_ALIASES: &[&str] = &["level", "lev", "pressure", "height", "hybrid"];
const MEMBER_ALIASES: &[&str] = &["ensemble_member", "member"];

/// Semantic role of a dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    X,
    Y,
    Z,
    T,
    Member,
}

impl Role {
    pub const ALL: [Role; 5] = [Role::X, Role::Y, Role::Z, Role::T, Role::Member];

    /// Whether a dimension with this name (and unlimited flag) claims the role.
    pub fn matches(self, name: &str, unlimited: bool) -> bool {
        match self {
            Role::X => X_ALIASES.contains(&name),
            Role::Y => Y_ALIASES.contains(&name),
            Role::T => T_ALIASES.contains(&name) || unlimited,
            Role::Z => Z_ALIASES.contains(&name) || name.contains("depth"),
            Role::Member => MEMBER_ALIASES.contains(&name),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::X => "x",
            Role::Y => "y",
            Role::Z => "z",
            Role::T => "t",
            Role::Member => "member",
        };
        f.write_str(name)
    }
}

/// Every dimension that matched a role, and the one that was kept
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleDecision {
    pub role: Role,
    /// Matching dimensions in file order
    pub candidates: Vec<String>,
    /// The last candidate, if any
    pub chosen: Option<String>,
}

impl RoleDecision {
    pub fn is_ambiguous(&self) -> bool {
        self.candidates.len() > 1
    }
}

/// Dimension names assigned to each role
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DimensionRoles {
    pub x: String,
    pub y: String,
    pub t: String,
    pub z: Option<String>,
    pub member: Option<String>,
    /// One decision per role, in [`Role::ALL`] order
    pub decisions: Vec<RoleDecision>,
}

impl DimensionRoles {
    /// Dimension name assigned to `role`.
    pub fn name(&self, role: Role) -> Option<&str> {
        match role {
            Role::X => Some(&self.x),
            Role::Y => Some(&self.y),
            Role::T => Some(&self.t),
            Role::Z => self.z.as_deref(),
            Role::Member => self.member.as_deref(),
        }
    }

    /// Role of the dimension called `name`, checked in T, Z, X, Y, Member order.
    pub fn role_of(&self, name: &str) -> Option<Role> {
        [Role::T, Role::Z, Role::X, Role::Y, Role::Member]
            .into_iter()
            .find(|&role| self.name(role) == Some(name))
    }

    pub fn decision(&self, role: Role) -> Option<&RoleDecision> {
        self.decisions.iter().find(|d| d.role == role)
    }

    /// Decisions where more than one dimension claimed the role.
    pub fn ambiguities(&self) -> impl Iterator<Item = &RoleDecision> {
        self.decisions.iter().filter(|d| d.is_ambiguous())
    }
}

/// Assign roles to the dimensions of `schema`.
///
/// Fails with a structural error when X, Y or T is missing, or when the T
/// dimension is not the unlimited dimension.
pub fn classify_dimensions(schema: &Schema) -> Result<DimensionRoles> {
    let decisions: Vec<RoleDecision> = Role::ALL
        .into_iter()
        .map(|role| {
            let candidates: Vec<String> = schema
                .dimensions
                .iter()
                .filter(|dim| role.matches(&dim.name, dim.unlimited))
                .map(|dim| dim.name.clone())
                .collect();
            RoleDecision {
                role,
                chosen: candidates.last().cloned(),
                candidates,
            }
        })
        .collect();

    let chosen = |role: Role| {
        decisions
            .iter()
            .find(|d| d.role == role)
            .and_then(|d| d.chosen.clone())
    };

    let x = chosen(Role::X);
    let y = chosen(Role::Y);
    let t = chosen(Role::T);
    let t_unlimited = t
        .as_deref()
        .and_then(|name| schema.dimension(name))
        .map(|dim| dim.unlimited)
        .unwrap_or(false);

    let (Some(x), Some(y), Some(t)) = (x.clone(), y.clone(), t.clone()) else {
        return Err(GridError::structural(format!(
            "All required dimensions not found (x: {}, y: {}, t: {})",
            found(&x),
            found(&y),
            found(&t)
        )));
    };
    if !t_unlimited {
        return Err(GridError::structural(format!(
            "Time dimension {} is not the unlimited dimension",
            t
        )));
    }

    Ok(DimensionRoles {
        x,
        y,
        t,
        z: chosen(Role::Z),
        member: chosen(Role::Member),
        decisions,
    })
}

fn found(name: &Option<String>) -> &str {
    name.as_deref().unwrap_or("not found")
}
