//! Variable classification.
//!
//! Variables are visited in file order and each one is given the first role
//! whose rule matches: Z axis, X axis, Y axis, T axis, member axis,
//! projection, auxiliary geographic grid, and finally data parameter.

use serde::Serialize;

use crate::attribute::attribute_equals;
use crate::dimensions::DimensionRoles;
use crate::error::{GridError, Result};
use crate::store::{Schema, VariableInfo};

/// Projection identifier used when no grid mapping is declared
pub const DEFAULT_PROJECTION: &str = "latitude_longitude";

/// Names of the auxiliary geographic coordinate variables
pub const AUX_LONGITUDE: &str = "longitude";
pub const AUX_LATITUDE: &str = "latitude";

/// How one horizontal axis variable was picked
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AxisDecision {
    /// Every variable matching the axis rule, in file order
    pub candidates: Vec<String>,
    /// Candidates that replaced the previous choice, in order
    pub accepted: Vec<String>,
    /// Candidates ignored because the current choice carries an explicit `axis`
    pub skipped: Vec<String>,
    /// The variable in use
    pub chosen: Option<String>,
}

impl AxisDecision {
    fn offer(&mut self, schema: &Schema, var: &VariableInfo, axis: &str) {
        self.candidates.push(var.name.clone());
        let keeps_current = self
            .chosen
            .as_deref()
            .and_then(|name| schema.variable(name))
            .map(|current| attribute_equals(&current.attributes, "axis", axis))
            .unwrap_or(false);

        if keeps_current {
            self.skipped.push(var.name.clone());
        } else {
            self.accepted.push(var.name.clone());
            self.chosen = Some(var.name.clone());
        }
    }
}

/// Role of every variable in a file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableClasses {
    pub x: AxisDecision,
    pub y: AxisDecision,
    pub z: Option<String>,
    pub t: String,
    pub member: Option<String>,
    /// Variable carrying `grid_mapping_name`
    pub projection: Option<String>,
    /// Value of `grid_mapping_name`, or [`DEFAULT_PROJECTION`]
    pub projection_name: String,
    /// `latitude`/`longitude` variables that are not axes
    pub auxiliary: Vec<String>,
    /// Data parameters in file order
    pub parameters: Vec<String>,
}

impl VariableClasses {
    pub fn x_var(&self) -> &str {
        self.x.chosen.as_deref().unwrap_or_default()
    }

    pub fn y_var(&self) -> &str {
        self.y.chosen.as_deref().unwrap_or_default()
    }
}

fn is_x_candidate(var: &VariableInfo, roles: &DimensionRoles) -> bool {
    var.name == roles.x
        || attribute_equals(&var.attributes, "standard_name", "longitude")
        || attribute_equals(&var.attributes, "standard_name", "projection_x_coordinate")
}

fn is_y_candidate(var: &VariableInfo, roles: &DimensionRoles) -> bool {
    var.name == roles.y || attribute_equals(&var.attributes, "standard_name", "latitude")
}

/// Assign roles to the variables of `schema`.
pub fn classify_variables(schema: &Schema, roles: &DimensionRoles) -> Result<VariableClasses> {
    let mut x = AxisDecision::default();
    let mut y = AxisDecision::default();
    let mut z = None;
    let mut t = None;
    let mut member = None;
    let mut projection = None;
    let mut projection_name = DEFAULT_PROJECTION.to_string();
    let mut auxiliary = Vec::new();
    let mut parameters = Vec::new();

    for var in &schema.variables {
        let name = var.name.as_str();

        if let Some(z_dim) = roles.z.as_deref() {
            if name == z_dim || attribute_equals(&var.attributes, "axis", "Z") {
                z = Some(var.name.clone());
                continue;
            }
        }
        if is_x_candidate(var, roles) {
            x.offer(schema, var, "X");
            continue;
        }
        if is_y_candidate(var, roles) {
            y.offer(schema, var, "Y");
            continue;
        }
        if name == roles.t {
            t = Some(var.name.clone());
            continue;
        }
        if roles.member.as_deref() == Some(name) {
            member = Some(var.name.clone());
            continue;
        }
        if let Some(mapping) = var.attribute("grid_mapping_name") {
            projection_name = mapping.as_text().unwrap_or_default();
            projection = Some(var.name.clone());
            continue;
        }
        if name == AUX_LATITUDE || name == AUX_LONGITUDE {
            auxiliary.push(var.name.clone());
            continue;
        }
        parameters.push(var.name.clone());
    }

    let missing: Vec<&str> = [
        ("x", x.chosen.is_none()),
        ("y", y.chosen.is_none()),
        ("t", t.is_none()),
    ]
    .into_iter()
    .filter_map(|(axis, absent)| absent.then_some(axis))
    .collect();
    if !missing.is_empty() {
        return Err(GridError::structural(format!(
            "Missing coordinate variable for axis: {}",
            missing.join(", ")
        )));
    }
    if parameters.is_empty() {
        return Err(GridError::structural("No data parameters found"));
    }

    Ok(VariableClasses {
        x,
        y,
        z,
        t: t.unwrap_or_default(),
        member,
        projection,
        projection_name,
        auxiliary,
        parameters,
    })
}
