use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{SimError, SimResult};

pub const P_CC_GROW: &str = "P_CC_GROW";
pub const P_HEP_DAMAGED: &str = "P_HEP_DAMAGED";
pub const P_HEP_CLEARED: &str = "P_HEP_CLEARED";
pub const P_CC_KILLED: &str = "P_CC_KILLED";

/// Rule-set configuration selected for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ModelVariant {
    /// Growth, hepatocyte damage and clearance only.
    Baseline,
    /// Baseline plus ECM deposition for uncleared peri-central apoptotic hepatocytes.
    Fibrosis,
    /// Baseline plus the implicit immune predation pass.
    ImmunePredation,
    /// Baseline, but a cancer cell that fails to grow moves into the free site instead.
    MoveOrGrow,
}

impl ModelVariant {
    pub const ALL: [ModelVariant; 4] = [
        ModelVariant::Baseline,
        ModelVariant::Fibrosis,
        ModelVariant::ImmunePredation,
        ModelVariant::MoveOrGrow,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ModelVariant::Baseline => "baseline",
            ModelVariant::Fibrosis => "fibrosis",
            ModelVariant::ImmunePredation => "immune_predation",
            ModelVariant::MoveOrGrow => "move_or_grow",
        }
    }

    pub fn has_fibrosis(self) -> bool { self == ModelVariant::Fibrosis }
    pub fn has_immune_predation(self) -> bool { self == ModelVariant::ImmunePredation }
    pub fn has_move_or_grow(self) -> bool { self == ModelVariant::MoveOrGrow }
}

impl FromStr for ModelVariant {
    type Err = SimError;

    fn from_str(s: &str) -> SimResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "baseline" | "model_1" => Ok(ModelVariant::Baseline),
            "fibrosis" | "model_2" => Ok(ModelVariant::Fibrosis),
            "immune_predation" | "model_3" => Ok(ModelVariant::ImmunePredation),
            "move_or_grow" | "model_4" => Ok(ModelVariant::MoveOrGrow),
            other => Err(SimError::ConfigurationMismatch(format!(
                "unrecognized model variant '{}'",
                other
            ))),
        }
    }
}

impl TryFrom<String> for ModelVariant {
    type Error = SimError;
    fn try_from(s: String) -> SimResult<Self> { s.parse() }
}

impl From<ModelVariant> for String {
    fn from(v: ModelVariant) -> String { v.name().to_string() }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

/// How a hepatocyte enqueued several times in one step is processed.
///
/// `PerEnqueue` visits it once per enqueue, so a hepatocyte damaged on its first
/// visit faces the clearance draw on its second. `Once` keeps only the first
/// enqueue of each hepatocyte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageQueuePolicy {
    #[default]
    PerEnqueue,
    Once,
}

/// Simulation parameters derived from the configuration. Read-only during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimParams {
    pub variant: ModelVariant,

    // Transition probabilities
    pub p_cc_grow: f64,
    pub p_hep_damaged: f64,
    pub p_hep_cleared: f64,
    /// Only present under the immune predation variant.
    pub p_cc_killed: Option<f64>,

    pub damage_queue: DamageQueuePolicy,

    // Lattice geometry
    pub spacing: f64,
    pub pericentral_radius: f64,

    /// Run the lattice/registry consistency check at the end of every step.
    pub check_invariants: bool,
}

impl SimParams {
    /// Default probability set of `variant` on a lattice with the given spacing.
    pub fn for_variant(variant: ModelVariant, spacing: f64) -> Self {
        let p_cc_grow = if variant.has_move_or_grow() { 0.5 } else { 1.0 };
        let p_cc_killed = if variant.has_immune_predation() { Some(0.5) } else { None };
        SimParams {
            variant,
            p_cc_grow,
            p_hep_damaged: 0.5,
            p_hep_cleared: 0.5,
            p_cc_killed,
            damage_queue: DamageQueuePolicy::default(),
            spacing,
            pericentral_radius: 5.0 * spacing,
            check_invariants: true,
        }
    }

    /// Looks up a probability by its recognized name.
    pub fn get(&self, name: &str) -> SimResult<f64> {
        match name {
            P_CC_GROW => Ok(self.p_cc_grow),
            P_HEP_DAMAGED => Ok(self.p_hep_damaged),
            P_HEP_CLEARED => Ok(self.p_hep_cleared),
            P_CC_KILLED => self.p_cc_killed.ok_or_else(|| {
                SimError::ConfigurationMismatch(format!(
                    "{} is not defined for the {} variant",
                    P_CC_KILLED, self.variant
                ))
            }),
            other => Err(SimError::ConfigurationMismatch(format!(
                "unrecognized parameter '{}'",
                other
            ))),
        }
    }

    /// Overrides a probability by its recognized name.
    pub fn set(&mut self, name: &str, value: f64) -> SimResult<()> {
        if !(0.0..=1.0).contains(&value) {
            return Err(SimError::ConfigurationMismatch(format!(
                "{} must lie in [0, 1], got {}",
                name, value
            )));
        }
        match name {
            P_CC_GROW => self.p_cc_grow = value,
            P_HEP_DAMAGED => self.p_hep_damaged = value,
            P_HEP_CLEARED => self.p_hep_cleared = value,
            P_CC_KILLED if self.variant.has_immune_predation() => self.p_cc_killed = Some(value),
            P_CC_KILLED => {
                return Err(SimError::ConfigurationMismatch(format!(
                    "{} cannot be set under the {} variant",
                    P_CC_KILLED, self.variant
                )))
            }
            other => {
                return Err(SimError::ConfigurationMismatch(format!(
                    "unrecognized parameter '{}'",
                    other
                )))
            }
        }
        Ok(())
    }

    /// The kill probability, or `ConfigurationMismatch` if immune predation is not enabled.
    pub fn kill_probability(&self) -> SimResult<f64> {
        if !self.variant.has_immune_predation() {
            return Err(SimError::ConfigurationMismatch(format!(
                "immune predation is not enabled under the {} variant",
                self.variant
            )));
        }
        self.get(P_CC_KILLED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_defaults_follow_model_table() {
        let base = SimParams::for_variant(ModelVariant::Baseline, 1.0);
        assert_eq!(base.p_cc_grow, 1.0);
        assert_eq!(base.p_hep_damaged, 0.5);
        assert_eq!(base.p_hep_cleared, 0.5);
        assert!(base.p_cc_killed.is_none());

        let immune = SimParams::for_variant(ModelVariant::ImmunePredation, 1.0);
        assert_eq!(immune.get(P_CC_KILLED).unwrap(), 0.5);

        let move_or_grow = SimParams::for_variant(ModelVariant::MoveOrGrow, 2.0);
        assert_eq!(move_or_grow.p_cc_grow, 0.5);
        assert_eq!(move_or_grow.pericentral_radius, 10.0);
    }

    #[test]
    fn variant_names_parse_both_spellings() {
        assert_eq!("model_2".parse::<ModelVariant>().unwrap(), ModelVariant::Fibrosis);
        assert_eq!("Move_Or_Grow".parse::<ModelVariant>().unwrap(), ModelVariant::MoveOrGrow);
        for v in ModelVariant::ALL {
            assert_eq!(v.name().parse::<ModelVariant>().unwrap(), v);
        }
        assert!(matches!(
            "model_5".parse::<ModelVariant>(),
            Err(SimError::ConfigurationMismatch(_))
        ));
    }

    #[test]
    fn unknown_or_inapplicable_parameters_are_rejected() {
        let mut params = SimParams::for_variant(ModelVariant::Fibrosis, 1.0);
        assert!(matches!(params.get("P_FOO"), Err(SimError::ConfigurationMismatch(_))));
        assert!(matches!(params.get(P_CC_KILLED), Err(SimError::ConfigurationMismatch(_))));
        assert!(matches!(params.set(P_CC_KILLED, 0.1), Err(SimError::ConfigurationMismatch(_))));
        assert!(matches!(params.set(P_CC_GROW, 1.5), Err(SimError::ConfigurationMismatch(_))));
        assert!(matches!(params.kill_probability(), Err(SimError::ConfigurationMismatch(_))));

        params.set(P_HEP_CLEARED, 0.25).unwrap();
        assert_eq!(params.get(P_HEP_CLEARED).unwrap(), 0.25);
    }
}
