use serde::{Deserialize, Serialize};
use anyhow::Result;
use crate::sim_params::{DamageQueuePolicy, ModelVariant, SimParams};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// Lattice geometry settings
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LatticeConfig {
    /// CSV site table with columns `site_id,x,y,site_type`.
    pub site_table: PathBuf,
    pub spacing: f64,
    /// Distance to the nearest central vein at or below which a hepatocyte site is peri-central.
    /// Defaults to `5 * spacing`.
    #[serde(default)]
    pub pericentral_radius: Option<f64>,
}

// Rule-set selection and probability overrides
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ModelConfig {
    pub variant: ModelVariant,
    #[serde(default)]
    pub damage_queue: DamageQueuePolicy,
    #[serde(default = "default_check_invariants")]
    pub check_invariants: bool,
    /// Overrides keyed by recognized parameter name (`P_CC_GROW`, ...).
    #[serde(default)]
    pub parameters: BTreeMap<String, f64>,
}

fn default_check_invariants() -> bool {
    true
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct InitialConditions {
    pub num_cancer_cells: usize,
    pub seed: u64,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TimingConfig {
    pub total_steps: u32,
    #[serde(default = "default_record_interval")]
    pub record_interval_steps: u32,
}

fn default_record_interval() -> u32 {
    1
}

// Configuration for output settings, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    pub base_filename: String,
    pub save_positions: bool,
    pub save_stats: bool,
    #[serde(default)]
    pub save_positions_in_snapshot: bool,
    pub format: Option<String>, // Output format: "json", "bincode", "messagepack"
}

// Main simulation configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SimulationConfig {
    pub lattice: LatticeConfig,
    pub model: ModelConfig,
    pub initial_conditions: InitialConditions,
    pub timing: TimingConfig,
    pub output: OutputConfig,
}

impl SimulationConfig {
    /// Loads the simulation configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        let config = Self::from_toml_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Invalid config '{}': {}", path_ref.display(), e))?;
        Ok(config)
    }

    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: SimulationConfig = toml::from_str(config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML: {}", e))?;

        if !(config.lattice.spacing.is_finite() && config.lattice.spacing > 0.0) {
            anyhow::bail!("lattice.spacing must be positive.");
        }
        if let Some(r) = config.lattice.pericentral_radius {
            if !(r.is_finite() && r >= 0.0) {
                anyhow::bail!("lattice.pericentral_radius must be non-negative.");
            }
        }
        if config.timing.record_interval_steps == 0 {
            anyhow::bail!("timing.record_interval_steps must be greater than 0.");
        }
        // Surfaces unknown parameter names and out-of-range values up front.
        config.get_sim_params()?;

        Ok(config)
    }

    /// Converts the configuration into simulation parameters used at runtime.
    pub fn get_sim_params(&self) -> Result<SimParams> {
        let mut params = SimParams::for_variant(self.model.variant, self.lattice.spacing);
        if let Some(r) = self.lattice.pericentral_radius {
            params.pericentral_radius = r;
        }
        params.damage_queue = self.model.damage_queue;
        params.check_invariants = self.model.check_invariants;
        for (name, value) in &self.model.parameters {
            params.set(name, *value)?;
        }
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim_params::P_CC_KILLED;

    const BASE: &str = r#"
[lattice]
site_table = "lattice.csv"
spacing = 1.0

[model]
variant = "model_3"

[model.parameters]
P_CC_KILLED = 0.2

[initial_conditions]
num_cancer_cells = 3
seed = 7

[timing]
total_steps = 10
record_interval_steps = 2

[output]
base_filename = "run"
save_positions = false
save_stats = true
"#;

    #[test]
    fn parses_and_applies_overrides() {
        let config = SimulationConfig::from_toml_str(BASE).unwrap();
        let params = config.get_sim_params().unwrap();
        assert_eq!(params.variant, ModelVariant::ImmunePredation);
        assert_eq!(params.get(P_CC_KILLED).unwrap(), 0.2);
        assert_eq!(params.pericentral_radius, 5.0);
        assert_eq!(params.damage_queue, DamageQueuePolicy::PerEnqueue);
        assert!(params.check_invariants);
    }

    #[test]
    fn rejects_unknown_variant_and_parameter() {
        let bad_variant = BASE.replace("model_3", "model_9");
        assert!(SimulationConfig::from_toml_str(&bad_variant).is_err());

        let bad_param = BASE.replace("P_CC_KILLED = 0.2", "P_CC_EXPLODE = 0.2");
        assert!(SimulationConfig::from_toml_str(&bad_param).is_err());

        let killed_without_immune = BASE.replace("model_3", "baseline");
        assert!(SimulationConfig::from_toml_str(&killed_without_immune).is_err());
    }

    #[test]
    fn queue_policy_and_radius_are_configurable() {
        let text = BASE
            .replace("variant = \"model_3\"", "variant = \"model_3\"\ndamage_queue = \"once\"")
            .replace("spacing = 1.0", "spacing = 1.0\npericentral_radius = 2.5");
        let params = SimulationConfig::from_toml_str(&text).unwrap().get_sim_params().unwrap();
        assert_eq!(params.damage_queue, DamageQueuePolicy::Once);
        assert_eq!(params.pericentral_radius, 2.5);
    }
}
