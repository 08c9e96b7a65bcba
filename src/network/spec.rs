use serde::{Serialize, Deserialize};

use crate::activation::activation::UnitType;
use crate::error::{DbnError, Result};
use crate::layers::{Pooling, PoolingKind, Rbm, RbmConfig, UnitLayer};
use crate::network::config::DbnConfig;
use crate::network::network::Dbn;

fn binary() -> UnitType {
    UnitType::Binary
}

/// Describes one layer of a stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerSpec {
    Rbm {
        visible: usize,
        hidden: usize,
        #[serde(default = "binary")]
        visible_unit: UnitType,
        #[serde(default = "binary")]
        hidden_unit: UnitType,
        #[serde(default)]
        config: RbmConfig,
    },
    Pooling {
        kind: PoolingKind,
        input: usize,
        window: usize,
    },
}

impl LayerSpec {
    pub fn build(&self) -> Result<Box<dyn UnitLayer>> {
        match *self {
            LayerSpec::Rbm { visible, hidden, visible_unit, hidden_unit, ref config } => {
                if visible == 0 || hidden == 0 {
                    return Err(DbnError::InvalidSpec(format!("RBM {visible} -> {hidden} has an empty side")));
                }
                Ok(Box::new(Rbm::with_units(visible, hidden, visible_unit, hidden_unit, config.clone())))
            }
            LayerSpec::Pooling { kind, input, window } => {
                if window == 0 || input == 0 || input % window != 0 {
                    return Err(DbnError::InvalidSpec(format!(
                        "pooling input {input} is not a positive multiple of window {window}"
                    )));
                }
                Ok(Box::new(Pooling::new(kind, input, window)))
            }
        }
    }
}

/// A fully serializable description of a DBN: its layers and config.
///
/// Kept apart from trained parameters so an architecture can be stored
/// before training starts; weights go through `Dbn::save`/`Dbn::load`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbnSpec {
    /// Human-readable name used as the model file stem.
    pub name: String,
    /// Ordered list of layer descriptions (input → output).
    pub layers: Vec<LayerSpec>,
    #[serde(default)]
    pub config: DbnConfig,
}

impl DbnSpec {
    pub fn build(&self) -> Result<Dbn> {
        if self.layers.is_empty() {
            return Err(DbnError::InvalidSpec(format!("network '{}' has no layers", self.name)));
        }
        let layers = self.layers.iter()
            .map(LayerSpec::build)
            .collect::<Result<Vec<_>>>()?;
        Dbn::new(layers, self.config.clone())
    }

    /// Serializes the spec to a pretty-printed JSON file.
    pub fn save_json(&self, path: &str) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes a `DbnSpec` from a JSON file.
    pub fn load_json(path: &str) -> Result<DbnSpec> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}
