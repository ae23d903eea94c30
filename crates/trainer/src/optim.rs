use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tch::nn::{self, OptimizerConfig};

use crate::error::Result;

const SGD_MOMENTUM: f64 = 0.9;

/// Which optimizer to build for a run. Kept apart from the built
/// [`nn::Optimizer`] so every grid cell constructs the same kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum OptimizerKind {
    #[serde(rename = "Adam")]
    #[value(name = "Adam")]
    Adam,
    #[serde(rename = "SGD")]
    #[value(name = "SGD")]
    Sgd,
}

impl OptimizerKind {
    pub fn build(self, vs: &nn::VarStore, learning_rate: f64) -> Result<nn::Optimizer> {
        let optimizer = match self {
            OptimizerKind::Adam => nn::Adam::default().build(vs, learning_rate)?,
            OptimizerKind::Sgd => nn::Sgd {
                momentum: SGD_MOMENTUM,
                ..Default::default()
            }
            .build(vs, learning_rate)?,
        };
        Ok(optimizer)
    }
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizerKind::Adam => write!(f, "Adam"),
            OptimizerKind::Sgd => write!(f, "SGD"),
        }
    }
}
