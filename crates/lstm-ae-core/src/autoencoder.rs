use tch::nn::{self, Module, RNN};
use tch::Tensor;

use crate::config::ModelConfig;

/// Sequence autoencoder: an LSTM encoder compresses the sequence into its
/// final hidden state, which is repeated over every time step and unrolled
/// by an LSTM decoder before a linear read-out back to the input width.
#[derive(Debug)]
pub struct LstmAutoencoder {
    encoder: nn::LSTM,
    decoder: nn::LSTM,
    output: nn::Linear,
    pub config: ModelConfig,
}

impl LstmAutoencoder {
    pub fn new(vs: &nn::Path, config: &ModelConfig) -> Self {
        let rnn_config = nn::RNNConfig {
            batch_first: true,
            ..Default::default()
        };

        let encoder = nn::lstm(vs / "encoder", config.input_size, config.hidden_dim, rnn_config);
        let decoder = nn::lstm(vs / "decoder", config.hidden_dim, config.hidden_dim, rnn_config);
        let output = nn::linear(vs / "output", config.hidden_dim, config.input_size, Default::default());

        Self {
            encoder,
            decoder,
            output,
            config: *config,
        }
    }

    /// x: [batch, seq_len, input_size]
    /// Returns the latent code: [batch, hidden_dim]
    pub fn encode(&self, x: &Tensor) -> Tensor {
        let (_, state) = self.encoder.seq(x);
        // h: [num_layers, batch, hidden_dim], keep the top layer
        state.h().select(0, -1)
    }

    /// z: [batch, hidden_dim]
    /// Returns the reconstruction: [batch, seq_len, input_size]
    pub fn decode(&self, z: &Tensor) -> Tensor {
        let repeated = z.unsqueeze(1).repeat(&[1, self.config.seq_len, 1]);
        let (out, _) = self.decoder.seq(&repeated);
        out.apply(&self.output)
    }
}

impl Module for LstmAutoencoder {
    fn forward(&self, x: &Tensor) -> Tensor {
        self.decode(&self.encode(x))
    }
}
