// ============================================================
// Layer 5 — Recurrent Encoder
// ============================================================
// A single-layer vanilla (Elman) RNN that reads a line image one
// column at a time and returns the final hidden state:
//
//   h_t = tanh(W_x · x_t + W_h · h_{t-1} + b)
//
// Lines in a batch are zero-padded to a common width, so the
// encoder takes the true widths as an explicit sequence-length
// argument. For a line of width w, steps t >= w leave its hidden
// state untouched:
//
//   h_t = m_t * h_t' + (1 - m_t) * h_{t-1},   m_t = [t < w]
//
// The returned state is therefore h_{w-1}, and padded columns
// contribute neither to the output nor to the gradients.

use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
};

#[derive(Config, Debug)]
pub struct RnnEncoderConfig {
    /// Size of one input column (the line height)
    pub input_size: usize,
    /// Size of the hidden state
    pub hidden_size: usize,
}

impl RnnEncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> RnnEncoder<B> {
        RnnEncoder {
            input:       LinearConfig::new(self.input_size, self.hidden_size).init(device),
            recurrent:   LinearConfig::new(self.hidden_size, self.hidden_size)
                .with_bias(false)
                .init(device),
            hidden_size: self.hidden_size,
        }
    }
}

#[derive(Module, Debug)]
pub struct RnnEncoder<B: Backend> {
    pub input:       Linear<B>,
    pub recurrent:   Linear<B>,
    pub hidden_size: usize,
}

impl<B: Backend> RnnEncoder<B> {
    /// inputs: [batch, width, input_size], lengths: [batch]
    /// → final hidden state [batch, hidden_size]
    pub fn forward(&self, inputs: Tensor<B, 3>, lengths: Tensor<B, 1, Int>) -> Tensor<B, 2> {
        let [batch_size, width, _] = inputs.dims();
        let device = inputs.device();

        // The input projection does not depend on the hidden state,
        // so it is computed for every column in one go.
        let projected = self.input.forward(inputs); // [batch, width, hidden]

        let mut hidden = Tensor::<B, 2>::zeros([batch_size, self.hidden_size], &device);
        for t in 0..width {
            let x_t = projected
                .clone()
                .slice([0..batch_size, t..t + 1, 0..self.hidden_size])
                .reshape([batch_size, self.hidden_size]);
            let candidate = (x_t + self.recurrent.forward(hidden.clone())).tanh();

            let mask = lengths
                .clone()
                .greater_elem(t as i64)
                .float()
                .unsqueeze_dim::<2>(1); // [batch, 1]
            let keep = mask.clone().neg().add_scalar(1.0);

            hidden = candidate * mask + hidden * keep;
        }

        hidden
    }
}
