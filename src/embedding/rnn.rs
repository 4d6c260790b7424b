//! Inference-only recurrent layers on `ndarray`.
//!
//! Gate layouts follow the usual conventions (GRU: reset, update, new; LSTM:
//! input, forget, cell, output). Weights are drawn uniformly from
//! `[-1/sqrt(n), 1/sqrt(n)]` with a seeded RNG so a configuration always
//! produces the same vectors.

use anyhow::Context;
use ndarray::{concatenate, s, Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::Rng;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RnnType {
    Gru,
    Lstm,
}

impl std::str::FromStr for RnnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gru" => Ok(Self::Gru),
            "lstm" => Ok(Self::Lstm),
            _ => Err(format!("unknown rnn type: {s}")),
        }
    }
}

fn uniform(rng: &mut StdRng, rows: usize, cols: usize, bound: f32) -> Array2<f32> {
    Array2::from_shape_fn((rows, cols), |_| rng.gen_range(-bound..=bound))
}

fn uniform_vec(rng: &mut StdRng, len: usize, bound: f32) -> Array1<f32> {
    Array1::from_shape_fn(len, |_| rng.gen_range(-bound..=bound))
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Affine map `y = W x + b`.
#[derive(Debug, Clone)]
pub struct Linear {
    weight: Array2<f32>,
    bias: Array1<f32>,
}

impl Linear {
    pub fn new(rng: &mut StdRng, input: usize, output: usize) -> Self {
        let bound = 1.0 / (input.max(1) as f32).sqrt();
        Self {
            weight: uniform(rng, output, input, bound),
            bias: uniform_vec(rng, output, bound),
        }
    }

    pub fn forward(&self, x: ArrayView1<f32>) -> Array1<f32> {
        self.weight.dot(&x) + &self.bias
    }

    pub fn output_len(&self) -> usize {
        self.weight.nrows()
    }
}

#[derive(Debug, Clone)]
struct Cell {
    kind: RnnType,
    w_ih: Array2<f32>,
    w_hh: Array2<f32>,
    b_ih: Array1<f32>,
    b_hh: Array1<f32>,
    hidden: usize,
}

impl Cell {
    fn new(rng: &mut StdRng, kind: RnnType, input: usize, hidden: usize) -> Self {
        let gates = match kind {
            RnnType::Gru => 3,
            RnnType::Lstm => 4,
        };
        let bound = 1.0 / (hidden.max(1) as f32).sqrt();
        Self {
            kind,
            w_ih: uniform(rng, gates * hidden, input, bound),
            w_hh: uniform(rng, gates * hidden, hidden, bound),
            b_ih: uniform_vec(rng, gates * hidden, bound),
            b_hh: uniform_vec(rng, gates * hidden, bound),
            hidden,
        }
    }

    /// One step; `c` is only used by LSTM cells.
    fn step(&self, x: ArrayView1<f32>, h: &Array1<f32>, c: &Array1<f32>) -> (Array1<f32>, Array1<f32>) {
        let n = self.hidden;
        let gi = self.w_ih.dot(&x) + &self.b_ih;
        let gh = self.w_hh.dot(h) + &self.b_hh;
        match self.kind {
            RnnType::Gru => {
                let r = (&gi.slice(s![0..n]) + &gh.slice(s![0..n])).mapv(sigmoid);
                let z = (&gi.slice(s![n..2 * n]) + &gh.slice(s![n..2 * n])).mapv(sigmoid);
                let candidate =
                    (&gi.slice(s![2 * n..3 * n]) + &(&r * &gh.slice(s![2 * n..3 * n]))).mapv(f32::tanh);
                let h_next = (1.0 - &z) * &candidate + &z * h;
                (h_next, c.clone())
            }
            RnnType::Lstm => {
                let g = gi + gh;
                let i = g.slice(s![0..n]).mapv(sigmoid);
                let f = g.slice(s![n..2 * n]).mapv(sigmoid);
                let cell = g.slice(s![2 * n..3 * n]).mapv(f32::tanh);
                let o = g.slice(s![3 * n..4 * n]).mapv(sigmoid);
                let c_next = &f * c + &i * &cell;
                let h_next = &o * &c_next.mapv(f32::tanh);
                (h_next, c_next)
            }
        }
    }

    /// Run over `inputs` (rows), optionally right-to-left. Output rows stay in
    /// input order.
    fn run(&self, inputs: &Array2<f32>, reverse: bool) -> Array2<f32> {
        let steps = inputs.nrows();
        let mut out = Array2::zeros((steps, self.hidden));
        let mut h = Array1::zeros(self.hidden);
        let mut c = Array1::zeros(self.hidden);
        let order: Box<dyn Iterator<Item = usize>> = if reverse {
            Box::new((0..steps).rev())
        } else {
            Box::new(0..steps)
        };
        for t in order {
            let (h_next, c_next) = self.step(inputs.row(t), &h, &c);
            out.row_mut(t).assign(&h_next);
            h = h_next;
            c = c_next;
        }
        out
    }
}

#[derive(Debug, Clone)]
struct Layer {
    forward: Cell,
    backward: Option<Cell>,
}

/// Multi-layer, optionally bidirectional recurrent network.
#[derive(Debug, Clone)]
pub struct Rnn {
    layers: Vec<Layer>,
    input: usize,
    hidden: usize,
    bidirectional: bool,
}

impl Rnn {
    pub fn new(
        rng: &mut StdRng,
        kind: RnnType,
        input: usize,
        hidden: usize,
        num_layers: usize,
        bidirectional: bool,
    ) -> Self {
        let directions = if bidirectional { 2 } else { 1 };
        let layers = (0..num_layers.max(1))
            .map(|l| {
                let layer_input = if l == 0 { input } else { hidden * directions };
                Layer {
                    forward: Cell::new(rng, kind, layer_input, hidden),
                    backward: bidirectional.then(|| Cell::new(rng, kind, layer_input, hidden)),
                }
            })
            .collect();
        Self {
            layers,
            input,
            hidden,
            bidirectional,
        }
    }

    /// Per-step outputs of the last layer, `(steps, hidden * directions)`.
    pub fn outputs(&self, inputs: &Array2<f32>) -> crate::Result<Array2<f32>> {
        if inputs.ncols() != self.input {
            return Err(Error::InvalidInput(format!(
                "rnn expects {} input features, got {}",
                self.input,
                inputs.ncols()
            )));
        }
        let mut x = inputs.clone();
        for layer in &self.layers {
            let fwd = layer.forward.run(&x, false);
            x = match &layer.backward {
                Some(cell) => {
                    let bwd = cell.run(&x, true);
                    concatenate(Axis(1), &[fwd.view(), bwd.view()])
                        .context("joining forward and backward outputs")?
                }
                None => fwd,
            };
        }
        Ok(x)
    }

    /// Sequence representation: the last step's output, or for bidirectional
    /// networks the first step's output followed by the last step's output.
    pub fn represent(&self, inputs: &Array2<f32>) -> crate::Result<Array1<f32>> {
        let outputs = self.outputs(inputs)?;
        let steps = outputs.nrows();
        if steps == 0 {
            return Ok(Array1::zeros(self.output_len()));
        }
        let last = outputs.row(steps - 1);
        if self.bidirectional {
            let first = outputs.row(0);
            Ok(concatenate(Axis(0), &[first, last]).context("joining first and last steps")?)
        } else {
            Ok(last.to_owned())
        }
    }

    /// Length of [`Rnn::represent`]'s output.
    pub fn output_len(&self) -> usize {
        if self.bidirectional {
            4 * self.hidden
        } else {
            self.hidden
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn inputs(steps: usize, dim: usize) -> Array2<f32> {
        Array2::from_shape_fn((steps, dim), |(t, d)| ((t + 1) * (d + 1)) as f32 * 0.1)
    }

    #[test]
    fn gru_shapes() {
        let mut rng = StdRng::seed_from_u64(7);
        let rnn = Rnn::new(&mut rng, RnnType::Gru, 3, 5, 2, false);
        assert_eq!(rnn.outputs(&inputs(4, 3)).unwrap().dim(), (4, 5));
        assert_eq!(rnn.represent(&inputs(4, 3)).unwrap().len(), 5);
    }

    #[test]
    fn bidirectional_lstm_shapes() {
        let mut rng = StdRng::seed_from_u64(7);
        let rnn = Rnn::new(&mut rng, RnnType::Lstm, 3, 4, 1, true);
        assert_eq!(rnn.outputs(&inputs(6, 3)).unwrap().dim(), (6, 8));
        assert_eq!(rnn.represent(&inputs(6, 3)).unwrap().len(), rnn.output_len());
        assert_eq!(rnn.output_len(), 16);
    }

    #[test]
    fn same_seed_same_output() {
        let a = Rnn::new(&mut StdRng::seed_from_u64(1), RnnType::Gru, 3, 4, 1, false);
        let b = Rnn::new(&mut StdRng::seed_from_u64(1), RnnType::Gru, 3, 4, 1, false);
        assert_eq!(a.represent(&inputs(3, 3)).unwrap(), b.represent(&inputs(3, 3)).unwrap());
    }

    #[test]
    fn gru_outputs_are_bounded() {
        let rnn = Rnn::new(&mut StdRng::seed_from_u64(3), RnnType::Gru, 3, 4, 1, false);
        assert!(rnn.outputs(&inputs(5, 3)).unwrap().iter().all(|v| v.abs() <= 1.0));
    }

    #[test]
    fn empty_sequence_is_zero() {
        let rnn = Rnn::new(&mut StdRng::seed_from_u64(3), RnnType::Gru, 3, 4, 1, false);
        let rep = rnn.represent(&Array2::zeros((0, 3))).unwrap();
        assert!(rep.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn wrong_input_width_is_an_error() {
        let rnn = Rnn::new(&mut StdRng::seed_from_u64(3), RnnType::Lstm, 3, 4, 1, true);
        let err = rnn.represent(&inputs(2, 5)).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn linear_maps_dimensions() {
        let layer = Linear::new(&mut StdRng::seed_from_u64(0), 3, 2);
        assert_eq!(layer.forward(Array1::ones(3).view()).len(), 2);
        assert_eq!(layer.output_len(), 2);
    }

    #[test]
    fn parse_rnn_type() {
        assert_eq!("GRU".parse::<RnnType>().unwrap(), RnnType::Gru);
        assert_eq!("lstm".parse::<RnnType>().unwrap(), RnnType::Lstm);
        assert!("transformer".parse::<RnnType>().is_err());
    }
}
