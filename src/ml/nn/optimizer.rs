//! Parameter update rules. One optimizer instance per layer, so moment
//! estimates never mix between layers.

use ndarray::{Array1, Array2};

use crate::config::OptimizerKind;

pub trait Optimizer: Send + Sync {
    fn update_weights(&mut self, weights: &mut Array2<f64>, gradients: &Array2<f64>);

    fn update_biases(&mut self, biases: &mut Array1<f64>, gradients: &Array1<f64>);
}

pub fn build_optimizer(kind: OptimizerKind, learning_rate: f64) -> Box<dyn Optimizer> {
    match kind {
        OptimizerKind::Adam => Box::new(Adam::new(learning_rate)),
        OptimizerKind::Sgd => Box::new(Sgd::new(learning_rate)),
    }
}

/// Plain stochastic gradient descent
#[derive(Debug, Clone)]
pub struct Sgd {
    pub learning_rate: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Self {
        Self { learning_rate }
    }
}

impl Optimizer for Sgd {
    fn update_weights(&mut self, weights: &mut Array2<f64>, gradients: &Array2<f64>) {
        weights.scaled_add(-self.learning_rate, gradients);
    }

    fn update_biases(&mut self, biases: &mut Array1<f64>, gradients: &Array1<f64>) {
        biases.scaled_add(-self.learning_rate, gradients);
    }
}

/// Adam with bias-corrected moment estimates
#[derive(Debug, Clone)]
pub struct Adam {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    t: i32,
    m_w: Option<Array2<f64>>,
    v_w: Option<Array2<f64>>,
    m_b: Option<Array1<f64>>,
    v_b: Option<Array1<f64>>,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            t: 0,
            m_w: None,
            v_w: None,
            m_b: None,
            v_b: None,
        }
    }

    fn step_size(&self) -> (f64, f64) {
        (1.0 - self.beta1.powi(self.t), 1.0 - self.beta2.powi(self.t))
    }
}

impl Optimizer for Adam {
    // Advances the step counter; biases reuse it
    fn update_weights(&mut self, weights: &mut Array2<f64>, gradients: &Array2<f64>) {
        self.t += 1;
        let (c1, c2) = self.step_size();
        let (b1, b2, lr, eps) = (self.beta1, self.beta2, self.learning_rate, self.epsilon);

        let m = self.m_w.get_or_insert_with(|| Array2::zeros(weights.dim()));
        let v = self.v_w.get_or_insert_with(|| Array2::zeros(weights.dim()));
        *m = &*m * b1 + gradients * (1.0 - b1);
        *v = &*v * b2 + &(gradients * gradients) * (1.0 - b2);

        ndarray::Zip::from(weights)
            .and(&*m)
            .and(&*v)
            .for_each(|w, &m, &v| *w -= lr * (m / c1) / ((v / c2).sqrt() + eps));
    }

    fn update_biases(&mut self, biases: &mut Array1<f64>, gradients: &Array1<f64>) {
        let (c1, c2) = self.step_size();
        let (b1, b2, lr, eps) = (self.beta1, self.beta2, self.learning_rate, self.epsilon);

        let m = self.m_b.get_or_insert_with(|| Array1::zeros(biases.len()));
        let v = self.v_b.get_or_insert_with(|| Array1::zeros(biases.len()));
        *m = &*m * b1 + gradients * (1.0 - b1);
        *v = &*v * b2 + &(gradients * gradients) * (1.0 - b2);

        ndarray::Zip::from(biases)
            .and(&*m)
            .and(&*v)
            .for_each(|b, &m, &v| *b -= lr * (m / c1) / ((v / c2).sqrt() + eps));
    }
}
