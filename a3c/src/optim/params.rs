//! Parameter extraction for inspection and comparison.

use burn::module::{Module, ModuleMapper, Param};
use burn::prelude::*;

use crate::nn::{tensor_to_vec, ModelError};

/// Collects every float parameter, flattened, in traversal order.
struct ParamExtractor<B: Backend> {
    params: Vec<Tensor<B, 1>>,
}

impl<B: Backend> ModuleMapper<B> for ParamExtractor<B> {
    fn map_float<const D: usize>(&mut self, param: Param<Tensor<B, D>>) -> Param<Tensor<B, D>> {
        let val = param.val();
        let total_size: usize = val.dims().iter().product();
        self.params.push(val.reshape([total_size]));
        param
    }
}

/// All parameter values of `model` concatenated in traversal order.
///
/// Two modules of the same architecture produce vectors of the same layout,
/// so equality of the results means equality of the weights.
pub fn flatten_params<B: Backend, M: Module<B>>(model: &M) -> Result<Vec<f32>, ModelError> {
    let mut extractor = ParamExtractor { params: Vec::new() };
    let _ = model.clone().map(&mut extractor);

    let mut flat = Vec::new();
    for tensor in extractor.params {
        flat.extend(tensor_to_vec(tensor)?);
    }
    Ok(flat)
}
