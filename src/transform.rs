//! Model graph transform: standard dropout → Monte Carlo dropout
//!
//! The trained model is never mutated. Its serialized layer graph is copied,
//! every `Dropout` declaration is retagged as `MonteCarloDropout` (the
//! parameters are shared, so only the class name changes), a new network is
//! rebuilt from the edited tree and the original weights are transplanted in
//! their existing order.

use crate::error::Result;
use crate::graph::{LayerRegistry, Model, Network};
use crate::layers::{DROPOUT, MONTE_CARLO_DROPOUT};
use serde_json::Value;

/// Rewrite `class_name` tags equal to `from` into `to`, at any depth
///
/// Walks every JSON object and array. Only values stored under a
/// `class_name` key are compared, so a layer merely *named* "Dropout" keeps
/// its name. Returns the number of rewritten declarations.
pub fn replace_class_names(node: &mut Value, from: &str, to: &str) -> usize {
    match node {
        Value::Object(map) => {
            let mut replaced = 0;
            if map.get("class_name").and_then(Value::as_str) == Some(from) {
                map.insert("class_name".to_string(), Value::String(to.to_string()));
                replaced += 1;
            }
            replaced
                + map
                    .values_mut()
                    .map(|child| replace_class_names(child, from, to))
                    .sum::<usize>()
        }
        Value::Array(items) => items
            .iter_mut()
            .map(|child| replace_class_names(child, from, to))
            .sum(),
        _ => 0,
    }
}

/// Stochastic copy of `model` using the process-wide layer registry
pub fn to_monte_carlo<M: Model + ?Sized>(model: &M) -> Result<Network> {
    to_monte_carlo_with(model, LayerRegistry::global())
}

/// Stochastic copy of `model`, rebuilt through `registry`
///
/// # Errors
/// - `UnknownLayer` when `registry` lacks `MonteCarloDropout` (or any other class)
/// - `Config` when the edited tree is not a valid network
/// - `WeightShape` when the original weights do not fit the rebuilt network
pub fn to_monte_carlo_with<M: Model + ?Sized>(
    model: &M,
    registry: &LayerRegistry,
) -> Result<Network> {
    let mut config = model.config()?;
    let replaced = replace_class_names(&mut config, DROPOUT, MONTE_CARLO_DROPOUT);
    if replaced == 0 {
        tracing::warn!("model has no Dropout layers; Monte Carlo samples will not vary");
    } else {
        tracing::debug!(replaced, "replaced Dropout layers with MonteCarloDropout");
    }

    let mut network = Network::from_config(&config, registry)?;
    network.set_weights(&model.weights())?;
    Ok(network)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EffectError;
    use crate::graph::Predictor;
    use crate::sequence::one_hot;
    use ndarray::Array3;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    fn trained(config: Value) -> Network {
        let mut network = Network::from_config(&config, LayerRegistry::global()).unwrap();
        network.randomize(&mut StdRng::seed_from_u64(99));
        network
    }

    fn dropout_model() -> Network {
        trained(json!({
            "class_name": "Sequential",
            "config": {
                "input_shape": [10, 4],
                "layers": [
                    {"class_name": "Flatten", "config": {"name": "Dropout"}},
                    {"class_name": "Dense", "config": {"units": 16, "activation": "relu"}},
                    {"class_name": "Dropout", "config": {"rate": 0.5, "seed": 5}},
                    {"class_name": "Sequential", "config": {"layers": [
                        {"class_name": "Dense", "config": {"units": 8, "activation": "tanh"}},
                        {"class_name": "Dropout", "config": {"rate": 0.25}}
                    ]}},
                    {"class_name": "Dense", "config": {"units": 2}}
                ]
            }
        }))
    }

    fn batch() -> Array3<f32> {
        one_hot(&["ACGTTGCAAC", "GGGATTACAC", "TTTTTAAAAA"]).unwrap()
    }

    #[test]
    fn test_replace_class_names_nested() {
        let mut tree = json!({
            "class_name": "Sequential",
            "config": {"layers": [
                {"class_name": "Dropout", "config": {"rate": 0.1}},
                {"class_name": "Sequential", "config": {"layers": [
                    {"class_name": "Dropout", "config": {"rate": 0.2}}
                ]}},
                {"class_name": "Dense", "config": {"name": "Dropout", "units": 1}}
            ]}
        });
        let replaced = replace_class_names(&mut tree, "Dropout", "MonteCarloDropout");
        assert_eq!(replaced, 2);
        assert_eq!(tree["config"]["layers"][0]["class_name"], "MonteCarloDropout");
        assert_eq!(
            tree["config"]["layers"][1]["config"]["layers"][0]["class_name"],
            "MonteCarloDropout"
        );
        // Parameters and unrelated strings are untouched
        assert_eq!(tree["config"]["layers"][0]["config"]["rate"], 0.1);
        assert_eq!(tree["config"]["layers"][2]["config"]["name"], "Dropout");
    }

    #[test]
    fn test_transform_replaces_all_dropout() {
        let model = dropout_model();
        let mc = to_monte_carlo(&model).unwrap();
        assert_eq!(mc.count_layers(DROPOUT), 0);
        assert_eq!(mc.count_layers(MONTE_CARLO_DROPOUT), 2);
        assert_eq!(model.count_layers(DROPOUT), 2);
    }

    #[test]
    fn test_transform_preserves_weights() {
        let model = dropout_model();
        let mc = to_monte_carlo(&model).unwrap();
        assert_eq!(mc.weights(), model.weights());
    }

    #[test]
    fn test_transformed_model_is_stochastic_at_inference() {
        let model = dropout_model();
        let mc = to_monte_carlo(&model).unwrap();
        let a = mc.predict(&batch(), &mut StdRng::seed_from_u64(1)).unwrap();
        let b = mc.predict(&batch(), &mut StdRng::seed_from_u64(2)).unwrap();
        assert_ne!(a, b);

        // The original stays deterministic
        let c = model.predict(&batch(), &mut StdRng::seed_from_u64(1)).unwrap();
        let d = model.predict(&batch(), &mut StdRng::seed_from_u64(2)).unwrap();
        assert_eq!(c, d);
    }

    #[test]
    fn test_transform_without_dropout_is_identical() {
        let model = trained(json!({
            "class_name": "Sequential",
            "config": {
                "input_shape": [10, 4],
                "layers": [
                    {"class_name": "Conv1D", "config": {"filters": 4, "kernel_size": 3, "activation": "relu"}},
                    {"class_name": "GlobalMaxPooling1D"},
                    {"class_name": "Dense", "config": {"units": 2}}
                ]
            }
        }));
        let mc = to_monte_carlo(&model).unwrap();
        assert_eq!(mc.count_layers(MONTE_CARLO_DROPOUT), 0);

        let mut rng = StdRng::seed_from_u64(4);
        assert_eq!(
            mc.predict(&batch(), &mut rng).unwrap(),
            model.predict(&batch(), &mut rng).unwrap()
        );
    }

    #[test]
    fn test_transform_fails_without_registration() {
        let model = dropout_model();
        let err = to_monte_carlo_with(&model, &LayerRegistry::standard()).unwrap_err();
        assert!(matches!(err, EffectError::UnknownLayer(ref c) if c == MONTE_CARLO_DROPOUT));
    }
}
