use std::fs;

use strand_backend_cpu::{CpuEngine, CpuSession};
use strand_core::{
    Device, Environment, EnvironmentConfig, InferenceEngine, IoBinding, ModelConfig, Session,
    StrandError,
};
use strand_kvcache::KvCache;
use strand_loader::BigramWeights;

fn tiny_config() -> ModelConfig {
    ModelConfig {
        vocab_size: 6,
        num_layers: 2,
        num_heads: 2,
        head_dim: 3,
        max_positions: 16,
    }
}

fn tiny_weights() -> BigramWeights {
    serde_json::from_str(r#"{"bias": {"0": 0.5}, "transitions": {"2": {"4": 3.0}}}"#).unwrap()
}

/// Bind one step the way the executor does.
fn bind_step(
    env: &Environment,
    session: &CpuSession,
    token: i64,
    position: usize,
    mask_len: usize,
    cache: KvCache,
) -> IoBinding {
    let config = session.config();
    let mut inputs = vec![
        env.from_i64(vec![token], &[1, 1]).unwrap(),
        env.from_i64(vec![position as i64], &[1, 1]).unwrap(),
        env.from_i64(vec![1; mask_len], &[1, mask_len]).unwrap(),
    ];
    inputs.extend(cache.into_buffers());
    let mut binding = IoBinding::new();
    for (name, buffer) in session.input_names().iter().zip(inputs) {
        binding.bind_input(name.as_str(), buffer);
    }
    let mut outputs = vec![env.allocate_f32(&config.logits_shape()).unwrap()];
    for _ in 0..2 * config.num_layers {
        outputs.push(env.allocate_f32(&config.cache_shape(position + 1)).unwrap());
    }
    for (name, buffer) in session.output_names().iter().zip(outputs) {
        binding.bind_output(name.as_str(), buffer);
    }
    binding
}

#[test]
fn test_first_step_fills_logits_and_cache() {
    let env = Environment::init(EnvironmentConfig::default()).unwrap();
    let session = CpuSession::from_parts(env.clone(), tiny_config(), tiny_weights());
    let cache = KvCache::empty(&env, session.config()).unwrap();

    let mut binding = bind_step(&env, &session, 2, 0, 1, cache);
    session.run(&mut binding).unwrap();

    let mut outputs = binding.into_outputs().into_iter();
    let logits = outputs.next().unwrap();
    assert_eq!(logits.as_f32().unwrap(), &[0.5, 0.0, 0.0, 0.0, 3.0, 0.0]);

    let cache = KvCache::from_present(session.config(), outputs.collect(), 1).unwrap();
    let layer = cache.layer(1).unwrap();
    assert_eq!(layer.key.as_f32().unwrap(), &[2.0; 6]);
    assert_eq!(layer.value.as_f32().unwrap(), &[0.0; 6]);
}

#[test]
fn test_second_step_appends_after_past() {
    let env = Environment::init(EnvironmentConfig::default()).unwrap();
    let session = CpuSession::from_parts(env.clone(), tiny_config(), tiny_weights());

    let cache = KvCache::empty(&env, session.config()).unwrap();
    let mut binding = bind_step(&env, &session, 2, 0, 1, cache);
    session.run(&mut binding).unwrap();
    let mut outputs = binding.into_outputs().into_iter();
    drop(outputs.next());
    let cache = KvCache::from_present(session.config(), outputs.collect(), 1).unwrap();

    let mut binding = bind_step(&env, &session, 4, 1, 2, cache);
    session.run(&mut binding).unwrap();
    let mut outputs = binding.into_outputs().into_iter();
    let logits = outputs.next().unwrap();
    assert_eq!(logits.as_f32().unwrap(), &[0.5, 0.0, 0.0, 0.0, 0.0, 0.0]);
    let cache = KvCache::from_present(session.config(), outputs.collect(), 2).unwrap();

    // head 0: [past row, new row], head 1: [past row, new row]
    let key = cache.layer(0).unwrap().key.as_f32().unwrap();
    assert_eq!(key, &[2.0, 2.0, 2.0, 4.0, 4.0, 4.0, 2.0, 2.0, 2.0, 4.0, 4.0, 4.0]);
    let value = cache.layer(0).unwrap().value.as_f32().unwrap();
    assert_eq!(&value[3..6], &[1.0, 1.0, 1.0]);

    drop(logits);
    drop(cache);
    assert_eq!(env.buffer_stats().live, 0);
}

#[test]
fn test_short_mask_is_an_engine_error() {
    let env = Environment::init(EnvironmentConfig::default()).unwrap();
    let session = CpuSession::from_parts(env.clone(), tiny_config(), tiny_weights());
    let cache = KvCache::empty(&env, session.config()).unwrap();

    let mut binding = bind_step(&env, &session, 2, 0, 2, cache);
    let err = session.run(&mut binding).unwrap_err();
    assert!(matches!(err, StrandError::Engine(_)));
}

#[test]
fn test_out_of_range_token_is_an_engine_error() {
    let env = Environment::init(EnvironmentConfig::default()).unwrap();
    let session = CpuSession::from_parts(env.clone(), tiny_config(), tiny_weights());
    let cache = KvCache::empty(&env, session.config()).unwrap();

    let mut binding = bind_step(&env, &session, 6, 0, 1, cache);
    assert!(matches!(
        session.run(&mut binding),
        Err(StrandError::Engine(_))
    ));
}

#[test]
fn test_missing_input_is_an_engine_error() {
    let env = Environment::init(EnvironmentConfig::default()).unwrap();
    let session = CpuSession::from_parts(env.clone(), tiny_config(), tiny_weights());
    let mut binding = IoBinding::new();
    binding.bind_input("input_ids", env.from_i64(vec![1], &[1, 1]).unwrap());
    let err = session.run(&mut binding).unwrap_err();
    assert!(err.to_string().contains("position_ids"));
}

#[test]
fn test_load_from_directory() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("config.json"),
        r#"{"vocab_size": 6, "n_layer": 2, "n_head": 2, "n_embd": 6}"#,
    )
    .unwrap();
    fs::write(dir.path().join("bigram.json"), r#"{"bias": {"1": 1.0}}"#).unwrap();

    let env = Environment::init(EnvironmentConfig::default()).unwrap();
    let session = CpuEngine::new()
        .load(&env, dir.path(), Device::Cpu)
        .unwrap();
    assert_eq!(session.config().head_dim, 3);
    assert_eq!(session.input_names().len(), 7);
    assert_eq!(session.output_names().len(), 5);

    // The session holds a handle, so the environment cannot be torn down yet.
    assert!(env.clone().shutdown().is_err());
    drop(session);
    env.shutdown().unwrap();
}

#[test]
fn test_load_rejects_gpu_device() {
    let dir = tempfile::tempdir().unwrap();
    let env = Environment::init(EnvironmentConfig::default()).unwrap();
    let err = CpuEngine::new()
        .load(&env, dir.path(), Device::Cuda(0))
        .unwrap_err();
    assert!(matches!(err, StrandError::ModelLoad(_)));
}
