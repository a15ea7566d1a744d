use strand_core::{Environment, EnvironmentConfig, StrandError};

fn env() -> Environment {
    Environment::init(EnvironmentConfig::default()).unwrap()
}

#[test]
fn test_buffer_release_is_counted_once() {
    let env = env();
    let a = env.allocate_f32(&[1, 2, 0, 4]).unwrap();
    let b = env.from_i64(vec![1, 1, 1], &[1, 3]).unwrap();
    assert_eq!(env.buffer_stats().live, 2);

    a.release();
    assert_eq!(env.buffer_stats().released, 1);
    drop(b);

    let stats = env.buffer_stats();
    assert_eq!(stats.allocated, 2);
    assert_eq!(stats.released, 2);
    assert_eq!(stats.live, 0);
}

#[test]
fn test_shape_must_match_data() {
    let env = env();
    let err = env.from_f32(vec![1.0, 2.0, 3.0], &[2, 2]).unwrap_err();
    assert!(matches!(err, StrandError::ShapeMismatch { .. }));
    assert_eq!(env.buffer_stats().allocated, 0);
}

#[test]
fn test_shutdown_with_live_buffer_fails() {
    let env = env();
    let buffer = env.allocate_f32(&[4]).unwrap();
    let err = env.clone().shutdown().unwrap_err();
    assert!(matches!(err, StrandError::Environment(_)));
    drop(buffer);
    env.shutdown().unwrap();
}

#[test]
fn test_shutdown_with_other_handle_fails() {
    let env = env();
    let other = env.clone();
    assert!(matches!(
        env.shutdown(),
        Err(StrandError::Environment(_))
    ));
    other.shutdown().unwrap();
}

#[test]
fn test_missing_runtime_library_fails_init() {
    let config = EnvironmentConfig {
        runtime_library: Some("/nonexistent/libstrand_runtime.so".into()),
    };
    assert!(matches!(
        Environment::init(config),
        Err(StrandError::Environment(_))
    ));
}
