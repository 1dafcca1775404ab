use oracle_math::MathError;
use price_oracle::error::OracleError;
use std::io;

#[test]
fn test_error_conversion() {
    let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
    match OracleError::from(io_error) {
        OracleError::IoError(_) => {}
        other => panic!("Expected IoError variant, got {:?}", other),
    }

    let math_error = MathError::NotFitted("forest".to_string());
    match OracleError::from(math_error) {
        OracleError::MathError(_) => {}
        other => panic!("Expected MathError variant, got {:?}", other),
    }

    let json_error = serde_json::from_str::<Vec<f64>>("[1.0,").unwrap_err();
    match OracleError::from(json_error) {
        OracleError::SerializationError(_) => {}
        other => panic!("Expected SerializationError variant, got {:?}", other),
    }
}

#[test]
fn test_error_display() {
    let error = OracleError::InvalidParameter("window_size must be at least 1".to_string());
    assert_eq!(
        error.to_string(),
        "Invalid parameter: window_size must be at least 1"
    );

    let error = OracleError::from(io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"));
    let message = error.to_string();
    assert!(message.contains("IO error"));
    assert!(message.contains("permission denied"));

    let error = OracleError::InvalidTask("train".to_string());
    assert_eq!(error.to_string(), "Invalid task: train");
}
