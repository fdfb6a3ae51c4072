use crate::errors::ServiceError;
use validator::Validate;

/// Validate any input that implements Validate trait
pub fn validate_input<T: Validate>(input: &T) -> Result<(), ServiceError> {
    input
        .validate()
        .map_err(|e| ServiceError::InvalidInput(format!("Validation failed: {}", e)))
}

/// A chat query must carry something other than whitespace.
pub fn validate_query(query: &str) -> Result<(), ServiceError> {
    if query.trim().is_empty() {
        return Err(ServiceError::InvalidInput(
            "query must not be empty".to_string(),
        ));
    }
    Ok(())
}
