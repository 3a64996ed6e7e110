use crate::server::response::ApiError;

const MAX_NAME_LEN: usize = 100;
const MIN_PASSWORD_LEN: usize = 8;

fn validate_name(name: &str, entity: &str) -> Result<String, String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(format!("{entity} name cannot be empty"));
    }
    if trimmed.len() > MAX_NAME_LEN {
        return Err(format!("{entity} name cannot exceed {MAX_NAME_LEN} characters"));
    }
    Ok(trimmed.to_string())
}

pub fn validate_household_name(name: &str) -> Result<String, ApiError> {
    validate_name(name, "Household").map_err(ApiError::bad_request)
}

pub fn validate_store_name(name: &str) -> Result<String, ApiError> {
    validate_name(name, "Store").map_err(ApiError::bad_request)
}

pub fn validate_user_name(name: &str) -> Result<String, ApiError> {
    validate_name(name, "User").map_err(ApiError::bad_request)
}

pub fn validate_email(email: &str) -> Result<String, ApiError> {
    let trimmed = email.trim();
    if trimmed.is_empty() || trimmed.len() > 254 || !trimmed.contains('@') {
        return Err(ApiError::bad_request("Invalid email address"));
    }
    Ok(trimmed.to_string())
}

pub fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_trimmed_and_bounded() {
        assert_eq!(validate_store_name("  Corner Shop ").unwrap(), "Corner Shop");
        assert!(validate_store_name("   ").is_err());
        assert!(validate_store_name(&"x".repeat(101)).is_err());
        assert_eq!(
            validate_store_name(&"x".repeat(100)).unwrap().len(),
            100
        );
    }

    #[test]
    fn test_password_length() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("long enough").is_ok());
    }
}
