//! Validation utilities for the Distribution Management Platform

// ============================================================================
// Inventory Validations
// ============================================================================

/// Minimum length of the justification note on a manual stock adjustment
pub const MIN_ADJUSTMENT_NOTE_LEN: usize = 5;

/// Validate a manual adjustment quantity (any sign, never zero)
pub fn validate_adjustment_quantity(quantity: i32) -> Result<(), &'static str> {
    if quantity == 0 {
        return Err("Adjustment quantity cannot be zero");
    }
    Ok(())
}

/// Validate the note justifying a manual adjustment
pub fn validate_adjustment_note(note: &str) -> Result<(), &'static str> {
    if note.trim().chars().count() < MIN_ADJUSTMENT_NOTE_LEN {
        return Err("Adjustment note must be at least 5 characters");
    }
    Ok(())
}

/// Validate a physical stock count
pub fn validate_physical_count(quantity: i32) -> Result<(), &'static str> {
    if quantity < 0 {
        return Err("Physical count cannot be negative");
    }
    Ok(())
}

// ============================================================================
// Transaction Validations
// ============================================================================

/// Validate a sale line quantity
pub fn validate_line_quantity(quantity: i32) -> Result<(), &'static str> {
    if quantity <= 0 {
        return Err("Quantity must be greater than zero");
    }
    Ok(())
}

/// Validate a visit counter value
pub fn validate_visit_value(value: i32) -> Result<(), &'static str> {
    if value < 0 {
        return Err("Visit counters cannot be negative");
    }
    Ok(())
}

// ============================================================================
// General Validations
// ============================================================================

/// Validate username format (3-50 chars of letters, digits, '.', '_' or '-')
pub fn validate_username(username: &str) -> Result<(), &'static str> {
    let len = username.chars().count();
    if len < 3 {
        return Err("Username must be at least 3 characters");
    }
    if len > 50 {
        return Err("Username must be at most 50 characters");
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err("Username may only contain letters, digits, '.', '_' and '-'");
    }
    Ok(())
}

/// Validate password strength
pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.len() < 6 {
        return Err("Password must be at least 6 characters");
    }
    Ok(())
}

/// Validate a required display name (regions, distributors, products)
pub fn validate_name(name: &str) -> Result<(), &'static str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Name is required");
    }
    if trimmed.chars().count() > 150 {
        return Err("Name must be at most 150 characters");
    }
    Ok(())
}

/// Validate a catalogue or vendor code
pub fn validate_code(code: &str) -> Result<(), &'static str> {
    let trimmed = code.trim();
    if trimmed.is_empty() {
        return Err("Code is required");
    }
    if trimmed.len() > 50 {
        return Err("Code must be at most 50 characters");
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err("Code cannot contain spaces");
    }
    Ok(())
}

/// Validate e-mail format (basic check)
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err("Invalid email format"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // Inventory Validation Tests
    // ========================================================================

    #[test]
    fn test_adjustment_quantity() {
        assert!(validate_adjustment_quantity(-3).is_ok());
        assert!(validate_adjustment_quantity(12).is_ok());
        assert!(validate_adjustment_quantity(0).is_err());
    }

    #[test]
    fn test_adjustment_note_is_trimmed() {
        assert!(validate_adjustment_note("casse en dépôt").is_ok());
        assert!(validate_adjustment_note("   abc   ").is_err());
        assert!(validate_adjustment_note("abcde").is_ok());
    }

    #[test]
    fn test_physical_count() {
        assert!(validate_physical_count(0).is_ok());
        assert!(validate_physical_count(-1).is_err());
    }

    // ========================================================================
    // Transaction Validation Tests
    // ========================================================================

    #[test]
    fn test_line_quantity() {
        assert!(validate_line_quantity(1).is_ok());
        assert!(validate_line_quantity(0).is_err());
        assert!(validate_line_quantity(-4).is_err());
    }

    #[test]
    fn test_visit_value() {
        assert!(validate_visit_value(0).is_ok());
        assert!(validate_visit_value(-1).is_err());
    }

    // ========================================================================
    // General Validation Tests
    // ========================================================================

    #[test]
    fn test_username() {
        assert!(validate_username("k.benali").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("with space").is_err());
        assert!(validate_username(&"x".repeat(51)).is_err());
    }

    #[test]
    fn test_password() {
        assert!(validate_password("secret").is_ok());
        assert!(validate_password("12345").is_err());
    }

    #[test]
    fn test_name_and_code() {
        assert!(validate_name("  Alger Centre ").is_ok());
        assert!(validate_name("   ").is_err());
        assert!(validate_code("P-001").is_ok());
        assert!(validate_code("P 001").is_err());
        assert!(validate_code("").is_err());
    }

    #[test]
    fn test_email() {
        assert!(validate_email("ops@distrib.dz").is_ok());
        assert!(validate_email("@distrib.dz").is_err());
        assert!(validate_email("ops@localhost").is_err());
    }
}
