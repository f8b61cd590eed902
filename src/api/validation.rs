use crate::error::{AppError, Result};

const MAX_TEXT_LEN: usize = 200;

/// Trims a required text field and rejects empty or oversized values
pub fn required(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    if trimmed.chars().count() > MAX_TEXT_LEN {
        return Err(AppError::Validation(format!(
            "{} must be at most {} characters",
            field, MAX_TEXT_LEN
        )));
    }
    Ok(trimmed.to_string())
}

/// Trims an optional text field; blank becomes `None`
pub fn optional(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

pub fn slug(value: &str) -> Result<String> {
    let slug = value.trim().to_lowercase();
    let valid_chars = slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');

    if !(2..=64).contains(&slug.len())
        || !valid_chars
        || slug.starts_with('-')
        || slug.ends_with('-')
    {
        return Err(AppError::Validation(
            "Slug must be 2-64 characters of a-z, 0-9 and inner dashes".to_string(),
        ));
    }

    Ok(slug)
}

pub fn email(value: &str) -> Result<String> {
    let email = value.trim().to_string();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };

    if !valid {
        return Err(AppError::Validation(format!("Invalid email address: {}", email)));
    }

    Ok(email)
}

pub fn optional_email(value: Option<String>) -> Result<Option<String>> {
    optional(value).map(|v| email(&v)).transpose()
}

pub fn probation_days(value: Option<i32>) -> Result<Option<i32>> {
    match value {
        Some(days) if days < 0 => Err(AppError::Validation(
            "Probation days cannot be negative".to_string(),
        )),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_trims() {
        assert_eq!(required("Name", "  Rowing Club ").unwrap(), "Rowing Club");
        assert!(required("Name", "   ").is_err());
        assert!(required("Name", &"x".repeat(201)).is_err());
    }

    #[test]
    fn test_optional_blank_is_none() {
        assert_eq!(optional(Some("  ".into())), None);
        assert_eq!(optional(Some(" a ".into())), Some("a".into()));
        assert_eq!(optional(None), None);
    }

    #[test]
    fn test_slug_rules() {
        assert_eq!(slug("Chess-Club-42").unwrap(), "chess-club-42");
        assert!(slug("a").is_err());
        assert!(slug("-chess").is_err());
        assert!(slug("chess club").is_err());
        assert!(slug("schach_verein").is_err());
    }

    #[test]
    fn test_email_rules() {
        assert_eq!(email(" ada@example.org ").unwrap(), "ada@example.org");
        assert!(email("ada.example.org").is_err());
        assert!(email("@example.org").is_err());
        assert!(email("ada@localhost").is_err());
        assert!(email("ada@@example.org").is_err());
    }

    #[test]
    fn test_optional_email() {
        assert_eq!(optional_email(Some(" ".into())).unwrap(), None);
        assert!(optional_email(Some("nope".into())).is_err());
    }

    #[test]
    fn test_probation_days() {
        assert_eq!(probation_days(Some(0)).unwrap(), Some(0));
        assert!(probation_days(Some(-1)).is_err());
    }
}
