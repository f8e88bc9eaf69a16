//! Field validators run before any persistence attempt. Each returns
//! the violations it found; handlers collect them into a single
//! `VALIDATION_ERROR` response.

use crate::schemas::FieldViolation;
use chrono::Datelike;
use model::entities::user::UserRole;
use validator::ValidationErrors;

/// Characters allowed in a username besides letters and digits.
const USERNAME_SYMBOLS: &str = "@.+-_";

/// Flatten `validator` derive output into field violations.
pub fn violations_from(result: Result<(), ValidationErrors>) -> Vec<FieldViolation> {
    let Err(errors) = result else {
        return Vec::new();
    };
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, field_errors)| {
            field_errors.iter().map(move |error| {
                let message = error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("invalid value for {field}"));
                FieldViolation::new(field, message)
            })
        })
        .collect()
}

/// Reserved-name and character-class checks for a submitted username.
pub fn username_violations(username: &str, reserved: &str) -> Vec<FieldViolation> {
    let mut violations = Vec::new();

    if username.eq_ignore_ascii_case(reserved) {
        violations.push(FieldViolation::new(
            "username",
            format!("username '{username}' is reserved and cannot be used"),
        ));
    }

    let charset_ok = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || USERNAME_SYMBOLS.contains(c));
    if !charset_ok {
        violations.push(FieldViolation::new(
            "username",
            format!("username '{username}' may only contain letters, digits and {USERNAME_SYMBOLS}"),
        ));
    }

    violations
}

/// A release year may not lie in the future.
pub fn year_violation(year: i32) -> Option<FieldViolation> {
    let current = chrono::Utc::now().year();
    (year > current).then(|| {
        FieldViolation::new(
            "year",
            format!("year {year} is in the future (current year is {current})"),
        )
    })
}

/// A review score is an integer in [1, 10].
pub fn score_violation(score: i16) -> Option<FieldViolation> {
    (!(1..=10).contains(&score)).then(|| {
        FieldViolation::new("score", format!("score must be between 1 and 10, got {score}"))
    })
}

/// Slugs are limited to letters, digits, hyphens and underscores.
pub fn slug_violation(slug: &str) -> Option<FieldViolation> {
    let ok = !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    (!ok).then(|| {
        FieldViolation::new(
            "slug",
            format!("slug '{slug}' may only contain letters, digits, hyphens and underscores"),
        )
    })
}

/// Parse a submitted role string into the role enum.
pub fn parse_role(value: &str) -> Result<UserRole, FieldViolation> {
    match value {
        "user" => Ok(UserRole::User),
        "moderator" => Ok(UserRole::Moderator),
        "admin" => Ok(UserRole::Admin),
        other => Err(FieldViolation::new(
            "role",
            format!("role must be one of 'user', 'moderator' or 'admin', got '{other}'"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn reserved_username_is_rejected_case_insensitively() {
        assert!(!username_violations("me", "me").is_empty());
        assert!(!username_violations("ME", "me").is_empty());
        assert!(!username_violations("Me", "me").is_empty());
        assert!(username_violations("meme", "me").is_empty());
    }

    #[test]
    fn username_charset_names_the_offending_value() {
        let violations = username_violations("bad name!", "me");
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("bad name!"));

        assert!(username_violations("good.name+tag@host_1-x", "me").is_empty());
    }

    #[test]
    fn future_years_are_rejected_current_year_is_accepted() {
        let current = chrono::Utc::now().year();
        assert!(year_violation(current + 1).is_some());
        assert!(year_violation(current).is_none());
        assert!(year_violation(1895).is_none());
    }

    #[test]
    fn score_bounds_are_inclusive() {
        assert!(score_violation(0).is_some());
        assert!(score_violation(11).is_some());
        assert!(score_violation(1).is_none());
        assert!(score_violation(10).is_none());
    }

    #[test]
    fn slugs_reject_spaces_and_punctuation() {
        assert!(slug_violation("").is_some());
        assert!(slug_violation("sci fi").is_some());
        assert!(slug_violation("sci.fi").is_some());
        assert!(slug_violation("sci-fi_2").is_none());
    }

    #[test]
    fn roles_parse_from_their_wire_names() {
        assert_eq!(parse_role("user").unwrap(), UserRole::User);
        assert_eq!(parse_role("moderator").unwrap(), UserRole::Moderator);
        assert_eq!(parse_role("admin").unwrap(), UserRole::Admin);
        assert!(parse_role("Admin").is_err());
        assert!(parse_role("owner").is_err());
    }
}
