//! Helpers for turning raw query-string filters into SQL bind values

use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// `%term%` for an `ILIKE` bind, or `None` for a blank search.
///
/// `%`, `_` and `\` in the term are escaped so they match literally.
pub fn like_pattern(search: Option<&str>) -> Option<String> {
    let term = search.map(str::trim).filter(|s| !s.is_empty())?;
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    Some(escaped)
}

/// Parse an id filter where the literal `all` (or nothing) means no filter
pub fn id_filter(raw: Option<&str>, field: &str) -> AppResult<Option<Uuid>> {
    match raw.map(str::trim) {
        None | Some("") | Some("all") => Ok(None),
        Some(value) => Uuid::parse_str(value)
            .map(Some)
            .map_err(|_| AppError::validation(field, format!("'{}' is not a valid id", value))),
    }
}

/// Text filter where `all` (or nothing) means no filter
pub fn text_filter(raw: Option<&str>) -> Option<String> {
    match raw.map(str::trim) {
        None | Some("") | Some("all") => None,
        Some(value) => Some(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern() {
        assert_eq!(like_pattern(Some("ali")), Some("%ali%".to_string()));
        assert_eq!(like_pattern(Some("  ")), None);
        assert_eq!(like_pattern(None), None);
        assert_eq!(like_pattern(Some("50%")), Some("%50\\%%".to_string()));
    }

    #[test]
    fn test_id_filter() {
        assert_eq!(id_filter(Some("all"), "category").unwrap(), None);
        assert_eq!(id_filter(None, "category").unwrap(), None);
        let id = Uuid::new_v4();
        assert_eq!(id_filter(Some(&id.to_string()), "category").unwrap(), Some(id));
        assert!(id_filter(Some("12"), "category").is_err());
    }

    #[test]
    fn test_text_filter() {
        assert_eq!(text_filter(Some("all")), None);
        assert_eq!(text_filter(Some("1L")), Some("1L".to_string()));
    }
}
