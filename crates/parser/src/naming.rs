//! Entity naming helpers

/// Entity name from a response schema title
///
/// `StudyListResponse` -> `Study`, `GermplasmSingleResponse` -> `Germplasm`
pub fn entity_name_from_title(title: &str) -> Option<String> {
    let stem = ["ListResponse", "SingleResponse", "Response"]
        .iter()
        .find_map(|suffix| title.strip_suffix(suffix))
        .unwrap_or(title);

    if stem.is_empty() {
        return None;
    }

    Some(capitalize(&singularize(stem)))
}

/// Entity name from a path segment
///
/// `studies` -> `Study`, `germplasm` -> `Germplasm`
pub fn entity_name_from_segment(segment: &str) -> String {
    capitalize(&singularize(segment))
}

/// Naive English singular: `ies` -> `y`, drop a trailing `s` (but not `ss`)
pub fn singularize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        if !stem.is_empty() {
            return format!("{stem}y");
        }
    }

    if word.len() > 1 && word.ends_with('s') && !word.ends_with("ss") {
        return word[..word.len() - 1].to_string();
    }

    word.to_string()
}

pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

pub fn lower_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_name_from_title() {
        assert_eq!(
            entity_name_from_title("StudyListResponse"),
            Some("Study".to_string())
        );
        assert_eq!(
            entity_name_from_title("GermplasmSingleResponse"),
            Some("Germplasm".to_string())
        );
        assert_eq!(
            entity_name_from_title("ObservationUnitListResponse"),
            Some("ObservationUnit".to_string())
        );
        assert_eq!(
            entity_name_from_title("commonCropNamesResponse"),
            Some("CommonCropName".to_string())
        );
        assert_eq!(entity_name_from_title("Response"), None);
    }

    #[test]
    fn test_entity_name_from_segment() {
        assert_eq!(entity_name_from_segment("studies"), "Study");
        assert_eq!(entity_name_from_segment("germplasm"), "Germplasm");
        assert_eq!(entity_name_from_segment("programs"), "Program");
        assert_eq!(entity_name_from_segment("progress"), "Progress");
    }

    #[test]
    fn test_lower_first() {
        assert_eq!(lower_first("Study"), "study");
        assert_eq!(lower_first(""), "");
    }
}
