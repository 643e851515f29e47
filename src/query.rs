use crate::data_models::ListingSystem;
use crate::error::ConfigError;

/// USPS abbreviations. Search engines return noticeably better results for
/// the full name, so two-letter input is expanded.
const STATES: [(&str, &str); 51] = [
    ("AL", "Alabama"),
    ("AK", "Alaska"),
    ("AZ", "Arizona"),
    ("AR", "Arkansas"),
    ("CA", "California"),
    ("CO", "Colorado"),
    ("CT", "Connecticut"),
    ("DE", "Delaware"),
    ("DC", "District of Columbia"),
    ("FL", "Florida"),
    ("GA", "Georgia"),
    ("HI", "Hawaii"),
    ("ID", "Idaho"),
    ("IL", "Illinois"),
    ("IN", "Indiana"),
    ("IA", "Iowa"),
    ("KS", "Kansas"),
    ("KY", "Kentucky"),
    ("LA", "Louisiana"),
    ("ME", "Maine"),
    ("MD", "Maryland"),
    ("MA", "Massachusetts"),
    ("MI", "Michigan"),
    ("MN", "Minnesota"),
    ("MS", "Mississippi"),
    ("MO", "Missouri"),
    ("MT", "Montana"),
    ("NE", "Nebraska"),
    ("NV", "Nevada"),
    ("NH", "New Hampshire"),
    ("NJ", "New Jersey"),
    ("NM", "New Mexico"),
    ("NY", "New York"),
    ("NC", "North Carolina"),
    ("ND", "North Dakota"),
    ("OH", "Ohio"),
    ("OK", "Oklahoma"),
    ("OR", "Oregon"),
    ("PA", "Pennsylvania"),
    ("RI", "Rhode Island"),
    ("SC", "South Carolina"),
    ("SD", "South Dakota"),
    ("TN", "Tennessee"),
    ("TX", "Texas"),
    ("UT", "Utah"),
    ("VT", "Vermont"),
    ("VA", "Virginia"),
    ("WA", "Washington"),
    ("WV", "West Virginia"),
    ("WI", "Wisconsin"),
    ("WY", "Wyoming"),
];

/// Expands a known two-letter abbreviation; anything else is returned trimmed.
pub fn normalize_state(state: &str) -> Result<String, ConfigError> {
    let trimmed = state.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::EmptyState);
    }
    if trimmed.len() == 2 {
        let upper = trimmed.to_ascii_uppercase();
        if let Some((_, full)) = STATES.iter().find(|(abbr, _)| *abbr == upper) {
            return Ok((*full).to_string());
        }
    }
    Ok(trimmed.to_string())
}

/// Search queries for `state` on the given system, most specific first.
pub fn build_queries(state: &str, system: ListingSystem) -> Result<Vec<String>, ConfigError> {
    let state = normalize_state(state)?;
    let host = system.host();
    let queries = match system {
        ListingSystem::Buildium => vec![
            format!(r#"site:{host} inurl:"Resident/Public/Rentals" "{state}""#),
            format!(r#"site:{host} inurl:"Resident/public/rentals" "{state}""#),
            format!(r#"site:{host} inurl:"rentals" "{state}""#),
        ],
        ListingSystem::AppFolio => vec![
            format!(r#"site:{host}/listings "{state}""#),
            format!(r#"site:{host} inurl:"listings/detail" "{state}""#),
            format!(r#"site:{host} inurl:listings "{state}" "apply now""#),
        ],
    };
    Ok(queries)
}
