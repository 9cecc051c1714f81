use thiserror::Error;
use url::Url;

use crate::{PersonName, SourceEntry};

/// Input rejected before anything reaches the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("enter a link to check")]
    EmptyAddress,
    #[error("enter a valid link (http:// or https://)")]
    InvalidScheme,
    #[error("this site has already been added")]
    DuplicateAddress,
    #[error("surname is required")]
    EmptySurname,
    #[error("add at least one court before running a check")]
    NoSources,
}

/// Validate a court link the user wants to add. Returns the trimmed link.
///
/// Duplicate detection is an exact string match against already added links.
pub fn validate_source(raw: &str, existing: &[SourceEntry]) -> Result<String, ValidationError> {
    let link = raw.trim();
    if link.is_empty() {
        return Err(ValidationError::EmptyAddress);
    }
    match Url::parse(link) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        _ => return Err(ValidationError::InvalidScheme),
    }
    if existing.iter().any(|entry| entry.link == link) {
        return Err(ValidationError::DuplicateAddress);
    }
    Ok(link.to_owned())
}

/// Validate a check request. Returns the person with trimmed fields and
/// blank optional parts dropped.
pub fn validate_check(
    sources: &[SourceEntry],
    person: &PersonName,
) -> Result<PersonName, ValidationError> {
    if sources.is_empty() {
        return Err(ValidationError::NoSources);
    }
    let surname = person.surname.trim();
    if surname.is_empty() {
        return Err(ValidationError::EmptySurname);
    }
    Ok(PersonName {
        surname: surname.to_owned(),
        name: trimmed_part(person.name.as_deref()),
        patronymic: trimmed_part(person.patronymic.as_deref()),
    })
}

fn trimmed_part(part: Option<&str>) -> Option<String> {
    part.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}
