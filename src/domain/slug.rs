//! Slug derivation and validation for published projects.
//!
//! A published slug doubles as the leading label of the site's hostname, so it
//! must be a valid DNS label, must not contain the preview separator and must
//! not collide with a reserved subdomain.

use slug::slugify;
use thiserror::Error;

const MAX_SUFFIX_ATTEMPTS: usize = 64;
const MAX_SLUG_LEN: usize = 63;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
    #[error("slug `{slug}` is reserved")]
    Reserved { slug: String },
    #[error("slug `{slug}` is not a valid hostname label")]
    Malformed { slug: String },
    #[error("exhausted attempts to find a unique slug for `{base}`")]
    Exhausted { base: String },
}

/// Errors from [`generate_unique_slug`], which awaits a fallible uniqueness check.
#[derive(Debug, Error)]
pub enum SlugAsyncError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error(transparent)]
    Predicate(E),
}

/// Derive a base slug from a project name ("Ana & João" → `ana-joao`).
pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let mut candidate = slugify(input);
    // Collapse runs so the result never carries the preview separator.
    while candidate.contains("--") {
        candidate = candidate.replace("--", "-");
    }
    candidate.truncate(MAX_SLUG_LEN);
    let candidate = candidate.trim_matches('-').to_string();

    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    Ok(candidate)
}

/// Check that `slug` can be served as a tenant hostname label.
pub fn validate_slug(slug: &str, reserved: &[String]) -> Result<(), SlugError> {
    let well_formed = !slug.is_empty()
        && slug.len() <= MAX_SLUG_LEN
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');

    if !well_formed {
        return Err(SlugError::Malformed {
            slug: slug.to_string(),
        });
    }

    if reserved.iter().any(|word| word.eq_ignore_ascii_case(slug)) {
        return Err(SlugError::Reserved {
            slug: slug.to_string(),
        });
    }

    Ok(())
}

/// Produce a slug that is valid, unreserved and accepted by `is_free`.
///
/// The base slug is tried first, then `base-1`, `base-2`, and so on. Reserved
/// bases are suffixed as well, so a project named "Admin" publishes as `admin-1`.
pub async fn generate_unique_slug<F, Fut, E>(
    input: &str,
    reserved: &[String],
    mut is_free: F,
) -> Result<String, SlugAsyncError<E>>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let base = derive_slug(input)?;

    if validate_slug(&base, reserved).is_ok()
        && is_free(base.clone())
            .await
            .map_err(SlugAsyncError::Predicate)?
    {
        return Ok(base);
    }

    for attempt in 1..=MAX_SUFFIX_ATTEMPTS {
        let candidate = suffixed(&base, attempt);
        if validate_slug(&candidate, reserved).is_err() {
            continue;
        }
        if is_free(candidate.clone())
            .await
            .map_err(SlugAsyncError::Predicate)?
        {
            return Ok(candidate);
        }
    }

    Err(SlugAsyncError::Slug(SlugError::Exhausted { base }))
}

/// `base-<attempt>`, shortening `base` so the result stays within one hostname label.
fn suffixed(base: &str, attempt: usize) -> String {
    let suffix = format!("-{attempt}");
    let room = MAX_SLUG_LEN.saturating_sub(suffix.len());
    let head = base[..base.len().min(room)].trim_end_matches('-');
    format!("{head}{suffix}")
}
