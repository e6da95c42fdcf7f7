//! Business-rule checks before a listing reaches the store.

use url::Url;

use crate::error::ValidationError;
use crate::types::listing::ExtractedListing;

/// Upper bound for bedroom and bathroom counts.
pub const MAX_ROOMS: u32 = 20;

/// Check an extracted listing, collecting every violation.
pub fn validate(listing: &ExtractedListing) -> Result<(), ValidationError> {
    let mut violations = Vec::new();
    let fields = &listing.fields;

    if let Some(price) = fields.price_normalized {
        if price <= 0 {
            violations.push(format!("price must be positive, got {}", price));
        }
    }

    if let Some(bedrooms) = fields.bedrooms {
        if bedrooms > MAX_ROOMS {
            violations.push(format!("bedrooms out of range: {}", bedrooms));
        }
    }

    if let Some(bathrooms) = fields.bathrooms {
        if bathrooms > MAX_ROOMS {
            violations.push(format!("bathrooms out of range: {}", bathrooms));
        }
    }

    if let Err(reason) = check_url(&listing.url) {
        violations.push(reason);
    }

    if !(0.0..=1.0).contains(&listing.extraction_confidence) {
        violations.push(format!(
            "confidence out of range: {}",
            listing.extraction_confidence
        ));
    }

    if let Some(coordinates) = fields.coordinates {
        if !coordinates.is_valid() {
            violations.push(format!(
                "coordinates out of range: {}, {}",
                coordinates.latitude, coordinates.longitude
            ));
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { violations })
    }
}

fn check_url(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| format!("malformed url {}: {}", raw, e))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported url scheme: {}", url.scheme()));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(format!("url has no host: {}", raw));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;
    use crate::types::listing::{Coordinates, SourceName};

    fn listing() -> ExtractedListing {
        fixtures::extracted(SourceName::Rightmove, "1", Some(150_000), fixtures::epoch())
    }

    #[test]
    fn test_valid_listing_passes() {
        assert!(validate(&listing()).is_ok());
    }

    #[test]
    fn test_absent_optional_fields_pass() {
        let mut listing = listing();
        listing.fields = Default::default();
        assert!(validate(&listing).is_ok());
    }

    #[test]
    fn test_collects_every_violation() {
        let mut listing = listing();
        listing.fields.price_normalized = Some(0);
        listing.fields.bedrooms = Some(45);
        listing.fields.coordinates = Some(Coordinates::new(95.0, 0.0));
        listing.extraction_confidence = 1.5;

        let err = validate(&listing).unwrap_err();
        assert_eq!(err.violations.len(), 4);
        assert!(err.violations[0].contains("price"));
    }

    #[test]
    fn test_url_rules() {
        let mut listing = listing();
        listing.url = "ftp://www.rightmove.co.uk/properties/1".into();
        assert!(validate(&listing).is_err());

        listing.url = "not a url".into();
        assert!(validate(&listing).is_err());

        listing.url = "http://www.rightmove.co.uk/properties/1".into();
        assert!(validate(&listing).is_ok());
    }
}
