//! Curated tag → field name table for the RUSMARC records we ingest.
//!
//! Lookups never fail: anything not listed here resolves to
//! [`UNKNOWN_FIELD_NAME`] and callers report it to the unknown-tag tracker.

use crate::types::UNKNOWN_FIELD_NAME;

/// Control number field
pub const CONTROL_NUMBER_TAG: &str = "001";
/// Publication, distribution, etc. (carries the year)
pub const PUBLICATION_TAG: &str = "210";
/// Electronic location and access (carries the viewer URL)
pub const ELECTRONIC_LOCATION_TAG: &str = "856";

// Sorted by tag so lookups can binary search.
static FIELD_NAMES: &[(&str, &str)] = &[
    ("001", "Control Number"),
    ("005", "Date and Time of Latest Transaction"),
    ("035", "Other System Numbers"),
    ("100", "Main Entry - Personal Name"),
    ("101", "Language Code"),
    ("102", "Country of Publication"),
    ("105", "Field of Coded Data: Textual Resources, Monographic"),
    ("135", "Material Designation"),
    ("140", "Coded Data Field"),
    ("200", "Title Statement"),
    ("205", "Edition Statement"),
    ("210", "Publication, Distribution, etc."),
    ("215", "Physical Description"),
    ("300", "General Notes"),
    ("303", "Note - Data"),
    ("304", "Note - Bibliography"),
    ("305", "Note - Data"),
    ("306", "Note - Data"),
    ("307", "Note - Data"),
    ("310", "Note - Binding Information"),
    ("314", "Note - Responsibility"),
    ("316", "Note - Copy Information"),
    ("317", "Provenance Note"),
    ("320", "Bibliography / Index Note"),
    ("321", "General Note"),
    ("325", "General Note"),
    ("327", "Notes About Contents"),
    ("330", "Summary or Abstract"),
    ("399", "Local Note"),
    ("412", "Source of Excerpt or Offprint"),
    ("422", "Parent of Supplement"),
    ("451", "Other Edition on Similar Medium"),
    ("454", "Translation Of"),
    ("461", "Set Level"),
    ("464", "Analytical Level"),
    ("481", "Also Bound in This Volume"),
    ("482", "Bound With"),
    ("488", "Other Related Works"),
    ("510", "Parallel Title"),
    ("513", "Added Title-Page Title"),
    ("514", "Caption Title"),
    ("517", "Other Variant Titles"),
    ("518", "Title in Standard Modern Spelling"),
    ("600", "Personal Name Used as Subject"),
    ("601", "Corporate Body Name Used as Subject"),
    ("602", "Family Name Used as Subject"),
    ("606", "Topical Name Used as Subject"),
    ("607", "Geographical Name Used as Subject"),
    ("610", "Uncontrolled Subject Terms"),
    ("620", "Subject Added Entry"),
    ("686", "Other Classification Numbers"),
    ("700", "Added Entry - Personal Name"),
    ("701", "Personal Name - Alternative Responsibility"),
    ("702", "Added Entry - Personal Name"),
    ("710", "Corporate Body Name - Primary Responsibility"),
    ("711", "Corporate Body Name - Alternative Responsibility"),
    ("712", "Added Entry - Corporate Name"),
    ("722", "Family Name - Secondary Responsibility"),
    ("790", "Personal Name - Alternative Form"),
    ("791", "Corporate Body Name - Alternative Form"),
    ("801", "Source of Cataloging"),
    ("830", "General Note"),
    ("852", "Location"),
    ("856", "Electronic Location and Access"),
    ("899", "Local Note"),
];

fn lookup(tag: &str) -> Option<&'static str> {
    FIELD_NAMES
        .binary_search_by(|(known, _)| (*known).cmp(tag))
        .ok()
        .map(|idx| FIELD_NAMES[idx].1)
}

/// Curated name for `tag`, or the "Unknown Field" sentinel
pub fn name_for(tag: &str) -> &'static str {
    lookup(tag).unwrap_or(UNKNOWN_FIELD_NAME)
}

pub fn is_known(tag: &str) -> bool {
    lookup(tag).is_some()
}
