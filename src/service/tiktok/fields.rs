use serde::{Deserialize, Serialize};

pub const FULL_FIELDS: &[&str] = &[
    "id",
    "title",
    "create_time",
    "duration",
    "cover_image_url",
    "share_url",
];

pub const MINIMAL_FIELDS: &[&str] = &["id", "share_url"];

pub const STATISTICS_FIELDS: &[&str] = &[
    "id",
    "view_count",
    "like_count",
    "comment_count",
    "share_count",
];

pub const USER_INFO_FIELDS: &[&str] = &[
    "open_id",
    "union_id",
    "avatar_url",
    "display_name",
    "username",
];

/// The attributes requested from the listing endpoint.
///
/// Listing starts with [FieldSet::Full]. Some accounts get zero videos back for the full set
/// while the minimal one still works, so an empty successful page moves on to
/// [FieldSet::Minimal] once. There is no fallback after that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSet {
    Full,
    Minimal,
}

impl FieldSet {
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            FieldSet::Full => FULL_FIELDS,
            FieldSet::Minimal => MINIMAL_FIELDS,
        }
    }

    /// The field-set to try when this one returned an empty page.
    pub fn fallback(self) -> Option<FieldSet> {
        match self {
            FieldSet::Full => Some(FieldSet::Minimal),
            FieldSet::Minimal => None,
        }
    }
}

impl std::fmt::Display for FieldSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldSet::Full => write!(f, "full"),
            FieldSet::Minimal => write!(f, "minimal"),
        }
    }
}

pub fn join(fields: &[&str]) -> String {
    fields.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_falls_back_to_minimal_once() {
        assert_eq!(FieldSet::Full.fallback(), Some(FieldSet::Minimal));
        assert_eq!(FieldSet::Minimal.fallback(), None);
    }

    #[test]
    fn fields_are_comma_separated() {
        assert_eq!(join(FieldSet::Minimal.fields()), "id,share_url");
    }
}
