use std::collections::BTreeMap;

use mailrun_common::dates::{DateRange, cn_date};

/// The closed set of names a template may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Placeholder {
    StartDate,
    EndDate,
    StartDateCn,
    EndDateCn,
    DateRangeCn,
    GroupName,
}

impl Placeholder {
    pub const ALL: [Placeholder; 6] = [
        Placeholder::StartDate,
        Placeholder::EndDate,
        Placeholder::StartDateCn,
        Placeholder::EndDateCn,
        Placeholder::DateRangeCn,
        Placeholder::GroupName,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Placeholder::StartDate => "start_date",
            Placeholder::EndDate => "end_date",
            Placeholder::StartDateCn => "start_date_cn",
            Placeholder::EndDateCn => "end_date_cn",
            Placeholder::DateRangeCn => "date_range_cn",
            Placeholder::GroupName => "group_name",
        }
    }

    /// Resolve a name used inside `{...}`. `hospital` is the legacy spelling of
    /// `group_name`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "hospital" => Some(Placeholder::GroupName),
            _ => Self::ALL.into_iter().find(|p| p.name() == name),
        }
    }
}

impl std::fmt::Display for Placeholder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Values available to a template. The date fields are built once per batch;
/// `group_name` is layered on per row with [`PlaceholderContext::for_group`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceholderContext {
    values: BTreeMap<Placeholder, String>,
}

impl PlaceholderContext {
    pub fn for_dates(range: &DateRange) -> Self {
        let mut values = BTreeMap::new();
        values.insert(Placeholder::StartDate, range.start_iso());
        values.insert(Placeholder::EndDate, range.end_iso());
        values.insert(Placeholder::StartDateCn, cn_date(range.start()));
        values.insert(Placeholder::EndDateCn, cn_date(range.end()));
        values.insert(Placeholder::DateRangeCn, range.range_cn());
        Self { values }
    }

    /// Copy of this context with `group_name` set.
    pub fn for_group(&self, group_name: &str) -> Self {
        let mut ctx = self.clone();
        ctx.values
            .insert(Placeholder::GroupName, group_name.to_string());
        ctx
    }

    pub fn get(&self, placeholder: Placeholder) -> Option<&str> {
        self.values.get(&placeholder).map(String::as_str)
    }

    pub fn set(&mut self, placeholder: Placeholder, value: impl Into<String>) {
        self.values.insert(placeholder, value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for p in Placeholder::ALL {
            assert_eq!(Placeholder::from_name(p.name()), Some(p));
        }
    }

    #[test]
    fn test_hospital_alias() {
        assert_eq!(Placeholder::from_name("hospital"), Some(Placeholder::GroupName));
        assert_eq!(Placeholder::from_name("Hospital"), None);
    }

    #[test]
    fn test_date_context_has_no_group_until_layered() {
        let range = DateRange::parse("2025-12-01", "2025-12-07").unwrap();
        let batch = PlaceholderContext::for_dates(&range);
        assert_eq!(batch.get(Placeholder::StartDate), Some("2025-12-01"));
        assert_eq!(batch.get(Placeholder::EndDateCn), Some("2025年12月7日"));
        assert_eq!(batch.get(Placeholder::GroupName), None);

        let row = batch.for_group("East Ward");
        assert_eq!(row.get(Placeholder::GroupName), Some("East Ward"));
        assert_eq!(batch.get(Placeholder::GroupName), None);
    }
}
