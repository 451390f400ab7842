//! Metric availability marker shared by aggregations, KPIs and presentation.

use serde::Serialize;

/// Placeholder rendered for a value that cannot be shown.
pub const PLACEHOLDER: &str = "—";

/// A value that may legitimately be missing.
///
/// `NoData` means the current selection is empty; `Unavailable` means the
/// source never carried the column. Neither is an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Metric<T> {
    Available(T),
    NoData,
    Unavailable,
}

impl<T> Metric<T> {
    pub fn available(&self) -> Option<&T> {
        match self {
            Metric::Available(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Metric::Available(_))
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Metric::Unavailable)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Metric<U> {
        match self {
            Metric::Available(value) => Metric::Available(f(value)),
            Metric::NoData => Metric::NoData,
            Metric::Unavailable => Metric::Unavailable,
        }
    }

    /// Format an available value, or the matching placeholder text.
    pub fn display_with(&self, f: impl FnOnce(&T) -> String) -> String {
        match self {
            Metric::Available(value) => f(value),
            Metric::NoData => "no data".to_string(),
            Metric::Unavailable => PLACEHOLDER.to_string(),
        }
    }
}

impl<T> From<Option<T>> for Metric<T> {
    /// `None` maps to `NoData`.
    fn from(value: Option<T>) -> Self {
        value.map_or(Metric::NoData, Metric::Available)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_distinguishes_missing_states() {
        let fmt = |v: &f64| format!("{v:.2}");
        assert_eq!(Metric::Available(2.5).display_with(fmt), "2.50");
        assert_eq!(Metric::<f64>::NoData.display_with(fmt), "no data");
        assert_eq!(Metric::<f64>::Unavailable.display_with(fmt), PLACEHOLDER);
    }

    #[test]
    fn test_serializes_with_status_tag() {
        let json = serde_json::to_value(Metric::Available(3)).unwrap();
        assert_eq!(json, serde_json::json!({"status": "available", "value": 3}));
        let json = serde_json::to_value(Metric::<i32>::Unavailable).unwrap();
        assert_eq!(json, serde_json::json!({"status": "unavailable"}));
    }

    #[test]
    fn test_from_option_and_map() {
        assert_eq!(Metric::from(Some(2)).map(|v| v * 2), Metric::Available(4));
        assert_eq!(Metric::<i32>::from(None), Metric::NoData);
        assert!(Metric::<i32>::Unavailable.map(|v| v + 1).is_unavailable());
    }
}
