use crate::data::Dataset;
use crate::error::{EngineError, EngineResult};

/// Ordered column names of a dataset, addressable by 1-based ordinal
#[derive(Debug, Clone, PartialEq)]
pub struct FieldCatalog {
    names: Vec<String>,
}

impl FieldCatalog {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn from_dataset(data: &Dataset) -> Self {
        Self::new(data.headers().to_vec())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Column name at a 1-based position
    pub fn resolve_ordinal(&self, position: usize) -> EngineResult<&str> {
        if position == 0 || position > self.names.len() {
            return Err(EngineError::OutOfRange {
                position,
                count: self.names.len(),
            });
        }
        Ok(&self.names[position - 1])
    }

    pub fn name_exists(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// 1-based position of a column name
    pub fn ordinal_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name).map(|i| i + 1)
    }

    /// Numbered listing, one `N. name` line per column
    pub fn listing(&self) -> Vec<String> {
        numbered(&self.names)
    }
}

/// Choose an entry of `options` by 1-based number or exact name
pub fn pick<'a>(options: &'a [String], input: &str) -> Option<&'a str> {
    let input = input.trim();
    if !input.is_empty() && input.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(n) = input.parse::<usize>() {
            if n >= 1 && n <= options.len() {
                return Some(&options[n - 1]);
            }
        }
    }
    options.iter().find(|o| o.as_str() == input).map(|o| o.as_str())
}

pub fn numbered(items: &[String]) -> Vec<String> {
    items
        .iter()
        .enumerate()
        .map(|(i, name)| format!("{}. {}", i + 1, name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> FieldCatalog {
        FieldCatalog::new(vec!["Date".into(), "Region".into(), "Sales".into()])
    }

    #[test]
    fn test_resolve_ordinal() {
        let c = catalog();
        assert_eq!(c.resolve_ordinal(1).unwrap(), "Date");
        assert_eq!(c.resolve_ordinal(3).unwrap(), "Sales");
    }

    #[test]
    fn test_resolve_ordinal_out_of_range() {
        let c = catalog();
        assert_eq!(
            c.resolve_ordinal(0),
            Err(EngineError::OutOfRange { position: 0, count: 3 })
        );
        assert!(matches!(c.resolve_ordinal(4), Err(EngineError::OutOfRange { position: 4, .. })));
    }

    #[test]
    fn test_name_lookup_round_trip() {
        let c = catalog();
        assert!(c.name_exists("Region"));
        assert!(!c.name_exists("region"));
        assert_eq!(c.ordinal_of("Sales"), Some(3));
        assert_eq!(c.ordinal_of("Missing"), None);
    }

    #[test]
    fn test_pick_by_number_or_name() {
        let options = vec!["Order Date".to_string(), "Ship Date".to_string()];
        assert_eq!(pick(&options, "2"), Some("Ship Date"));
        assert_eq!(pick(&options, "Order Date"), Some("Order Date"));
        assert_eq!(pick(&options, "3"), None);
        assert_eq!(pick(&options, "Due Date"), None);
    }

    #[test]
    fn test_listing() {
        assert_eq!(catalog().listing(), vec!["1. Date", "2. Region", "3. Sales"]);
    }
}
