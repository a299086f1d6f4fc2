//! Schema planner: turns a sanitized header into an ordered column list.
//!
//! Column order is the binding order used by the staging loader, so the plan
//! always has exactly one entry per header field, in header order.

use serde::Serialize;

use crate::registry::{DatasetSpec, StorageType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub storage_type: StorageType,
}

pub fn plan_columns(headers: &[String], dataset: &DatasetSpec) -> Vec<ColumnDefinition> {
    headers
        .iter()
        .map(|name| ColumnDefinition {
            name: name.clone(),
            storage_type: dataset.storage_type(name),
        })
        .collect()
}

/// Rows for the `--plan` table: position, column, storage type.
pub fn describe_columns(columns: &[ColumnDefinition]) -> Vec<Vec<String>> {
    columns
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            vec![
                (idx + 1).to_string(),
                column.name.clone(),
                column.storage_type.to_string(),
            ]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    #[test]
    fn plan_preserves_header_order_and_length() {
        let registry = Registry::gtfs_default();
        let stops = registry.dataset("sp_stop").unwrap();
        let headers: Vec<String> = ["stop_lon", "stop_id", "zone_id", "stop_lat"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let plan = plan_columns(&headers, stops);
        let names: Vec<&str> = plan.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["stop_lon", "stop_id", "zone_id", "stop_lat"]);
        assert_eq!(plan[0].storage_type, StorageType::Decimal(10, 6));
        assert_eq!(plan[2].storage_type, StorageType::VarChar(255));
    }

    #[test]
    fn unknown_columns_default_silently() {
        let registry = Registry::gtfs_default();
        let trips = registry.dataset("sp_trip").unwrap();
        let plan = plan_columns(&["anything at all".to_string()], trips);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].storage_type, StorageType::VarChar(255));
    }

    #[test]
    fn describe_numbers_columns_from_one() {
        let columns = vec![ColumnDefinition {
            name: "route_type".into(),
            storage_type: StorageType::Int,
        }];
        assert_eq!(
            describe_columns(&columns),
            vec![vec!["1".to_string(), "route_type".to_string(), "INT".to_string()]]
        );
    }
}
