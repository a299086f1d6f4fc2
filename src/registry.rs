//! Dataset registry: which feed file feeds which table, and with which column types.
//!
//! The registry is an immutable value built once at startup, either from the
//! built-in GTFS table ([`Registry::gtfs_default`]) or from a YAML file
//! ([`Registry::load`]), and then passed explicitly to the planner and the
//! orchestrator.
//!
//! ```yaml
//! column_types:          # optional, defaults to the built-in GTFS table
//!   stop_lat: DECIMAL(10,6)
//! datasets:
//!   - name: sp_stop
//!     file: stops.txt
//!     column_types:      # optional per-dataset overrides
//!       stop_code: VARCHAR(32)
//! ```

use std::{
    collections::{BTreeMap, HashSet},
    fmt,
    fs::File,
    io::BufReader,
    path::Path,
    str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use thiserror::Error;

use crate::identifier::Identifier;

const MAX_DECIMAL_PRECISION: u32 = 65;
const MAX_VARCHAR_LENGTH: u32 = 65_535;

pub const DEFAULT_STORAGE_TYPE: StorageType = StorageType::VarChar(255);

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Cannot open registry file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid registry file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Unsupported storage type '{0}'")]
    UnsupportedType(String),
    #[error("Invalid dataset name '{name}': {reason}")]
    InvalidDatasetName { name: String, reason: String },
    #[error("Dataset '{0}' is declared more than once")]
    DuplicateDataset(String),
    #[error("Unknown dataset '{0}'")]
    UnknownDataset(String),
    #[error("Registry does not declare any datasets")]
    Empty,
}

/// Column storage type. Closed set, so registry files cannot inject SQL into DDL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageType {
    TinyInt,
    Int,
    Decimal(u32, u32),
    VarChar(u32),
    Text,
}

impl StorageType {
    pub fn sql(&self) -> String {
        match self {
            StorageType::TinyInt => "TINYINT".to_string(),
            StorageType::Int => "INT".to_string(),
            StorageType::Decimal(precision, scale) => format!("DECIMAL({precision},{scale})"),
            StorageType::VarChar(len) => format!("VARCHAR({len})"),
            StorageType::Text => "TEXT".to_string(),
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql())
    }
}

fn parse_args(inner: &str) -> Option<Vec<u32>> {
    inner
        .split(',')
        .map(|part| part.trim().parse::<u32>().ok())
        .collect()
}

impl FromStr for StorageType {
    type Err = RegistryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase().replace(' ', "");
        let unsupported = || RegistryError::UnsupportedType(value.to_string());
        let (base, args) = match normalized.split_once('(') {
            Some((base, rest)) => {
                let inner = rest.strip_suffix(')').ok_or_else(unsupported)?;
                (base, Some(parse_args(inner).ok_or_else(unsupported)?))
            }
            None => (normalized.as_str(), None),
        };
        let parsed = match (base, args.as_deref()) {
            ("TINYINT", None) => StorageType::TinyInt,
            ("INT" | "INTEGER", None) => StorageType::Int,
            ("TEXT", None) => StorageType::Text,
            ("DECIMAL" | "NUMERIC", Some(&[precision, scale]))
                if (1..=MAX_DECIMAL_PRECISION).contains(&precision) && scale <= precision =>
            {
                StorageType::Decimal(precision, scale)
            }
            ("VARCHAR", Some(&[len])) if (1..=MAX_VARCHAR_LENGTH).contains(&len) => {
                StorageType::VarChar(len)
            }
            _ => return Err(unsupported()),
        };
        Ok(parsed)
    }
}

impl Serialize for StorageType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.sql())
    }
}

impl<'de> Deserialize<'de> for StorageType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

pub type TypeTable = BTreeMap<String, StorageType>;

/// One import unit: a feed file and the primary table it replaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSpec {
    name: Identifier,
    file_name: String,
    type_overrides: TypeTable,
}

impl DatasetSpec {
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn table(&self) -> &Identifier {
        &self.name
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn type_overrides(&self) -> &TypeTable {
        &self.type_overrides
    }

    pub fn storage_type(&self, column: &str) -> StorageType {
        self.type_overrides
            .get(column)
            .copied()
            .unwrap_or(DEFAULT_STORAGE_TYPE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    datasets: Vec<DatasetSpec>,
    column_types: TypeTable,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegistryFile {
    #[serde(default)]
    column_types: Option<TypeTable>,
    datasets: Vec<DatasetEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DatasetEntry {
    name: String,
    file: String,
    #[serde(default)]
    column_types: TypeTable,
}

const GTFS_DATASETS: &[(&str, &str)] = &[
    ("sp_calendar", "calendar.txt"),
    ("sp_calendar_dates", "calendar_dates.txt"),
    ("sp_fare_att", "fare_attributes.txt"),
    ("sp_fare_rules", "fare_rules.txt"),
    ("sp_frequencies", "frequencies.txt"),
    ("sp_routes", "routes.txt"),
    ("sp_shapes", "shapes.txt"),
    ("sp_stop", "stops.txt"),
    ("sp_stop_times", "stop_times.txt"),
    ("sp_trip", "trips.txt"),
];

fn gtfs_column_types() -> TypeTable {
    use StorageType::*;
    let entries: &[(&str, StorageType)] = &[
        // calendar.txt
        ("monday", TinyInt),
        ("tuesday", TinyInt),
        ("wednesday", TinyInt),
        ("thursday", TinyInt),
        ("friday", TinyInt),
        ("saturday", TinyInt),
        ("sunday", TinyInt),
        ("start_date", VarChar(8)),
        ("end_date", VarChar(8)),
        // calendar_dates.txt
        ("date", VarChar(8)),
        ("exception_type", TinyInt),
        // fare_attributes.txt
        ("price", Decimal(10, 6)),
        ("payment_method", TinyInt),
        ("transfers", VarChar(10)),
        ("transfer_duration", Int),
        // frequencies.txt
        ("headway_secs", Int),
        ("start_time", VarChar(10)),
        ("end_time", VarChar(10)),
        // routes.txt
        ("route_type", Int),
        // shapes.txt
        ("shape_pt_lat", Decimal(10, 6)),
        ("shape_pt_lon", Decimal(10, 6)),
        ("shape_pt_sequence", Int),
        ("shape_dist_traveled", Decimal(10, 2)),
        // stops.txt
        ("stop_lat", Decimal(10, 6)),
        ("stop_lon", Decimal(10, 6)),
        // stop_times.txt
        ("arrival_time", VarChar(10)),
        ("departure_time", VarChar(10)),
        ("stop_sequence", Int),
        // trips.txt
        ("direction_id", TinyInt),
    ];
    entries
        .iter()
        .map(|(name, ty)| (name.to_string(), *ty))
        .collect()
}

impl Registry {
    /// Builds a registry from `(dataset, file, per-dataset overrides)` triples.
    /// Per-dataset overrides win over the registry-wide `column_types`.
    pub fn new<I>(datasets: I, column_types: TypeTable) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = (String, String, TypeTable)>,
    {
        let mut seen = HashSet::new();
        let mut specs = Vec::new();
        for (name, file_name, overrides) in datasets {
            let ident = Identifier::parse(&name).map_err(|err| {
                RegistryError::InvalidDatasetName {
                    name: name.clone(),
                    reason: err.to_string(),
                }
            })?;
            // Staging and backup names must stay valid too.
            for suffix in ["_staging", "_backup"] {
                ident
                    .with_suffix(suffix)
                    .map_err(|err| RegistryError::InvalidDatasetName {
                        name: name.clone(),
                        reason: err.to_string(),
                    })?;
            }
            if !seen.insert(name.clone()) {
                return Err(RegistryError::DuplicateDataset(name));
            }
            let mut type_overrides = column_types.clone();
            type_overrides.extend(overrides);
            specs.push(DatasetSpec {
                name: ident,
                file_name,
                type_overrides,
            });
        }
        if specs.is_empty() {
            return Err(RegistryError::Empty);
        }
        Ok(Self {
            datasets: specs,
            column_types,
        })
    }

    /// The built-in GTFS registry.
    pub fn gtfs_default() -> Self {
        let datasets = GTFS_DATASETS
            .iter()
            .map(|(name, file)| (name.to_string(), file.to_string(), TypeTable::new()));
        match Self::new(datasets, gtfs_column_types()) {
            Ok(registry) => registry,
            Err(err) => unreachable!("built-in registry is valid: {err}"),
        }
    }

    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let display = path.display().to_string();
        let file = File::open(path).map_err(|source| RegistryError::Io {
            path: display.clone(),
            source,
        })?;
        let parsed: RegistryFile = serde_yaml::from_reader(BufReader::new(file))
            .map_err(|source| RegistryError::Parse {
                path: display,
                source,
            })?;
        Self::from_file(parsed)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, RegistryError> {
        let parsed: RegistryFile =
            serde_yaml::from_str(yaml).map_err(|source| RegistryError::Parse {
                path: "<inline>".to_string(),
                source,
            })?;
        Self::from_file(parsed)
    }

    fn from_file(parsed: RegistryFile) -> Result<Self, RegistryError> {
        let column_types = parsed.column_types.unwrap_or_else(gtfs_column_types);
        Self::new(
            parsed
                .datasets
                .into_iter()
                .map(|entry| (entry.name, entry.file, entry.column_types)),
            column_types,
        )
    }

    pub fn datasets(&self) -> &[DatasetSpec] {
        &self.datasets
    }

    pub fn dataset(&self, name: &str) -> Option<&DatasetSpec> {
        self.datasets.iter().find(|spec| spec.name() == name)
    }

    /// Registry-wide lookup, ignoring per-dataset overrides.
    pub fn storage_type(&self, column: &str) -> StorageType {
        self.column_types
            .get(column)
            .copied()
            .unwrap_or(DEFAULT_STORAGE_TYPE)
    }

    /// Restricts the registry to `names`, keeping declaration order.
    pub fn select(&self, names: &[String]) -> Result<Self, RegistryError> {
        if names.is_empty() {
            return Ok(self.clone());
        }
        if let Some(unknown) = names.iter().find(|name| self.dataset(name).is_none()) {
            return Err(RegistryError::UnknownDataset(unknown.clone()));
        }
        let datasets = self
            .datasets
            .iter()
            .filter(|spec| names.iter().any(|name| name == spec.name()))
            .cloned()
            .collect();
        Ok(Self {
            datasets,
            column_types: self.column_types.clone(),
        })
    }
}
