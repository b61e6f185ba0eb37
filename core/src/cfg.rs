//! Configuration model for the simulation driver
//!
//! Configuration is supplied as a Java-style property file (`key = value` lines,
//! `#` comments) optionally overlaid with `-D key=value` pairs from the command
//! line. The raw [`PropertySet`] is resolved into a typed, validated
//! [`SimConfig`] before any simulation object is constructed; validation
//! failures never escape into the step loop.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An error raised while loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The property file could not be read
    #[error("cannot read property file: {0}")]
    Io(#[from] std::io::Error),
    /// A property line was not of the form `key = value`
    #[error("malformed property line {line_number}: {line:?}")]
    MalformedLine {
        /// 1-based line number within the property file
        line_number: usize,
        /// Offending line text
        line: String,
    },
    /// A required key was absent
    #[error("missing required property: {0}")]
    MissingKey(String),
    /// A key was present but its value could not be used
    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        /// Property key
        key: String,
        /// Rejected value text
        value: String,
        /// Why the value was rejected
        reason: String,
    },
    /// Two or more values were individually valid but mutually inconsistent
    #[error("inconsistent configuration: {0}")]
    Inconsistent(String),
}

/// A flat bag of raw string properties
///
/// Later insertions win, which is how command-line `-D` overrides are layered
/// on top of the property file.
#[derive(Default, Debug, Clone)]
pub struct PropertySet {
    map: HashMap<String, String>,
}

impl PropertySet {
    /// Create an empty property set
    pub fn new() -> Self {
        Self::default()
    }

    /// Load properties from a file at `path`
    ///
    /// Blank lines and lines starting with `#` or `!` are ignored. Every other
    /// line must contain `key = value` (the `=` may be surrounded by spaces).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut props = Self::new();
        let text = fs::read_to_string(path)?;

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }

            match line.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => {
                    props.set(key.trim(), value.trim());
                }
                _ => {
                    return Err(ConfigError::MalformedLine {
                        line_number: index + 1,
                        line: line.to_string(),
                    })
                }
            }
        }

        Ok(props)
    }

    /// Insert or replace a property
    pub fn set(&mut self, key: &str, value: &str) {
        self.map.insert(key.to_string(), value.to_string());
    }

    /// Overlay a `key=value` pair given as a single string, as from `-D`
    pub fn set_pair(&mut self, pair: &str) -> Result<(), ConfigError> {
        match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                self.set(key.trim(), value.trim());
                Ok(())
            }
            _ => Err(ConfigError::InvalidValue {
                key: "-D".to_string(),
                value: pair.to_string(),
                reason: "expected key=value".to_string(),
            }),
        }
    }

    /// Raw string lookup
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    /// Iterate over all `(key, value)` pairs in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parse an optional key into `T`
    fn parse_opt<T: FromStr>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T::Err: fmt::Display,
    {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value.parse().map(Some).map_err(|e: T::Err| {
                ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                    reason: e.to_string(),
                }
            }),
        }
    }

    /// Parse a required key into `T`
    fn parse_required<T: FromStr>(&self, key: &str) -> Result<T, ConfigError>
    where
        T::Err: fmt::Display,
    {
        self.parse_opt(key)?
            .ok_or_else(|| ConfigError::MissingKey(key.to_string()))
    }

    /// Parse an optional key into `T`, falling back to `default`
    fn parse_or<T: FromStr>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T::Err: fmt::Display,
    {
        Ok(self.parse_opt(key)?.unwrap_or(default))
    }
}

/// Declare a keyword enum with `FromStr`/`Display` over SCREAMING_SNAKE tokens
macro_rules! keyword_enum {
    ($(#[$outer:meta])* $name:ident { $($(#[$inner:meta])* $variant:ident => $token:literal),+ $(,)? }) => {
        $(#[$outer])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $($(#[$inner])* $variant),+
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($token => Ok(Self::$variant),)+
                    _ => Err(format!(
                        "expected one of {:?}", [$($token),+]
                    )),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($token)),+
                }
            }
        }
    };
}

keyword_enum! {
    /// Which component kind populates the tumor
    ComponentType {
        /// Individually tracked single cells
        Cell => "CELL",
        /// Multi-cell lineages sharing one genotype
        Lineage => "LINEAGE",
        /// Multi-cell demes with heterogeneous internal membership
        Deme => "DEME",
    }
}

keyword_enum! {
    /// Spatial structure of the simulation
    SpatialType {
        /// Periodic cubic lattice with bounded site capacity
        Lattice => "LATTICE",
        /// A single site with unbounded capacity
        Point => "POINT",
    }
}

keyword_enum! {
    /// Neighborhood used for neighbor enumeration
    NeighborhoodType {
        /// All 26 adjacent sites
        Moore => "MOORE",
        /// The 6 face-adjacent sites
        VonNeumann => "VON_NEUMANN",
    }
}

keyword_enum! {
    /// Distribution used to pick the expansion site for a division
    ExpansionSelectorType {
        /// Uniform over the Moore neighborhood
        Uniform => "UNIFORM",
        /// Weighted toward face neighbors (`p_nn = 0.122`), zero corner weight
        Spherical => "SPHERICAL",
    }
}

keyword_enum! {
    /// Local growth-rate model
    LocalModelType {
        /// Each component grows at its own genotype-scaled intrinsic rate
        Intrinsic => "INTRINSIC",
    }
}

keyword_enum! {
    /// Site-capacity model
    CapacityModelType {
        /// The same capacity at every site
        Uniform => "UNIFORM",
    }
}

keyword_enum! {
    /// Migration model applied before each advancement phase
    MigrationType {
        /// Components never move
        Pinned => "PINNED",
        /// Components propose a uniform random neighbor each step
        Random => "RANDOM",
    }
}

keyword_enum! {
    /// Distribution family for per-step mutation counts
    RateType {
        /// Counts are Poisson with mean `rate * exposure`
        Poisson => "POISSON",
        /// Each new cell mutates independently with probability `rate`
        Bernoulli => "BERNOULLI",
    }
}

keyword_enum! {
    /// Distribution of the scalar selection coefficient
    CoeffType {
        /// Every scalar mutation carries exactly the configured coefficient
        Delta => "DELTA",
        /// Coefficients are exponential with the configured mean
        Exponential => "EXPONENTIAL",
    }
}

/// Growth-model options
#[derive(Debug, Clone, Serialize)]
pub struct GrowthConfig {
    /// Per-cell per-step birth probability
    pub birth_rate: f64,
    /// Per-cell per-step death probability
    pub death_rate: f64,
    /// Local growth-rate model
    pub local_model_type: LocalModelType,
    /// Populations at or below this size resolve events by explicit sampling
    pub explicit_sampling_limit: u64,
}

/// Capacity-model options
#[derive(Debug, Clone, Serialize)]
pub struct CapacityConfig {
    /// Capacity model kind
    pub model_type: CapacityModelType,
    /// Cells allowed at a single site under the uniform model
    pub site_capacity: u64,
}

/// Lattice options
#[derive(Debug, Clone, Serialize)]
pub struct LatticeConfig {
    /// Period of the cubic lattice along each axis
    pub period_length: u64,
    /// Neighborhood used for neighbor enumeration
    pub neighborhood: NeighborhoodType,
    /// Expansion-site selection distribution
    pub expansion_selector: ExpansionSelectorType,
}

/// Mutation-generation options
#[derive(Debug, Clone, Serialize)]
pub struct MutationConfig {
    /// Count distribution for neutral mutations
    pub neutral_rate_type: RateType,
    /// Mean neutral mutations per new cell
    pub neutral_mean_rate: f64,
    /// Count distribution for scalar selective mutations
    pub selective_rate_type: RateType,
    /// Mean selective mutations per new cell
    pub selective_mean_rate: f64,
    /// Selection coefficient (the mean, under `EXPONENTIAL`)
    pub selection_coeff: f64,
    /// Distribution of the selection coefficient
    pub selection_coeff_type: CoeffType,
    /// Count distribution for neoantigen mutations
    pub neoantigen_rate_type: RateType,
    /// Mean neoantigen mutations per new cell
    pub neoantigen_mean_rate: f64,
    /// Stop generating mutations once this many exist
    pub max_mutation_count: Option<u64>,
    /// Stop generating mutations after this time step
    pub max_generation_step: Option<u32>,
}

/// Per-report options parsed from `tumor.report.<group>.<name>.*` keys
#[derive(Debug, Clone, Serialize)]
pub struct ReportConfig {
    /// Whether the report runs at all
    pub run: bool,
    /// Record on every time step that is a multiple of this interval
    pub sample_interval: u32,
    /// Also record on the first crossing of each of these tumor sizes
    pub sample_sizes: Vec<u64>,
    /// Number of samples (sites or directions) collected per sampling step
    pub sample_count: u32,
    /// Target cell count for bulk samples
    pub target_size: u64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            run: false,
            sample_interval: 1,
            sample_sizes: Vec::new(),
            sample_count: 1,
            target_size: 1000,
        }
    }
}

/// Report options keyed by report name
///
/// Keys look like `tumor.report.<group>.<name>.<option>`; the group token is
/// organizational only and is ignored during lookup.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportsConfig {
    entries: BTreeMap<String, ReportConfig>,
}

impl ReportsConfig {
    /// Options for the named report, disabled if never mentioned
    pub fn entry(&self, name: &str) -> ReportConfig {
        self.entries.get(name).cloned().unwrap_or_default()
    }

    /// Whether the named report is enabled
    pub fn is_enabled(&self, name: &str) -> bool {
        self.entries.get(name).map_or(false, |e| e.run)
    }

    fn from_properties(props: &PropertySet) -> Result<Self, ConfigError> {
        let mut entries: BTreeMap<String, ReportConfig> = BTreeMap::new();

        for (key, value) in props.iter() {
            let Some(rest) = key.strip_prefix("tumor.report.") else {
                continue;
            };
            let Some((path, option)) = rest.rsplit_once('.') else {
                continue;
            };
            // The report name is the last token of the (possibly grouped) path
            let name = path.rsplit('.').next().unwrap_or(path).to_string();
            let entry = entries.entry(name).or_default();

            let invalid = |reason: &str| ConfigError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
                reason: reason.to_string(),
            };

            match option {
                "run" => {
                    entry.run = parse_bool(value).ok_or_else(|| invalid("expected true|false"))?;
                }
                "sampleInterval" => {
                    entry.sample_interval =
                        value.parse().map_err(|_| invalid("expected positive integer"))?;
                    if entry.sample_interval == 0 {
                        return Err(invalid("sample interval must be positive"));
                    }
                }
                "sampleSizes" => {
                    let mut sizes = Vec::new();
                    for token in value.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                        sizes.push(
                            token
                                .parse()
                                .map_err(|_| invalid("expected comma-separated integers"))?,
                        );
                    }
                    sizes.sort_unstable();
                    entry.sample_sizes = sizes;
                }
                "sampleCount" => {
                    entry.sample_count =
                        value.parse().map_err(|_| invalid("expected positive integer"))?;
                }
                "targetSize" => {
                    entry.target_size =
                        value.parse().map_err(|_| invalid("expected positive integer"))?;
                }
                _ => {
                    return Err(invalid("unknown report option"));
                }
            }
        }

        Ok(Self { entries })
    }
}

/// Fully resolved and validated simulation options
#[derive(Debug, Clone, Serialize)]
pub struct SimConfig {
    /// Component kind populating the tumor
    pub component_type: ComponentType,
    /// Spatial structure
    pub spatial_type: SpatialType,
    /// Trial index stamped on every output row
    pub trial_index: u32,
    /// Number of founder cells
    pub initial_size: u64,
    /// Maximum number of time steps
    pub max_step_count: u32,
    /// Stop once the tumor reaches this many cells
    pub max_tumor_size: u64,
    /// RNG seed; seeded from entropy when absent
    pub random_seed: Option<u64>,
    /// Directory under which the trial directory tree is created
    pub report_dir: PathBuf,
    /// Growth-model options
    pub growth: GrowthConfig,
    /// Capacity-model options
    pub capacity: CapacityConfig,
    /// Lattice options
    pub lattice: LatticeConfig,
    /// Migration model
    pub migration_model: MigrationType,
    /// Mutation-generation options
    pub mutation: MutationConfig,
    /// Consecutive empty ray sites that terminate a surface-site walk
    pub empty_shell_distance: u64,
    /// Per-report options
    pub reports: ReportsConfig,
}

impl SimConfig {
    /// Resolve and validate a `SimConfig` from raw properties
    pub fn from_properties(props: &PropertySet) -> Result<Self, ConfigError> {
        let cfg = Self {
            component_type: props.parse_required("tumor.driver.componentType")?,
            spatial_type: props.parse_required("tumor.driver.spatialType")?,
            trial_index: props.parse_or("tumor.driver.trialIndex", 0)?,
            initial_size: props.parse_required("tumor.driver.initialSize")?,
            max_step_count: props.parse_required("tumor.driver.maxStepCount")?,
            max_tumor_size: props.parse_required("tumor.driver.maxTumorSize")?,
            random_seed: props.parse_opt("tumor.driver.randomSeed")?,
            report_dir: props
                .get("tumor.driver.reportDir")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            growth: GrowthConfig {
                birth_rate: props.parse_required("tumor.growth.birthRate")?,
                death_rate: props.parse_required("tumor.growth.deathRate")?,
                local_model_type: props
                    .parse_or("tumor.growth.localModelType", LocalModelType::Intrinsic)?,
                explicit_sampling_limit: props.parse_or("tumor.growth.explicitSamplingLimit", 10)?,
            },
            capacity: CapacityConfig {
                model_type: props
                    .parse_or("tumor.capacity.modelType", CapacityModelType::Uniform)?,
                site_capacity: props.parse_or("tumor.capacity.siteCapacity", 1)?,
            },
            lattice: LatticeConfig {
                period_length: props.parse_or("tumor.lattice.periodLength", 1)?,
                neighborhood: props
                    .parse_or("tumor.lattice.neighborhood", NeighborhoodType::Moore)?,
                expansion_selector: props.parse_or(
                    "tumor.lattice.expansionSelector",
                    ExpansionSelectorType::Uniform,
                )?,
            },
            migration_model: props.parse_or("tumor.migrate.modelType", MigrationType::Pinned)?,
            mutation: MutationConfig {
                neutral_rate_type: props
                    .parse_or("tumor.mutation.neutralRateType", RateType::Poisson)?,
                neutral_mean_rate: props.parse_or("tumor.mutation.neutralMeanRate", 0.0)?,
                selective_rate_type: props
                    .parse_or("tumor.mutation.selectiveRateType", RateType::Poisson)?,
                selective_mean_rate: props.parse_or("tumor.mutation.selectiveMeanRate", 0.0)?,
                selection_coeff: props.parse_or("tumor.mutation.selectionCoeff", 0.0)?,
                selection_coeff_type: props
                    .parse_or("tumor.mutation.selectionCoeffType", CoeffType::Delta)?,
                neoantigen_rate_type: props
                    .parse_or("tumor.mutation.neoantigenRateType", RateType::Poisson)?,
                neoantigen_mean_rate: props.parse_or("tumor.mutation.neoantigenMeanRate", 0.0)?,
                max_mutation_count: props.parse_opt("tumor.mutation.maxMutationCount")?,
                max_generation_step: props.parse_opt("tumor.mutation.maxGenerationStep")?,
            },
            empty_shell_distance: props.parse_or("tumor.sample.emptyShellDistance", 3)?,
            reports: ReportsConfig::from_properties(props)?,
        };

        cfg.validate()?;
        Ok(cfg)
    }

    /// Check cross-field consistency and value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn range(key: &str, value: f64, lo: f64, hi: f64) -> Result<(), ConfigError> {
            if value.is_finite() && (lo..=hi).contains(&value) {
                Ok(())
            } else {
                Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                    reason: format!("must lie in [{}, {}]", lo, hi),
                })
            }
        }

        fn positive(key: &str, value: u64) -> Result<(), ConfigError> {
            if value > 0 {
                Ok(())
            } else {
                Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                    reason: "must be positive".to_string(),
                })
            }
        }

        positive("tumor.driver.initialSize", self.initial_size)?;
        positive("tumor.driver.maxStepCount", self.max_step_count as u64)?;
        positive("tumor.driver.maxTumorSize", self.max_tumor_size)?;
        positive("tumor.capacity.siteCapacity", self.capacity.site_capacity)?;
        positive("tumor.lattice.periodLength", self.lattice.period_length)?;
        positive("tumor.sample.emptyShellDistance", self.empty_shell_distance)?;

        range("tumor.growth.birthRate", self.growth.birth_rate, 0.0, 1.0)?;
        range("tumor.growth.deathRate", self.growth.death_rate, 0.0, 1.0)?;
        if self.growth.birth_rate + self.growth.death_rate > 1.0 {
            return Err(ConfigError::Inconsistent(format!(
                "birthRate + deathRate = {} exceeds 1",
                self.growth.birth_rate + self.growth.death_rate
            )));
        }

        for (key, rate) in [
            ("tumor.mutation.neutralMeanRate", self.mutation.neutral_mean_rate),
            ("tumor.mutation.selectiveMeanRate", self.mutation.selective_mean_rate),
            ("tumor.mutation.neoantigenMeanRate", self.mutation.neoantigen_mean_rate),
            ("tumor.mutation.selectionCoeff", self.mutation.selection_coeff),
        ] {
            if !rate.is_finite() || rate < 0.0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: rate.to_string(),
                    reason: "must be non-negative".to_string(),
                });
            }
        }

        // A Bernoulli rate is a per-cell probability and must not exceed one.
        for (key, rate_type, rate) in [
            (
                "tumor.mutation.neutralMeanRate",
                self.mutation.neutral_rate_type,
                self.mutation.neutral_mean_rate,
            ),
            (
                "tumor.mutation.selectiveMeanRate",
                self.mutation.selective_rate_type,
                self.mutation.selective_mean_rate,
            ),
            (
                "tumor.mutation.neoantigenMeanRate",
                self.mutation.neoantigen_rate_type,
                self.mutation.neoantigen_mean_rate,
            ),
        ] {
            if rate_type == RateType::Bernoulli && rate > 1.0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: rate.to_string(),
                    reason: "a BERNOULLI rate must not exceed 1".to_string(),
                });
            }
        }

        if self.lattice.expansion_selector == ExpansionSelectorType::Spherical
            && self.lattice.neighborhood != NeighborhoodType::Moore
        {
            return Err(ConfigError::Inconsistent(
                "the SPHERICAL expansion selector requires the MOORE neighborhood".to_string(),
            ));
        }

        if self.spatial_type == SpatialType::Lattice
            && self.component_type != ComponentType::Cell
            && self.initial_size > self.capacity.site_capacity
        {
            return Err(ConfigError::Inconsistent(format!(
                "initialSize {} exceeds the founder site capacity {}",
                self.initial_size, self.capacity.site_capacity
            )));
        }

        if self.spatial_type == SpatialType::Lattice {
            // The lattice must be able to hold the final tumor without the
            // growth front wrapping onto itself.
            let mean_capacity = self.capacity.site_capacity as f64;
            let radius =
                (3.0 * self.max_tumor_size as f64 / (4.0 * std::f64::consts::PI * mean_capacity))
                    .cbrt();
            if 2.0 * radius > self.lattice.period_length as f64 {
                return Err(ConfigError::Inconsistent(format!(
                    "lattice period {} cannot hold maxTumorSize {} (estimated diameter {:.1})",
                    self.lattice.period_length,
                    self.max_tumor_size,
                    2.0 * radius
                )));
            }
        }

        Ok(())
    }

    /// Lattice period actually used: `POINT` tumors live on a single site
    pub fn effective_period(&self) -> u64 {
        match self.spatial_type {
            SpatialType::Lattice => self.lattice.period_length,
            SpatialType::Point => 1,
        }
    }
}

/// Parse a `true`/`false` token, case-insensitively
fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}
