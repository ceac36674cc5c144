//! Run configuration, read from a line-oriented `key value` input file.
//!
//! Recognized keys:
//!
//! ```text
//! problemName              chemABC | ms
//! meshFileName             path to the mesh graph
//! smToFmGIDMappingFileName path to the sample-to-full GID map (sample mesh runs only)
//! odeStepperName           name of the time integrator
//! dt                       time step
//! finalTime                final simulation time
//! diffusion                diffusion coefficient
//! chemReaction             reaction rate of the chemistry problem
//! observerOn               0 | 1
//! shapshotsFreq            snapshot collection frequency, in steps
//! shapshotsFileName        output path for snapshots
//! basisFileName            path to the basis
//! romOn                    0 | 1
//! romSize                  number of basis modes
//! executionBackend         sequential | parallel
//! ```
//!
//! Unknown keys are ignored.
use crate::assembly::ExecutionBackend;
use crate::physics::AdrPhysics;
use eyre::Context;
use log::info;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// The problems that can be configured.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProblemKind {
    /// The `A + B -> C` chemistry problem in the four-eddy flow (`chemABC`).
    ChemistryAbc,
    /// The manufactured-solution verification problem (`ms`).
    ManufacturedSolution,
}

impl ProblemKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "chemABC" => Some(Self::ChemistryAbc),
            "ms" => Some(Self::ManufacturedSolution),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ChemistryAbc => "chemABC",
            Self::ManufacturedSolution => "ms",
        }
    }
}

/// Invalid values in a run configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum InputError {
    InvalidProblemName(String),
    MissingMeshFile,
    NonPositiveTimeStep(f64),
    NonPositiveFinalTime(f64),
    NegativeDiffusion(f64),
    NegativeReactionRate(f64),
    NonPositiveSnapshotFrequency(i64),
    MissingSnapshotsFile,
    MissingBasisFile,
    NonPositiveRomSize(i64),
    /// The value given for a key could not be parsed.
    InvalidValue { key: String, value: String },
}

impl Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::InvalidProblemName(name) => {
                write!(f, "invalid problem name `{name}`, expected `chemABC` or `ms`")
            }
            InputError::MissingMeshFile => write!(f, "no mesh file given"),
            InputError::NonPositiveTimeStep(dt) => write!(f, "time step must be positive, got {dt}"),
            InputError::NonPositiveFinalTime(t) => write!(f, "final time must be positive, got {t}"),
            InputError::NegativeDiffusion(d) => write!(f, "diffusion coefficient must not be negative, got {d}"),
            InputError::NegativeReactionRate(k) => write!(f, "reaction rate must not be negative, got {k}"),
            InputError::NonPositiveSnapshotFrequency(freq) => {
                write!(f, "snapshot frequency must be positive, got {freq}")
            }
            InputError::MissingSnapshotsFile => write!(f, "observer is enabled, but no snapshots file is given"),
            InputError::MissingBasisFile => write!(f, "no basis file given"),
            InputError::NonPositiveRomSize(size) => write!(f, "ROM size must be positive, got {size}"),
            InputError::InvalidValue { key, value } => write!(f, "invalid value `{value}` for `{key}`"),
        }
    }
}

impl Error for InputError {}

/// Settings for snapshot collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObserverSettings {
    pub frequency: usize,
    pub snapshots_file: PathBuf,
    pub basis_file: PathBuf,
}

/// Settings for reduced-order runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RomSettings {
    pub rom_size: usize,
    pub basis_file: PathBuf,
}

/// A validated run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdrInput {
    pub problem: ProblemKind,
    pub mesh_file: PathBuf,
    pub sample_to_full_map_file: Option<PathBuf>,
    pub ode_stepper: Option<String>,
    pub dt: f64,
    pub final_time: f64,
    pub diffusion: f64,
    pub reaction_rate: f64,
    pub observer: Option<ObserverSettings>,
    pub rom: Option<RomSettings>,
    pub backend: ExecutionBackend,
}

#[derive(Debug, Default)]
struct RawInput {
    problem_name: Option<String>,
    mesh_file: Option<PathBuf>,
    sample_to_full_map_file: Option<PathBuf>,
    ode_stepper: Option<String>,
    dt: f64,
    final_time: f64,
    diffusion: f64,
    reaction_rate: f64,
    observer_on: bool,
    snapshots_frequency: i64,
    snapshots_file: Option<PathBuf>,
    basis_file: Option<PathBuf>,
    rom_on: bool,
    rom_size: i64,
    backend: ExecutionBackend,
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, InputError> {
    value.parse().map_err(|_| InputError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_flag(key: &str, value: &str) -> Result<bool, InputError> {
    match value {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(InputError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_backend(key: &str, value: &str) -> Result<ExecutionBackend, InputError> {
    match value {
        "sequential" => Ok(ExecutionBackend::Sequential),
        "parallel" => Ok(ExecutionBackend::Parallel),
        _ => Err(InputError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

impl RawInput {
    fn set(&mut self, key: &str, value: &str) -> Result<(), InputError> {
        match key {
            "problemName" => self.problem_name = Some(value.to_string()),
            "meshFileName" => self.mesh_file = Some(PathBuf::from(value)),
            "smToFmGIDMappingFileName" => self.sample_to_full_map_file = Some(PathBuf::from(value)),
            "odeStepperName" => self.ode_stepper = Some(value.to_string()),
            "dt" => self.dt = parse_value(key, value)?,
            "finalTime" => self.final_time = parse_value(key, value)?,
            "diffusion" => self.diffusion = parse_value(key, value)?,
            "chemReaction" => self.reaction_rate = parse_value(key, value)?,
            "observerOn" => self.observer_on = parse_flag(key, value)?,
            "shapshotsFreq" => self.snapshots_frequency = parse_value(key, value)?,
            "shapshotsFileName" => self.snapshots_file = Some(PathBuf::from(value)),
            "basisFileName" => self.basis_file = Some(PathBuf::from(value)),
            "romOn" => self.rom_on = parse_flag(key, value)?,
            "romSize" => self.rom_size = parse_value(key, value)?,
            "executionBackend" => self.backend = parse_backend(key, value)?,
            _ => {}
        }
        Ok(())
    }

    fn validate(self) -> Result<AdrInput, InputError> {
        let problem_name = self.problem_name.unwrap_or_default();
        let problem =
            ProblemKind::from_name(&problem_name).ok_or(InputError::InvalidProblemName(problem_name))?;
        let mesh_file = self.mesh_file.ok_or(InputError::MissingMeshFile)?;

        if !(self.dt > 0.0) {
            return Err(InputError::NonPositiveTimeStep(self.dt));
        }
        if !(self.final_time > 0.0) {
            return Err(InputError::NonPositiveFinalTime(self.final_time));
        }
        if !(self.diffusion >= 0.0) {
            return Err(InputError::NegativeDiffusion(self.diffusion));
        }
        if !(self.reaction_rate >= 0.0) {
            return Err(InputError::NegativeReactionRate(self.reaction_rate));
        }

        let observer = if self.observer_on {
            if self.snapshots_frequency <= 0 {
                return Err(InputError::NonPositiveSnapshotFrequency(self.snapshots_frequency));
            }
            Some(ObserverSettings {
                frequency: self.snapshots_frequency as usize,
                snapshots_file: self.snapshots_file.ok_or(InputError::MissingSnapshotsFile)?,
                basis_file: self.basis_file.clone().ok_or(InputError::MissingBasisFile)?,
            })
        } else {
            None
        };

        let rom = if self.rom_on {
            if self.rom_size <= 0 {
                return Err(InputError::NonPositiveRomSize(self.rom_size));
            }
            Some(RomSettings {
                rom_size: self.rom_size as usize,
                basis_file: self.basis_file.ok_or(InputError::MissingBasisFile)?,
            })
        } else {
            None
        };

        Ok(AdrInput {
            problem,
            mesh_file,
            sample_to_full_map_file: self.sample_to_full_map_file,
            ode_stepper: self.ode_stepper,
            dt: self.dt,
            final_time: self.final_time,
            diffusion: self.diffusion,
            reaction_rate: self.reaction_rate,
            observer,
            rom,
            backend: self.backend,
        })
    }
}

impl AdrInput {
    /// Parses and validates a configuration from `key value` lines.
    pub fn parse<R: BufRead>(reader: R) -> eyre::Result<Self> {
        let mut raw = RawInput::default();
        for line in reader.lines() {
            let line = line.wrap_err("failed to read input file")?;
            let mut tokens = line.split_whitespace();
            if let (Some(key), Some(value)) = (tokens.next(), tokens.next()) {
                raw.set(key, value)?;
            }
        }
        let input = raw.validate()?;
        info!(
            "Problem {}: mesh {}, dt = {}, final time = {}, {} steps, D = {}, K = {}",
            input.problem.name(),
            input.mesh_file.display(),
            input.dt,
            input.final_time,
            input.num_steps(),
            input.diffusion,
            input.reaction_rate
        );
        Ok(input)
    }

    pub fn from_file(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).wrap_err_with(|| format!("failed to open input file {}", path.display()))?;
        Self::parse(BufReader::new(file)).wrap_err_with(|| format!("invalid input file {}", path.display()))
    }

    /// Number of time steps, `floor(final_time / dt)`.
    pub fn num_steps(&self) -> usize {
        (self.final_time / self.dt).floor() as usize
    }

    /// The pointwise physics of the configured problem.
    pub fn physics(&self) -> AdrPhysics {
        match self.problem {
            ProblemKind::ChemistryAbc => AdrPhysics::chemistry_abc(self.reaction_rate),
            ProblemKind::ManufacturedSolution => AdrPhysics::manufactured_solution(self.diffusion),
        }
    }

    /// Whether the run evaluates the velocity on a sample mesh.
    pub fn uses_sample_mesh(&self) -> bool {
        self.sample_to_full_map_file.is_some()
    }
}
