use adr_rom::assembly::ExecutionBackend;
use adr_rom::config::{AdrInput, InputError, ProblemKind};
use adr_rom::physics::AdrPhysics;
use std::path::PathBuf;

use crate::test_output_dir;

fn input_error(content: &str) -> InputError {
    let err = AdrInput::parse(content.as_bytes()).unwrap_err();
    err.downcast_ref::<InputError>()
        .cloned()
        .expect("Error must be an input error")
}

const CHEMISTRY_INPUT: &str = "\
problemName chemABC
meshFileName mesh.dat
odeStepperName RungeKutta4
dt 0.01
finalTime 2.005
diffusion 0.001
chemReaction 5.0
someUnknownKey 3
observerOn 1
shapshotsFreq 10
shapshotsFileName snapshots.txt
basisFileName basis.txt
executionBackend parallel
";

#[test]
fn parse_chemistry_input() {
    let input = AdrInput::parse(CHEMISTRY_INPUT.as_bytes()).unwrap();
    assert_eq!(input.problem, ProblemKind::ChemistryAbc);
    assert_eq!(input.mesh_file, PathBuf::from("mesh.dat"));
    assert_eq!(input.ode_stepper.as_deref(), Some("RungeKutta4"));
    assert_eq!(input.dt, 0.01);
    assert_eq!(input.num_steps(), 200);
    assert_eq!(input.backend, ExecutionBackend::Parallel);
    assert!(!input.uses_sample_mesh());
    assert!(input.rom.is_none());

    let observer = input.observer.as_ref().unwrap();
    assert_eq!(observer.frequency, 10);
    assert_eq!(observer.snapshots_file, PathBuf::from("snapshots.txt"));
    assert_eq!(observer.basis_file, PathBuf::from("basis.txt"));

    assert_eq!(input.physics(), AdrPhysics::chemistry_abc(5.0));
}

#[test]
fn parse_manufactured_solution_rom_input() {
    let content = "\
problemName ms
meshFileName sample_mesh.dat
smToFmGIDMappingFileName sm_to_fm.dat
dt 0.1
finalTime 1.0
diffusion 0.01
romOn 1
romSize 12
basisFileName basis.txt
";
    let input = AdrInput::parse(content.as_bytes()).unwrap();
    assert_eq!(input.problem, ProblemKind::ManufacturedSolution);
    assert!(input.uses_sample_mesh());
    assert_eq!(input.backend, ExecutionBackend::Sequential);
    let rom = input.rom.as_ref().unwrap();
    assert_eq!(rom.rom_size, 12);
    assert_eq!(rom.basis_file, PathBuf::from("basis.txt"));
    assert_eq!(input.physics(), AdrPhysics::manufactured_solution(0.01));
}

#[test]
fn invalid_inputs_are_rejected() {
    let base = "meshFileName mesh.dat\ndt 0.1\nfinalTime 1.0\n";
    assert_eq!(
        input_error(&format!("problemName burgers\n{base}")),
        InputError::InvalidProblemName("burgers".to_string())
    );
    assert_eq!(
        input_error("problemName ms\ndt 0.1\nfinalTime 1.0\n"),
        InputError::MissingMeshFile
    );
    assert_eq!(
        input_error(&format!("problemName ms\n{base}dt 0\n")),
        InputError::NonPositiveTimeStep(0.0)
    );
    assert_eq!(
        input_error(&format!("problemName ms\n{base}finalTime -1\n")),
        InputError::NonPositiveFinalTime(-1.0)
    );
    assert_eq!(
        input_error(&format!("problemName ms\n{base}diffusion -0.5\n")),
        InputError::NegativeDiffusion(-0.5)
    );
    assert_eq!(
        input_error(&format!("problemName chemABC\n{base}chemReaction -2\n")),
        InputError::NegativeReactionRate(-2.0)
    );
    assert_eq!(
        input_error(&format!("problemName ms\n{base}observerOn 1\nshapshotsFreq 0\n")),
        InputError::NonPositiveSnapshotFrequency(0)
    );
    assert_eq!(
        input_error(&format!("problemName ms\n{base}observerOn 1\nshapshotsFreq 2\nbasisFileName b.txt\n")),
        InputError::MissingSnapshotsFile
    );
    assert_eq!(
        input_error(&format!("problemName ms\n{base}romOn 1\nromSize 3\n")),
        InputError::MissingBasisFile
    );
    assert_eq!(
        input_error(&format!("problemName ms\n{base}romOn 1\nromSize -3\nbasisFileName b.txt\n")),
        InputError::NonPositiveRomSize(-3)
    );
    assert_eq!(
        input_error(&format!("problemName ms\n{base}romOn yes\n")),
        InputError::InvalidValue {
            key: "romOn".to_string(),
            value: "yes".to_string()
        }
    );
}

#[test]
fn nan_values_are_rejected() {
    let base = "problemName chemABC\nmeshFileName mesh.dat\ndt 0.1\nfinalTime 1.0\n";
    assert!(matches!(
        input_error(&format!("{base}dt NaN\n")),
        InputError::NonPositiveTimeStep(dt) if dt.is_nan()
    ));
    assert!(matches!(
        input_error(&format!("{base}finalTime NaN\n")),
        InputError::NonPositiveFinalTime(t) if t.is_nan()
    ));
    assert!(matches!(
        input_error(&format!("{base}diffusion NaN\n")),
        InputError::NegativeDiffusion(d) if d.is_nan()
    ));
    assert!(matches!(
        input_error(&format!("{base}chemReaction NaN\n")),
        InputError::NegativeReactionRate(k) if k.is_nan()
    ));
}

#[test]
fn input_from_file() {
    let path = test_output_dir("config").join("chemistry.input");
    std::fs::write(&path, CHEMISTRY_INPUT).unwrap();
    assert_eq!(
        AdrInput::from_file(&path).unwrap(),
        AdrInput::parse(CHEMISTRY_INPUT.as_bytes()).unwrap()
    );
    assert!(AdrInput::from_file(path.with_extension("missing")).is_err());
}
