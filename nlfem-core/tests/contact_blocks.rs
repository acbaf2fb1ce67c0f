use approx::assert_relative_eq;
use nlfem_core::contact::AugmentationStatus;
use nlfem_core::material::NeoHookean;
use nlfem_core::{
    Analysis, AnalysisConfig, ContactConfig, ElasticSolidDomain, ElementType, Mesh, Model, Point3, Result,
    SlidingInterface, StepReport, Surface,
};

const PUSH: f64 = 0.1;

fn add_brick(mesh: &mut Mesh, origin: Point3) -> Result<usize> {
    let first = mesh.n_nodes();
    for (x, y, z) in [
        (0.0, 0.0, 0.0),
        (1.0, 0.0, 0.0),
        (1.0, 1.0, 0.0),
        (0.0, 1.0, 0.0),
        (0.0, 0.0, 1.0),
        (1.0, 0.0, 1.0),
        (1.0, 1.0, 1.0),
        (0.0, 1.0, 1.0),
    ] {
        mesh.add_node(origin + Point3::new(x, y, z));
    }
    mesh.add_element(ElementType::Hex8, (first..first + 8).collect())
}

/// Two unit blocks touching at x = 1. The left block is clamped at x = 0,
/// the far face of the right block is pushed towards it.
fn blocks(config: ContactConfig) -> Result<Model> {
    let mut mesh = Mesh::new();
    let left = add_brick(&mut mesh, Point3::zeros())?;
    let right = add_brick(&mut mesh, Point3::new(1.0, 0.0, 0.0))?;
    let mut model = Model::new(mesh);
    for (name, e) in [("left", left), ("right", right)] {
        let domain = ElasticSolidDomain::new(name, model.mesh(), ElementType::Hex8, vec![e])?
            .with_material(Box::new(NeoHookean::new(10.0, 0.3)?));
        model.add_domain(domain)?;
    }
    let master = Surface::from_quads("left+x", &[[1, 2, 6, 5]])?;
    let slave = Surface::from_quads("right-x", &[[8, 12, 15, 11]])?;
    model.add_contact(Box::new(SlidingInterface::new("joint", slave, master, config)?));

    for node in [0, 3, 4, 7] {
        model.fix(node, &[0, 1, 2])?;
    }
    for node in [9, 10, 13, 14] {
        model.prescribe(node, 0, -PUSH)?;
        model.fix(node, &[1, 2])?;
    }
    Ok(model)
}

fn run(model: &mut Model) -> Result<Vec<StepReport>> {
    let mut analysis = Analysis::new(AnalysisConfig {
        time_steps: 4,
        step_size: 0.25,
        ..AnalysisConfig::precise()
    })?;
    analysis.run(model)
}

#[test]
fn test_contact_transmits_the_push() -> Result<()> {
    let config = ContactConfig {
        augmentation_tolerance: 1e-3,
        max_augmentations: 50,
        ..ContactConfig::with_penalty(50.0)
    };
    let mut model = blocks(config)?;
    let reports = run(&mut model)?;
    let last = reports.last().map(|r| r.augmentations[0]).unwrap();
    assert_eq!(last.status, AugmentationStatus::Converged);

    let reactions = model.reactions()?;
    let clamped: f64 = [0, 3, 4, 7].iter().map(|&n| reactions[n].x).sum();
    let pushed: f64 = [9, 10, 13, 14].iter().map(|&n| reactions[n].x).sum();
    assert!(pushed.abs() > 0.1);
    assert_relative_eq!(clamped, -pushed, epsilon = 1e-6);

    // the interface force is what holds the blocks apart
    let force = model.contacts()[0].contact_force();
    assert_relative_eq!(force.x.abs(), pushed.abs(), max_relative = 1e-6);

    // the blocks share the push; the interface barely overlaps
    let interface_x = model.mesh().nodes()[1].x + model.displacement()[1].x;
    assert!(interface_x < 1.0 && interface_x > 1.0 - PUSH);
    assert!(last.max_gap < 1e-3);
    Ok(())
}

#[test]
fn test_augmentation_reduces_penetration() -> Result<()> {
    let mut penalty = blocks(ContactConfig::penalty_only(20.0))?;
    let penalty_gap = run(&mut penalty)?.last().map(|r| r.augmentations[0].max_gap).unwrap();

    let mut augmented = blocks(ContactConfig {
        augmentation_tolerance: 1e-3,
        max_augmentations: 50,
        ..ContactConfig::with_penalty(20.0)
    })?;
    let reports = run(&mut augmented)?;
    let last = reports.last().unwrap();
    assert!(last.augmentation_passes > 1);
    assert!(last.augmentations[0].max_gap < 0.2 * penalty_gap);
    Ok(())
}

#[test]
fn test_violation_never_grows_across_passes() -> Result<()> {
    let mut model = blocks(ContactConfig {
        augmentation_tolerance: 1e-4,
        max_augmentations: 50,
        ..ContactConfig::with_penalty(20.0)
    })?;
    for report in run(&mut model)? {
        assert_eq!(report.violations.len(), report.augmentation_passes);
        assert!(report.violations.len() > 2, "{report:?}");
        for pair in report.violations.windows(2) {
            assert!(pair[1] <= pair[0], "{:?}", report.violations);
        }
        let first = report.violations[0];
        let last = report.violations[report.violations.len() - 1];
        assert!(last < 0.1 * first, "{:?}", report.violations);
    }
    Ok(())
}

#[test]
fn test_exhausted_augmentation_fails_the_analysis() -> Result<()> {
    let mut model = blocks(ContactConfig {
        augmentation_tolerance: 1e-12,
        max_augmentations: 2,
        ..ContactConfig::with_penalty(20.0)
    })?;
    let mut analysis = Analysis::new(AnalysisConfig {
        time_steps: 1,
        step_size: 1.0,
        max_retries: 1,
        ..AnalysisConfig::precise()
    })?;
    assert!(matches!(
        analysis.run(&mut model),
        Err(nlfem_core::Error::Convergence { .. })
    ));
    Ok(())
}
