pub mod architectural_bottleneck;
pub mod async_antipattern;
pub mod circular_dependency;
pub mod core_utility;
pub mod data_clumps;
pub mod dead_code;
pub mod degree_centrality;
pub mod external_lint;
pub mod feature_envy;
pub mod generator_misuse;
pub mod god_class;
pub mod influential_code;
pub mod inappropriate_intimacy;
pub mod lazy_class;
pub mod long_parameter_list;
pub mod message_chain;
pub mod middle_man;
pub mod module_cohesion;
pub mod refused_bequest;
pub mod shotgun_surgery;
pub mod test_smell;
pub mod type_hint_coverage;
pub mod util;

pub use architectural_bottleneck::ArchitecturalBottleneckDetector;
pub use async_antipattern::AsyncAntipatternDetector;
pub use circular_dependency::{normalize_cycle, CircularDependencyDetector};
pub use core_utility::CoreUtilityDetector;
pub use data_clumps::DataClumpsDetector;
pub use dead_code::DeadCodeDetector;
pub use degree_centrality::DegreeCentralityDetector;
pub use external_lint::{ExternalLinterDetector, LintDiagnostic};
pub use feature_envy::FeatureEnvyDetector;
pub use generator_misuse::GeneratorMisuseDetector;
pub use god_class::GodClassDetector;
pub use inappropriate_intimacy::InappropriateIntimacyDetector;
pub use influential_code::InfluentialCodeDetector;
pub use lazy_class::LazyClassDetector;
pub use long_parameter_list::LongParameterListDetector;
pub use message_chain::MessageChainDetector;
pub use middle_man::MiddleManDetector;
pub use module_cohesion::ModuleCohesionDetector;
pub use refused_bequest::RefusedBequestDetector;
pub use shotgun_surgery::ShotgunSurgeryDetector;
pub use test_smell::TestSmellDetector;
pub use type_hint_coverage::TypeHintCoverageDetector;

use crate::detector::Detector;

/// The default detector roster in its fixed execution order. Structural
/// detectors run first so the collaboration channel carries their findings
/// into the later, noisier ones.
pub fn default_detectors() -> Vec<Box<dyn Detector>> {
    vec![
        Box::new(CircularDependencyDetector),
        Box::new(DeadCodeDetector),
        Box::new(GodClassDetector),
        Box::new(ArchitecturalBottleneckDetector),
        Box::new(FeatureEnvyDetector),
        Box::new(ShotgunSurgeryDetector),
        Box::new(MiddleManDetector),
        Box::new(InappropriateIntimacyDetector),
        Box::new(MessageChainDetector),
        Box::new(LongParameterListDetector),
        Box::new(DataClumpsDetector),
        Box::new(LazyClassDetector),
        Box::new(RefusedBequestDetector),
        Box::new(InfluentialCodeDetector),
        Box::new(CoreUtilityDetector),
        Box::new(DegreeCentralityDetector),
        Box::new(ModuleCohesionDetector),
        Box::new(AsyncAntipatternDetector),
        Box::new(GeneratorMisuseDetector),
        Box::new(TestSmellDetector),
        Box::new(TypeHintCoverageDetector),
    ]
}
