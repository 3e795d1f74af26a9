use repograph_core::{Grade, MetricsBreakdown};

/// Category weights. They must sum to exactly 1.0.
pub const STRUCTURE_WEIGHT: f64 = 0.40;
pub const QUALITY_WEIGHT: f64 = 0.30;
pub const ARCHITECTURE_WEIGHT: f64 = 0.30;

/// Graph structure: modularity, coupling, cycles, bottlenecks.
pub fn score_structure(m: &MetricsBreakdown) -> f64 {
    let modularity_score = m.modularity * 100.0;
    let coupling_score = (100.0 - m.avg_coupling * 10.0).max(0.0);
    let cycle_score = 100.0 - (m.circular_dependencies as f64 * 10.0).min(50.0);
    let bottleneck_score = 100.0 - (m.bottleneck_count as f64 * 5.0).min(30.0);
    (modularity_score + coupling_score + cycle_score + bottleneck_score) / 4.0
}

/// Code quality: dead code, duplication, god classes.
pub fn score_quality(m: &MetricsBreakdown) -> f64 {
    let dead_code_score = 100.0 - m.dead_code_percentage * 100.0;
    let duplication_score = 100.0 - m.duplication_percentage * 100.0;
    let god_class_score = 100.0 - (m.god_class_count as f64 * 15.0).min(40.0);
    (dead_code_score + duplication_score + god_class_score) / 3.0
}

/// Architecture: layering, boundaries, abstraction balance.
pub fn score_architecture(m: &MetricsBreakdown) -> f64 {
    let layer_score = 100.0 - (m.layer_violations as f64 * 5.0).min(50.0);
    let boundary_score = 100.0 - (m.boundary_violations as f64 * 3.0).min(40.0);
    let abstraction_score = abstraction_band(m.abstraction_ratio);
    (layer_score + boundary_score + abstraction_score) / 3.0
}

/// Abstraction ratios in [0.3, 0.7] are ideal; the score decays linearly
/// outside the band and bottoms out at 50.
fn abstraction_band(ratio: f64) -> f64 {
    if (0.3..=0.7).contains(&ratio) {
        100.0
    } else {
        let distance = (ratio - 0.3).abs().min((ratio - 0.7).abs());
        (100.0 - distance * 100.0).max(50.0)
    }
}

/// Weighted overall score.
pub fn overall_score(structure: f64, quality: f64, architecture: f64) -> f64 {
    structure * STRUCTURE_WEIGHT + quality * QUALITY_WEIGHT + architecture * ARCHITECTURE_WEIGHT
}

/// Letter grade. Half-open intervals for B/C/D/F, inclusive on both ends
/// for A, so exactly one grade covers every score in [0, 100].
pub fn score_to_grade(score: f64) -> Grade {
    if (90.0..=100.0).contains(&score) {
        Grade::A
    } else if (80.0..90.0).contains(&score) {
        Grade::B
    } else if (70.0..80.0).contains(&score) {
        Grade::C
    } else if (60.0..70.0).contains(&score) {
        Grade::D
    } else {
        Grade::F
    }
}
