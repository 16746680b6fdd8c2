use serde::{Deserialize, Serialize};

/// Category tag carried by every taxonomy entry.
///
/// This tag, not substring matching on the class name, decides whether a
/// prediction counts as healthy or off-domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiseaseCategory {
    Healthy,
    Disease,
    NotApplicable,
}

impl DiseaseCategory {
    /// Wire-format label used in `/predict` and `/diseases` responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            DiseaseCategory::Healthy => "healthy",
            DiseaseCategory::Disease => "disease",
            DiseaseCategory::NotApplicable => "not_applicable",
        }
    }
}

/// One output class of the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassEntry {
    pub name: String,
    pub category: DiseaseCategory,
    pub treatment: String,
}

/// The fixed, ordered list of classes the model can output.
///
/// Index `i` of the probability vector maps to `entries()[i]`; the order
/// is a deployment-time artifact and must match the trained model. A
/// mismatch does not crash anything, it silently returns wrong labels,
/// which is why the order lives in the deployment config file rather than
/// in code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiseaseTaxonomy {
    classes: Vec<ClassEntry>,
}

impl DiseaseTaxonomy {
    pub fn new(classes: Vec<ClassEntry>) -> Self {
        Self { classes }
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn entries(&self) -> &[ClassEntry] {
        &self.classes
    }

    pub fn get(&self, index: usize) -> Option<&ClassEntry> {
        self.classes.get(index)
    }

    pub fn find_by_name(&self, name: &str) -> Option<(usize, &ClassEntry)> {
        self.classes
            .iter()
            .enumerate()
            .find(|(_, entry)| entry.name == name)
    }

    pub fn class_names(&self) -> Vec<String> {
        self.classes.iter().map(|entry| entry.name.clone()).collect()
    }
}

impl Default for DiseaseTaxonomy {
    /// The nine-class rice-leaf taxonomy the shipped model was trained on.
    fn default() -> Self {
        let entry = |name: &str, category: DiseaseCategory, treatment: &str| ClassEntry {
            name: name.to_string(),
            category,
            treatment: treatment.to_string(),
        };
        Self::new(vec![
            entry(
                "Bacterial Leaf Blight",
                DiseaseCategory::Disease,
                "Apply copper-based bactericides (Copper oxychloride 50% WP @ 3g/L). Improve field \
                 drainage and avoid overhead irrigation. Use resistant varieties like IR64.",
            ),
            entry(
                "Brown Spot",
                DiseaseCategory::Disease,
                "Apply fungicides like Mancozeb 75% WP @ 2g/L or Carbendazim 50% WP @ 1g/L. \
                 Improve soil fertility with balanced NPK fertilizer.",
            ),
            entry(
                "Healthy Rice Leaf",
                DiseaseCategory::Healthy,
                "Continue current management practices. Regular monitoring for early disease \
                 detection. Maintain proper nutrition and water management.",
            ),
            entry(
                "Leaf Blast",
                DiseaseCategory::Disease,
                "Apply systemic fungicides like Tricyclazole 75% WP @ 0.6g/L. Use blast-resistant \
                 varieties. Avoid excessive nitrogen fertilization.",
            ),
            entry(
                "Leaf Scald",
                DiseaseCategory::Disease,
                "Apply fungicides at early infection stage. Remove infected plant debris. Improve \
                 air circulation in the field.",
            ),
            entry(
                "Leaf Smut",
                DiseaseCategory::Disease,
                "Apply fungicides like Tebuconazole 25% EC @ 1ml/L. Remove affected tillers. Use \
                 disease-free seeds and resistant varieties.",
            ),
            entry(
                "Not a Rice Leaf",
                DiseaseCategory::NotApplicable,
                "This appears to be not a rice leaf. Please take a photo of a rice leaf for \
                 accurate disease detection.",
            ),
            entry(
                "Rice Hispa",
                DiseaseCategory::Disease,
                "Apply insecticides like Chlorpyrifos 20% EC @ 2ml/L. Use pheromone traps. Remove \
                 grassy weeds around field boundaries.",
            ),
            entry(
                "Sheath Blight",
                DiseaseCategory::Disease,
                "Apply fungicides like Validamycin 3% L @ 2.5ml/L. Improve field drainage. Reduce \
                 plant density and apply silicon fertilizers.",
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_taxonomy_has_nine_ordered_classes() {
        let taxonomy = DiseaseTaxonomy::default();
        assert_eq!(taxonomy.len(), 9);
        assert_eq!(taxonomy.get(0).unwrap().name, "Bacterial Leaf Blight");
        assert_eq!(taxonomy.get(8).unwrap().name, "Sheath Blight");
    }

    #[test]
    fn every_entry_carries_a_treatment() {
        for entry in DiseaseTaxonomy::default().entries() {
            assert!(!entry.treatment.is_empty(), "{} has no treatment", entry.name);
        }
    }

    #[test]
    fn category_tag_is_the_source_of_truth() {
        let taxonomy = DiseaseTaxonomy::default();
        let (_, healthy) = taxonomy.find_by_name("Healthy Rice Leaf").unwrap();
        assert_eq!(healthy.category, DiseaseCategory::Healthy);
        let (_, off_domain) = taxonomy.find_by_name("Not a Rice Leaf").unwrap();
        assert_eq!(off_domain.category, DiseaseCategory::NotApplicable);
        let (_, blast) = taxonomy.find_by_name("Leaf Blast").unwrap();
        assert_eq!(blast.category, DiseaseCategory::Disease);
    }
}
