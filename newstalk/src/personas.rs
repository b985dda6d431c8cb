// Fixed catalogue of simulated speakers

use rand::seq::SliceRandom;
use rand::Rng;

use crate::models::Side;

/// Family of canned responses a persona draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntentClass {
    Financial,
    Scientific,
    Technology,
    SkepticalReporter,
    DataDriven,
}

impl IntentClass {
    pub fn sentences(&self) -> &'static [&'static str] {
        match self {
            IntentClass::Financial => &[
                "The market reaction here tells you most of what you need to know.",
                "Follow the money and the incentives start to make sense.",
                "Investors are going to price this in faster than people expect.",
                "The real question is what this does to margins over the next few quarters.",
            ],
            IntentClass::Scientific => &[
                "The evidence so far is promising, but it still needs independent replication.",
                "Peer-reviewed data points in a fairly consistent direction on this.",
                "We should separate what has been measured from what is being extrapolated.",
                "The underlying mechanism matters more than the headline number.",
            ],
            IntentClass::Technology => &[
                "This is the kind of shift that looks small until it suddenly is not.",
                "The technology is ahead of the policy conversation, as usual.",
                "Adoption will depend on whether the tooling gets easier for regular people.",
                "I would watch who controls the platform rather than the feature itself.",
            ],
            IntentClass::SkepticalReporter => &[
                "I would want a second source before treating that as settled.",
                "We have confirmed parts of this, but several claims are still unverified.",
                "Who benefits from this story being framed the way it is?",
                "The official statement leaves out a few details worth asking about.",
            ],
            IntentClass::DataDriven => &[
                "The trend line is clearer than any single data point.",
                "Once you adjust for the baseline the effect looks a lot more modest.",
                "The numbers suggest a real change, with a fair amount of uncertainty.",
                "Sample size is doing a lot of work in the more dramatic takes.",
            ],
        }
    }
}

/// A simulated speaker. Never mutated at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    pub name: &'static str,
    pub outlet: &'static str,
    pub side_affinity: Side,
    pub intent: IntentClass,
}

impl Persona {
    /// Label shown above the bubble, e.g. "Kai (AP)".
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.outlet)
    }
}

// Affinities alternate so that round-robin position i lands on a persona whose
// side matches the positional side of turn i.
const CATALOG: &[Persona] = &[
    Persona { name: "Dr. Sarah Chen", outlet: "Nature", side_affinity: Side::Left, intent: IntentClass::Scientific },
    Persona { name: "Mike Rodriguez", outlet: "WSJ", side_affinity: Side::Right, intent: IntentClass::Financial },
    Persona { name: "Dr. Elena Patel", outlet: "Scientific American", side_affinity: Side::Left, intent: IntentClass::Scientific },
    Persona { name: "Leo", outlet: "MIT Tech Review", side_affinity: Side::Right, intent: IntentClass::Technology },
    Persona { name: "Kai", outlet: "AP", side_affinity: Side::Left, intent: IntentClass::SkepticalReporter },
    Persona { name: "Rin", outlet: "Financial Times", side_affinity: Side::Right, intent: IntentClass::Financial },
    Persona { name: "Jules", outlet: "FiveThirtyEight", side_affinity: Side::Left, intent: IntentClass::DataDriven },
    Persona { name: "Zoe", outlet: "Nature", side_affinity: Side::Right, intent: IntentClass::Scientific },
];

#[derive(Debug, Clone, Copy)]
pub struct PersonaRegistry {
    personas: &'static [Persona],
}

impl Default for PersonaRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl PersonaRegistry {
    pub fn standard() -> Self {
        Self { personas: CATALOG }
    }

    pub fn personas(&self) -> &'static [Persona] {
        self.personas
    }

    /// Deterministic assignment used for the opening turns.
    pub fn round_robin(&self, index: usize) -> &'static Persona {
        &self.personas[index % self.personas.len()]
    }

    /// Draw `n` distinct personas, skipping those in `exclude`.
    ///
    /// If the exclusions leave fewer than `n` candidates the excluded
    /// personas are used to fill up, so variety is favoured but a call never
    /// comes back short (unless `n` exceeds the catalogue).
    pub fn pick<R: Rng + ?Sized>(
        &self,
        n: usize,
        exclude: &[&Persona],
        rng: &mut R,
    ) -> Vec<&'static Persona> {
        let (fresh, used): (Vec<&'static Persona>, Vec<&'static Persona>) = self
            .personas
            .iter()
            .partition(|p| !exclude.iter().any(|e| e.name == p.name && e.outlet == p.outlet));

        let mut chosen: Vec<&'static Persona> =
            fresh.choose_multiple(rng, n).copied().collect();
        if chosen.len() < n {
            let missing = n - chosen.len();
            chosen.extend(used.choose_multiple(rng, missing).copied());
        }
        chosen
    }

    /// Resolve a speaker label ("Kai (AP)" or just "Kai") back to its persona.
    pub fn find_by_label(&self, label: &str) -> Option<&'static Persona> {
        let label = label.trim();
        self.personas
            .iter()
            .find(|p| p.label() == label || p.name == label)
    }
}
