use std::collections::BTreeMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed set of canonical outbreak categories.
///
/// Declaration order is the canonical display order: glyph slices, legends
/// and `BTreeMap<Category, _>` iteration all follow it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Foodborne")]
    Foodborne,
    #[serde(rename = "Waterborne")]
    Waterborne,
    #[serde(rename = "Vector-Borne")]
    VectorBorne,
    #[serde(rename = "Airborne")]
    Airborne,
    #[serde(rename = "Contact Transmission")]
    ContactTransmission,
    #[serde(rename = "Healthcare-Associated Infections")]
    HealthcareAssociated,
    #[serde(rename = "Zoonotic")]
    Zoonotic,
    #[serde(rename = "Sexually Transmitted")]
    SexuallyTransmitted,
    #[serde(rename = "Vaccine-Preventable Diseases")]
    VaccinePreventable,
    #[serde(rename = "Emerging Infectious Diseases")]
    Emerging,
    #[serde(rename = "Veterinary Outbreaks")]
    VeterinaryOutbreaks,
    #[serde(rename = "Neurological Outbreaks")]
    Neurological,
    #[serde(rename = "Respiratory Outbreaks")]
    Respiratory,
    #[serde(rename = "Other")]
    Other,
}

impl Category {
    pub const ALL: [Category; 14] = [
        Category::Foodborne,
        Category::Waterborne,
        Category::VectorBorne,
        Category::Airborne,
        Category::ContactTransmission,
        Category::HealthcareAssociated,
        Category::Zoonotic,
        Category::SexuallyTransmitted,
        Category::VaccinePreventable,
        Category::Emerging,
        Category::VeterinaryOutbreaks,
        Category::Neurological,
        Category::Respiratory,
        Category::Other,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Category::Foodborne => "Foodborne",
            Category::Waterborne => "Waterborne",
            Category::VectorBorne => "Vector-Borne",
            Category::Airborne => "Airborne",
            Category::ContactTransmission => "Contact Transmission",
            Category::HealthcareAssociated => "Healthcare-Associated Infections",
            Category::Zoonotic => "Zoonotic",
            Category::SexuallyTransmitted => "Sexually Transmitted",
            Category::VaccinePreventable => "Vaccine-Preventable Diseases",
            Category::Emerging => "Emerging Infectious Diseases",
            Category::VeterinaryOutbreaks => "Veterinary Outbreaks",
            Category::Neurological => "Neurological Outbreaks",
            Category::Respiratory => "Respiratory Outbreaks",
            Category::Other => "Other",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("not a canonical category name: {0:?}")]
pub struct UnknownCategory(pub String);

impl std::str::FromStr for Category {
    type Err = UnknownCategory;

    /// Strict parse of canonical names only; use [`Taxonomy::resolve`] for
    /// free text.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// 8-bit sRGB color, serialized as `#rrggbb`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid color {0:?}; expected #rrggbb")]
pub struct InvalidColor(pub String);

impl TryFrom<String> for Color {
    type Error = InvalidColor;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let hex = value.strip_prefix('#').unwrap_or(&value);
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(InvalidColor(value));
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16);
        match (channel(0), channel(2), channel(4)) {
            (Ok(r), Ok(g), Ok(b)) => Ok(Color::rgb(r, g, b)),
            _ => Err(InvalidColor(value)),
        }
    }
}

impl From<Color> for String {
    fn from(c: Color) -> Self {
        c.to_hex()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryEntry {
    pub category: Category,
    pub color: Color,
    pub aliases: Vec<String>,
}

/// Which resolution step produced a category.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum MatchKind {
    Exact,
    CaseInsensitive,
    Alias,
    Contains,
    Fallback,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub category: Category,
    pub color: Color,
    pub matched_by: MatchKind,
}

/// Adjustments layered over the built-in taxonomy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxonomyConfig {
    /// Extra `alias -> canonical` pairs, matched case-insensitively.
    pub extra_aliases: BTreeMap<String, Category>,
    pub colors: BTreeMap<Category, Color>,
}

const BUILTIN: [(Category, Color, &[&str]); 14] = [
    (
        Category::Foodborne,
        Color::rgb(0xf5, 0x9e, 0x0b),
        &["Food-borne", "Food borne", "Foodborne Illness", "Food Poisoning"],
    ),
    (
        Category::Waterborne,
        Color::rgb(0x0e, 0xa5, 0xe9),
        &["Water-borne", "Water borne", "Waterborne Illness"],
    ),
    (
        Category::VectorBorne,
        Color::rgb(0x84, 0xcc, 0x16),
        &["Vectorborne", "Vector borne", "Mosquito-borne", "Tick-borne"],
    ),
    (
        Category::Airborne,
        Color::rgb(0x63, 0x66, 0xf1),
        &["Air-borne", "Air borne"],
    ),
    (
        Category::ContactTransmission,
        Color::rgb(0xec, 0x48, 0x99),
        &["Contact", "Direct Contact", "Contact-Transmitted"],
    ),
    (
        Category::HealthcareAssociated,
        Color::rgb(0x14, 0xb8, 0xa6),
        &["HAI", "Healthcare-Associated", "Hospital-Acquired", "Nosocomial"],
    ),
    (
        Category::Zoonotic,
        Color::rgb(0xa1, 0x62, 0x07),
        &["Zoonosis", "Zoonoses", "Zoonotic Disease"],
    ),
    (
        Category::SexuallyTransmitted,
        Color::rgb(0xd9, 0x46, 0xef),
        &["STI", "STD", "Sexually Transmitted Infections", "Sexually Transmitted Diseases"],
    ),
    (
        Category::VaccinePreventable,
        Color::rgb(0x22, 0xc5, 0x5e),
        &["VPD", "Vaccine Preventable", "Vaccine-Preventable"],
    ),
    (
        Category::Emerging,
        Color::rgb(0xef, 0x44, 0x44),
        &["Emerging", "Emerging Infections", "Novel Pathogen"],
    ),
    (
        Category::VeterinaryOutbreaks,
        Color::rgb(0x78, 0x71, 0x6c),
        &["Veterinary Outbreak", "Veterinary", "Animal Outbreak", "Animal Disease"],
    ),
    (
        Category::Neurological,
        Color::rgb(0x8b, 0x5c, 0xf6),
        &["Neurological", "Neurological Outbreak"],
    ),
    (
        Category::Respiratory,
        Color::rgb(0x3b, 0x82, 0xf6),
        &["Respiratory", "Respiratory Outbreak", "Respiratory Illness"],
    ),
    (Category::Other, Color::rgb(0x9c, 0xa3, 0xaf), &["Unknown", "Uncategorized", "Misc"]),
];

/// Maps free-text category strings onto the canonical [`Category`] set.
///
/// Resolution is total and deterministic; see [`Taxonomy::resolve`].
#[derive(Debug, Clone)]
pub struct Taxonomy {
    entries: Vec<CategoryEntry>,
    // Lowercased alias -> category.
    aliases: BTreeMap<String, Category>,
}

impl Taxonomy {
    pub fn builtin() -> Self {
        let entries: Vec<CategoryEntry> = BUILTIN
            .iter()
            .map(|(category, color, aliases)| CategoryEntry {
                category: *category,
                color: *color,
                aliases: aliases.iter().map(|a| a.to_string()).collect(),
            })
            .collect();
        Self::from_entries(entries)
    }

    /// Process-wide built-in taxonomy, built on first use.
    pub fn global() -> &'static Taxonomy {
        static GLOBAL: OnceLock<Taxonomy> = OnceLock::new();
        GLOBAL.get_or_init(Taxonomy::builtin)
    }

    pub fn with_config(config: &TaxonomyConfig) -> Self {
        let mut entries = Self::builtin().entries;
        for (alias, category) in &config.extra_aliases {
            entries[category.index()].aliases.push(alias.clone());
        }
        for (category, color) in &config.colors {
            entries[category.index()].color = *color;
        }
        Self::from_entries(entries)
    }

    fn from_entries(entries: Vec<CategoryEntry>) -> Self {
        let mut aliases = BTreeMap::new();
        for entry in &entries {
            for alias in &entry.aliases {
                // First declaration wins on conflicting aliases.
                aliases
                    .entry(alias.trim().to_lowercase())
                    .or_insert(entry.category);
            }
        }
        Self { entries, aliases }
    }

    pub fn entries(&self) -> &[CategoryEntry] {
        &self.entries
    }

    pub fn entry(&self, category: Category) -> &CategoryEntry {
        &self.entries[category.index()]
    }

    pub fn color(&self, category: Category) -> Color {
        self.entry(category).color
    }

    /// Resolves the primary (first comma-separated) segment of `raw`.
    ///
    /// Steps, first hit wins: exact canonical name, case-insensitive name,
    /// alias, canonical name contained in the text, then `Other`.
    pub fn resolve(&self, raw: &str) -> Resolution {
        let primary = primary_segment(raw);
        let (category, matched_by) = match self.resolve_segment(primary) {
            Some(hit) => hit,
            None => {
                tracing::debug!(raw, "unresolved category, falling back to Other");
                (Category::Other, MatchKind::Fallback)
            }
        };
        Resolution {
            category,
            color: self.color(category),
            matched_by,
        }
    }

    /// Every canonical category implied by a possibly composite string.
    ///
    /// Segments resolve independently; the primary comes first and duplicates
    /// are dropped. Never empty.
    pub fn resolve_all(&self, raw: &str) -> Vec<Category> {
        self.resolve_composite(raw).1
    }

    /// [`Taxonomy::resolve`] and [`Taxonomy::resolve_all`] in one pass.
    pub fn resolve_composite(&self, raw: &str) -> (Resolution, Vec<Category>) {
        let primary = self.resolve(raw);
        let mut out = vec![primary.category];
        for segment in raw.split(',').skip(1) {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            let category = self
                .resolve_segment(segment)
                .map(|(c, _)| c)
                .unwrap_or(Category::Other);
            if !out.contains(&category) {
                out.push(category);
            }
        }
        (primary, out)
    }

    fn resolve_segment(&self, segment: &str) -> Option<(Category, MatchKind)> {
        let segment = segment.trim();
        if segment.is_empty() {
            return None;
        }

        if let Ok(category) = segment.parse::<Category>() {
            return Some((category, MatchKind::Exact));
        }

        let lower = segment.to_lowercase();
        if let Some(category) = Category::ALL
            .into_iter()
            .find(|c| c.name().to_lowercase() == lower)
        {
            return Some((category, MatchKind::CaseInsensitive));
        }

        if let Some(category) = self.aliases.get(&lower) {
            return Some((*category, MatchKind::Alias));
        }

        Category::ALL
            .into_iter()
            .filter(|c| *c != Category::Other)
            .find(|c| lower.contains(&c.name().to_lowercase()))
            .map(|c| (c, MatchKind::Contains))
    }
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self::builtin()
    }
}

fn primary_segment(raw: &str) -> &str {
    raw.trim().split(',').next().unwrap_or("").trim()
}
