//! Tag catalog and search query building.
//!
//! Search criteria are a predefined catalog of tag chips plus a free-text
//! custom-tags string. One tick queries exactly one randomly chosen
//! criterion: a multi-tag AND query tends to return nothing, so variety
//! comes from repeated ticks instead of query breadth.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// One selectable chip from the predefined catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagChip {
    pub name: String,
    pub category: String,
    pub selected: bool,
}

impl TagChip {
    fn new(name: &str, category: &str) -> Self {
        Self {
            name: name.to_string(),
            category: category.to_string(),
            selected: false,
        }
    }
}

/// Persisted shape of a tag set: selected chip names plus the custom string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagSelection {
    #[serde(default)]
    pub selected: Vec<String>,
    #[serde(default)]
    pub custom: String,
}

/// An ordered set of tag chips with per-chip selection state and free-text
/// custom tags (comma-separated). Chip names are unique within a set.
#[derive(Debug, Clone, Default)]
pub struct TagSet {
    chips: Vec<TagChip>,
    custom_tags: String,
}

impl TagSet {
    /// Builds a set over the default catalog with the given selection
    /// applied. Selected names unknown to the catalog are dropped.
    pub fn from_selection(selection: &TagSelection) -> Self {
        let mut chips = default_catalog();
        for chip in &mut chips {
            if selection.selected.iter().any(|n| n == &chip.name) {
                chip.selected = true;
            }
        }
        Self {
            chips,
            custom_tags: selection.custom.clone(),
        }
    }

    /// A set with no chips and no custom tags.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn chips(&self) -> &[TagChip] {
        &self.chips
    }

    pub fn custom_tags(&self) -> &str {
        &self.custom_tags
    }

    /// Flips one chip by name. Returns false if the name is unknown.
    pub fn set_selected(&mut self, name: &str, selected: bool) -> bool {
        match self.chips.iter_mut().find(|c| c.name == name) {
            Some(chip) => {
                chip.selected = selected;
                true
            }
            None => false,
        }
    }

    pub fn set_custom_tags(&mut self, custom: impl Into<String>) {
        self.custom_tags = custom.into();
    }

    /// The persisted form of the current selection.
    pub fn selection(&self) -> TagSelection {
        TagSelection {
            selected: self
                .chips
                .iter()
                .filter(|c| c.selected)
                .map(|c| c.name.clone())
                .collect(),
            custom: self.custom_tags.clone(),
        }
    }

    /// Selected chip names plus non-empty trimmed custom entries, in order.
    pub fn candidates(&self) -> Vec<&str> {
        let mut all: Vec<&str> = self
            .chips
            .iter()
            .filter(|c| c.selected)
            .map(|c| c.name.as_str())
            .collect();
        all.extend(
            self.custom_tags
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty()),
        );
        all
    }

    pub fn has_criteria(&self) -> bool {
        !self.candidates().is_empty()
    }
}

/// Picks one candidate uniformly at random and percent-encodes it.
/// An empty candidate list yields an empty string, meaning "no criteria".
pub fn build_query(tags: &TagSet, rng: &mut impl Rng) -> String {
    let candidates = tags.candidates();
    if candidates.is_empty() {
        return String::new();
    }
    let chosen = candidates[rng.gen_range(0..candidates.len())];
    urlencoding::encode(chosen).into_owned()
}

/// The predefined wallhaven tag catalog, every chip unselected.
pub fn default_catalog() -> Vec<TagChip> {
    vec![
        // Anime & Manga
        TagChip::new("Characters", "Anime & Manga"),
        TagChip::new("Other", "Anime & Manga"),
        TagChip::new("Series", "Anime & Manga"),
        TagChip::new("Visual Novels", "Anime & Manga"),
        // Art & Design
        TagChip::new("Architecture", "Art & Design"),
        TagChip::new("Digital", "Art & Design"),
        TagChip::new("Photography", "Art & Design"),
        TagChip::new("Traditional", "Art & Design"),
        // Entertainment
        TagChip::new("Comic Books & Graphic Novels", "Entertainment"),
        TagChip::new("Events", "Entertainment"),
        TagChip::new("Games", "Entertainment"),
        TagChip::new("Literature", "Entertainment"),
        TagChip::new("Movies", "Entertainment"),
        TagChip::new("Music", "Entertainment"),
        TagChip::new("Sports", "Entertainment"),
        TagChip::new("Television", "Entertainment"),
        // Knowledge
        TagChip::new("History", "Knowledge"),
        TagChip::new("Holidays", "Knowledge"),
        TagChip::new("Military & Weapons", "Knowledge"),
        TagChip::new("Quotes", "Knowledge"),
        TagChip::new("Religion", "Knowledge"),
        TagChip::new("Science", "Knowledge"),
        // Location
        TagChip::new("Cities", "Location"),
        TagChip::new("Countries", "Location"),
        TagChip::new("Space", "Location"),
        // Miscellaneous
        TagChip::new("Clothing", "Miscellaneous"),
        TagChip::new("Colors", "Miscellaneous"),
        TagChip::new("Companies & Logos", "Miscellaneous"),
        TagChip::new("Food", "Miscellaneous"),
        TagChip::new("Technology", "Miscellaneous"),
        // Nature
        TagChip::new("Animals", "Nature"),
        TagChip::new("Landscapes", "Nature"),
        TagChip::new("Plants", "Nature"),
        // People
        TagChip::new("Artists", "People"),
        TagChip::new("Celebrities", "People"),
        TagChip::new("Fictional Characters", "People"),
        TagChip::new("Models", "People"),
        TagChip::new("Musicians", "People"),
        TagChip::new("Other Figures", "People"),
        TagChip::new("Photographers", "People"),
        // Vehicles
        TagChip::new("Aircraft", "Vehicles"),
        TagChip::new("Cars & Motorcycles", "Vehicles"),
        TagChip::new("Ships", "Vehicles"),
        TagChip::new("Spacecrafts", "Vehicles"),
        TagChip::new("Trains", "Vehicles"),
    ]
}
