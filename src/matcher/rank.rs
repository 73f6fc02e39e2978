//! Taxonomic ranks, ordered from broadest to narrowest.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::network::analysis::fold;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    Kingdom,
    Phylum,
    Class,
    Order,
    Family,
    Tribe,
    Genus,
    Species,
    Subspecies,
    Variety,
    Form,
}

impl Rank {
    /// Parse a rank name or common abbreviation (`subsp.`, `var.`, `f.`).
    pub fn parse(raw: &str) -> Option<Rank> {
        let key = fold(raw);
        let rank = match key.trim_end_matches('.') {
            "kingdom" | "regnum" => Rank::Kingdom,
            "phylum" | "division" | "divisio" => Rank::Phylum,
            "class" | "classis" => Rank::Class,
            "order" | "ordo" => Rank::Order,
            "family" | "familia" => Rank::Family,
            "tribe" | "tribus" => Rank::Tribe,
            "genus" => Rank::Genus,
            "species" | "sp" => Rank::Species,
            "subspecies" | "subsp" | "ssp" => Rank::Subspecies,
            "variety" | "varietas" | "var" => Rank::Variety,
            "form" | "forma" | "f" => Rank::Form,
            _ => return None,
        };
        Some(rank)
    }

    pub fn is_broader_than(self, other: Rank) -> bool {
        self < other
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Rank::Kingdom => "kingdom",
            Rank::Phylum => "phylum",
            Rank::Class => "class",
            Rank::Order => "order",
            Rank::Family => "family",
            Rank::Tribe => "tribe",
            Rank::Genus => "genus",
            Rank::Species => "species",
            Rank::Subspecies => "subspecies",
            Rank::Variety => "variety",
            Rank::Form => "form",
        };
        f.write_str(name)
    }
}
