//! Brand popularity table
//!
//! Static lookup of resale demand by brand name. Keys are upper-case; lookups
//! normalize the input the same way.

use once_cell::sync::Lazy;
use resale_common::BrandTier;
use std::collections::HashMap;

pub const S_TIER_POINTS: u32 = 35;
pub const A_TIER_POINTS: u32 = 26;
pub const B_TIER_POINTS: u32 = 17;

const S_TIER: &[&str] = &[
    "BURBERRY",
    "BARBOUR",
    "STONE ISLAND",
    "CP COMPANY",
    "PATAGONIA",
    "ARC'TERYX",
    "ARCTERYX",
    "COMME DES GARCONS",
    "ISSEY MIYAKE",
    "YOHJI YAMAMOTO",
    "POLO RALPH LAUREN",
    "RALPH LAUREN",
    "RRL",
    "RED WING",
    "LEVI'S",
    "LEVIS",
    "SCHOTT",
    "THE REAL MCCOY'S",
    "REAL MCCOYS",
    "BUZZ RICKSON",
    "FILSON",
    "NIGEL CABOURN",
];

const A_TIER: &[&str] = &[
    "CARHARTT",
    "THE NORTH FACE",
    "NORTH FACE",
    "STUSSY",
    "CHAMPION",
    "NIKE",
    "ADIDAS",
    "FRED PERRY",
    "LACOSTE",
    "BEN SHERMAN",
    "COLUMBIA",
    "L.L.BEAN",
    "LL BEAN",
    "PENDLETON",
    "DICKIES",
    "TIMBERLAND",
    "WRANGLER",
    "LEE",
    "WOOLRICH",
    "SIERRA DESIGNS",
    "HELLY HANSEN",
    "DANTON",
    "ORSLOW",
    "KAPITAL",
    "VISVIM",
    "ENGINEERED GARMENTS",
    "BEAMS",
];

const B_TIER: &[&str] = &[
    "GAP",
    "EDDIE BAUER",
    "LANDS END",
    "BANANA REPUBLIC",
    "J.CREW",
    "BROOKS BROTHERS",
    "TOMMY HILFIGER",
    "NAUTICA",
    "HANES",
    "RUSSELL",
    "UNIQLO",
    "ZARA",
    "H&M",
    "NEW BALANCE",
    "PUMA",
    "REEBOK",
    "CONVERSE",
];

static POPULARITY: Lazy<HashMap<&'static str, u32>> = Lazy::new(|| {
    let mut table = HashMap::with_capacity(S_TIER.len() + A_TIER.len() + B_TIER.len());
    for (names, points) in [(S_TIER, S_TIER_POINTS), (A_TIER, A_TIER_POINTS), (B_TIER, B_TIER_POINTS)] {
        for name in names {
            table.insert(*name, points);
        }
    }
    table
});

/// Popularity points for a brand name, if it is in the table
pub fn popularity(brand: &str) -> Option<u32> {
    let key = brand.trim().to_uppercase();
    POPULARITY.get(key.as_str()).copied()
}

/// Fallback points from the classifier's brand tier
pub fn tier_fallback(tier: Option<BrandTier>) -> u32 {
    match tier {
        Some(BrandTier::Luxury) => 30,
        Some(BrandTier::Premium) => 20,
        Some(BrandTier::Mid) => 10,
        Some(BrandTier::Basic) => 4,
        Some(BrandTier::Other) | None => 0,
    }
}

/// Leading upper-case brand run of a listing name, up to the first Korean word
///
/// "STONE ISLAND 나일론 자켓" yields "STONE ISLAND"; names without a Korean
/// word after the run, or starting with anything outside `A-Z 0-9 & . ' -`
/// and whitespace, yield `None`.
pub fn brand_prefix(name: &str) -> Option<&str> {
    let chars: Vec<(usize, char)> = name.char_indices().collect();
    for (pos, &(byte_idx, c)) in chars.iter().enumerate() {
        if pos > 0 && c.is_whitespace() {
            let next = chars[pos..].iter().map(|(_, ch)| *ch).find(|ch| !ch.is_whitespace());
            if next.is_some_and(is_hangul_syllable) {
                let prefix = name[..byte_idx].trim();
                return (!prefix.is_empty()).then_some(prefix);
            }
        }
        if !is_brand_char(c) {
            return None;
        }
    }
    None
}

fn is_brand_char(c: char) -> bool {
    c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, '&' | '.' | '\'' | '-') || c.is_whitespace()
}

fn is_hangul_syllable(c: char) -> bool {
    ('\u{AC00}'..='\u{D7A3}').contains(&c)
}

/// Brand used for scoring: the catalog brand, else the name's brand prefix,
/// else the first word of the name
pub fn scoring_brand<'a>(brand: &'a str, name: &'a str) -> &'a str {
    if !brand.trim().is_empty() {
        return brand;
    }
    brand_prefix(name).unwrap_or_else(|| name.split_whitespace().next().unwrap_or(""))
}

/// Brand component of the keepScore (0-35)
pub fn brand_points(brand: &str, tier: Option<BrandTier>) -> u32 {
    popularity(brand).unwrap_or_else(|| tier_fallback(tier))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(popularity("burberry"), Some(35));
        assert_eq!(popularity("  Stone Island "), Some(35));
        assert_eq!(popularity("The North Face"), Some(26));
        assert_eq!(popularity("h&m"), Some(17));
        assert_eq!(popularity("Unknown Label"), None);
    }

    #[test]
    fn test_table_beats_brand_tier() {
        assert_eq!(brand_points("Uniqlo", Some(BrandTier::Luxury)), 17);
    }

    #[test]
    fn test_brand_prefix() {
        assert_eq!(brand_prefix("STONE ISLAND 나일론 자켓"), Some("STONE ISLAND"));
        assert_eq!(brand_prefix("LEVI'S 501 데님"), Some("LEVI'S 501"));
        assert_eq!(brand_prefix("A.P.C.  셔츠"), Some("A.P.C."));
        assert_eq!(brand_prefix("Barbour 자켓"), None);
        assert_eq!(brand_prefix("NIKE JACKET"), None);
        assert_eq!(brand_prefix("자켓"), None);
        assert_eq!(brand_prefix(""), None);
    }

    #[test]
    fn test_scoring_brand_fallbacks() {
        assert_eq!(scoring_brand("Barbour", "whatever"), "Barbour");
        assert_eq!(scoring_brand("", "RED WING 부츠"), "RED WING");
        assert_eq!(scoring_brand(" ", "Filson bag"), "Filson");
        assert_eq!(scoring_brand("", ""), "");
    }

    #[test]
    fn test_brand_tier_fallback() {
        assert_eq!(brand_points("Atelier X", Some(BrandTier::Luxury)), 30);
        assert_eq!(brand_points("Atelier X", Some(BrandTier::Premium)), 20);
        assert_eq!(brand_points("Atelier X", Some(BrandTier::Mid)), 10);
        assert_eq!(brand_points("Atelier X", Some(BrandTier::Basic)), 4);
        assert_eq!(brand_points("Atelier X", Some(BrandTier::Other)), 0);
        assert_eq!(brand_points("", None), 0);
    }
}
