//! Structural checks over one listing
//!
//! Everything here is pure; the network image probe lives in
//! [`super::probe`].

use reqwest::Url;
use resale_common::{AuditIssue, Item};
use std::collections::BTreeSet;

use crate::scoring::brands::brand_prefix;

/// Detail text shorter than this (in characters) counts as missing
pub const MIN_DETAIL_TEXT_CHARS: usize = 50;

/// Minimum listing brand length for the brand-in-detail check
pub const MIN_BRAND_CHARS: usize = 3;

/// Plain text of detail HTML: tags become spaces, common entities are
/// decoded and whitespace runs collapse to one space
pub fn strip_html(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' if !in_tag => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                text.push(' ');
            }
            _ if in_tag => {}
            _ => text.push(c),
        }
    }

    let decoded = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// File name of an image URL, ignoring host and query string
pub fn image_basename(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => {
            let path = parsed.path();
            match path.rsplit('/').next() {
                Some(last) if !last.is_empty() => last.to_string(),
                _ => path.to_string(),
            }
        }
        Err(_) => url.to_string(),
    }
}

/// Whether the text carries a `GRADE: X` marker (X in S, A, B, V; any case)
pub fn has_grade_marker(text: &str) -> bool {
    let bytes = text.as_bytes();
    let needle = b"GRADE";
    let mut start = 0;

    while start + needle.len() <= bytes.len() {
        let Some(found) = bytes[start..]
            .windows(needle.len())
            .position(|w| w.eq_ignore_ascii_case(needle))
        else {
            return false;
        };
        let mut i = start + found + needle.len();
        start = start + found + 1;

        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] != b':' {
            continue;
        }
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || !matches!(bytes[i].to_ascii_uppercase(), b'S' | b'A' | b'B' | b'V') {
            continue;
        }
        let boundary = bytes
            .get(i + 1)
            .map_or(true, |b| !(b.is_ascii_alphanumeric() || *b == b'_'));
        if boundary {
            return true;
        }
    }
    false
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

/// Run every check that needs no network access
pub fn structural_issues(item: &Item) -> BTreeSet<AuditIssue> {
    let mut issues = BTreeSet::new();

    if is_blank(item.thumbnail_url.as_deref()) {
        issues.insert(AuditIssue::NoThumbnail);
    }
    if item.sell_price <= 0 {
        issues.insert(AuditIssue::PriceZero);
    }

    let Some(detail) = item.detail.as_ref() else {
        issues.insert(AuditIssue::NoDetail);
        return issues;
    };

    let plain = strip_html(&detail.content);
    let listing_brand = brand_prefix(&item.name);

    if !detail.name.is_empty() && !item.name.is_empty() && detail.name != item.name {
        if let (Some(listing), Some(detailed)) = (listing_brand, brand_prefix(&detail.name)) {
            if !listing.eq_ignore_ascii_case(detailed) {
                issues.insert(AuditIssue::NameMismatch);
            }
        }
    }

    if !plain.is_empty() {
        if let Some(brand) = listing_brand.filter(|b| b.chars().count() >= MIN_BRAND_CHARS) {
            let brand = brand.to_lowercase();
            let in_text = plain.to_lowercase().contains(&brand);
            let in_detail_name = detail.name.to_lowercase().contains(&brand);
            if !in_text && !in_detail_name {
                issues.insert(AuditIssue::NameMismatch);
            }
        }
    }

    if let (Some(thumb), Some(detail_image)) = (item.thumbnail_url.as_deref(), detail.image_url.as_deref()) {
        if !thumb.is_empty() && !detail_image.is_empty() {
            let thumb_base = image_basename(thumb);
            let detail_base = image_basename(detail_image);
            if !thumb_base.is_empty() && !detail_base.is_empty() && thumb_base != detail_base {
                issues.insert(AuditIssue::ImageMismatch);
            }
        }
    }

    if plain.chars().count() < MIN_DETAIL_TEXT_CHARS {
        issues.insert(AuditIssue::NoDetail);
    }

    if !has_grade_marker(&plain) && !item.grade.is_known() {
        issues.insert(AuditIssue::NoGrade);
    }

    issues
}
