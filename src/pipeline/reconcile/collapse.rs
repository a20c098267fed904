//! One invoice per base id.
//!
//! When the service returns several winners for a base id, they are folded
//! in version order (natural order of full ids, earliest first). A later
//! version that duplicates an earlier one replaces it. Anything left over is
//! a supplement and is fused under a `MERGED|...` full id, keeping every
//! line item.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::enums::InconsistencyLevel;
use crate::models::{is_merged_id, merged_id, MERGE_DELIMITER};

use super::grouping::natural_cmp;
use super::types::{WinningInvoice, WinningLineItem};

static SERIAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:s/n|sn[:#]|serial(?:\s+(?:no\.?|number|#))?)\s*[:#.]?\s*([a-z0-9][a-z0-9-]{2,})")
        .expect("valid regex")
});

/// How a base id's winners were reduced to one invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollapseKind {
    /// The service returned exactly one winner.
    Single,
    /// Later versions replaced earlier duplicates; the dropped full ids.
    Replaced(Vec<String>),
    /// Distinct supplements were fused; the contributing full ids.
    Merged(Vec<String>),
}

/// Serial numbers mentioned on any line.
pub fn serial_anchors(invoice: &WinningInvoice) -> HashSet<String> {
    invoice
        .line_items
        .iter()
        .flat_map(|line| [line.sub_details.as_str(), line.parent_description.as_str()])
        .flat_map(|text| SERIAL_RE.captures_iter(text))
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|serial| serial.chars().any(|c| c.is_ascii_digit()))
        .map(str::to_ascii_uppercase)
        .collect()
}

fn line_key(line: &WinningLineItem) -> (String, i64, i64) {
    (
        line.prod_id.trim().to_ascii_uppercase(),
        (line.qty * 1000.0).round() as i64,
        (line.extended_total * 100.0).round() as i64,
    )
}

fn line_multiset(invoice: &WinningInvoice) -> Vec<(String, i64, i64)> {
    let mut keys: Vec<_> = invoice.line_items.iter().map(line_key).collect();
    keys.sort();
    keys
}

fn same_po_and_total(a: &WinningInvoice, b: &WinningInvoice) -> bool {
    let po_a = a.metadata.po.trim();
    let po_b = b.metadata.po.trim();
    !po_a.is_empty()
        && po_a.eq_ignore_ascii_case(po_b)
        && (a.financials.total - b.financials.total).abs() < 0.005
}

/// True if `later` is another copy or a corrected version of `earlier`.
///
/// A shared purchase order alone is not enough: progress billing reuses the
/// PO for a deposit and a final invoice with different totals.
pub fn is_replacement(earlier: &WinningInvoice, later: &WinningInvoice) -> bool {
    if earlier.invoice_id_full.trim() == later.invoice_id_full.trim() {
        return true;
    }
    let lines = line_multiset(earlier);
    if !lines.is_empty() && lines == line_multiset(later) {
        return true;
    }
    if !serial_anchors(earlier).is_disjoint(&serial_anchors(later)) {
        return true;
    }
    same_po_and_total(earlier, later)
}

/// Reduce several winners for one base id to exactly one.
///
/// Returns `None` only for an empty input.
pub fn collapse_winners(mut winners: Vec<WinningInvoice>) -> Option<(WinningInvoice, CollapseKind)> {
    if winners.len() <= 1 {
        return winners.pop().map(|w| (w, CollapseKind::Single));
    }
    winners.sort_by(|a, b| natural_cmp(version_key(&a.invoice_id_full), version_key(&b.invoice_id_full)));

    let mut kept: Vec<WinningInvoice> = Vec::new();
    let mut dropped = Vec::new();
    for winner in winners {
        match kept.iter().position(|k| is_replacement(k, &winner)) {
            Some(pos) => {
                let replaced = std::mem::replace(&mut kept[pos], winner);
                dropped.push(replaced.invoice_id_full);
            }
            None => kept.push(winner),
        }
    }

    let mut kept = kept.into_iter();
    let mut fused = kept.next()?;
    let rest: Vec<WinningInvoice> = kept.collect();
    if rest.is_empty() {
        return Some((fused, CollapseKind::Replaced(dropped)));
    }

    let mut sources = source_ids(&fused.invoice_id_full);
    for other in rest {
        sources.extend(source_ids(&other.invoice_id_full));
        absorb(&mut fused, other);
    }
    sources.dedup();
    fused.invoice_id_full = merged_id(sources.iter().map(String::as_str));
    Some((fused, CollapseKind::Merged(sources)))
}

/// Earliest contributing full id, used for version ordering.
fn version_key(full_id: &str) -> &str {
    if is_merged_id(full_id) {
        full_id
            .split(MERGE_DELIMITER)
            .nth(1)
            .map(str::trim)
            .unwrap_or(full_id)
    } else {
        full_id.trim()
    }
}

/// Full ids behind a winner, unpacking an existing merge sentinel.
fn source_ids(full_id: &str) -> Vec<String> {
    if is_merged_id(full_id) {
        full_id
            .split(MERGE_DELIMITER)
            .skip(1)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    } else {
        vec![full_id.trim().to_string()]
    }
}

fn fill(target: &mut String, source: String) {
    if target.trim().is_empty() {
        *target = source;
    }
}

fn severity(level: &str) -> u8 {
    match InconsistencyLevel::from_loose(level) {
        InconsistencyLevel::None => 0,
        InconsistencyLevel::Minor => 1,
        InconsistencyLevel::Major => 2,
        InconsistencyLevel::Severe => 3,
    }
}

fn absorb(target: &mut WinningInvoice, other: WinningInvoice) {
    fill(&mut target.iso_date, other.iso_date);
    fill(&mut target.origin_id, other.origin_id);
    fill(&mut target.cust_id, other.cust_id);
    fill(&mut target.sold_to_attn, other.sold_to_attn);
    fill(&mut target.ship_to_resolved, other.ship_to_resolved);
    fill(&mut target.ship_to_attn, other.ship_to_attn);
    fill(&mut target.metadata.po, other.metadata.po);
    fill(&mut target.metadata.salesperson, other.metadata.salesperson);
    fill(&mut target.metadata.terms, other.metadata.terms);
    fill(&mut target.metadata.shipped_via, other.metadata.shipped_via);
    fill(&mut target.metadata.fob, other.metadata.fob);

    target.financials.add(&other.financials);
    target.line_items.extend(other.line_items);

    if severity(&other.audit.level) > severity(&target.audit.level) {
        target.audit.level = other.audit.level;
    }
    if !other.audit.notes.trim().is_empty() {
        if !target.audit.notes.trim().is_empty() {
            target.audit.notes.push_str("; ");
        }
        target.audit.notes.push_str(&other.audit.notes);
    }
    fill(&mut target.audit.math_check, other.audit.math_check);
}
