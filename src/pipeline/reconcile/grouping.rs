//! Filter, group and order raw rows before reconciliation.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate};

use crate::models::RawExtractionRow;

/// Printed date formats seen on invoices. Two-digit years are tried first:
/// `%Y` would otherwise read "23" as the year 23.
const DATE_FORMATS: &[&str] = &["%m/%d/%y", "%m/%d/%Y", "%m.%d.%y", "%m-%d-%y", "%Y-%m-%d"];

pub fn parse_invoice_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(trimmed).ok().map(|dt| dt.date_naive()))
}

/// Numeric-aware, case-insensitive comparison: "9" < "10" < "100".
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();
    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let l = take_digits(&mut left);
                let r = take_digits(&mut right);
                let ord = compare_digit_runs(&l, &r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                let ord = x.to_lowercase().cmp(y.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(c) = chars.next_if(char::is_ascii_digit) {
        run.push(c);
    }
    run
}

fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Raw rows of one base transaction id.
#[derive(Debug, Clone)]
pub struct InvoiceGroup<'a> {
    pub base_id: String,
    pub rows: Vec<&'a RawExtractionRow>,
}

/// Counts of rows left out of grouping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub already_processed: usize,
    pub before_cutoff: usize,
    pub undated: usize,
    pub missing_base_id: usize,
}

/// Group unprocessed rows dated on or after `cutoff` by base id, newest
/// (highest) base id first.
pub fn group_pending<'a>(
    rows: &'a [RawExtractionRow],
    processed: &HashSet<String>,
    cutoff: NaiveDate,
) -> (Vec<InvoiceGroup<'a>>, FilterStats) {
    let mut stats = FilterStats::default();
    let mut groups: HashMap<&str, Vec<&'a RawExtractionRow>> = HashMap::new();

    for row in rows {
        let base = row.invoice_id_base.trim();
        if base.is_empty() {
            stats.missing_base_id += 1;
            continue;
        }
        if processed.contains(base) {
            stats.already_processed += 1;
            continue;
        }
        match parse_invoice_date(&row.date) {
            None => {
                tracing::warn!(base_id = base, date = %row.date, "Unparseable invoice date, row excluded");
                stats.undated += 1;
                continue;
            }
            Some(date) if date < cutoff => {
                stats.before_cutoff += 1;
                continue;
            }
            Some(_) => {}
        }
        groups.entry(base).or_default().push(row);
    }

    let mut ordered: Vec<InvoiceGroup<'a>> = groups
        .into_iter()
        .map(|(base, rows)| InvoiceGroup {
            base_id: base.to_string(),
            rows,
        })
        .collect();
    // Ids equal under natural order ("A1"/"a1", "07"/"7") fall back to byte order.
    ordered.sort_by(|a, b| {
        natural_cmp(&b.base_id, &a.base_id).then_with(|| b.base_id.cmp(&a.base_id))
    });
    (ordered, stats)
}
