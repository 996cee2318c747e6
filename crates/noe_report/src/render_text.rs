//! render_text.rs: plain-text table for terminals and logs.
//!
//! Layout:
//!   header (title, round, version, seat counts)
//!   one line per seat: seat, id, name, quota, rank, movement
//!   leavers, per-quota totals, warning, integrity footer

use std::fmt::Write as _;

use crate::{Movement, ReportModel};

pub fn render_text(model: &ReportModel) -> String {
    let mut out = String::new();
    let c = &model.cover;

    let _ = write!(out, "{} v{}", c.title, c.version);
    if let Some(round) = &c.round {
        let _ = write!(out, " [{round}]");
    }
    if let Some(prev) = c.previous_version {
        let _ = write!(out, " (compared with v{prev})");
    }
    out.push('\n');
    match c.requested_seats {
        Some(r) => {
            let _ = writeln!(out, "seats filled: {} of {r}", c.seats_filled);
        }
        None => {
            let _ = writeln!(out, "seats filled: {}", c.seats_filled);
        }
    }
    out.push('\n');

    let id_w = model.seats.iter().map(|r| r.candidate_id.len()).max().unwrap_or(0).max("candidate".len());
    let name_w = model.seats.iter().map(|r| r.display_name.chars().count()).max().unwrap_or(0).max("name".len());
    let _ = writeln!(out, "{:>4}  {:<id_w$}  {:<name_w$}  {:<10}  {:>4}  change", "seat", "candidate", "name", "quota", "rank");
    for r in &model.seats {
        let change = r.movement.as_ref().map_or_else(|| "-".to_string(), Movement::to_string);
        let _ = writeln!(
            out,
            "{:>4}  {:<id_w$}  {:<name_w$}  {:<10}  {:>4}  {change}",
            r.seat, r.candidate_id, r.display_name, r.quota, r.rank_in_quota
        );
    }

    if !model.leavers.is_empty() {
        out.push_str("\nleft the order:\n");
        for l in &model.leavers {
            let _ = writeln!(out, "  {} {} (was seat {})", l.candidate_id, l.display_name, l.previous_seat);
        }
    }

    out.push_str("\nseats by quota:");
    for q in &model.quotas {
        let _ = write!(out, " {}={}", q.quota, q.seats);
    }
    out.push('\n');

    if let Some(w) = &model.warning {
        let _ = writeln!(out, "\nwarning: {w}");
    }

    let i = &model.integrity;
    let _ = writeln!(out, "\norder {}\nrun   {}\nengine {} at {}", i.order_id, i.run_id, i.engine, i.timestamp_utc);
    out
}
