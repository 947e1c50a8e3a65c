//! Shared builders for unit tests.

use chrono::{DateTime, TimeZone, Utc};
use tally_types::{Micros, Period};

use crate::detailed_line::DetailedLine;
use crate::discount::{AmountDiscount, DiscountReason};
use crate::line::Line;

pub fn micros(s: &str) -> Micros {
    s.parse().unwrap()
}

pub fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
}

pub fn period(start_day: u32, end_day: u32) -> Period {
    Period::new(at(start_day), at(end_day))
}

pub fn line(id: &str) -> Line {
    let mut line = Line::new(
        "inv-1",
        format!("line {id}"),
        "USD",
        period(1, 31),
        micros("10"),
        micros("1.5"),
    );
    line.id = id.into();
    line
}

pub fn detailed(id: &str) -> DetailedLine {
    let mut dl =
        DetailedLine::new(format!("detailed {id}"), period(1, 31), micros("1.5"), micros("5"));
    dl.id = id.into();
    dl
}

pub fn amount_discount(id: &str, amount: &str) -> AmountDiscount {
    let mut d = AmountDiscount::new(DiscountReason::MaximumSpend, micros(amount));
    d.id = id.into();
    d
}

/// Line `1` without children; line `2` with detailed lines `2.1` (carrying
/// discount `D2.1.1`) and `2.2`. Nothing is persisted yet.
pub fn sample_invoice() -> Vec<Line> {
    let mut child_1 = detailed("2.1");
    child_1.amount_discounts.push(amount_discount("D2.1.1", "1"));
    let child_2 = detailed("2.2");

    let mut line_2 = line("2");
    line_2.detailed_lines = vec![child_1, child_2];

    vec![line("1"), line_2]
}

/// `lines` with their current state recorded as persisted.
pub fn persisted(mut lines: Vec<Line>) -> Vec<Line> {
    for line in &mut lines {
        line.save_db_state();
    }
    lines
}
