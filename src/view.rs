use crate::domain::{CreditRating, Mortgage};

const HEADERS: [&str; 9] = [
    "ID",
    "APPLICANT",
    "INCOME",
    "LOAN",
    "PROPERTY VALUE",
    "SCORE",
    "LOAN TYPE",
    "PROPERTY",
    "RATING",
];

/// Thousands-separated amount; cents only when the value has them.
pub fn format_amount(value: f64) -> String {
    let negative = value < 0.0;
    let cents = (value.abs() * 100.0).round() as u64;
    let (whole, frac) = (cents / 100, cents % 100);

    let digits = whole.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 4);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if frac != 0 {
        out.push_str(&format!(".{frac:02}"));
    }
    if negative {
        out.insert(0, '-');
    }
    out
}

pub fn rating_label(rating: Option<CreditRating>) -> &'static str {
    rating.map(CreditRating::as_str).unwrap_or("-")
}

pub fn row(m: &Mortgage) -> [String; 9] {
    [
        m.id.to_string(),
        m.applicant_name.clone(),
        format_amount(m.income),
        format_amount(m.loan_amount),
        format_amount(m.property_value),
        m.credit_score.to_string(),
        m.loan_type.label().to_string(),
        m.property_type.label().to_string(),
        rating_label(m.credit_rating).to_string(),
    ]
}

pub fn render_table(mortgages: &[Mortgage]) -> String {
    if mortgages.is_empty() {
        return "No mortgage applications yet.\n".to_string();
    }

    let rows: Vec<[String; 9]> = mortgages.iter().map(row).collect();
    let mut widths = HEADERS.map(str::len);
    for r in &rows {
        for (w, cell) in widths.iter_mut().zip(r) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_line(&mut out, HEADERS.iter().copied(), &widths);
    for r in &rows {
        push_line(&mut out, r.iter().map(String::as_str), &widths);
    }
    out
}

fn push_line<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>, widths: &[usize; 9]) {
    let line: Vec<String> = cells
        .zip(widths)
        .map(|(cell, &w)| format!("{cell:<w$}"))
        .collect();
    out.push_str(line.join("  ").trim_end());
    out.push('\n');
}

pub fn render_record(m: &Mortgage) -> String {
    let mut out = String::new();
    let fields = [
        ("id", m.id.to_string()),
        ("applicant_name", m.applicant_name.clone()),
        ("income", format_amount(m.income)),
        ("debt_amount", format_amount(m.debt_amount)),
        ("credit_score", m.credit_score.to_string()),
        ("loan_amount", format_amount(m.loan_amount)),
        ("property_value", format_amount(m.property_value)),
        ("loan_type", m.loan_type.label().to_string()),
        ("property_type", m.property_type.label().to_string()),
        ("credit_rating", rating_label(m.credit_rating).to_string()),
    ];
    for (k, v) in fields {
        out.push_str(&format!("{k}: {v}\n"));
    }
    out
}
