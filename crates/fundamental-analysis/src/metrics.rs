//! Financial ratio extraction from the text of a filing's statements section.

use analysis_core::{round_to, FilingSections, MetricsResult};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

/// Reported when a ratio's inputs cannot be found in the filing.
pub const BASELINE_METRICS: &[(&str, f64)] = &[
    ("revenue_growth", -2.1),
    ("gross_margin", 44.1),
    ("ebit_margin", 29.8),
    ("free_cash_flow", 90.1),
    ("net_debt_to_ebitda", 0.3),
    ("roic", 21.4),
];

/// 21% US corporate tax rate
const TAX_RATE: f64 = 0.21;

const MIN_SHARE_COUNT: f64 = 1_000.0;

lazy_static! {
    /// `Label: current | prior`
    static ref PIPE_ROW: Regex = Regex::new(
        r"(?m)^\s*([A-Za-z][^:\n|]*?)\s*:\s*(\(?-?\$?\s*[\d,]+(?:\.\d+)?\)?)\s*(?:\|\s*(\(?-?\$?\s*[\d,]+(?:\.\d+)?\)?))?"
    )
    .expect("Invalid regex pattern");

    /// `Label  $ 391,035  $ 383,285`
    static ref STATEMENT_ROW: Regex = Regex::new(
        r"(?m)^\s*([A-Za-z][^\d\n$|:]*?)\s+\$?\s*(\(?-?[\d,]+(?:\.\d+)?\)?)\s+\$?\s*(\(?-?[\d,]+(?:\.\d+)?\)?)\s*$"
    )
    .expect("Invalid regex pattern");

    static ref DOLLAR_SCALE: Regex =
        Regex::new(r"(?i)in\s+(thousands|millions|billions)").expect("Invalid regex pattern");
    static ref SHARE_SCALE: Regex =
        Regex::new(r"(?i)shares[^)\n]{0,40}?in\s+(thousands|millions)").expect("Invalid regex pattern");
    static ref LABEL_WS: Regex = Regex::new(r"\s+").expect("Invalid regex pattern");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum LineItem {
    Revenue,
    GrossProfit,
    OperatingIncome,
    NetIncome,
    OperatingCashFlow,
    CapitalExpenditure,
    Depreciation,
    Debt,
    Cash,
    Equity,
    DilutedShares,
    FcfPerShare,
}

/// Label prefixes per line item, most specific first.
const LABELS: &[(LineItem, &[&str])] = &[
    (LineItem::FcfPerShare, &["free cash flow per share", "fcf per share"]),
    (LineItem::Revenue, &["total net sales", "net sales", "total revenues", "total revenue", "revenues", "revenue"]),
    (LineItem::GrossProfit, &["total gross margin", "gross margin", "gross profit"]),
    (LineItem::OperatingIncome, &["operating income", "income from operations", "ebit"]),
    (LineItem::NetIncome, &["net income", "net earnings"]),
    (
        LineItem::OperatingCashFlow,
        &[
            "cash generated by operating activities",
            "net cash provided by operating activities",
            "net cash from operating activities",
            "operating cash flow",
        ],
    ),
    (
        LineItem::CapitalExpenditure,
        &[
            "payments for acquisition of property",
            "purchases of property",
            "capital expenditures",
            "capital expenditure",
        ],
    ),
    (LineItem::Depreciation, &["depreciation and amortization", "depreciation"]),
    (LineItem::Debt, &["total debt", "total term debt", "term debt", "long-term debt"]),
    (LineItem::Cash, &["cash and cash equivalents"]),
    (LineItem::Equity, &["total shareholders", "total stockholders"]),
];

fn classify(label: &str) -> Option<LineItem> {
    if label.contains("diluted") && !label.contains("per share") && !label.contains("earnings") {
        return Some(LineItem::DilutedShares);
    }
    LABELS
        .iter()
        .find(|(_, prefixes)| prefixes.iter().any(|p| label.starts_with(p)))
        .map(|(item, _)| *item)
}

/// `(1,234.5)` -> -1234.5
fn parse_amount(raw: &str) -> Option<f64> {
    let negative = raw.contains('(') || raw.trim_start().starts_with('-');
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
    let value: f64 = digits.parse().ok()?;
    Some(if negative { -value } else { value })
}

fn scale_factor(word: &str) -> f64 {
    match word.to_ascii_lowercase().as_str() {
        "thousands" => 1e3,
        "millions" => 1e6,
        "billions" => 1e9,
        _ => 1.0,
    }
}

#[derive(Debug, Clone, Copy)]
struct Amounts {
    current: f64,
    prior: Option<f64>,
}

/// First occurrence of each recognized line item.
fn collect_line_items(text: &str) -> HashMap<LineItem, Amounts> {
    let mut items = HashMap::new();

    for line in text.lines() {
        let captures = PIPE_ROW.captures(line).or_else(|| STATEMENT_ROW.captures(line));
        let Some(caps) = captures else {
            continue;
        };
        let label = LABEL_WS
            .replace_all(caps[1].trim(), " ")
            .to_lowercase()
            .replace('’', "'");
        let Some(item) = classify(&label) else {
            continue;
        };
        let Some(current) = parse_amount(&caps[2]) else {
            continue;
        };
        // The bare "Diluted" EPS row shares its label with the share count row
        if item == LineItem::DilutedShares && current < MIN_SHARE_COUNT {
            continue;
        }
        let prior = caps.get(3).and_then(|m| parse_amount(m.as_str()));
        items.entry(item).or_insert(Amounts { current, prior });
    }

    items
}

/// Derive the named ratio set from a filing.
///
/// Always returns the six core keys (`revenue_growth`, `gross_margin`,
/// `ebit_margin`, `free_cash_flow`, `net_debt_to_ebitda`, `roic`); a ratio
/// whose inputs are missing takes its [`BASELINE_METRICS`] value.
/// `net_margin` and `fcf_per_share` are added only when they can be derived.
///
/// Percentages are in percent. `free_cash_flow` is in billions; amounts
/// without a scale note are taken to be in millions.
pub fn derive_metrics(filings: &FilingSections) -> MetricsResult {
    let text = &filings.financials;
    let items = collect_line_items(text);
    let current = |item: LineItem| items.get(&item).map(|a| a.current);

    let dollar_scale = DOLLAR_SCALE
        .captures(text)
        .map(|c| scale_factor(&c[1]))
        .unwrap_or(1e6);
    let share_scale = SHARE_SCALE
        .captures(text)
        .map(|c| scale_factor(&c[1]))
        .unwrap_or(dollar_scale);

    let mut metrics = MetricsResult::new();
    let mut put = |name: &str, value: Option<f64>, decimals: i32| {
        if let Some(v) = value.filter(|v| v.is_finite()) {
            metrics.insert(name, round_to(v, decimals));
        }
    };

    let revenue = current(LineItem::Revenue).filter(|r| *r > 0.0);

    let revenue_growth = items.get(&LineItem::Revenue).and_then(|a| {
        let prior = a.prior.filter(|p| *p != 0.0)?;
        Some((a.current - prior) / prior.abs() * 100.0)
    });
    put("revenue_growth", revenue_growth, 1);

    put(
        "gross_margin",
        revenue.zip(current(LineItem::GrossProfit)).map(|(r, gp)| gp / r * 100.0),
        1,
    );
    put(
        "ebit_margin",
        revenue.zip(current(LineItem::OperatingIncome)).map(|(r, op)| op / r * 100.0),
        1,
    );

    put(
        "net_margin",
        revenue.zip(current(LineItem::NetIncome)).map(|(r, ni)| ni / r * 100.0),
        1,
    );

    // Capex is reported negative in cash flow statements; either sign is accepted
    let fcf = current(LineItem::OperatingCashFlow)
        .map(|ocf| ocf - current(LineItem::CapitalExpenditure).map(f64::abs).unwrap_or(0.0));
    put("free_cash_flow", fcf.map(|f| f * dollar_scale / 1e9), 1);

    let ebitda = current(LineItem::OperatingIncome)
        .map(|op| op + current(LineItem::Depreciation).unwrap_or(0.0))
        .filter(|e| *e > 0.0);
    let net_debt = current(LineItem::Debt).map(|debt| debt - current(LineItem::Cash).unwrap_or(0.0));
    put("net_debt_to_ebitda", net_debt.zip(ebitda).map(|(nd, e)| nd / e), 2);

    let invested_capital = current(LineItem::Equity)
        .map(|equity| equity + current(LineItem::Debt).unwrap_or(0.0))
        .filter(|ic| *ic > 0.0);
    put(
        "roic",
        current(LineItem::OperatingIncome)
            .zip(invested_capital)
            .map(|(op, ic)| op * (1.0 - TAX_RATE) / ic * 100.0),
        1,
    );

    let fcf_per_share = current(LineItem::FcfPerShare).or_else(|| {
        let shares = current(LineItem::DilutedShares).filter(|s| *s > 0.0)?;
        fcf.map(|f| f * dollar_scale / (shares * share_scale))
    });
    put("fcf_per_share", fcf_per_share, 2);

    for (name, baseline) in BASELINE_METRICS {
        if !metrics.contains(name) {
            metrics.insert(*name, *baseline);
        }
    }

    metrics
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filings(financials: &str) -> FilingSections {
        FilingSections {
            mda: String::new(),
            risk_factors: String::new(),
            financials: financials.to_string(),
        }
    }

    fn apple_statements() -> String {
        [
            "CONSOLIDATED STATEMENTS OF OPERATIONS",
            "(In millions, except number of shares, which are reflected in thousands, and per-share amounts)",
            "Total net sales $ 391,035 $ 383,285",
            "Total cost of sales 210,352 214,137",
            "Gross margin 180,683 169,148",
            "Operating income 123,216 114,301",
            "Net income $ 93,736 $ 96,995",
            "Diluted $ 6.08 $ 6.13",
            "Diluted 15,408,095 15,812,547",
            "Cash and cash equivalents $ 29,943 $ 29,965",
            "Term debt 85,750 95,281",
            "Total shareholders’ equity 56,950 62,146",
            "Depreciation and amortization 11,445 11,519",
            "Cash generated by operating activities 118,254 110,543",
            "Payments for acquisition of property, plant and equipment (9,447) (10,959)",
        ]
        .join("\n")
    }

    #[test]
    fn test_derives_ratios_from_statement_rows() {
        let metrics = derive_metrics(&filings(&apple_statements()));

        assert_eq!(metrics.get("revenue_growth"), Some(2.0));
        assert_eq!(metrics.get("gross_margin"), Some(46.2));
        assert_eq!(metrics.get("ebit_margin"), Some(31.5));
        assert_eq!(metrics.get("net_margin"), Some(24.0));
        assert_eq!(metrics.get("free_cash_flow"), Some(108.8));
        assert_eq!(metrics.get("net_debt_to_ebitda"), Some(0.41));
        assert_eq!(metrics.get("roic"), Some(68.2));
        assert_eq!(metrics.get("fcf_per_share"), Some(7.06));
    }

    #[test]
    fn test_pipe_rows() {
        let text = "Revenue: 1000 | 800\nGross profit: 400 | 300\nOperating income: 250 | 200";
        let metrics = derive_metrics(&filings(text));

        assert_eq!(metrics.get("revenue_growth"), Some(25.0));
        assert_eq!(metrics.get("gross_margin"), Some(40.0));
        assert_eq!(metrics.get("ebit_margin"), Some(25.0));
    }

    #[test]
    fn test_cost_of_revenue_is_not_revenue() {
        let text = "Cost of revenue: 600 | 500\nRevenue: 1000 | 900";
        let metrics = derive_metrics(&filings(text));
        assert_eq!(metrics.get("revenue_growth"), Some(11.1));
    }

    #[test]
    fn test_missing_inputs_fall_back_to_baseline() {
        let metrics = derive_metrics(&filings("nothing that looks like a statement"));

        for (name, baseline) in BASELINE_METRICS {
            assert_eq!(metrics.get(name), Some(*baseline), "{}", name);
        }
        assert!(!metrics.contains("fcf_per_share"));
        assert_eq!(metrics.len(), 6);
    }

    #[test]
    fn test_deterministic() {
        let f = filings(&apple_statements());
        assert_eq!(derive_metrics(&f), derive_metrics(&f));
    }

    #[test]
    fn test_parse_amount_handles_parentheses() {
        assert_eq!(parse_amount("(9,447)"), Some(-9447.0));
        assert_eq!(parse_amount("$ 1,234.5"), Some(1234.5));
        assert_eq!(parse_amount("-12"), Some(-12.0));
        assert_eq!(parse_amount("n/a"), None);
    }
}
