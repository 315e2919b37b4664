use analysis_core::FilingSections;
use std::collections::HashSet;

pub const MAX_RISKS: usize = 3;

/// Headline risks reported when the risk factors body yields none.
pub const GENERIC_RISKS: [&str; MAX_RISKS] = [
    "Supply-chain uncertainty",
    "Regulatory pressure",
    "Services dependency growth",
];

const MIN_HEADLINE_CHARS: usize = 40;
const MAX_HEADLINE_CHARS: usize = 160;

/// Lines that open the section rather than describe a risk
const BOILERPLATE_PREFIXES: &[&str] = &[
    "item ",
    "the following",
    "the company's business, reputation",
    "investing in",
    "this section",
    "you should carefully consider",
    "the risks described",
];

/// First sentence of a paragraph.
fn first_sentence(paragraph: &str) -> &str {
    paragraph
        .find(". ")
        .map(|end| &paragraph[..=end])
        .unwrap_or(paragraph)
        .trim()
}

fn truncate(headline: &str) -> String {
    if headline.chars().count() <= MAX_HEADLINE_CHARS {
        return headline.to_string();
    }
    let cut: String = headline.chars().take(MAX_HEADLINE_CHARS - 3).collect();
    format!("{}...", cut.trim_end())
}

/// Up to three headline risks from the risk factors section: the first
/// sentence of each distinct paragraph, in filing order.
pub fn extract_risks(filings: &FilingSections) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut risks = Vec::with_capacity(MAX_RISKS);

    for paragraph in filings.risk_factors.lines().map(str::trim) {
        let headline = first_sentence(paragraph);
        if headline.chars().count() < MIN_HEADLINE_CHARS {
            continue;
        }
        let key = headline.to_lowercase().replace('’', "'");
        if BOILERPLATE_PREFIXES.iter().any(|p| key.starts_with(p)) {
            continue;
        }
        if !seen.insert(key) {
            continue;
        }

        risks.push(truncate(headline));
        if risks.len() == MAX_RISKS {
            break;
        }
    }

    if risks.is_empty() {
        return GENERIC_RISKS.iter().map(|r| r.to_string()).collect();
    }
    risks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filings(risk_factors: &str) -> FilingSections {
        FilingSections {
            mda: String::new(),
            risk_factors: risk_factors.to_string(),
            financials: String::new(),
        }
    }

    #[test]
    fn test_headlines_from_paragraphs() {
        let text = "The following risks could affect our results.\n\
             Macro\n\
             The Company's operations depend on outsourcing partners located primarily in Asia. Further detail follows.\n\
             The Company is subject to complex and changing laws and regulations worldwide.\n\
             The Company's operations depend on outsourcing partners located primarily in Asia. Repeated.\n\
             Future operating results depend upon the Company's ability to obtain components.\n\
             The Company's stock price is subject to volatility.";
        let risks = extract_risks(&filings(text));

        assert_eq!(
            risks,
            vec![
                "The Company's operations depend on outsourcing partners located primarily in Asia.",
                "The Company is subject to complex and changing laws and regulations worldwide.",
                "Future operating results depend upon the Company's ability to obtain components.",
            ]
        );
    }

    #[test]
    fn test_generic_risks_when_nothing_usable() {
        let risks = extract_risks(&filings("Short line\nAnother"));
        assert_eq!(risks, GENERIC_RISKS.to_vec());
    }

    #[test]
    fn test_long_headline_is_truncated() {
        let text = format!("Risk {}", "word ".repeat(100));
        let risks = extract_risks(&filings(&text));
        assert_eq!(risks.len(), 1);
        assert_eq!(risks[0].chars().count(), MAX_HEADLINE_CHARS);
        assert!(risks[0].ends_with("..."));
    }
}
