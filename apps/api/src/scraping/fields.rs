//! Regex field extraction for job-info list items and page counters.

use lazy_static::lazy_static;
use regex::Regex;

use crate::models::job::JobInfo;

pub const FIXED_PRICE: &str = "Fixed price";
pub const HOURLY: &str = "Hourly";

/// Experience levels in match priority order.
const EXPERIENCE_LEVELS: &[&str] = &["Entry Level", "Intermediate", "Expert"];

lazy_static! {
    static ref HOURLY_RANGE: Regex =
        Regex::new(r"Hourly:\s*\$([0-9,.]+)\s*-\s*\$([0-9,.]+)").expect("valid hourly regex");
    static ref EST_BUDGET: Regex =
        Regex::new(r"Est\. budget:\s*\$([0-9,.]+)").expect("valid budget regex");
    static ref JOBS_COUNT: Regex =
        Regex::new(r"([\d,]+)\s+jobs?\s+found").expect("valid jobs count regex");
    static ref OVERFLOW_TOKEN: Regex = Regex::new(r"^\+\d+$").expect("valid overflow regex");
    static ref GENERIC_BUDGETS: Vec<Regex> = vec![
        Regex::new(r"\$(\d+(?:,\d{3})*(?:\.\d{2})?)").expect("valid dollar regex"),
        Regex::new(r"(\d+(?:,\d{3})*)\s*USD").expect("valid usd regex"),
        Regex::new(r"Budget:\s*\$?(\d+(?:,\d{3})*)").expect("valid budget label regex"),
    ];
    static ref JOB_LINE_PATTERNS: Vec<Regex> = vec![
        Regex::new(
            r"(?i)\b[A-Z][a-z]+ [A-Z][a-z]+\b.*(?:Developer|Writer|Designer|Manager|Engineer|Specialist)"
        )
        .expect("valid role regex"),
        Regex::new(r"(?i)(?:Looking for|Seeking|Need|Want).*(?:Developer|Writer|Designer|Manager|Engineer)")
            .expect("valid request regex"),
        Regex::new(r"(?i)\$\d+.*(?:hour|project|hourly|fixed)").expect("valid rate regex"),
    ];
}

/// Folds one job-info list item into `info`. The first matching rule wins:
/// fixed price, hourly (with rate range), estimated budget, experience level, estimated time.
pub fn classify_info_item(text: &str, info: &mut JobInfo) {
    if text.contains("Fixed price") {
        info.job_type = Some(FIXED_PRICE.to_string());
    } else if text.contains("Hourly:") {
        info.job_type = Some(HOURLY.to_string());
        if let Some(caps) = HOURLY_RANGE.captures(text) {
            info.hourly_rate_min = Some(caps[1].to_string());
            info.hourly_rate_max = Some(caps[2].to_string());
        }
    } else if text.contains("Est. budget:") {
        if let Some(caps) = EST_BUDGET.captures(text) {
            info.budget = Some(caps[1].to_string());
        }
    } else if let Some(level) = EXPERIENCE_LEVELS.iter().find(|l| text.contains(*l)) {
        info.experience_level = Some(level.to_string());
    } else if text.contains("Est. time:") {
        info.duration = Some(text.replace("Est. time:", "").trim().to_string());
    }
}

/// Parses the result counter, e.g. "5,679 jobs found" → 5679.
pub fn parse_jobs_count(text: &str) -> Option<u64> {
    JOBS_COUNT
        .captures(text)
        .and_then(|caps| caps[1].replace(',', "").parse().ok())
}

/// Skill chips such as "+3" only say that more skills are hidden.
pub fn is_overflow_token(text: &str) -> bool {
    OVERFLOW_TOKEN.is_match(text.trim())
}

/// Loose budget lookup for free text, used when no structured job info is present.
pub fn extract_budget_from_text(text: &str) -> Option<String> {
    GENERIC_BUDGETS
        .iter()
        .find_map(|re| re.captures(text).map(|caps| caps[1].to_string()))
}

/// Whether a line of page text reads like a job headline or a rate offer.
pub fn looks_like_job_line(line: &str) -> bool {
    JOB_LINE_PATTERNS.iter().any(|re| re.is_match(line))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(items: &[&str]) -> JobInfo {
        let mut info = JobInfo::default();
        for item in items {
            classify_info_item(item, &mut info);
        }
        info
    }

    #[test]
    fn test_fixed_price() {
        let info = classify(&["Fixed price", "Est. budget: $1,500.00"]);
        assert_eq!(info.job_type.as_deref(), Some("Fixed price"));
        assert_eq!(info.budget.as_deref(), Some("1,500.00"));
    }

    #[test]
    fn test_hourly_range() {
        let info = classify(&["Hourly: $25.00 - $50.00"]);
        assert_eq!(info.job_type.as_deref(), Some("Hourly"));
        assert_eq!(info.hourly_rate_min.as_deref(), Some("25.00"));
        assert_eq!(info.hourly_rate_max.as_deref(), Some("50.00"));
    }

    #[test]
    fn test_hourly_without_range_sets_only_type() {
        let info = classify(&["Hourly:"]);
        assert_eq!(info.job_type.as_deref(), Some("Hourly"));
        assert!(info.hourly_rate_min.is_none());
    }

    #[test]
    fn test_hourly_stripped_text_still_matches() {
        // Text nodes are concatenated without separators.
        let info = classify(&["Hourly:$10-$30"]);
        assert_eq!(info.hourly_rate_min.as_deref(), Some("10"));
        assert_eq!(info.hourly_rate_max.as_deref(), Some("30"));
    }

    #[test]
    fn test_experience_level_priority() {
        assert_eq!(
            classify(&["Intermediate"]).experience_level.as_deref(),
            Some("Intermediate")
        );
        assert_eq!(
            classify(&["Entry Level or Expert"]).experience_level.as_deref(),
            Some("Entry Level")
        );
        assert_eq!(classify(&["Expert"]).experience_level.as_deref(), Some("Expert"));
    }

    #[test]
    fn test_duration() {
        let info = classify(&["Est. time: 1 to 3 months, 30+ hrs/week"]);
        assert_eq!(info.duration.as_deref(), Some("1 to 3 months, 30+ hrs/week"));
    }

    #[test]
    fn test_first_rule_wins() {
        // Mentions both fixed price and a level; only the type is taken.
        let info = classify(&["Fixed price - Expert"]);
        assert_eq!(info.job_type.as_deref(), Some("Fixed price"));
        assert!(info.experience_level.is_none());
    }

    #[test]
    fn test_unrelated_item_ignored() {
        let info = classify(&["Payment verified"]);
        assert_eq!(info, JobInfo::default());
    }

    #[test]
    fn test_parse_jobs_count() {
        assert_eq!(parse_jobs_count("5,679 jobs found"), Some(5679));
        assert_eq!(parse_jobs_count("1 job found"), Some(1));
        assert_eq!(parse_jobs_count("no results"), None);
    }

    #[test]
    fn test_overflow_token() {
        assert!(is_overflow_token("+3"));
        assert!(is_overflow_token(" +12 "));
        assert!(!is_overflow_token("C++"));
        assert!(!is_overflow_token("Rust"));
    }

    #[test]
    fn test_extract_budget_from_text_order() {
        assert_eq!(
            extract_budget_from_text("Pays $1,200.50 on delivery").as_deref(),
            Some("1,200.50")
        );
        assert_eq!(extract_budget_from_text("800 USD total").as_deref(), Some("800"));
        assert_eq!(extract_budget_from_text("nothing here"), None);
    }

    #[test]
    fn test_looks_like_job_line() {
        assert!(looks_like_job_line("Looking for a backend developer"));
        assert!(looks_like_job_line("Senior Content Writer for a SaaS blog"));
        assert!(looks_like_job_line("$40 per hour, long term"));
        assert!(!looks_like_job_line("Sign in to see more results"));
        assert!(!looks_like_job_line("$40"));
    }
}
