//! Domain canonicalization — the load-bearing primitive for admission and
//! resume-catalog filtering. Kept pure so it can be unit-tested exhaustively.

/// Canonicalize a raw domain or URL string: strip scheme, strip a leading
/// `www.`, lowercase, and fold any `yellowpages.*` host onto `yello.*`.
pub fn canonicalize(raw: &str) -> String {
    let trimmed = strip_scheme(raw.trim());
    let host = strip_path(trimmed);
    let lower = host.to_lowercase();
    let no_www = lower.strip_prefix("www.").unwrap_or(&lower);
    fold_yellowpages(no_www)
}

fn strip_scheme(s: &str) -> &str {
    s.strip_prefix("https://")
        .or_else(|| s.strip_prefix("http://"))
        .unwrap_or(s)
}

fn strip_path(s: &str) -> &str {
    s.split(['/', '?', '#']).next().unwrap_or(s)
}

fn fold_yellowpages(host: &str) -> String {
    if let Some(rest) = host.strip_prefix("yellowpages.") {
        format!("yello.{rest}")
    } else {
        host.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scheme_and_www() {
        assert_eq!(canonicalize("https://www.yello.ae"), "yello.ae");
        assert_eq!(canonicalize("http://www.yello.ae/"), "yello.ae");
    }

    #[test]
    fn lowercases() {
        assert_eq!(canonicalize("HTTPS://WWW.Yello.AE"), "yello.ae");
    }

    #[test]
    fn folds_yellowpages_prefix() {
        assert_eq!(canonicalize("http://yellowpages.ae/"), "yello.ae");
        assert_eq!(canonicalize("yellowpages.com.ng"), "yello.com.ng");
    }

    #[test]
    fn strips_path_and_query() {
        assert_eq!(
            canonicalize("https://www.yello.ae/location/dubai?page=2"),
            "yello.ae"
        );
    }

    #[test]
    fn bare_host_unchanged() {
        assert_eq!(canonicalize("businesslist.pk"), "businesslist.pk");
    }

    #[test]
    fn idempotent() {
        let inputs = [
            "https://www.yello.ae",
            "http://yellowpages.ae/",
            "businesslist.pk",
            "YELLOWPAGES.CO.KE",
        ];
        for input in inputs {
            let once = canonicalize(input);
            let twice = canonicalize(&once);
            assert_eq!(once, twice, "not idempotent for {input}");
        }
    }

    #[test]
    fn admission_conflict_example_matches() {
        // Scenario 1 from the testable-properties section: these two must
        // canonicalize to the same domain.
        assert_eq!(
            canonicalize("https://www.yello.ae"),
            canonicalize("http://yellowpages.ae/")
        );
    }
}
