//! Naming helpers shared by the graph builders.
//!
//! CloudFormation logical ids only allow alphanumerics, so domains and
//! service names are folded into `PascalCase` with `Dash`/`Dot` tokens.

/// Returns the registrable root of a domain name.
///
/// `api.example.com` -> `example.com`, `example.com` -> `example.com`.
/// Inputs with fewer than two labels are returned unchanged.
pub fn root_domain(domain: &str) -> String {
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return domain.to_string();
    }
    format!("{}.{}", labels[labels.len() - 2], labels[labels.len() - 1])
}

/// Turns a domain or service name into an alphanumeric identifier fragment.
///
/// `example.com` -> `ExampleDotCom`, `ielts-all-in.com` -> `IeltsDashAllDashInDotCom`,
/// `my_api` -> `MyUnderscoreApi`.
pub fn identifier(domain: &str) -> String {
    domain
        .split('.')
        .map(|label| {
            title_case(label)
                .replace('-', "Dash")
                .replace('_', "Underscore")
        })
        .collect::<Vec<_>>()
        .join("Dot")
}

// Upper-cases the first letter of every word and lower-cases the rest; any
// non-alphanumeric character starts a new word.
fn title_case(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut at_word_start = true;
    for c in label.chars() {
        if c.is_alphanumeric() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_root_domain() {
        let cases = [
            ("api.example.com", "example.com"),
            ("example.com", "example.com"),
            ("foo.bar.example.com", "example.com"),
            ("localhost", "localhost"),
            ("", ""),
            ("co.uk", "co.uk"),
        ];
        for (input, expected) in cases {
            assert_eq!(root_domain(input), expected, "root_domain({:?})", input);
        }
    }

    #[test]
    fn test_root_domain_is_idempotent() {
        for domain in ["api.example.com", "a.b.c.d.io", "localhost", "x.y", "."] {
            let once = root_domain(domain);
            assert_eq!(root_domain(&once), once);
        }
    }

    #[test]
    fn test_identifier() {
        let cases = [
            ("api.example.com", "ApiDotExampleDotCom"),
            ("example.com", "ExampleDotCom"),
            ("foo.bar.example.com", "FooDotBarDotExampleDotCom"),
            ("localhost", "Localhost"),
            ("", ""),
            ("co.uk", "CoDotUk"),
            ("ielts-all-in.com", "IeltsDashAllDashInDotCom"),
            ("my_api", "MyUnderscoreApi"),
        ];
        for (input, expected) in cases {
            assert_eq!(identifier(input), expected, "identifier({:?})", input);
        }
    }

    #[test]
    fn test_identifier_is_collision_free_over_sample() {
        let domains = [
            "example.com",
            "example.co",
            "ex-ample.com",
            "ex.ample.com",
            "api.example.com",
            "api-example.com",
            "ielts-all-in.com",
            "ielts.all-in.com",
            "my_api",
            "my-api",
        ];
        let ids: HashSet<String> = domains.iter().map(|d| identifier(d)).collect();
        assert_eq!(ids.len(), domains.len());
        assert!(ids.iter().all(|id| id.chars().all(|c| c.is_ascii_alphanumeric())));
    }
}
