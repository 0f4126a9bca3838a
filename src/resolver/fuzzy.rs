use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Qualified-reference matching
// ---------------------------------------------------------------------------
//
// Languages whose references carry no file path (Ruby's `A::B::C` constants)
// get a last-resort matcher: convert the reference into conventional path
// segments and look for a file whose path components contain them as an
// ordered subsequence. The matcher only ever answers with a unique winner;
// a tie is reported as no resolution.

/// Alignment quality of one candidate. Lower is better, compared
/// lexicographically: a tight match beats one with components skipped
/// between segments, then one ending at the file name beats one ending at a
/// directory, then a shallow match beats a deep one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MatchScore {
    /// Unmatched components between the first and last matched component.
    pub gaps: usize,
    /// Components after the last match.
    pub trailing: usize,
    /// Components before the first match.
    pub leading: usize,
}

/// Resolve a qualified reference against candidate files.
///
/// `segments` are the reference's parts in order (`["Acme", "Widgets",
/// "Frob"]`); each is normalized to snake_case before matching, and the
/// candidate's components are normalized the same way, with the file
/// extension stripped.
///
/// Matching tries the full segment list first. If nothing matches, the last
/// segment is dropped and the search retried, so `Acme::Widgets::FROB_LIMIT`
/// still lands on `acme/widgets.rb`. The first length that produces matches
/// decides: a unique best score resolves, a tie resolves to nothing.
pub fn resolve_qualified(candidates: &[&PathBuf], segments: &[&str]) -> Option<PathBuf> {
    if segments.is_empty() || candidates.is_empty() {
        return None;
    }
    let normalized: Vec<String> = segments.iter().map(|s| snake_case(s)).collect();
    let component_lists: Vec<Vec<String>> = candidates.iter().map(|c| components_of(c)).collect();

    for len in (1..=normalized.len()).rev() {
        let window = &normalized[..len];
        let mut best: Option<(MatchScore, usize)> = None;
        let mut tied = false;

        for (idx, components) in component_lists.iter().enumerate() {
            let Some(score) = best_alignment(components, window) else {
                continue;
            };
            match best {
                None => best = Some((score, idx)),
                Some((current, _)) => {
                    if score < current {
                        best = Some((score, idx));
                        tied = false;
                    } else if score == current {
                        tied = true;
                    }
                }
            }
        }

        match best {
            Some((_, idx)) if !tied => return Some(candidates[idx].clone()),
            Some(_) => return None, // ambiguous at this length: stop, do not guess
            None => continue,       // nothing matched: retry without the last segment
        }
    }
    None
}

/// Best alignment of `segments` as an ordered subsequence of `components`.
///
/// The gap total telescopes to `last - first - (len-1)`, so for a fixed
/// starting component the earliest-next greedy walk is optimal; the overall
/// best is the minimum over starting positions.
fn best_alignment(components: &[String], segments: &[String]) -> Option<MatchScore> {
    let n = segments.len();
    let m = components.len();
    if n == 0 || m < n {
        return None;
    }

    let mut best: Option<MatchScore> = None;
    for first in 0..m {
        if components[first] != segments[0] {
            continue;
        }
        let mut pos = first;
        let mut complete = true;
        for segment in &segments[1..] {
            match (pos + 1..m).find(|&j| components[j] == *segment) {
                Some(j) => pos = j,
                None => {
                    complete = false;
                    break;
                }
            }
        }
        if !complete {
            continue;
        }
        let score = MatchScore {
            gaps: pos - first - (n - 1),
            trailing: m - 1 - pos,
            leading: first,
        };
        if best.map(|b| score < b).unwrap_or(true) {
            best = Some(score);
        }
    }
    best
}

fn components_of(path: &Path) -> Vec<String> {
    let mut out: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(name) => name.to_str().map(snake_case),
            _ => None,
        })
        .collect();
    if let Some(stem) = path.file_stem().and_then(|s| s.to_str())
        && let Some(last) = out.last_mut()
    {
        *last = snake_case(stem);
    }
    out
}

/// Convert a constant-style name to its conventional file-name form:
/// `WidgetFactory` → `widget_factory`, `HTTPClient` → `http_client`.
/// Already-snake input passes through unchanged.
pub fn snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1);
            let after_lower = prev.map(|p| p.is_lowercase() || p.is_ascii_digit()).unwrap_or(false);
            let acronym_end = prev.map(|p| p.is_uppercase()).unwrap_or(false)
                && next.map(|n| n.is_lowercase()).unwrap_or(false);
            if after_lower || acronym_end {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(raw: &[&str]) -> Vec<PathBuf> {
        raw.iter().map(PathBuf::from).collect()
    }

    fn resolve(raw: &[&str], segments: &[&str]) -> Option<PathBuf> {
        let owned = paths(raw);
        let refs: Vec<&PathBuf> = owned.iter().collect();
        resolve_qualified(&refs, segments)
    }

    #[test]
    fn snake_case_handles_camel_and_acronyms() {
        assert_eq!(snake_case("WidgetFactory"), "widget_factory");
        assert_eq!(snake_case("HTTPClient"), "http_client");
        assert_eq!(snake_case("Acme"), "acme");
        assert_eq!(snake_case("already_snake"), "already_snake");
        assert_eq!(snake_case("V2Api"), "v2_api");
    }

    #[test]
    fn unique_subsequence_match_resolves() {
        let got = resolve(
            &["/r/lib/acme/widgets/frob.rb", "/r/lib/acme/other.rb"],
            &["Acme", "Widgets", "Frob"],
        );
        assert_eq!(got, Some(PathBuf::from("/r/lib/acme/widgets/frob.rb")));
    }

    #[test]
    fn tie_at_best_score_resolves_to_nothing() {
        let got = resolve(
            &["/r/lib/acme/widget.rb", "/r/spec/acme/widget.rb"],
            &["Acme", "Widget"],
        );
        assert_eq!(got, None, "equal scores must not pick arbitrarily");
    }

    #[test]
    fn tighter_match_beats_gappy_match() {
        let got = resolve(
            &["/r/acme/widgets/frob.rb", "/r/acme/frob.rb"],
            &["Acme", "Frob"],
        );
        assert_eq!(got, Some(PathBuf::from("/r/acme/frob.rb")));
    }

    #[test]
    fn file_name_match_beats_directory_match() {
        // Both contain "widget"; matching the stem leaves no trailing
        // components and wins.
        let got = resolve(
            &["/r/lib/widget/helpers.rb", "/r/lib/acme/widget.rb"],
            &["Widget"],
        );
        assert_eq!(got, Some(PathBuf::from("/r/lib/acme/widget.rb")));
    }

    #[test]
    fn shallow_match_beats_deep_match_on_leading() {
        let got = resolve(
            &["/r/x/y.rb", "/r/deeper/nested/x/y.rb"],
            &["X", "Y"],
        );
        assert_eq!(got, Some(PathBuf::from("/r/x/y.rb")));
    }

    #[test]
    fn truncation_recovers_when_last_segment_is_not_a_file() {
        let got = resolve(
            &["/r/lib/acme/widgets.rb", "/r/lib/acme/engines.rb"],
            &["Acme", "Widgets", "FROB_LIMIT"],
        );
        assert_eq!(got, Some(PathBuf::from("/r/lib/acme/widgets.rb")));
    }

    #[test]
    fn truncation_stops_at_first_length_with_matches() {
        // Full length ties; the rule is to report ambiguity, not keep
        // truncating until something becomes unique.
        let got = resolve(
            &["/r/a/acme/widgets.rb", "/r/b/acme/widgets.rb", "/r/acme.rb"],
            &["Acme", "Widgets"],
        );
        assert_eq!(got, None);
    }

    #[test]
    fn no_match_at_any_length_resolves_to_nothing() {
        let got = resolve(&["/r/lib/other.rb"], &["Acme", "Widgets"]);
        assert_eq!(got, None);
    }
}
