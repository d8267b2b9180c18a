//! Glob resolution: include/exclude pattern sets combined under strictness
//! and conjunction policy.
//!
//! [`resolve`] turns a [`PathGlobs`] request into the final, deduplicated,
//! deterministically ordered set of matched file paths — or a single fatal
//! [`ExpansionError`]. The output order is byte-wise lexicographic on the
//! normalized path string, never filesystem iteration order or pattern
//! order; downstream consumers fingerprint the result, so reproducibility
//! is part of the contract.

use std::collections::BTreeSet;
use std::io;
use std::thread;

use camino::Utf8PathBuf;
use tracing::{debug, warn};

use globpack_matcher::{Pattern, PatternError, TreeWalker};
use globpack_proto::{Conjunction, PathGlobs, Strictness};

/// A resolution failed; nothing partial is ever returned.
#[derive(Debug, thiserror::Error)]
pub enum ExpansionError {
    #[error(transparent)]
    MalformedPattern(#[from] PatternError),

    #[error("glob pattern {pattern:?} did not match any files")]
    NoMatches { pattern: String },

    #[error("no files matched any of the include patterns {patterns:?}")]
    ConjunctionUnsatisfied { patterns: Vec<String> },

    #[error("failed to walk {path}: {source}")]
    Walk {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Matched paths: deduplicated, post-exclusion, byte-wise sorted.
    pub paths: Vec<Utf8PathBuf>,
    /// Include patterns that matched nothing under `WARN` strictness.
    ///
    /// Always empty for `ERROR` (a violation is fatal) and `IGNORE`
    /// (violations are silent).
    pub unmatched_patterns: Vec<String>,
}

/// Resolve a glob request against a file tree.
///
/// Policy evaluation, in order:
/// 1. Every pattern (include and exclude) must parse; a malformed pattern is
///    fatal regardless of strictness.
/// 2. Include patterns expand to their pre-exclusion match sets, in parallel
///    when there is more than one.
/// 3. The conjunction defines which "matched nothing" outcomes violate the
///    request: `ALL_MATCH` flags every include pattern with an empty match
///    set; `ANY_MATCH` flags the request only when the union is empty.
///    Strictness then decides severity: `ERROR` fails, `WARN` logs and
///    reports, `IGNORE` stays silent.
/// 4. An empty union always fails, under any strictness: an include set that
///    matched nothing never yields a successful empty response.
/// 5. Exclusion subtracts paths from the union afterwards — it never feeds
///    back into the emptiness checks above, and an exclude pattern matching
///    nothing is never an error. Exclusion alone may leave the final set
///    empty; that is a legitimate success.
///
/// # Errors
///
/// Returns an [`ExpansionError`] for malformed patterns, policy violations,
/// or a traversal failure.
pub fn resolve(globs: &PathGlobs, walker: &TreeWalker) -> Result<Resolution, ExpansionError> {
    let include = Pattern::parse_all(&globs.include_patterns)?;
    let exclude = Pattern::parse_all(&globs.exclude_patterns)?;

    let match_sets = expand_all(&include, walker)?;

    let empty: Vec<&Pattern> = include
        .iter()
        .zip(&match_sets)
        .filter(|(_, set)| set.is_empty())
        .map(|(pattern, _)| pattern)
        .collect();
    let union_is_empty = empty.len() == include.len();

    let violations: &[&Pattern] = match globs.conjunction {
        Conjunction::AllMatch => &empty,
        Conjunction::AnyMatch if union_is_empty => &empty,
        Conjunction::AnyMatch => &[],
    };

    let mut unmatched_patterns = Vec::new();
    if let Some(first) = violations.first() {
        match globs.strictness {
            Strictness::Error => {
                return Err(ExpansionError::NoMatches {
                    pattern: first.as_str().to_string(),
                });
            }
            Strictness::Warn => {
                for pattern in violations {
                    warn!(pattern = pattern.as_str(), "glob matched no files");
                    unmatched_patterns.push(pattern.as_str().to_string());
                }
            }
            Strictness::Ignore => {}
        }
    }

    if union_is_empty {
        return Err(ExpansionError::ConjunctionUnsatisfied {
            patterns: globs.include_patterns.clone(),
        });
    }

    let mut union: BTreeSet<Utf8PathBuf> = BTreeSet::new();
    for set in match_sets {
        union.extend(set);
    }
    union.retain(|path| !exclude.iter().any(|pattern| pattern.matches(path)));

    debug!(
        matched = union.len(),
        includes = include.len(),
        excludes = exclude.len(),
        "glob resolution complete"
    );
    Ok(Resolution {
        paths: union.into_iter().collect(),
        unmatched_patterns,
    })
}

/// Expand each include pattern to its match set, one scoped thread per
/// pattern when there are several. Patterns are independent, so this only
/// shortens the wall clock of multi-pattern requests; result order follows
/// pattern order either way.
fn expand_all(
    include: &[Pattern],
    walker: &TreeWalker,
) -> Result<Vec<BTreeSet<Utf8PathBuf>>, ExpansionError> {
    if include.len() <= 1 {
        return include.iter().map(|p| expand_one(p, walker)).collect();
    }
    thread::scope(|scope| {
        let handles: Vec<_> = include
            .iter()
            .map(|pattern| scope.spawn(move || expand_one(pattern, walker)))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("include expansion thread panicked"))
            .collect()
    })
}

fn expand_one(
    pattern: &Pattern,
    walker: &TreeWalker,
) -> Result<BTreeSet<Utf8PathBuf>, ExpansionError> {
    walker
        .expand(pattern)
        .map(|result| {
            result.map_err(|e| ExpansionError::Walk {
                path: e.path,
                source: e.source,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tree(files: &[&str]) -> (tempfile::TempDir, TreeWalker) {
        let dir = tempfile::TempDir::new().unwrap();
        for rel in files {
            let path = dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, rel.as_bytes()).unwrap();
        }
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        (dir, TreeWalker::new(root))
    }

    fn globs(
        include: &[&str],
        exclude: &[&str],
        strictness: Strictness,
        conjunction: Conjunction,
    ) -> PathGlobs {
        PathGlobs::new(
            include.iter().map(ToString::to_string).collect(),
            exclude.iter().map(ToString::to_string).collect(),
            strictness,
            conjunction,
        )
    }

    fn paths(resolution: &Resolution) -> Vec<&str> {
        resolution.paths.iter().map(|p| p.as_str()).collect()
    }

    #[test]
    fn matches_are_sorted_and_deduplicated() {
        let (_dir, walker) = tree(&["src/b.txt", "src/a.txt", "src/c.log"]);
        let globs = globs(
            // Both patterns match the same files; the union stays unique.
            &["src/*.txt", "src/*"],
            &[],
            Strictness::Error,
            Conjunction::AllMatch,
        );
        let resolution = resolve(&globs, &walker).unwrap();
        assert_eq!(paths(&resolution), ["src/a.txt", "src/b.txt", "src/c.log"]);
    }

    #[test]
    fn error_strictness_all_match_names_the_unmatched_pattern() {
        let (_dir, walker) = tree(&["src/a.txt", "src/b.txt"]);
        let globs = globs(
            &["src/*.txt", "missing/*.md"],
            &[],
            Strictness::Error,
            Conjunction::AllMatch,
        );
        let err = resolve(&globs, &walker).unwrap_err();
        assert!(matches!(
            err,
            ExpansionError::NoMatches { ref pattern } if pattern == "missing/*.md"
        ));
    }

    #[test]
    fn error_strictness_any_match_succeeds_when_union_is_nonempty() {
        let (_dir, walker) = tree(&["src/a.txt"]);
        let globs = globs(
            &["src/*.txt", "missing/*.md"],
            &[],
            Strictness::Error,
            Conjunction::AnyMatch,
        );
        let resolution = resolve(&globs, &walker).unwrap();
        assert_eq!(paths(&resolution), ["src/a.txt"]);
        assert!(resolution.unmatched_patterns.is_empty());
    }

    #[test]
    fn ignore_strictness_lets_unmatched_patterns_contribute_nothing() {
        let (_dir, walker) = tree(&["src/a.txt", "src/b.txt", "src/c.log"]);
        let globs = globs(
            &["src/*.txt", "missing/*.md"],
            &[],
            Strictness::Ignore,
            Conjunction::AnyMatch,
        );
        let resolution = resolve(&globs, &walker).unwrap();
        assert_eq!(paths(&resolution), ["src/a.txt", "src/b.txt"]);
        assert!(resolution.unmatched_patterns.is_empty());
    }

    #[test]
    fn warn_strictness_reports_unmatched_patterns_without_failing() {
        let (_dir, walker) = tree(&["src/a.txt"]);
        let globs = globs(
            &["src/*.txt", "missing/*.md"],
            &[],
            Strictness::Warn,
            Conjunction::AllMatch,
        );
        let resolution = resolve(&globs, &walker).unwrap();
        assert_eq!(paths(&resolution), ["src/a.txt"]);
        assert_eq!(resolution.unmatched_patterns, ["missing/*.md"]);
    }

    #[test]
    fn empty_union_fails_under_every_strictness() {
        let (_dir, walker) = tree(&["src/a.txt"]);
        for strictness in [Strictness::Error, Strictness::Warn, Strictness::Ignore] {
            for conjunction in [Conjunction::AllMatch, Conjunction::AnyMatch] {
                let globs = globs(&["missing/*.md"], &[], strictness, conjunction);
                let err = resolve(&globs, &walker).unwrap_err();
                match strictness {
                    Strictness::Error => assert!(matches!(err, ExpansionError::NoMatches { .. })),
                    _ => assert!(matches!(
                        err,
                        ExpansionError::ConjunctionUnsatisfied { .. }
                    )),
                }
            }
        }
    }

    #[test]
    fn excludes_are_subtracted_after_the_emptiness_checks() {
        let (_dir, walker) = tree(&["src/a.txt", "src/nested/b.txt", "src/c.log"]);
        let globs = globs(
            &["src/**"],
            &["src/*.log"],
            Strictness::Error,
            Conjunction::AllMatch,
        );
        let resolution = resolve(&globs, &walker).unwrap();
        assert_eq!(paths(&resolution), ["src/a.txt", "src/nested/b.txt"]);
    }

    #[test]
    fn exclusion_may_legitimately_empty_the_result() {
        let (_dir, walker) = tree(&["src/a.log"]);
        let globs = globs(
            &["src/**"],
            &["**/*.log"],
            Strictness::Error,
            Conjunction::AllMatch,
        );
        let resolution = resolve(&globs, &walker).unwrap();
        assert!(resolution.paths.is_empty());
    }

    #[test]
    fn exclude_pattern_matching_nothing_is_never_an_error() {
        let (_dir, walker) = tree(&["src/a.txt"]);
        let globs = globs(
            &["src/*.txt"],
            &["nothing/here/**"],
            Strictness::Error,
            Conjunction::AllMatch,
        );
        let resolution = resolve(&globs, &walker).unwrap();
        assert_eq!(paths(&resolution), ["src/a.txt"]);
    }

    #[test]
    fn malformed_patterns_fail_regardless_of_strictness() {
        let (_dir, walker) = tree(&["src/a.txt"]);
        for strictness in [Strictness::Error, Strictness::Warn, Strictness::Ignore] {
            let include = globs(&["src/[oops"], &[], strictness, Conjunction::AnyMatch);
            assert!(matches!(
                resolve(&include, &walker).unwrap_err(),
                ExpansionError::MalformedPattern(_)
            ));

            let exclude = globs(&["src/*.txt"], &["src/[oops"], strictness, Conjunction::AnyMatch);
            assert!(matches!(
                resolve(&exclude, &walker).unwrap_err(),
                ExpansionError::MalformedPattern(_)
            ));
        }
    }

    #[test]
    fn resolving_twice_is_idempotent() {
        let (_dir, walker) = tree(&["src/a.txt", "src/b.txt", "docs/c.md"]);
        let globs = globs(
            &["**/*.txt", "docs/*.md"],
            &[],
            Strictness::Error,
            Conjunction::AllMatch,
        );
        let first = resolve(&globs, &walker).unwrap();
        let second = resolve(&globs, &walker).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn output_order_does_not_depend_on_pattern_order() {
        let (_dir, walker) = tree(&["b.txt", "a.md"]);
        let forward = globs(&["*.txt", "*.md"], &[], Strictness::Error, Conjunction::AllMatch);
        let reversed = globs(&["*.md", "*.txt"], &[], Strictness::Error, Conjunction::AllMatch);
        assert_eq!(
            resolve(&forward, &walker).unwrap().paths,
            resolve(&reversed, &walker).unwrap().paths,
        );
    }
}
