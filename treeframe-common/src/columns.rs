use glob::{MatchOptions, Pattern};
use indexmap::IndexSet;

#[derive(Debug, thiserror::Error)]
pub enum ColumnSelectionError {
    #[error("Pattern '{0}' didn't match any branch")]
    PatternNotFound(String),
    #[error("Invalid column pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Index of the `]` that closes the character class opened at `start`.
///
/// A `!` right after the `[` negates the class, and a `]` right after that
/// belongs to the class instead of closing it.
fn class_end(chars: &[char], start: usize) -> Option<usize> {
    let mut first = start + 1;
    if chars.get(first) == Some(&'!') {
        first += 1;
    }
    if chars.get(first) == Some(&']') {
        first += 1;
    }
    chars
        .get(first..)?
        .iter()
        .position(|c| *c == ']')
        .map(|offset| first + offset)
}

/// Compiles a shell pattern for matching against a whole column name.
///
/// Column names have no path separators, so runs of `*` collapse into one
/// instead of being read as a recursive `**` wildcard. A `[` without a
/// closing `]` is a literal character.
fn compile(pattern: &str) -> Result<Pattern, ColumnSelectionError> {
    let chars = pattern.chars().collect::<Vec<_>>();
    let mut glob = String::with_capacity(pattern.len());

    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' if glob.ends_with('*') => {}
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    glob.extend(&chars[i..=end]);
                    i = end;
                }
                None => glob.push_str("[[]"),
            },
            c => glob.push(c),
        }
        i += 1;
    }

    Pattern::new(&glob).map_err(|source| ColumnSelectionError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Resolves shell patterns (`*`, `?`, `[...]`) against the available columns.
///
/// Patterns are processed in order and, for each pattern, columns in the
/// order they are available. A column is selected the first time any
/// pattern matches it and is never repeated. Patterns are not brace
/// expanded here, see [`crate::expand_patterns`].
///
/// With `fail_on_no_match` a pattern matching nothing fails with
/// [`ColumnSelectionError::PatternNotFound`], otherwise it is skipped.
pub fn select_columns<C, P>(
    available: &[C],
    patterns: &[P],
    fail_on_no_match: bool,
) -> Result<Vec<String>, ColumnSelectionError>
where
    C: AsRef<str>,
    P: AsRef<str>,
{
    let mut selected = IndexSet::new();

    for pattern in patterns {
        let pattern = pattern.as_ref();
        let compiled = compile(pattern)?;

        let mut found = false;
        for column in available {
            let column = column.as_ref();
            if compiled.matches_with(column, MATCH_OPTIONS) {
                found = true;
                selected.insert(column.to_string());
            }
        }

        tracing::trace!("Column pattern '{}' matched: {}", pattern, found);
        if !found && fail_on_no_match {
            return Err(ColumnSelectionError::PatternNotFound(pattern.to_string()));
        }
    }

    Ok(selected.into_iter().collect())
}
