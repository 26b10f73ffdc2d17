use indexmap::IndexSet;

/// A parsed pattern is a sequence of these nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Literal(String),
    /// `{a,b,...}`: each alternative is itself a sequence of nodes.
    Alternation(Vec<Vec<Node>>),
}

struct BraceParser {
    chars: Vec<char>,
    pos: usize,
}

impl BraceParser {
    fn parse(input: &str) -> Vec<Node> {
        let mut parser = Self {
            chars: input.chars().collect(),
            pos: 0,
        };
        parser.sequence(false)
    }

    /// Reads nodes up to the end of input or, inside a group, up to the next
    /// unescaped `,` or `}` (left unconsumed).
    fn sequence(&mut self, in_group: bool) -> Vec<Node> {
        let mut nodes = Vec::new();
        let mut literal = String::new();

        while let Some(&c) = self.chars.get(self.pos) {
            match c {
                '\\' if matches!(self.chars.get(self.pos + 1), Some('{' | '}' | ',')) => {
                    literal.push(self.chars[self.pos + 1]);
                    self.pos += 2;
                }
                ',' | '}' if in_group => break,
                '{' => {
                    let open = self.pos;
                    self.pos += 1;
                    match self.group() {
                        Some(group) => {
                            if !literal.is_empty() {
                                nodes.push(Node::Literal(std::mem::take(&mut literal)));
                            }
                            nodes.extend(group);
                        }
                        None => {
                            // Never closed: the brace is plain text.
                            self.pos = open + 1;
                            literal.push('{');
                        }
                    }
                }
                _ => {
                    literal.push(c);
                    self.pos += 1;
                }
            }
        }

        if !literal.is_empty() {
            nodes.push(Node::Literal(literal));
        }
        nodes
    }

    /// Parses a group body after its `{`. Returns `None` when the input ends
    /// before the matching `}`.
    fn group(&mut self) -> Option<Vec<Node>> {
        let mut alternatives = vec![self.sequence(true)];
        loop {
            match self.chars.get(self.pos) {
                Some(',') => {
                    self.pos += 1;
                    alternatives.push(self.sequence(true));
                }
                Some('}') => {
                    self.pos += 1;
                    break;
                }
                _ => return None,
            }
        }

        if alternatives.len() == 1 {
            // `{x}` has nothing to choose between and stays literal.
            let mut nodes = vec![Node::Literal("{".to_string())];
            nodes.extend(alternatives.remove(0));
            nodes.push(Node::Literal("}".to_string()));
            Some(nodes)
        } else {
            Some(vec![Node::Alternation(alternatives)])
        }
    }
}

fn flatten(nodes: &[Node]) -> Vec<String> {
    let mut expanded = vec![String::new()];
    for node in nodes {
        match node {
            Node::Literal(text) => expanded.iter_mut().for_each(|prefix| prefix.push_str(text)),
            Node::Alternation(alternatives) => {
                let suffixes = alternatives
                    .iter()
                    .flat_map(|alternative| flatten(alternative))
                    .collect::<Vec<_>>();
                expanded = expanded
                    .iter()
                    .flat_map(|prefix| suffixes.iter().map(move |suffix| format!("{prefix}{suffix}")))
                    .collect();
            }
        }
    }
    expanded
}

/// Expands shell-style brace alternation, e.g. `A{B,C}*` into `AB*` and `AC*`.
///
/// Sequential groups produce their cartesian product and nested groups are
/// expanded recursively. A group without a comma (`{x}`) or one that is never
/// closed is kept as literal text. `\{`, `\}` and `\,` escape the brace
/// characters and lose their backslash; every other character, glob
/// wildcards included, passes through untouched.
///
/// The result holds no duplicates. Its order follows the pattern left to
/// right but callers should treat it as a set.
pub fn expand_braces(pattern: &str) -> Vec<String> {
    let nodes = BraceParser::parse(pattern);
    flatten(&nodes)
        .into_iter()
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}

/// Brace-expands every pattern and flattens the results into one list.
pub fn expand_patterns<I, S>(patterns: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    patterns
        .into_iter()
        .flat_map(|pattern| expand_braces(pattern.as_ref()))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn set(values: &[&str]) -> HashSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn expanded_set(pattern: &str) -> HashSet<String> {
        expand_braces(pattern).into_iter().collect()
    }

    #[test]
    fn test_no_braces_is_identity() {
        for pattern in ["", "abc", "A*", "x?[0-9]", "a,b"] {
            assert_eq!(expand_braces(pattern), vec![pattern.to_string()]);
        }
    }

    #[test]
    fn test_single_group() {
        assert_eq!(expanded_set("A{B,C}"), set(&["AB", "AC"]));
    }

    #[test]
    fn test_sequential_groups() {
        assert_eq!(
            expanded_set("{A,B}{C,D}"),
            set(&["AC", "AD", "BC", "BD"])
        );
    }

    #[test]
    fn test_group_with_wildcards() {
        assert_eq!(expanded_set("A{B,C}*"), set(&["AB*", "AC*"]));
    }

    #[test]
    fn test_nested_group() {
        assert_eq!(expanded_set("{a,{b,c}}d"), set(&["ad", "bd", "cd"]));
    }

    #[test]
    fn test_empty_alternative() {
        assert_eq!(expanded_set("x{,y}"), set(&["x", "xy"]));
    }

    #[test]
    fn test_duplicates_removed() {
        assert_eq!(expand_braces("{a,a}"), vec!["a".to_string()]);
    }

    #[test]
    fn test_group_without_comma_is_literal() {
        assert_eq!(expand_braces("A{B}"), vec!["A{B}".to_string()]);
        assert_eq!(expand_braces("{}"), vec!["{}".to_string()]);
    }

    #[test]
    fn test_escaped_braces_are_unescaped() {
        assert_eq!(expand_braces("A\\}B"), vec!["A}B".to_string()]);
        assert_eq!(expand_braces("\\{A,B\\}"), vec!["{A,B}".to_string()]);
    }

    #[test]
    fn test_unbalanced_brace_is_literal() {
        assert_eq!(expand_braces("A{B,C"), vec!["A{B,C".to_string()]);
        assert_eq!(expand_braces("A}B"), vec!["A}B".to_string()]);
        assert_eq!(expand_braces("{a,{b}"), vec!["{a,{b}".to_string()]);
    }

    #[test]
    fn test_expand_patterns_flattens() {
        let expanded = expand_patterns(["A{B,C}", "D"]);
        assert_eq!(expanded.len(), 3);
        assert!(expanded.contains(&"D".to_string()));
    }
}
