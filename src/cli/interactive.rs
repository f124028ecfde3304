use std::io::{self, BufRead, Write};

use anyhow::{Result, anyhow};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Selection {
    All,
    None,
    Indices(Vec<usize>),
}

impl Selection {
    /// Resolves against a list of `len` entries, as 0-based indices.
    pub(crate) fn indices(&self, len: usize) -> Vec<usize> {
        match self {
            Selection::All => (0..len).collect(),
            Selection::None => Vec::new(),
            Selection::Indices(indices) => indices.clone(),
        }
    }
}

/// Prints a numbered menu on stderr and reads a selection from stdin.
/// Empty input means `default`.
pub(crate) fn prompt_selection(
    heading: &str,
    labels: &[String],
    default: Selection,
) -> Result<Selection> {
    let mut stderr = io::stderr().lock();
    writeln!(stderr, "{heading}")?;
    for (i, label) in labels.iter().enumerate() {
        writeln!(stderr, "  {:>2}) {label}", i + 1)?;
    }
    let default_label = match &default {
        Selection::All => "all",
        _ => "none",
    };
    write!(
        stderr,
        "Select entries (e.g. 1,3-5 / all / none) [default: {default_label}]: "
    )?;
    stderr.flush()?;

    let mut input = String::new();
    let mut stdin = io::stdin().lock();
    let n = stdin.read_line(&mut input)?;
    if n == 0 {
        return Ok(Selection::None);
    }
    if input.trim().is_empty() {
        return Ok(default);
    }
    parse_selection(&input, labels.len())
}

pub(crate) fn parse_selection(input: &str, max: usize) -> Result<Selection> {
    if max == 0 {
        return Ok(Selection::None);
    }

    let s = input.trim();
    if s.is_empty() {
        return Ok(Selection::All);
    }

    let s = s.to_ascii_lowercase();
    match s.as_str() {
        "all" | "*" => return Ok(Selection::All),
        "none" | "no" | "n" | "q" | "quit" => return Ok(Selection::None),
        _ => {}
    }

    let mut selected = vec![false; max];
    for token in s.split(|c: char| c == ',' || c.is_whitespace()) {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }

        if let Some((start, end)) = token.split_once('-') {
            let start = start
                .trim()
                .parse::<usize>()
                .map_err(|_| anyhow!("invalid range start: {token}"))?;
            let end = end
                .trim()
                .parse::<usize>()
                .map_err(|_| anyhow!("invalid range end: {token}"))?;
            if start == 0 || end == 0 {
                return Err(anyhow!("selection is 1-based (0 is not allowed): {token}"));
            }
            if start > end {
                return Err(anyhow!("invalid range (start > end): {token}"));
            }
            if end > max {
                return Err(anyhow!("selection out of range (max {max}): {token}"));
            }
            for i in start..=end {
                selected[i - 1] = true;
            }
        } else {
            let idx = token
                .parse::<usize>()
                .map_err(|_| anyhow!("invalid selection: {token}"))?;
            if idx == 0 {
                return Err(anyhow!("selection is 1-based (0 is not allowed): {token}"));
            }
            if idx > max {
                return Err(anyhow!("selection out of range (max {max}): {token}"));
            }
            selected[idx - 1] = true;
        }
    }

    let indices: Vec<usize> = selected
        .into_iter()
        .enumerate()
        .filter_map(|(idx, on)| on.then_some(idx))
        .collect();

    if indices.is_empty() {
        return Err(anyhow!("nothing selected (use 'all' or 'none')"));
    }

    Ok(Selection::Indices(indices))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_selection_keywords() {
        assert_eq!(parse_selection("", 3).unwrap(), Selection::All);
        assert_eq!(parse_selection("ALL", 2).unwrap(), Selection::All);
        for s in ["none", "no", "n", "q", "quit"] {
            assert_eq!(parse_selection(s, 2).unwrap(), Selection::None);
        }
        assert_eq!(parse_selection("1", 0).unwrap(), Selection::None);
    }

    #[test]
    fn parse_selection_numbers_and_ranges() {
        assert_eq!(
            parse_selection("1,3-4", 5).unwrap(),
            Selection::Indices(vec![0, 2, 3])
        );
        assert_eq!(
            parse_selection("4 2 2", 5).unwrap(),
            Selection::Indices(vec![1, 3])
        );
    }

    #[test]
    fn parse_selection_rejects_bad_input() {
        assert!(parse_selection("3", 2).is_err());
        assert!(parse_selection("0", 2).is_err());
        assert!(parse_selection("2-1", 2).is_err());
        assert!(parse_selection("medical", 2).is_err());
        assert!(parse_selection(",", 2).is_err());
    }

    #[test]
    fn selection_resolves_to_indices() {
        assert_eq!(Selection::All.indices(3), vec![0, 1, 2]);
        assert!(Selection::None.indices(3).is_empty());
        assert_eq!(Selection::Indices(vec![1]).indices(3), vec![1]);
    }
}
