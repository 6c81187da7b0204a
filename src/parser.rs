// https://github.com/Geal/nom/blob/master/doc/choosing_a_combinator.md

use log::warn;
use nom::{
    bytes::complete::take_till1,
    character::complete::{space0, space1},
    multi::separated_list0,
    IResult,
};

fn is_separator(chr: char) -> bool {
    chr == ' ' || chr == '\t'
}

/// Splits a line into words separated by runs of spaces and tabs.
pub(crate) fn parse(input: &str) -> IResult<&str, Vec<&str>> {
    let (i, _) = space0(input)?; // ignore all leading space
    let (i, words) = separated_list0(space1, take_till1(is_separator))(i)?;
    let (i, _) = space0(i)?;

    Ok((i, words))
}

/// Tokenizes one input line into owned words.
///
/// Anything from the first newline on is ignored. At most `limit` tokens are
/// returned, the remainder of the line is dropped.
pub fn tokenize(line: &str, limit: usize) -> Vec<String> {
    let line = match line.find('\n') {
        Some(end) => &line[..end],
        None => line,
    };

    let words = match parse(line) {
        Ok((_, words)) => words,
        Err(_) => return Vec::new(),
    };

    if words.len() > limit {
        warn!(
            "dropping {} token(s) beyond the {} argument limit",
            words.len() - limit,
            limit
        );
    }

    words.into_iter().take(limit).map(str::to_owned).collect()
}
