use nom::IResult;
use nom::branch::alt;
use nom::bytes::complete::{tag, take_until, take_while, take_while1};
use nom::character::complete::{char, line_ending, multispace0, multispace1, not_line_ending};
use nom::combinator::{map, opt, peek, recognize};
use nom::multi::many0;
use nom::sequence::{delimited, pair, preceded, tuple};

use super::token::AttrList;

/// Result of scanning one `<…>` tag.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct HtmlTagScan {
    pub closing: bool,
    pub name: String,
    pub attributes: AttrList,
    pub self_closing: bool,
}

fn tag_name(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic()),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '-'),
    ))(input)
}

fn attribute_value(input: &str) -> IResult<&str, String> {
    alt((
        map(
            delimited(char('"'), take_while(|c: char| c != '"'), char('"')),
            str::to_string,
        ),
        map(
            delimited(char('\''), take_while(|c: char| c != '\''), char('\'')),
            str::to_string,
        ),
        map(
            take_while1(|c: char| !c.is_whitespace() && c != '>' && c != '/'),
            str::to_string,
        ),
    ))(input)
}

/// One `name` or `name="value"` pair. Values may be double-quoted,
/// single-quoted, or bare.
pub(super) fn scan_attribute(input: &str) -> IResult<&str, (String, Option<String>)> {
    let (rest, name) = take_while1(|c: char| {
        c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':'
    })(input)?;
    let (rest, value) = opt(preceded(
        tuple((multispace0, char('='), multispace0)),
        attribute_value,
    ))(rest)?;
    Ok((rest, (name.to_string(), value)))
}

/// Scans a full `<…>` tag: optional leading `/` for closing tags,
/// whitespace-separated attributes, optional trailing `/` for
/// self-closing tags.
pub(super) fn scan_html_tag(input: &str) -> IResult<&str, HtmlTagScan> {
    let (rest, (_, closing, name)) = tuple((char('<'), opt(char('/')), tag_name))(input)?;
    let (rest, attributes) = many0(preceded(multispace1, scan_attribute))(rest)?;
    let (rest, _) = multispace0(rest)?;
    let (rest, self_slash) = opt(char('/'))(rest)?;
    let (rest, _) = char('>')(rest)?;
    Ok((
        rest,
        HtmlTagScan {
            closing: closing.is_some(),
            name: name.to_string(),
            attributes,
            self_closing: self_slash.is_some(),
        },
    ))
}

/// True when the input could be the start of an HTML tag, i.e. `<`
/// followed by an optional `/` and a letter. Anything else rewinds to
/// plain text without attempting an attribute scan.
pub(super) fn looks_like_tag(input: &str) -> bool {
    let mut chars = input.chars();
    if chars.next() != Some('<') {
        return false;
    }
    match chars.next() {
        Some('/') => chars.next().is_some_and(|c| c.is_ascii_alphabetic()),
        Some(c) => c.is_ascii_alphabetic(),
        None => false,
    }
}

/// Scans the URI body of a link, starting at `](`. The URI runs up to
/// the closing `)`, which is *not* consumed — it is tokenized
/// separately as the link end. A `<…>`-bracketed URI may itself
/// contain parentheses; the brackets are stripped.
pub(super) fn scan_link_target(input: &str) -> IResult<&str, String> {
    let (rest, _) = tag("](")(input)?;
    let (rest, uri) = alt((
        map(
            delimited(
                char('<'),
                take_while(|c: char| c != '>' && c != '\n'),
                char('>'),
            ),
            str::to_string,
        ),
        map(take_while(|c: char| c != ')' && c != '\n'), str::to_string),
    ))(rest)?;
    let (rest, _) = peek(char(')'))(rest)?;
    Ok((rest, uri))
}

/// Scans `[^ref]` with an optional trailing `:`. Returns the label and
/// whether the colon (definition form) was present.
pub(super) fn scan_footnote(input: &str) -> IResult<&str, (String, bool)> {
    let (rest, _) = tag("[^")(input)?;
    let (rest, label) =
        take_while1(|c: char| c.is_alphanumeric() || c == '-' || c == '_')(rest)?;
    let (rest, _) = char(']')(rest)?;
    let (rest, colon) = opt(char(':'))(rest)?;
    Ok((rest, (label.to_string(), colon.is_some())))
}

/// The info string after an opening fence: text up to the next
/// whitespace.
pub(super) fn scan_fence_info(input: &str) -> IResult<&str, &str> {
    take_while(|c: char| !c.is_whitespace())(input)
}

/// Byte length of the `+++ … +++` frontmatter block at the start of the
/// source, including the closing fence line. `None` when the source
/// does not open with a complete frontmatter block; an unterminated
/// opening fence is ordinary text.
pub(crate) fn frontmatter_end(source: &str) -> Option<usize> {
    let result: IResult<&str, &str> = recognize(tuple((
        tag("+++"),
        line_ending,
        take_until("\n+++"),
        tag("\n+++"),
        opt(not_line_ending),
        opt(line_ending),
    )))(source);
    match result {
        Ok((_, consumed)) => Some(consumed.len()),
        Err(_) => None,
    }
}
