//! Parser for the C definitions block at the top of a script.
//!
//! Only record definitions are understood; typedefs, enums, prototypes and
//! preprocessor lines are skipped.

use crate::language::{
    structs::StructRegistry,
    types::{Field, Record, SizedType},
};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_until},
    character::complete::{alpha1, alphanumeric1, char, digit1, multispace1, not_line_ending},
    combinator::{map, map_res, recognize},
    multi::{many0, many0_count, many1, separated_list1},
    sequence::{delimited, pair, preceded},
    IResult,
};
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CDefError {
    #[error("invalid C definitions near '{near}'")]
    Syntax { near: String },
    #[error("unknown type '{ty}' for field '{field}' of {record}")]
    UnknownType {
        ty: String,
        field: String,
        record: String,
    },
    #[error("field '{field}' of {record} has incomplete type '{ty}'")]
    IncompleteType {
        ty: String,
        field: String,
        record: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum DeclItem {
    Star,
    Word(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Declarator {
    items: Vec<DeclItem>,
    dims: Vec<usize>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct RawField {
    base: Vec<String>,
    pointers: usize,
    name: String,
    dims: Vec<usize>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct RawRecord {
    is_union: bool,
    name: String,
    fields: Vec<RawField>,
}

fn line_comment(input: &str) -> IResult<&str, &str> {
    preceded(tag("//"), not_line_ending)(input)
}

fn block_comment(input: &str) -> IResult<&str, &str> {
    delimited(tag("/*"), take_until("*/"), tag("*/"))(input)
}

fn preprocessor(input: &str) -> IResult<&str, &str> {
    preceded(char('#'), not_line_ending)(input)
}

fn trivia(input: &str) -> IResult<&str, ()> {
    let (input, _) = many0_count(alt((multispace1, line_comment, block_comment, preprocessor)))(input)?;
    Ok((input, ()))
}

fn identifier(input: &str) -> IResult<&str, &str> {
    let (input, _) = trivia(input)?;
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0_count(alt((alphanumeric1, tag("_")))),
    ))(input)
}

fn symbol<'a>(expected: char) -> impl FnMut(&'a str) -> IResult<&'a str, char> {
    move |input| {
        let (input, _) = trivia(input)?;
        char(expected)(input)
    }
}

fn decl_item(input: &str) -> IResult<&str, DeclItem> {
    alt((
        map(symbol('*'), |_| DeclItem::Star),
        map(identifier, |word| DeclItem::Word(word.to_string())),
    ))(input)
}

fn array_dim(input: &str) -> IResult<&str, usize> {
    let (input, _) = symbol('[')(input)?;
    let (input, _) = trivia(input)?;
    let (input, len) = map_res(digit1, str::parse::<usize>)(input)?;
    let (input, _) = symbol(']')(input)?;
    Ok((input, len))
}

fn declarator(input: &str) -> IResult<&str, Declarator> {
    let (input, items) = many1(decl_item)(input)?;
    let (input, dims) = many0(array_dim)(input)?;
    Ok((input, Declarator { items, dims }))
}

/// `unsigned long a, *b[4];`
fn field_declaration(input: &str) -> IResult<&str, Vec<RawField>> {
    let (input, declarators) = separated_list1(symbol(','), declarator)(input)?;
    let (input, _) = symbol(';')(input)?;

    let mut fields = Vec::with_capacity(declarators.len());
    let mut base: Vec<String> = Vec::new();
    for (idx, decl) in declarators.into_iter().enumerate() {
        let mut words: Vec<String> = Vec::new();
        let mut pointers = 0;
        for item in decl.items {
            match item {
                DeclItem::Star => pointers += 1,
                DeclItem::Word(word) => words.push(word),
            }
        }
        let Some(name) = words.pop() else {
            return Err(nom::Err::Failure(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Verify,
            )));
        };
        if idx == 0 {
            base = words;
        }
        fields.push(RawField {
            base: base.clone(),
            pointers,
            name,
            dims: decl.dims,
        });
    }
    Ok((input, fields))
}

fn record_definition(input: &str) -> IResult<&str, RawRecord> {
    let (input, keyword) = identifier(input)?;
    let is_union = match keyword {
        "struct" => false,
        "union" => true,
        _ => {
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Tag,
            )))
        }
    };
    let (input, name) = identifier(input)?;
    let (input, _) = symbol('{')(input)?;
    let (input, fields) = many0(field_declaration)(input)?;
    let (input, _) = symbol('}')(input)?;
    let (input, _) = symbol(';')(input)?;
    Ok((
        input,
        RawRecord {
            is_union,
            name: name.to_string(),
            fields: fields.into_iter().flatten().collect(),
        },
    ))
}

/// Consumes any other top-level statement up to its terminating `;`,
/// including braced bodies.
fn skipped_statement(input: &str) -> IResult<&str, ()> {
    let (input, _) = trivia(input)?;
    let mut depth = 0usize;
    for (pos, c) in input.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ';' if depth == 0 => return Ok((&input[pos + 1..], ())),
            _ => {}
        }
    }
    Err(nom::Err::Error(nom::error::Error::new(
        input,
        nom::error::ErrorKind::TakeUntil,
    )))
}

fn definitions(input: &str) -> IResult<&str, Vec<RawRecord>> {
    let (input, items) = many0(alt((
        map(record_definition, Some),
        map(skipped_statement, |_| None),
    )))(input)?;
    let (input, _) = trivia(input)?;
    Ok((input, items.into_iter().flatten().collect()))
}

fn integer_typedef(name: &str) -> Option<SizedType> {
    let name = name.trim_start_matches('_');
    let (signed, bits) = if let Some(rest) = name.strip_prefix("uint") {
        (false, rest.strip_suffix("_t")?)
    } else if let Some(rest) = name.strip_prefix("int") {
        (true, rest.strip_suffix("_t")?)
    } else if let Some(rest) = name.strip_prefix('u') {
        (false, rest)
    } else if let Some(rest) = name.strip_prefix('s') {
        (true, rest)
    } else {
        return None;
    };
    match bits.parse::<u8>().ok()? {
        bits @ (8 | 16 | 32 | 64) => Some(SizedType::Integer { bits, signed }),
        _ => None,
    }
}

fn base_type(words: &[String]) -> Option<SizedType> {
    let unsigned = words.iter().any(|w| w == "unsigned");
    let core: Vec<&str> = words
        .iter()
        .map(String::as_str)
        .filter(|w| !matches!(*w, "const" | "volatile" | "signed" | "unsigned"))
        .collect();
    let core = match core.as_slice() {
        [rest @ .., "int"] if !rest.is_empty() => rest,
        other => other,
    };
    let bits = match core {
        [] | ["int"] => 32,
        ["char"] => 8,
        ["short"] => 16,
        ["long"] | ["long", "long"] => 64,
        ["bool"] | ["_Bool"] => return Some(SizedType::uint(8)),
        ["void"] => return Some(SizedType::Void),
        ["size_t"] => return Some(SizedType::uint64()),
        ["ssize_t"] => return Some(SizedType::int64()),
        ["pid_t"] => return Some(SizedType::int(32)),
        [name] => return integer_typedef(name),
        _ => return None,
    };
    Some(if unsigned {
        SizedType::uint(bits)
    } else {
        SizedType::int(bits)
    })
}

fn field_type(
    field: &RawField,
    record_name: &str,
    registry: &StructRegistry,
) -> Result<SizedType, CDefError> {
    let ty_name = field.base.join(" ");
    let mut ty = match field.base.as_slice() {
        [kind, name] if kind == "struct" || kind == "union" => {
            let full = format!("{kind} {name}");
            match registry.get(&full) {
                Some(record) if record.is_resolved() => SizedType::Record(record.clone()),
                _ if field.pointers > 0 => SizedType::Record(Record::named(full)),
                _ => {
                    return Err(CDefError::IncompleteType {
                        ty: ty_name,
                        field: field.name.clone(),
                        record: record_name.to_string(),
                    })
                }
            }
        }
        words => base_type(words).ok_or_else(|| CDefError::UnknownType {
            ty: ty_name.clone(),
            field: field.name.clone(),
            record: record_name.to_string(),
        })?,
    };
    if ty.is_void() && field.pointers == 0 {
        return Err(CDefError::IncompleteType {
            ty: ty_name,
            field: field.name.clone(),
            record: record_name.to_string(),
        });
    }
    for _ in 0..field.pointers {
        ty = SizedType::pointer(ty);
    }
    for len in field.dims.iter().rev() {
        ty = SizedType::array(ty, *len);
    }
    Ok(ty)
}

fn build_record(raw: &RawRecord, registry: &StructRegistry) -> Result<Record, Vec<CDefError>> {
    let name = format!("{} {}", if raw.is_union { "union" } else { "struct" }, raw.name);
    let mut fields = Vec::with_capacity(raw.fields.len());
    let mut errors = Vec::new();
    for field in &raw.fields {
        match field_type(field, &name, registry) {
            Ok(ty) => fields.push((field.name.clone(), ty)),
            Err(err) => errors.push(err),
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }
    if !raw.is_union {
        return Ok(Record::with_fields(name, fields));
    }
    let size = fields.iter().map(|(_, ty)| ty.size()).max().unwrap_or(0);
    Ok(Record {
        name,
        fields: fields
            .into_iter()
            .map(|(name, ty)| Field {
                name,
                ty,
                offset: 0,
            })
            .collect(),
        size,
    })
}

/// Parses `source` and adds every record it defines to `registry`. Records
/// may refer to records defined earlier in the same text or already present
/// in the registry. Returns the names of the new records.
pub fn parse_definitions(
    source: &str,
    registry: &mut StructRegistry,
) -> Result<Vec<String>, Vec<CDefError>> {
    let raw = match definitions(source) {
        Ok(("", raw)) => raw,
        Ok((rest, _)) | Err(nom::Err::Error(nom::error::Error { input: rest, .. }))
        | Err(nom::Err::Failure(nom::error::Error { input: rest, .. })) => {
            let near: String = rest.chars().take(20).collect();
            return Err(vec![CDefError::Syntax { near }]);
        }
        Err(nom::Err::Incomplete(_)) => {
            return Err(vec![CDefError::Syntax {
                near: String::new(),
            }])
        }
    };

    let mut names = Vec::with_capacity(raw.len());
    let mut errors = Vec::new();
    for record in &raw {
        match build_record(record, registry) {
            Ok(built) => {
                names.push(built.name.clone());
                registry.insert(built);
            }
            Err(errs) => errors.extend(errs),
        }
    }
    if errors.is_empty() {
        Ok(names)
    } else {
        Err(errors)
    }
}
