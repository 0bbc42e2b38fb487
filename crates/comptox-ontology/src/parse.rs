//! Line-oriented parser for `.ont` ontology files.
//!
//! ```text
//! ontology <Name>
//! entity <Type> (<code>)[ : <Parent>][:]
//!   functional <property>
//!   multi <property>
//! relationship <name>: <Subject> -> <Object>[ inverse <name>]
//! ```
//!
//! `#` starts a comment. Property lines attach to the most recent `entity`
//! header. Structural checks that span declarations (parents, endpoints,
//! cardinality agreement) run in [`crate::Ontology::validate`].

use nom::{
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char as pchar, multispace0, multispace1},
    combinator::{all_consuming, opt, recognize},
    sequence::{delimited, preceded, tuple},
    IResult,
};
use std::collections::BTreeMap;

use crate::{EntityTypeDef, Ontology, OntologyError, PropertyDef, RelationshipTypeDef};

#[derive(Debug, Clone, PartialEq, Eq)]
struct EntityHeader {
    name: String,
    short_code: String,
    parent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RelationshipDecl {
    name: String,
    subject: String,
    object: String,
    inverse: Option<String>,
}

/// Parse ontology text without running cross-declaration validation.
pub fn parse_ontology(text: &str) -> Result<Ontology, OntologyError> {
    let mut name = "Unnamed".to_string();
    let mut entity_types: BTreeMap<String, EntityTypeDef> = BTreeMap::new();
    let mut relationship_types: BTreeMap<String, RelationshipTypeDef> = BTreeMap::new();
    let mut current_entity: Option<String> = None;

    for (i, raw) in text.lines().enumerate() {
        let line_no = i + 1;
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }
        let err = |message: String| OntologyError::Parse {
            line: line_no,
            message,
        };

        if let Some(rest) = line.strip_prefix("ontology ").map(str::trim) {
            if rest.is_empty() {
                return Err(err("ontology name missing".to_string()));
            }
            name = rest.to_string();
            current_entity = None;
            continue;
        }

        if let Some(rest) = line.strip_prefix("entity ").map(str::trim) {
            let header = parse_entity_header(rest).map_err(err)?;
            if entity_types.contains_key(&header.name) {
                return Err(err(format!("entity type `{}` declared twice", header.name)));
            }
            current_entity = Some(header.name.clone());
            entity_types.insert(
                header.name.clone(),
                EntityTypeDef {
                    name: header.name,
                    short_code: header.short_code,
                    parent: header.parent,
                    properties: BTreeMap::new(),
                },
            );
            continue;
        }

        if let Some(rest) = line.strip_prefix("relationship ").map(str::trim) {
            current_entity = None;
            let decl = parse_relationship(rest).map_err(err)?;
            let mut defs = vec![RelationshipTypeDef {
                name: decl.name.clone(),
                subject: decl.subject.clone(),
                object: decl.object.clone(),
                inverse: decl.inverse.clone(),
            }];
            if let Some(inverse) = &decl.inverse {
                if inverse == &decl.name {
                    return Err(err(format!(
                        "relationship `{}` cannot be its own inverse",
                        decl.name
                    )));
                }
                defs.push(RelationshipTypeDef {
                    name: inverse.clone(),
                    subject: decl.object.clone(),
                    object: decl.subject.clone(),
                    inverse: Some(decl.name.clone()),
                });
            }
            for def in defs {
                if relationship_types.contains_key(&def.name) {
                    return Err(err(format!("relationship `{}` declared twice", def.name)));
                }
                relationship_types.insert(def.name.clone(), def);
            }
            continue;
        }

        let property = if let Some(rest) = line.strip_prefix("functional ") {
            Some(PropertyDef::functional(rest.trim()))
        } else {
            line.strip_prefix("multi ")
                .map(|rest| PropertyDef::multi_valued(rest.trim()))
        };

        if let Some(property) = property {
            if !is_ident(&property.name) {
                return Err(err(format!("invalid property name `{}`", property.name)));
            }
            let Some(owner) = current_entity.as_ref().and_then(|n| entity_types.get_mut(n)) else {
                return Err(err(format!(
                    "property `{}` outside an entity declaration",
                    property.name
                )));
            };
            if owner.properties.contains_key(&property.name) {
                return Err(err(format!(
                    "property `{}` declared twice on `{}`",
                    property.name, owner.name
                )));
            }
            owner.properties.insert(property.name.clone(), property);
            continue;
        }

        return Err(err(format!("unrecognized line: {line}")));
    }

    Ok(Ontology::from_parts(name, entity_types, relationship_types))
}

fn strip_comment(line: &str) -> &str {
    line.split_once('#').map(|(before, _)| before).unwrap_or(line)
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_ident(s: &str) -> bool {
    all_consuming(parse_ident)(s).is_ok()
}

fn parse_ident(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        take_while1(is_ident_start),
        take_while(is_ident_continue),
    )))(input)
}

fn parse_entity_header(rest: &str) -> Result<EntityHeader, String> {
    fn parser(input: &str) -> IResult<&str, EntityHeader> {
        let (input, name) = parse_ident(input)?;
        let (input, _) = multispace1(input)?;
        let (input, code) = delimited(
            tuple((pchar('('), multispace0)),
            take_while1(is_ident_continue),
            tuple((multispace0, pchar(')'))),
        )(input)?;
        let (input, parent) = opt(preceded(
            tuple((multispace0, pchar(':'), multispace0)),
            parse_ident,
        ))(input)?;
        let (input, _) = multispace0(input)?;
        let (input, _) = opt(pchar(':'))(input)?;
        let (input, _) = multispace0(input)?;
        Ok((
            input,
            EntityHeader {
                name: name.to_string(),
                short_code: code.to_string(),
                parent: parent.map(str::to_string),
            },
        ))
    }

    all_consuming(parser)(rest.trim())
        .map(|(_, v)| v)
        .map_err(|_| "entity header expects: `entity <Type> (<code>)[ : <Parent>]`".to_string())
}

fn parse_relationship(rest: &str) -> Result<RelationshipDecl, String> {
    fn parser(input: &str) -> IResult<&str, RelationshipDecl> {
        let (input, name) = parse_ident(input)?;
        let (input, _) = tuple((multispace0, pchar(':'), multispace0))(input)?;
        let (input, subject) = parse_ident(input)?;
        let (input, _) = tuple((multispace0, tag("->"), multispace0))(input)?;
        let (input, object) = parse_ident(input)?;
        let (input, inverse) = opt(preceded(
            tuple((multispace1, tag("inverse"), multispace1)),
            parse_ident,
        ))(input)?;
        let (input, _) = multispace0(input)?;
        Ok((
            input,
            RelationshipDecl {
                name: name.to_string(),
                subject: subject.to_string(),
                object: object.to_string(),
                inverse: inverse.map(str::to_string),
            },
        ))
    }

    all_consuming(parser)(rest.trim()).map(|(_, v)| v).map_err(|_| {
        "relationship expects: `relationship <name>: <Subject> -> <Object>[ inverse <name>]`"
            .to_string()
    })
}
