//! Validation instructions: trees of check references.
//!
//! JSON forms:
//!
//! ```text
//! "isString"                                   leaf shorthand
//! {"check": "hasLength", "args": [3]}          leaf
//! {"check": "isEmpty", "negate": true}         negated leaf
//! {"$all": [<instruction>, ...]}               AND, short-circuiting
//! {"$any": [<instruction>, ...]}               OR, short-circuiting
//! ```

use crate::error::InstructionError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use std::fmt;

pub const ALL_KEY: &str = "$all";
pub const ANY_KEY: &str = "$any";

/// Reference to a registered check, with arguments and negation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckRef {
    #[serde(rename = "check")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Json>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub negate: bool,
}

impl CheckRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            negate: false,
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = Json>) -> Self {
        self.args = args.into_iter().collect();
        self
    }

    pub fn negated(mut self) -> Self {
        self.negate = !self.negate;
        self
    }
}

impl fmt::Display for CheckRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negate {
            f.write_str("not ")?;
        }
        f.write_str(&self.name)?;
        if !self.args.is_empty() {
            let args: Vec<String> = self.args.iter().map(Json::to_string).collect();
            write!(f, "({})", args.join(", "))?;
        }
        Ok(())
    }
}

/// A validation instruction tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Json", into = "Json")]
pub enum Instruction {
    Check(CheckRef),
    All(Vec<Instruction>),
    Any(Vec<Instruction>),
}

impl Instruction {
    pub fn check(name: impl Into<String>) -> Self {
        Instruction::Check(CheckRef::new(name))
    }

    pub fn check_with(name: impl Into<String>, args: impl IntoIterator<Item = Json>) -> Self {
        Instruction::Check(CheckRef::new(name).with_args(args))
    }

    pub fn all(children: impl IntoIterator<Item = Instruction>) -> Self {
        Instruction::All(children.into_iter().collect())
    }

    pub fn any(children: impl IntoIterator<Item = Instruction>) -> Self {
        Instruction::Any(children.into_iter().collect())
    }

    /// Negate a leaf. Combinators are negated via De Morgan so the tree
    /// keeps only leaf-level negation.
    pub fn negated(self) -> Self {
        match self {
            Instruction::Check(leaf) => Instruction::Check(leaf.negated()),
            Instruction::All(children) => {
                Instruction::Any(children.into_iter().map(Instruction::negated).collect())
            }
            Instruction::Any(children) => {
                Instruction::All(children.into_iter().map(Instruction::negated).collect())
            }
        }
    }

    /// Parse an instruction from its JSON form.
    pub fn parse(json: &Json) -> Result<Self, InstructionError> {
        parse_at(json, "$")
    }

    /// Reject combinators without children anywhere in the tree.
    ///
    /// [`parse`](Self::parse) never yields one, but [`all`](Self::all) and
    /// [`any`](Self::any) accept an empty list.
    pub fn check_shape(&self) -> Result<(), InstructionError> {
        let (key, children) = match self {
            Instruction::Check(_) => return Ok(()),
            Instruction::All(children) => (ALL_KEY, children),
            Instruction::Any(children) => (ANY_KEY, children),
        };
        if children.is_empty() {
            return Err(InstructionError::EmptyCombinator(key));
        }
        children.iter().try_for_each(Instruction::check_shape)
    }

    /// Every leaf in evaluation order.
    pub fn leaves(&self) -> Vec<&CheckRef> {
        let mut out = Vec::new();
        collect_leaves(self, &mut out);
        out
    }

    pub fn to_json(&self) -> Json {
        match self {
            Instruction::Check(leaf) => {
                if leaf.args.is_empty() && !leaf.negate {
                    Json::String(leaf.name.clone())
                } else {
                    serde_json::to_value(leaf).unwrap_or(Json::Null)
                }
            }
            Instruction::All(children) => combinator_json(ALL_KEY, children),
            Instruction::Any(children) => combinator_json(ANY_KEY, children),
        }
    }
}

fn combinator_json(key: &str, children: &[Instruction]) -> Json {
    let mut map = Map::new();
    map.insert(
        key.to_string(),
        Json::Array(children.iter().map(Instruction::to_json).collect()),
    );
    Json::Object(map)
}

fn collect_leaves<'a>(instruction: &'a Instruction, out: &mut Vec<&'a CheckRef>) {
    match instruction {
        Instruction::Check(leaf) => out.push(leaf),
        Instruction::All(children) | Instruction::Any(children) => {
            for child in children {
                collect_leaves(child, out);
            }
        }
    }
}

fn malformed(path: &str, message: impl Into<String>) -> InstructionError {
    InstructionError::Malformed {
        path: path.to_string(),
        message: message.into(),
    }
}

fn parse_children(
    json: &Json,
    path: &str,
    key: &'static str,
) -> Result<Vec<Instruction>, InstructionError> {
    let items = json
        .as_array()
        .ok_or_else(|| malformed(path, format!("`{key}` must be an array")))?;
    if items.is_empty() {
        return Err(InstructionError::EmptyCombinator(key));
    }
    items
        .iter()
        .enumerate()
        .map(|(i, item)| parse_at(item, &format!("{path}.{key}[{i}]")))
        .collect()
}

fn parse_at(json: &Json, path: &str) -> Result<Instruction, InstructionError> {
    let map = match json {
        Json::String(name) if !name.is_empty() => return Ok(Instruction::check(name.as_str())),
        Json::String(_) => return Err(malformed(path, "check name must not be empty")),
        Json::Object(map) => map,
        other => {
            return Err(malformed(
                path,
                format!("expected string or object, got {other}"),
            ));
        }
    };

    match (map.get(ALL_KEY), map.get(ANY_KEY)) {
        (Some(_), Some(_)) => return Err(InstructionError::AmbiguousCombinator),
        (Some(children), None) => {
            expect_only_key(map, ALL_KEY, path)?;
            return parse_children(children, path, ALL_KEY).map(Instruction::All);
        }
        (None, Some(children)) => {
            expect_only_key(map, ANY_KEY, path)?;
            return parse_children(children, path, ANY_KEY).map(Instruction::Any);
        }
        (None, None) => {}
    }

    let name = map
        .get("check")
        .and_then(Json::as_str)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| malformed(path, "leaf requires a non-empty `check` name"))?;
    let args = match map.get("args") {
        None | Some(Json::Null) => Vec::new(),
        Some(Json::Array(args)) => args.clone(),
        Some(_) => return Err(malformed(path, "`args` must be an array")),
    };
    let negate = match map.get("negate") {
        None => false,
        Some(Json::Bool(b)) => *b,
        Some(_) => return Err(malformed(path, "`negate` must be a boolean")),
    };
    if let Some(unknown) = map
        .keys()
        .find(|k| !matches!(k.as_str(), "check" | "args" | "negate"))
    {
        return Err(malformed(path, format!("unknown key `{unknown}`")));
    }
    Ok(Instruction::Check(CheckRef {
        name: name.to_string(),
        args,
        negate,
    }))
}

fn expect_only_key(map: &Map<String, Json>, key: &str, path: &str) -> Result<(), InstructionError> {
    match map.keys().find(|k| k.as_str() != key) {
        Some(other) => Err(malformed(
            path,
            format!("unexpected key `{other}` next to `{key}`"),
        )),
        None => Ok(()),
    }
}

impl TryFrom<Json> for Instruction {
    type Error = InstructionError;

    fn try_from(json: Json) -> Result<Self, Self::Error> {
        Instruction::parse(&json)
    }
}

impl From<Instruction> for Json {
    fn from(instruction: Instruction) -> Self {
        instruction.to_json()
    }
}

impl From<&str> for Instruction {
    fn from(name: &str) -> Self {
        Instruction::check(name)
    }
}

impl From<CheckRef> for Instruction {
    fn from(leaf: CheckRef) -> Self {
        Instruction::Check(leaf)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn child(f: &mut fmt::Formatter<'_>, node: &Instruction) -> fmt::Result {
            match node {
                Instruction::Check(leaf) => write!(f, "{leaf}"),
                Instruction::All(children) | Instruction::Any(children) if children.len() > 1 => {
                    write!(f, "({node})")
                }
                _ => write!(f, "{node}"),
            }
        }
        fn joined(f: &mut fmt::Formatter<'_>, children: &[Instruction], sep: &str) -> fmt::Result {
            for (i, node) in children.iter().enumerate() {
                if i > 0 {
                    f.write_str(sep)?;
                }
                child(f, node)?;
            }
            Ok(())
        }

        match self {
            Instruction::Check(leaf) => write!(f, "{leaf}"),
            Instruction::All(children) => joined(f, children, " and "),
            Instruction::Any(children) => joined(f, children, " or "),
        }
    }
}
