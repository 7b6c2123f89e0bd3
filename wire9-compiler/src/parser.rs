// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::analyzer::ErrorCode;
use crate::ast;
use codespan_reporting::diagnostic::Diagnostic;
use codespan_reporting::files;
use pest::error::InputLocation;
use pest::iterators::{Pair, Pairs};
use pest::Parser;
use std::iter::Peekable;

// Generate the directive parser.
// A directive is the text following the prefix of a host comment line:
//
//   Record field[width,type,endian] ...;
#[derive(pest_derive::Parser)]
#[grammar_inline = r#"
WHITESPACE = _{ " " | "\t" }

alpha = { 'a'..'z' | 'A'..'Z' | "_" }
digit = { '0'..'9' }
hexdigit = { digit | 'a'..'f' | 'A'..'F' }
alphanum = { alpha | digit }

identifier = @{ alpha ~ alphanum* }
intvalue = @{ digit+ }
hexvalue = @{ ("0x"|"0X") ~ hexdigit+ }
integer = @{ hexvalue | intvalue }
string = @{ "\"" ~ (!"\"" ~ ANY)* ~ "\"" }

add_op = { "+" | "-" }
mul_op = { "*" | "/" | "%" }
width_atom = _{ integer | identifier | "(" ~ width_sum ~ ")" }
width_product = { width_atom ~ (mul_op ~ width_atom)* }
width_sum = { width_product ~ (add_op ~ width_product)* }
width = { width_sum }

type_path = { identifier ~ (("::" | ".") ~ identifier)* }
slice_type = { "[" ~ "]" ~ type_expr }
array_type = { "[" ~ integer ~ "]" ~ type_expr }
pointer_type = { "*" ~ type_expr }
type_expr = { slice_type | array_type | pointer_type | type_path | string }

endianness = @{ alphanum+ }

field = {
    identifier ~ "[" ~
        width? ~
        ("," ~ type_expr? ~ ("," ~ endianness?)?)? ~
    "]"
}
record_id = { identifier ~ !"[" }

directive_head = { SOI ~ record_id? ~ field* }
directive = { SOI ~ record_id? ~ field* ~ ";"? ~ EOI }
"#]
pub struct DirectiveParser;

type Node<'i> = Pair<'i, Rule>;
type NodeIterator<'i> = Peekable<Pairs<'i, Rule>>;

struct Context<'a> {
    file: ast::FileId,
    line_starts: &'a Vec<usize>,
}

trait Helpers<'i> {
    fn children(self) -> NodeIterator<'i>;
    fn as_loc(&self, context: &Context) -> ast::SourceRange;
    fn as_string(&self) -> String;
    fn as_usize(&self) -> Result<usize, String>;
}

impl<'i> Helpers<'i> for Node<'i> {
    fn children(self) -> NodeIterator<'i> {
        self.into_inner().peekable()
    }

    fn as_loc(&self, context: &Context) -> ast::SourceRange {
        let span = self.as_span();
        ast::SourceRange {
            file: context.file,
            start: ast::SourceLocation::new(span.start_pos().pos(), context.line_starts),
            end: ast::SourceLocation::new(span.end_pos().pos(), context.line_starts),
        }
    }

    fn as_string(&self) -> String {
        self.as_str().to_owned()
    }

    fn as_usize(&self) -> Result<usize, String> {
        let text = self.as_str();
        if let Some(num) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            usize::from_str_radix(num, 16)
                .map_err(|_| format!("cannot convert '{}' to usize", self.as_str()))
        } else {
            text.parse::<usize>()
                .map_err(|_| format!("cannot convert '{}' to usize", self.as_str()))
        }
    }
}

fn err_unexpected_rule<T>(expected: Rule, found: Rule) -> Result<T, String> {
    Err(format!("expected rule {:?}, got {:?}", expected, found))
}

fn err_missing_rule<T>(expected: Rule) -> Result<T, String> {
    Err(format!("expected rule {:?}, got nothing", expected))
}

fn expect<'i>(iter: &mut impl Iterator<Item = Node<'i>>, rule: Rule) -> Result<Node<'i>, String> {
    match iter.next() {
        Some(node) if node.as_rule() == rule => Ok(node),
        Some(node) => err_unexpected_rule(rule, node.as_rule()),
        None => err_missing_rule(rule),
    }
}

fn maybe<'i>(iter: &mut NodeIterator<'i>, rule: Rule) -> Option<Node<'i>> {
    iter.next_if(|n| n.as_rule() == rule)
}

fn parse_identifier(iter: &mut NodeIterator<'_>) -> Result<String, String> {
    expect(iter, Rule::identifier).map(|n| n.as_string())
}

fn parse_string(node: &Node<'_>) -> Result<String, String> {
    node.as_str()
        .strip_prefix('"')
        .ok_or_else(|| "expected \" prefix".to_owned())
        .and_then(|s| s.strip_suffix('"').ok_or_else(|| "expected \" suffix".to_owned()))
        .map(|s| s.to_owned())
}

fn parse_binary_op(node: &Node<'_>) -> Result<ast::BinaryOp, String> {
    match node.as_str() {
        "+" => Ok(ast::BinaryOp::Add),
        "-" => Ok(ast::BinaryOp::Sub),
        "*" => Ok(ast::BinaryOp::Mul),
        "/" => Ok(ast::BinaryOp::Div),
        "%" => Ok(ast::BinaryOp::Rem),
        op => Err(format!("unexpected operator '{op}'")),
    }
}

/// Parse an operand of a width expression.
fn parse_width_atom(node: Node<'_>) -> Result<ast::WidthExpr, String> {
    match node.as_rule() {
        Rule::integer => Ok(ast::WidthExpr::Literal { value: node.as_usize()? }),
        Rule::identifier => Ok(ast::WidthExpr::FieldRef { id: node.as_string() }),
        Rule::width_sum | Rule::width_product => parse_width_chain(node),
        rule => err_unexpected_rule(Rule::width_sum, rule),
    }
}

/// Parse a left associative chain of operands separated by operators
/// of the same precedence.
fn parse_width_chain(node: Node<'_>) -> Result<ast::WidthExpr, String> {
    let mut children = node.children();
    let mut lhs = match children.next() {
        Some(first) => parse_width_atom(first)?,
        None => return err_missing_rule(Rule::width_product),
    };
    while let Some(op) = children.next() {
        let op = parse_binary_op(&op)?;
        let rhs = match children.next() {
            Some(operand) => parse_width_atom(operand)?,
            None => return err_missing_rule(Rule::width_product),
        };
        lhs = ast::WidthExpr::BinaryOp { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
    }
    Ok(lhs)
}

fn parse_width(node: Node<'_>) -> Result<ast::WidthExpr, String> {
    let mut children = node.children();
    parse_width_chain(expect(&mut children, Rule::width_sum)?)
}

fn parse_type_expr(node: Node<'_>) -> Result<ast::TypeExpr, String> {
    let mut children = node.children();
    let desc = match children.next() {
        Some(desc) => desc,
        None => return err_missing_rule(Rule::type_path),
    };
    let rule = desc.as_rule();
    let mut children = desc.clone().children();
    Ok(match rule {
        Rule::type_path => {
            let mut path = vec![];
            while children.peek().is_some() {
                path.push(parse_identifier(&mut children)?);
            }
            ast::TypeExpr::Named { path }
        }
        Rule::slice_type => {
            let element = parse_type_expr(expect(&mut children, Rule::type_expr)?)?;
            ast::TypeExpr::Slice { element: Box::new(element) }
        }
        Rule::array_type => {
            let len = expect(&mut children, Rule::integer)?.as_usize()?;
            let element = parse_type_expr(expect(&mut children, Rule::type_expr)?)?;
            ast::TypeExpr::Array { len, element: Box::new(element) }
        }
        Rule::pointer_type => {
            let target = parse_type_expr(expect(&mut children, Rule::type_expr)?)?;
            ast::TypeExpr::Pointer { target: Box::new(target) }
        }
        Rule::string => ast::TypeExpr::Literal { value: parse_string(&desc)? },
        _ => return err_unexpected_rule(Rule::type_path, rule),
    })
}

fn parse_endianness(
    node: Node<'_>,
    context: &Context,
) -> Result<ast::Endianness, Diagnostic<ast::FileId>> {
    match node.as_str() {
        "LE" => Ok(ast::Endianness::LittleEndian),
        "BE" => Ok(ast::Endianness::BigEndian),
        other => Err(Diagnostic::error()
            .with_code(ErrorCode::InvalidEndianness)
            .with_message("endian must be LE or BE")
            .with_labels(vec![node
                .as_loc(context)
                .primary()
                .with_message(format!("found `{other}`"))])),
    }
}

fn parse_field(
    node: Node<'_>,
    context: &Context,
) -> Result<ast::FieldSyntax, Diagnostic<ast::FileId>> {
    let loc = node.as_loc(context);
    let mut children = node.children();
    let id = parse_identifier(&mut children).map_err(internal_error)?;
    let width =
        maybe(&mut children, Rule::width).map(parse_width).transpose().map_err(internal_error)?;
    let type_expr = maybe(&mut children, Rule::type_expr)
        .map(parse_type_expr)
        .transpose()
        .map_err(internal_error)?;
    let endianness = match maybe(&mut children, Rule::endianness) {
        Some(node) => parse_endianness(node, context)?,
        None => ast::Endianness::LittleEndian,
    };

    if width.is_none() && type_expr.is_none() {
        return Err(Diagnostic::error()
            .with_code(ErrorCode::EmptyWidthAndType)
            .with_message("width and type cannot both be empty")
            .with_labels(vec![loc.primary().with_message(format!("in field `{id}`"))]));
    }

    Ok(ast::FieldSyntax { loc, id, width, type_expr, endianness })
}

fn parse_toplevel(
    root: Node<'_>,
    context: &Context,
) -> Result<ast::Directive, Diagnostic<ast::FileId>> {
    let loc = root.as_loc(context);
    let mut id = None;
    let mut fields = vec![];
    for node in root.children() {
        match node.as_rule() {
            Rule::record_id => {
                let mut children = node.children();
                id = Some(parse_identifier(&mut children).map_err(internal_error)?);
            }
            Rule::field => fields.push(parse_field(node, context)?),
            Rule::EOI => (),
            rule => return Err(internal_error(format!("unexpected rule {:?}", rule))),
        }
    }
    Ok(ast::Directive { loc, id: id.unwrap_or_else(|| ast::ANONYMOUS_RECORD.to_owned()), fields })
}

fn internal_error(message: String) -> Diagnostic<ast::FileId> {
    Diagnostic::error().with_code(ErrorCode::SyntaxError).with_message(message)
}

/// Build the diagnostic for a directive rejected by the grammar.
/// Trailing text after a valid field list is reported separately from
/// other syntax errors.
fn syntax_error(
    file: ast::FileId,
    name: &str,
    source: &str,
    err: pest::error::Error<Rule>,
) -> Diagnostic<ast::FileId> {
    if let Ok(mut head) = DirectiveParser::parse(Rule::directive_head, source) {
        let end = head.next().map(|n| n.as_span().end()).unwrap_or(0);
        let trailing = source[end..].trim_start();
        // Text that does not look like a field declaration.
        if !trailing.is_empty() && !trailing.starts_with(';') && !trailing.contains('[') {
            let start = source.len() - trailing.len();
            return Diagnostic::error()
                .with_code(ErrorCode::MissingTerminator)
                .with_message(format!(
                    "failed to parse directive '{}': expected field or terminator",
                    name
                ))
                .with_labels(vec![codespan_reporting::diagnostic::Label::primary(
                    file,
                    start..source.len(),
                )
                .with_message("unexpected trailing content")]);
        }
    }
    let range = match err.location {
        InputLocation::Pos(pos) => pos..pos,
        InputLocation::Span((start, end)) => start..end,
    };
    Diagnostic::error()
        .with_code(ErrorCode::SyntaxError)
        .with_message(format!("failed to parse directive '{}': {}", name, err.variant.message()))
        .with_labels(vec![codespan_reporting::diagnostic::Label::primary(file, range)])
}

/// Parse a directive from a string.
///
/// The directive text must not include the comment prefix. It is
/// added to the compilation database under the provided name.
pub fn parse_inline(
    sources: &mut ast::SourceDatabase,
    name: &str,
    source: String,
) -> Result<ast::Directive, Diagnostic<ast::FileId>> {
    let line_starts: Vec<_> = files::line_starts(&source).collect();
    let file = sources.add(name.to_owned(), source.clone());
    let root = DirectiveParser::parse(Rule::directive, &source)
        .map_err(|e| syntax_error(file, name, &source, e))?
        .next()
        .ok_or_else(|| internal_error(format!("empty parse tree for '{name}'")))?;
    parse_toplevel(root, &Context { file, line_starts: &line_starts })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ast::{BinaryOp, Endianness, TypeExpr, WidthExpr};

    fn parse(text: &str) -> Result<ast::Directive, Diagnostic<ast::FileId>> {
        let mut db = ast::SourceDatabase::new();
        parse_inline(&mut db, "stdin", text.to_owned())
    }

    fn named(path: &[&str]) -> TypeExpr {
        TypeExpr::Named { path: path.iter().map(|s| s.to_string()).collect() }
    }

    fn code(result: Result<ast::Directive, Diagnostic<ast::FileId>>) -> Option<String> {
        result.err().and_then(|d| d.code)
    }

    #[test]
    fn test_parse_fields() {
        let directive = parse("Bstr n[2] data[n]").unwrap();
        assert_eq!(directive.id, "Bstr");
        assert_eq!(directive.fields.len(), 2);
        assert_eq!(directive.fields[0].id, "n");
        assert_eq!(directive.fields[0].width, Some(WidthExpr::Literal { value: 2 }));
        assert_eq!(directive.fields[0].type_expr, None);
        assert_eq!(directive.fields[1].width, Some(WidthExpr::FieldRef { id: "n".to_owned() }));
    }

    #[test]
    fn test_parse_types() {
        let directive =
            parse("Ex3A p[,image.Point] size[,int64] reply[,Ex2A] l[4,[]byte] r[,*Ex3A]").unwrap();
        let types: Vec<_> = directive.fields.iter().map(|f| f.type_expr.clone()).collect();
        assert_eq!(
            types,
            vec![
                Some(named(&["image", "Point"])),
                Some(named(&["int64"])),
                Some(named(&["Ex2A"])),
                Some(TypeExpr::Slice { element: Box::new(named(&["byte"])) }),
                Some(TypeExpr::Pointer { target: Box::new(named(&["Ex3A"])) }),
            ]
        );
        assert!(directive.fields.iter().all(|f| f.endianness == Endianness::LittleEndian));
    }

    #[test]
    fn test_parse_array_and_literal_types() {
        let directive = parse(r#"Hdr magic[4,"WIRE"] ids[,[3]uint16] path[,crate::net::Addr]"#)
            .unwrap();
        assert_eq!(
            directive.fields[0].type_expr,
            Some(TypeExpr::Literal { value: "WIRE".to_owned() })
        );
        assert_eq!(
            directive.fields[1].type_expr,
            Some(TypeExpr::Array { len: 3, element: Box::new(named(&["uint16"])) })
        );
        assert_eq!(directive.fields[2].type_expr, Some(named(&["crate", "net", "Addr"])));
    }

    #[test]
    fn test_parse_endianness() {
        let directive = parse("Git index[4,,BE] other[2,,LE]").unwrap();
        assert_eq!(directive.fields[0].endianness, Endianness::BigEndian);
        assert_eq!(directive.fields[0].width, Some(WidthExpr::Literal { value: 4 }));
        assert_eq!(directive.fields[0].type_expr, None);
        assert_eq!(directive.fields[1].endianness, Endianness::LittleEndian);

        assert_eq!(code(parse("Git index[4,,XE]")), Some(ErrorCode::InvalidEndianness.into()));
    }

    #[test]
    fn test_parse_width_precedence() {
        let directive = parse("R a[1] b[1] c[2] data[a+b*c] clip[4*4] d[(a+b)*0x2]").unwrap();
        assert_eq!(directive.fields[3].width.as_ref().unwrap().to_string(), "(a+(b*c))");
        assert_eq!(directive.fields[4].width.as_ref().unwrap().fold(), Some(16));
        assert_eq!(
            directive.fields[5].width,
            Some(WidthExpr::BinaryOp {
                op: BinaryOp::Mul,
                lhs: Box::new(WidthExpr::BinaryOp {
                    op: BinaryOp::Add,
                    lhs: Box::new(WidthExpr::FieldRef { id: "a".to_owned() }),
                    rhs: Box::new(WidthExpr::FieldRef { id: "b".to_owned() }),
                }),
                rhs: Box::new(WidthExpr::Literal { value: 2 }),
            })
        );
    }

    #[test]
    fn test_parse_empty_width_and_type() {
        let result = parse("Z myint[2] bytething[]");
        let diagnostic = result.as_ref().err().unwrap();
        assert_eq!(diagnostic.message, "width and type cannot both be empty");
        assert_eq!(code(result), Some(ErrorCode::EmptyWidthAndType.into()));
    }

    #[test]
    fn test_parse_terminator() {
        assert!(parse("T a[1] b[2];").is_ok());
        assert!(parse("T a[1] b[2] ;").is_ok());
        assert_eq!(code(parse("T a[1] b[2] junk")), Some(ErrorCode::MissingTerminator.into()));
        assert_eq!(code(parse("T a[1] b[2]; a[1]")), Some(ErrorCode::SyntaxError.into()));
        assert_eq!(code(parse("T a[1")), Some(ErrorCode::SyntaxError.into()));
    }

    #[test]
    fn test_parse_anonymous() {
        let directive = parse("a[1] b[2]").unwrap();
        assert!(directive.is_anonymous());
        assert_eq!(directive.fields.len(), 2);
    }
}
