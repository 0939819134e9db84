use std::path::Path;

use ecsstatic_core::types::Span;
use ecsstatic_core::ParseError;
use swc_core::common::input::StringInput;
use swc_core::common::sync::Lrc;
use swc_core::common::FileName;
use swc_core::common::Globals;
use swc_core::common::Mark;
use swc_core::common::SourceFile;
use swc_core::common::SourceMap;
use swc_core::common::Spanned;
use swc_core::common::GLOBALS;
use swc_core::ecma::ast::EsVersion;
use swc_core::ecma::ast::Expr;
use swc_core::ecma::ast::Module;
use swc_core::ecma::parser::error::Error as SwcParseError;
use swc_core::ecma::parser::lexer::Lexer;
use swc_core::ecma::parser::EsSyntax;
use swc_core::ecma::parser::Parser;
use swc_core::ecma::parser::Syntax;
use swc_core::ecma::parser::TsSyntax;
use swc_core::ecma::transforms::base::resolver;
use swc_core::ecma::visit::VisitMutWith;

/// A parsed source file, with access to the original text by span
pub struct ParsedModule {
  pub module: Module,
  pub source_map: Lrc<SourceMap>,
  pub source_file: Lrc<SourceFile>,
}

impl ParsedModule {
  /// Byte range of a swc span in the original text
  pub fn span(&self, span: swc_core::common::Span) -> Span {
    let start = self.source_file.start_pos.0;
    Span::new(
      span.lo.0.saturating_sub(start) as usize,
      span.hi.0.saturating_sub(start) as usize,
    )
  }

  /// Original text of a node
  pub fn text(&self, node: &impl Spanned) -> &str {
    let span = self.span(node.span());
    self
      .source_file
      .src
      .get(span.start..span.end)
      .unwrap_or_default()
  }
}

/// Pick the syntax for a file from its extension
///
/// TypeScript files without an `x` suffix are parsed without JSX so `<T>value` casts work.
pub fn syntax_for(file_name: &str) -> Syntax {
  let extension = Path::new(file_name)
    .extension()
    .and_then(|extension| extension.to_str())
    .unwrap_or_default();

  match extension {
    "ts" | "mts" | "cts" => Syntax::Typescript(TsSyntax {
      tsx: false,
      decorators: true,
      ..Default::default()
    }),
    "js" | "jsx" | "mjs" | "cjs" | "json" => Syntax::Es(EsSyntax {
      jsx: true,
      decorators: true,
      ..Default::default()
    }),
    _ => Syntax::Typescript(TsSyntax {
      tsx: true,
      decorators: true,
      ..Default::default()
    }),
  }
}

fn parse_error(
  source_map: &SourceMap,
  file_name: &str,
  error: SwcParseError,
) -> ParseError {
  let loc = source_map.lookup_char_pos(error.span().lo);
  ParseError {
    file: file_name.to_string(),
    message: error.kind().msg().to_string(),
    line: loc.line as u32,
    column: loc.col.0 as u32 + 1,
  }
}

/// Parse a module without scope analysis
pub fn parse_module(code: &str, file_name: &str) -> Result<ParsedModule, ParseError> {
  let source_map = Lrc::new(SourceMap::default());
  let source_file = source_map.new_source_file(
    Lrc::new(FileName::Custom(file_name.to_string())),
    code.to_string(),
  );

  let lexer = Lexer::new(
    syntax_for(file_name),
    EsVersion::latest(),
    StringInput::from(&*source_file),
    None,
  );

  let mut parser = Parser::new_from(lexer);
  let module = parser
    .parse_module()
    .map_err(|error| parse_error(&source_map, file_name, error))?;

  Ok(ParsedModule {
    module,
    source_map,
    source_file,
  })
}

/// Parse a module and run swc's scope resolver over it
///
/// After resolution, two identifiers refer to the same binding iff their `(sym, ctxt)`
/// pairs are equal.
pub fn parse_module_with_scopes(code: &str, file_name: &str) -> Result<ParsedModule, ParseError> {
  let mut parsed = parse_module(code, file_name)?;
  let is_typescript = matches!(syntax_for(file_name), Syntax::Typescript(_));

  GLOBALS.set(&Globals::new(), || {
    let global_mark = Mark::new();
    let unresolved_mark = Mark::new();
    parsed
      .module
      .visit_mut_with(&mut resolver(unresolved_mark, global_mark, is_typescript));
  });

  Ok(parsed)
}

/// Parse a single expression
pub fn parse_expression(code: &str, file_name: &str) -> Result<Box<Expr>, ParseError> {
  let source_map = Lrc::new(SourceMap::default());
  let source_file = source_map.new_source_file(
    Lrc::new(FileName::Custom(file_name.to_string())),
    code.to_string(),
  );

  let lexer = Lexer::new(
    syntax_for(file_name),
    EsVersion::latest(),
    StringInput::from(&*source_file),
    None,
  );

  Parser::new_from(lexer)
    .parse_expr()
    .map_err(|error| parse_error(&source_map, file_name, error))
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;
  use swc_core::ecma::ast::ModuleItem;

  use super::*;

  #[test]
  fn maps_spans_to_byte_offsets() {
    let code = "const a = 1;\nconst b = 'two';";
    let parsed = parse_module(code, "file.ts").unwrap();

    let ModuleItem::Stmt(second) = &parsed.module.body[1] else {
      panic!("expected a statement");
    };

    assert!(parsed.text(second).starts_with("const b = 'two'"));
    assert_eq!(parsed.span(second.span()).start, 13);
  }

  #[test]
  fn reports_syntax_errors_with_location() {
    let error = parse_module("const a = ;", "file.tsx").err().unwrap();

    assert_eq!(error.file, "file.tsx");
    assert_eq!(error.line, 1);
  }

  #[test]
  fn parses_tsx_and_ts_casts() {
    assert!(parse_module("const a = <div className=\"x\" />;", "file.tsx").is_ok());
    assert!(parse_module("const a = <string>b;", "file.ts").is_ok());
  }

  #[test]
  fn parses_expressions() {
    let expr = parse_expression("tokens.colors['accent']", "file.ts").unwrap();

    assert!(matches!(*expr, Expr::Member(_)));
  }
}
