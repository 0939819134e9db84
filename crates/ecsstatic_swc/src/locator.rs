use std::collections::HashMap;

use ecsstatic_core::types::is_style_module;
use ecsstatic_core::types::tag_kind;
use ecsstatic_core::types::Interpolation;
use ecsstatic_core::types::QuasiPart;
use ecsstatic_core::types::TagBinding;
use ecsstatic_core::types::TaggedTemplateSite;
use swc_core::common::Spanned;
use swc_core::ecma::ast::Expr;
use swc_core::ecma::ast::Id;
use swc_core::ecma::ast::Ident;
use swc_core::ecma::ast::ImportDecl;
use swc_core::ecma::ast::ImportSpecifier;
use swc_core::ecma::ast::KeyValueProp;
use swc_core::ecma::ast::ModuleDecl;
use swc_core::ecma::ast::ModuleExportName;
use swc_core::ecma::ast::ModuleItem;
use swc_core::ecma::ast::Pat;
use swc_core::ecma::ast::PropName;
use swc_core::ecma::ast::TaggedTpl;
use swc_core::ecma::ast::VarDeclarator;
use swc_core::ecma::visit::Visit;
use swc_core::ecma::visit::VisitWith;

use crate::parse::ParsedModule;

/// Style tag bindings and tagged template sites of one file
#[derive(Debug, Default, PartialEq)]
pub struct LocatedSites {
  pub bindings: Vec<TagBinding>,
  /// In source order. A site nested in another site's interpolation comes after it.
  pub sites: Vec<TaggedTemplateSite>,
  /// Aliases also referenced outside a tag position, in order of first use
  pub value_uses: Vec<String>,
}

/// Import specifiers binding a style tag, keyed by the binding they introduce
pub fn tag_bindings(parsed: &ParsedModule, package_name: &str) -> Vec<(Id, TagBinding)> {
  let mut bindings = Vec::new();

  for item in &parsed.module.body {
    let ModuleItem::ModuleDecl(ModuleDecl::Import(import)) = item else {
      continue;
    };
    if import.type_only || !is_style_module(package_name, &import.src.value) {
      continue;
    }

    for specifier in &import.specifiers {
      // Default and namespace imports never name a tag
      let ImportSpecifier::Named(named) = specifier else {
        continue;
      };
      if named.is_type_only {
        continue;
      }

      let export_name = match &named.imported {
        Some(ModuleExportName::Ident(ident)) => ident.sym.to_string(),
        Some(ModuleExportName::Str(name)) => name.value.to_string(),
        None => named.local.sym.to_string(),
      };

      if let Some((source_kind, style_form)) =
        tag_kind(package_name, &import.src.value, &export_name)
      {
        bindings.push((
          named.local.to_id(),
          TagBinding {
            local_alias: named.local.sym.to_string(),
            source_kind,
            style_form,
            import_span: parsed.span(import.span),
          },
        ));
      }
    }
  }

  bindings
}

/// Find every tagged template using a style tag of `package_name`
///
/// `parsed` must have been through scope resolution so shadowed aliases are not mistaken
/// for tags.
pub fn locate_tag_sites(parsed: &ParsedModule, package_name: &str) -> LocatedSites {
  let bindings = tag_bindings(parsed, package_name);
  if bindings.is_empty() {
    return LocatedSites::default();
  }

  let mut visitor = TagSiteVisitor {
    parsed,
    bindings: bindings.iter().cloned().collect(),
    original_names: HashMap::new(),
    sites: Vec::new(),
    value_uses: Vec::new(),
  };
  parsed.module.visit_with(&mut visitor);

  tracing::debug!(
    bindings = bindings.len(),
    sites = visitor.sites.len(),
    "Located style tags"
  );

  LocatedSites {
    bindings: bindings.into_iter().map(|(_, binding)| binding).collect(),
    sites: visitor.sites,
    value_uses: visitor.value_uses,
  }
}

struct TagSiteVisitor<'a> {
  parsed: &'a ParsedModule,
  bindings: HashMap<Id, TagBinding>,
  /// Names of declarators and properties whose value is exactly a tagged template
  original_names: HashMap<swc_core::common::Span, String>,
  sites: Vec<TaggedTemplateSite>,
  value_uses: Vec<String>,
}

fn prop_name(key: &PropName) -> Option<String> {
  match key {
    PropName::Ident(ident) => Some(ident.sym.to_string()),
    PropName::Str(name) => Some(name.value.to_string()),
    PropName::Num(number) => Some(number.value.to_string()),
    _ => None,
  }
}

impl Visit for TagSiteVisitor<'_> {
  // The specifiers binding the tags are not uses
  fn visit_import_decl(&mut self, _import: &ImportDecl) {}

  fn visit_ident(&mut self, ident: &Ident) {
    if let Some(binding) = self.bindings.get(&ident.to_id()) {
      if !self.value_uses.contains(&binding.local_alias) {
        self.value_uses.push(binding.local_alias.clone());
      }
    }
  }

  fn visit_var_declarator(&mut self, declarator: &VarDeclarator) {
    if let (Pat::Ident(name), Some(init)) = (&declarator.name, &declarator.init) {
      if let Expr::TaggedTpl(tpl) = &**init {
        self
          .original_names
          .insert(tpl.span, name.id.sym.to_string());
      }
    }

    declarator.visit_children_with(self);
  }

  fn visit_key_value_prop(&mut self, prop: &KeyValueProp) {
    if let Expr::TaggedTpl(tpl) = &*prop.value {
      if let Some(name) = prop_name(&prop.key) {
        self.original_names.insert(tpl.span, name);
      }
    }

    prop.visit_children_with(self);
  }

  fn visit_tagged_tpl(&mut self, tagged: &TaggedTpl) {
    if let Expr::Ident(tag) = &*tagged.tag {
      if let Some(binding) = self.bindings.get(&tag.to_id()) {
        let quasis = tagged
          .tpl
          .quasis
          .iter()
          .enumerate()
          .map(|(index, quasi)| QuasiPart {
            literal: quasi.raw.to_string(),
            interpolation: tagged.tpl.exprs.get(index).map(|expr| Interpolation {
              span: self.parsed.span(expr.span()),
              source: self.parsed.text(&**expr).to_string(),
            }),
          })
          .collect();

        self.sites.push(TaggedTemplateSite {
          span: self.parsed.span(tagged.span),
          quasis,
          binding: binding.clone(),
          original_name: self.original_names.get(&tagged.span).cloned(),
        });

        tagged.tpl.visit_with(self);
        return;
      }
    }

    tagged.visit_children_with(self);
  }
}

#[cfg(test)]
mod tests {
  use ecsstatic_core::types::SourceKind;
  use ecsstatic_core::types::StyleForm;
  use pretty_assertions::assert_eq;

  use super::*;
  use crate::parse::parse_module_with_scopes;

  const PKG: &str = "@acab/ecsstatic";

  fn locate(code: &str) -> LocatedSites {
    let parsed = parse_module_with_scopes(code, "/app/src/App.tsx").unwrap();
    locate_tag_sites(&parsed, PKG)
  }

  #[test]
  fn returns_nothing_without_style_imports() {
    let located = locate("import { css } from 'other';\nconst a = css`color: red;`;");

    assert_eq!(located, LocatedSites::default());
  }

  #[test]
  fn finds_aliased_tags_imported_together() {
    let located = locate(
      r#"import { css as style, scss, createGlobalStyle } from '@acab/ecsstatic';
const a = style`color: red;`;
const b = scss`$c: red; color: $c;`;
createGlobalStyle`body { margin: 0; }`;
"#,
    );

    assert_eq!(located.bindings.len(), 3);
    assert_eq!(located.bindings[0].local_alias, "style");
    assert_eq!(
      located
        .sites
        .iter()
        .map(|site| (site.binding.source_kind, site.binding.style_form))
        .collect::<Vec<_>>(),
      vec![
        (SourceKind::PlainCss, StyleForm::Scoped),
        (SourceKind::SassLike, StyleForm::Scoped),
        (SourceKind::PlainCss, StyleForm::GlobalUnscoped),
      ]
    );
    assert_eq!(located.sites[0].original_name.as_deref(), Some("a"));
    assert_eq!(located.sites[2].original_name, None);
  }

  #[test]
  fn finds_nested_sites_with_property_names() {
    let located = locate(
      r#"import { css } from '@acab/ecsstatic';
export const styles = {
  wrapper: css`display: flex;`,
  'title-text': css`font-weight: bold;`,
};
export const Button = () => {
  const local = css`color: ${accent};`;
  return <button className={local} />;
};
"#,
    );

    assert_eq!(
      located
        .sites
        .iter()
        .map(|site| site.original_name.clone())
        .collect::<Vec<_>>(),
      vec![
        Some("wrapper".to_string()),
        Some("title-text".to_string()),
        Some("local".to_string()),
      ]
    );

    let interpolation = located.sites[2].interpolations().next().unwrap();
    assert_eq!(interpolation.source, "accent");
  }

  #[test]
  fn records_literal_parts_and_spans() {
    let code = "import { css } from '@acab/ecsstatic';\nconst a = css`a: ${b}; c: d;`;";
    let located = locate(code);
    let site = &located.sites[0];

    assert_eq!(&code[site.span.start..site.span.end], "css`a: ${b}; c: d;`");
    assert_eq!(site.quasis[0].literal, "a: ");
    assert_eq!(site.quasis[1].literal, "; c: d;");
    assert_eq!(site.quasis[1].interpolation, None);
    assert_eq!(
      &code[located.bindings[0].import_span.start..located.bindings[0].import_span.end],
      "import { css } from '@acab/ecsstatic';"
    );
  }

  #[test]
  fn ignores_shadowed_aliases() {
    let located = locate(
      r#"import { css } from '@acab/ecsstatic';
const a = css`color: red;`;
function render(css) {
  return css`not a style`;
}
"#,
    );

    assert_eq!(located.sites.len(), 1);
  }

  #[test]
  fn records_aliases_used_as_values() {
    let located = locate(
      r#"import { css, createGlobalStyle } from '@acab/ecsstatic';
const a = css`color: red;`;
createGlobalStyle`body { margin: 0; }`;
export const tags = { css };
function local(css) {
  return css;
}
"#,
    );

    assert_eq!(located.sites.len(), 2);
    assert_eq!(located.value_uses, vec!["css".to_string()]);
  }

  #[test]
  fn tag_positions_are_not_value_uses() {
    let located = locate(
      "import { css } from '@acab/ecsstatic';
const a = css`& ${css`color: red;`} { color: blue; }`;",
    );

    assert!(located.value_uses.is_empty());
  }

  #[test]
  fn ignores_type_only_default_and_namespace_imports() {
    let located = locate(
      r#"import type { css } from '@acab/ecsstatic';
import ecsstatic, * as everything from '@acab/ecsstatic';
const a = css`color: red;`;
"#,
    );

    assert!(located.bindings.is_empty());
  }

  #[test]
  fn discovers_sites_nested_in_interpolations() {
    let located = locate(
      "import { css } from '@acab/ecsstatic';\nconst a = css`& ${css`color: red;`} { color: blue; }`;",
    );

    assert_eq!(located.sites.len(), 2);
    assert!(located.sites[0].span.contains(&located.sites[1].span));
  }

  #[test]
  fn recognizes_subpath_entry_points() {
    let located = locate(
      "import { css } from '@acab/ecsstatic/modules';\nconst styles = css`.a { color: red; }`;",
    );

    assert_eq!(located.sites[0].binding.style_form, StyleForm::Modules);
  }
}
