use ecsstatic_core::NormalizeError;
use ecsstatic_hash::murmur_hash;
use indexmap::IndexSet;
use lightningcss::printer::PrinterOptions;
use lightningcss::properties::Property;
use lightningcss::rules::CssRule;
use lightningcss::stylesheet::ParserFlags;
use lightningcss::stylesheet::ParserOptions;
use lightningcss::stylesheet::StyleSheet;
use lightningcss::traits::ToCss;

/// Declaration-level rules replacing one generated class
#[derive(Debug, PartialEq)]
pub struct AtomizedStyle {
  pub css: String,
  /// Atomic classes in order of first appearance
  pub class_names: Vec<String>,
}

impl AtomizedStyle {
  /// The value substituted for the original class at the call site
  pub fn class_list(&self) -> String {
    self.class_names.join(" ")
  }
}

struct AtomizeContext<'a> {
  class_name: &'a str,
  prefix: &'a str,
  class_names: IndexSet<String>,
}

fn printer_options() -> PrinterOptions<'static> {
  PrinterOptions {
    minify: true,
    ..PrinterOptions::default()
  }
}

fn printer_error(error: lightningcss::error::PrinterError) -> NormalizeError {
  NormalizeError {
    message: error.kind.to_string(),
    line: error.loc.as_ref().map_or(1, |loc| loc.line + 1),
    column: error.loc.as_ref().map_or(1, |loc| loc.column),
  }
}

/// Split the flat stylesheet of `class_name` into one class per declaration
///
/// The atomic class of a declaration hashes its at-rule chain, the selector shape around
/// the original class and the property name, then separately its value, so equal
/// declarations under equal selectors and at-rules share a class across the whole build.
pub fn atomize(css: &str, class_name: &str, prefix: &str) -> Result<AtomizedStyle, NormalizeError> {
  let stylesheet = StyleSheet::parse(
    css,
    ParserOptions {
      flags: ParserFlags::NESTING,
      ..ParserOptions::default()
    },
  )
  .map_err(|error| NormalizeError {
    message: error.kind.to_string(),
    line: error.loc.as_ref().map_or(1, |loc| loc.line + 1),
    column: error.loc.as_ref().map_or(1, |loc| loc.column),
  })?;

  let mut context = AtomizeContext {
    class_name,
    prefix,
    class_names: IndexSet::new(),
  };

  let css = atomize_rules(&stylesheet.rules.0, None, &mut context)?;

  tracing::debug!(
    class_name,
    atomic_classes = context.class_names.len(),
    "Atomized style"
  );

  Ok(AtomizedStyle {
    css,
    class_names: context.class_names.into_iter().collect(),
  })
}

fn atomize_rules(
  rules: &[CssRule<'_>],
  at_rule_label: Option<&str>,
  context: &mut AtomizeContext<'_>,
) -> Result<String, NormalizeError> {
  let mut output: IndexSet<String> = IndexSet::new();

  for rule in rules {
    match rule {
      CssRule::Style(style) => {
        if !style.rules.0.is_empty() {
          return Err(NormalizeError {
            message: "Nested rules need to be flattened before atomizing".into(),
            line: style.loc.line + 1,
            column: style.loc.column,
          });
        }

        let selectors = style
          .selectors
          .0
          .iter()
          .map(|selector| {
            selector
              .to_css_string(printer_options())
              .map(|selector| normalize_selector(&selector_shape(&selector, context.class_name)))
          })
          .collect::<Result<Vec<_>, _>>()
          .map_err(printer_error)?;

        for (property, important) in style.declarations.iter() {
          output.insert(atomize_declaration(
            property,
            important,
            &selectors,
            at_rule_label,
            context,
          )?);
        }
      }
      CssRule::Media(_) | CssRule::Supports(_) | CssRule::Container(_) | CssRule::LayerBlock(_) => {
        let prelude = at_rule_prelude(rule)?;
        let label = format!(
          "{}{}",
          at_rule_label.unwrap_or_default(),
          prelude.trim_start_matches('@')
        );
        let children = match rule {
          CssRule::Media(media) => &media.rules.0,
          CssRule::Supports(supports) => &supports.rules.0,
          CssRule::Container(container) => &container.rules.0,
          CssRule::LayerBlock(layer) => &layer.rules.0,
          _ => continue,
        };
        let inner = atomize_rules(children, Some(&label), context)?;
        output.insert(format!("{}{{{}}}", prelude, inner));
      }
      CssRule::Namespace(namespace) => {
        return Err(NormalizeError {
          message: "At-rule '@namespace' cannot be used in CSS rules.".into(),
          line: namespace.loc.line + 1,
          column: namespace.loc.column,
        });
      }
      CssRule::Unknown(unknown) => {
        return Err(NormalizeError {
          message: format!("Unknown at-rule '@{}'.", unknown.name),
          line: unknown.loc.line + 1,
          column: unknown.loc.column,
        });
      }
      CssRule::Ignored => {}
      // Keyframes, font faces, imports and friends are not split
      other => {
        output.insert(other.to_css_string(printer_options()).map_err(printer_error)?);
      }
    }
  }

  Ok(output.into_iter().collect())
}

/// `@media (...)` of a grouping rule, printed without its block
fn at_rule_prelude(rule: &CssRule<'_>) -> Result<String, NormalizeError> {
  let mut empty = rule.clone();
  match &mut empty {
    CssRule::Media(media) => media.rules.0.clear(),
    CssRule::Supports(supports) => supports.rules.0.clear(),
    CssRule::Container(container) => container.rules.0.clear(),
    CssRule::LayerBlock(layer) => layer.rules.0.clear(),
    _ => {}
  }

  let printed = empty.to_css_string(printer_options()).map_err(printer_error)?;
  Ok(printed.trim_end_matches("{}").to_string())
}

fn atomize_declaration(
  property: &Property<'_>,
  important: bool,
  selectors: &[String],
  at_rule_label: Option<&str>,
  context: &mut AtomizeContext<'_>,
) -> Result<String, NormalizeError> {
  let name = property.property_id().name().to_string();
  let mut value = property
    .value_to_css_string(printer_options())
    .map_err(printer_error)?;
  if important {
    value.push_str("true");
  }

  let value_hash: String = murmur_hash(&value, 0).chars().take(4).collect();
  let mut built = Vec::with_capacity(selectors.len());
  for selector in selectors {
    let group_seed = format!(
      "{}{}{}",
      at_rule_label.unwrap_or("undefined"),
      selector,
      name
    );
    let group: String = murmur_hash(&group_seed, 0).chars().take(4).collect();
    let atomic = format!("{}{}{}", context.prefix, group, value_hash);

    built.push(selector.replace('&', &format!(".{}", atomic)));
    context.class_names.insert(atomic);
  }
  tracing::trace!(property = %name, selectors = ?built, "Atomic declaration");

  let declaration = property
    .to_css_string(important, printer_options())
    .map_err(printer_error)?;

  Ok(format!("{}{{{}}}", built.join(","), declaration))
}

/// Replace each `.<class_name>` in a selector with `&`
fn selector_shape(selector: &str, class_name: &str) -> String {
  let needle = format!(".{}", class_name);
  let mut shape = String::with_capacity(selector.len());
  let mut rest = selector;

  while let Some(position) = rest.find(&needle) {
    let after = &rest[position + needle.len()..];
    let is_whole = !after
      .chars()
      .next()
      .is_some_and(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');

    shape.push_str(&rest[..position]);
    if is_whole {
      shape.push('&');
    } else {
      shape.push_str(&needle);
    }
    rest = after;
  }
  shape.push_str(rest);
  shape
}

fn normalize_selector(selector: &str) -> String {
  let collapsed = collapse_adjacent_nesting_selectors(selector.trim());
  let collapsed = collapsed.trim();
  if collapsed.is_empty() {
    return "&".to_string();
  }
  if collapsed.contains('&') {
    return collapsed.to_string();
  }

  format!("& {}", collapsed)
}

fn collapse_adjacent_nesting_selectors(selector: &str) -> String {
  let mut out = String::with_capacity(selector.len());
  let mut chars = selector.chars().peekable();
  while let Some(ch) = chars.next() {
    if ch == '&' {
      out.push('&');
      let mut saw_whitespace = false;
      while chars.peek().is_some_and(|next| next.is_whitespace()) {
        saw_whitespace = true;
        chars.next();
      }
      if chars.peek() == Some(&'&') {
        continue;
      }
      if saw_whitespace {
        out.push(' ');
      }
      continue;
    }
    out.push(ch);
  }
  out
}
