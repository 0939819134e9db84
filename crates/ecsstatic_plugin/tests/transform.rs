use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use ecsstatic_core::config::AtomizeConfig;
use ecsstatic_core::config::EcsstaticConfig;
use ecsstatic_core::plugin::BundlerPlugin;
use ecsstatic_core::plugin::TransformOutput;
use ecsstatic_core::EcsstaticError;
use ecsstatic_core::ResolveCause;
use ecsstatic_filesystem::in_memory_file_system::InMemoryFileSystem;
use ecsstatic_hash::class_name_for;
use ecsstatic_plugin::EcsstaticPlugin;
use pretty_assertions::assert_eq;
use tracing_test::traced_test;

const BUTTON: &str = "/app/src/Button.tsx";

fn plugin_with(config: EcsstaticConfig, fs: InMemoryFileSystem) -> EcsstaticPlugin {
  EcsstaticPlugin::new(config, PathBuf::from("/app"), Arc::new(fs)).unwrap()
}

fn plugin() -> EcsstaticPlugin {
  plugin_with(EcsstaticConfig::default(), InMemoryFileSystem::default())
}

fn transform(plugin: &EcsstaticPlugin, code: &str) -> TransformOutput {
  plugin.transform(code, BUTTON).unwrap().unwrap()
}

/// Value of the first `const <name> = "<value>"` in `code`
fn assigned_string<'a>(code: &'a str, name: &str) -> &'a str {
  let prefix = format!("const {} = \"", name);
  let start = code.find(&prefix).unwrap() + prefix.len();
  let end = start + code[start..].find('"').unwrap();
  &code[start..end]
}

fn stylesheet_id(class_name: &str) -> String {
  format!("/app/src/{}.acab.css", class_name)
}

#[test]
#[traced_test]
fn extracts_a_literal_template() {
  let plugin = plugin();
  let code = r#"import { css } from '@acab/ecsstatic';

const btn = css`color: hotpink;`;

export const Button = () => <button className={btn}>Hi</button>;
"#;

  let output = transform(&plugin, code);
  let class_name = class_name_for("ecsstatic", "color: hotpink;");

  assert_eq!(assigned_string(&output.code, "btn"), class_name);
  assert!(output.code.contains(&format!("import \"./{}.acab.css\";", class_name)));
  assert!(!output.code.contains("@acab/ecsstatic"));
  assert!(output.code.contains("className={btn}"));

  // Registered text is minified, named colors become their shortest form
  assert_eq!(
    plugin.load(&stylesheet_id(&class_name)),
    Some(format!(".{}{{color:#ff69b4}}", class_name))
  );
}

#[test]
fn class_names_are_deterministic() {
  let code = "import { css } from '@acab/ecsstatic';\nconst a = css`\n  color: red;\n`;\n";

  let first = transform(&plugin(), code);
  let second = transform(&plugin(), code);

  assert_eq!(first, second);
}

#[test]
fn identical_content_shares_a_class_name_across_files() {
  let plugin = plugin();
  let first = plugin
    .transform("import { css } from '@acab/ecsstatic';\nconst primary = css`margin: 0;`;", "/app/src/A.tsx")
    .unwrap()
    .unwrap();
  let second = plugin
    .transform(
      "import { css as style } from '@acab/ecsstatic';\nconst other = style`\n  margin: 0;\n`;",
      "/app/src/nested/B.tsx",
    )
    .unwrap()
    .unwrap();

  assert_eq!(
    assigned_string(&first.code, "primary"),
    assigned_string(&second.code, "other")
  );
}

#[test]
fn identical_templates_in_one_file_are_both_replaced() {
  let plugin = plugin();
  let output = transform(
    &plugin,
    "import { css } from '@acab/ecsstatic';\nconst a = css`color: red;`;\nconst b = css`color: red;`;\n",
  );
  let class_name = class_name_for("ecsstatic", "color: red;");

  assert_eq!(assigned_string(&output.code, "a"), class_name);
  assert_eq!(assigned_string(&output.code, "b"), class_name);
  assert_eq!(output.code.matches(".acab.css").count(), 1);
  assert_eq!(plugin.registry().len(), 1);
}

#[test]
fn unused_imports_are_left_alone() {
  let plugin = plugin();

  let output = plugin
    .transform("import { css } from '@acab/ecsstatic';\nexport const a = 1;", BUTTON)
    .unwrap();

  assert_eq!(output, None);
  assert!(plugin.registry().is_empty());
}

#[test]
fn files_without_style_imports_are_left_alone() {
  let plugin = plugin();

  assert_eq!(plugin.transform("const css = (s) => s;\ncss`a`;", BUTTON).unwrap(), None);
  assert_eq!(plugin.transform("body { color: red; }", "/app/src/index.css").unwrap(), None);
}

#[test]
fn flattens_nested_selectors() {
  let plugin = plugin();
  let template = "\n  color: blue;\n  &:hover { color: red; }\n";
  let output = transform(
    &plugin,
    &format!("import {{ css }} from '@acab/ecsstatic';\nconst link = css`{}`;", template),
  );
  let class_name = assigned_string(&output.code, "link").to_string();

  let css = plugin.load(&stylesheet_id(&class_name)).unwrap();
  assert!(css.contains(&format!(".{}:hover{{color:red}}", class_name)), "{}", css);
  assert!(!css.contains('&'));
}

#[test]
fn inlines_same_file_constants_without_running_components() {
  let plugin = plugin();
  let output = transform(
    &plugin,
    r#"import { css } from '@acab/ecsstatic';

const accent = '#fff';
renderApp(document.getElementById('root'));

const title = css`color: ${accent};`;

export function Title() {
  return <h1 className={title}>{window.location.href}</h1>;
}
"#,
  );

  let class_name = class_name_for("ecsstatic", "color: #fff;");
  assert_eq!(assigned_string(&output.code, "title"), class_name);
  assert!(output.code.contains("renderApp(document.getElementById('root'));"));

  let css = plugin.load(&stylesheet_id(&class_name)).unwrap();
  assert!(css.contains("color:#fff"), "{}", css);
}

#[test]
fn inlines_imported_constants() {
  let fs = InMemoryFileSystem::default();
  fs.write_file(
    Path::new("/app/src/theme.ts"),
    "export const theme = { space: (n: number) => `${n * 4}px` };\nconsole.log('loaded');",
  );
  let plugin = plugin_with(EcsstaticConfig::default(), fs);

  let output = transform(
    &plugin,
    "import { css } from '@acab/ecsstatic';\nimport { theme } from './theme';\nconst card = css`padding: ${theme.space(2)};`;",
  );

  assert_eq!(
    assigned_string(&output.code, "card"),
    class_name_for("ecsstatic", "padding: 8px;")
  );
  assert!(output.code.contains("import { theme } from './theme';"));
}

#[test]
fn references_to_sibling_templates_resolve_to_their_class() {
  let plugin = plugin();
  let output = transform(
    &plugin,
    "import { css } from '@acab/ecsstatic';\nconst icon = css`width: 1em;`;\nconst button = css`& .${icon} { fill: red; }`;",
  );
  let icon = assigned_string(&output.code, "icon").to_string();
  let button = assigned_string(&output.code, "button").to_string();

  let css = plugin.load(&stylesheet_id(&button)).unwrap();
  assert!(css.contains(&format!(".{} .{}", button, icon)), "{}", css);
}

#[test]
fn unlisted_packages_fail_the_whole_file() {
  let plugin = plugin();

  let error = plugin
    .transform(
      "import { css } from '@acab/ecsstatic';\nimport props from 'open-props';\nconst ok = css`color: red;`;\nconst blue = css`color: ${props.blue};`;",
      BUTTON,
    )
    .unwrap_err();

  assert!(error.to_string().contains(BUTTON), "{}", error);
  match error.downcast_ref::<EcsstaticError>() {
    Some(EcsstaticError::Resolution(error)) => {
      assert_eq!(error.expression, "props.blue");
      assert_eq!(error.cause, ResolveCause::ExternalPackage("open-props".into()));
    }
    other => panic!("unexpected error {:?}", other),
  }
  assert!(plugin.registry().is_empty());
}

#[test]
fn listed_packages_are_inlined() {
  let fs = InMemoryFileSystem::default();
  fs.write_file(
    Path::new("/app/node_modules/open-props/package.json"),
    r#"{ "module": "index.mjs" }"#,
  );
  fs.write_file(
    Path::new("/app/node_modules/open-props/index.mjs"),
    "export default { blue: '#4dabf7' };",
  );
  let mut config = EcsstaticConfig::default();
  config.evaluate_expressions.resolve_packages = vec!["open-props".into()];
  let plugin = plugin_with(config, fs);

  let output = transform(
    &plugin,
    "import { css } from '@acab/ecsstatic';\nimport props from 'open-props';\nconst blue = css`color: ${props.blue};`;",
  );

  assert_eq!(
    assigned_string(&output.code, "blue"),
    class_name_for("ecsstatic", "color: #4dabf7;")
  );
}

#[test]
fn atomized_classes_are_shared_between_templates() {
  let config = EcsstaticConfig {
    atomize: AtomizeConfig::Enabled(true),
    ..EcsstaticConfig::default()
  };
  let plugin = plugin_with(config, InMemoryFileSystem::default());

  let output = transform(
    &plugin,
    "import { css } from '@acab/ecsstatic';\nconst a = css`color: red; padding: 4px;`;\nconst b = css`padding: 4px; margin: 0;`;",
  );

  let a: Vec<&str> = assigned_string(&output.code, "a").split(' ').collect();
  let b: Vec<&str> = assigned_string(&output.code, "b").split(' ').collect();
  assert_eq!(a.len(), 2);
  assert_eq!(b.len(), 2);
  assert!(a.iter().chain(b.iter()).all(|class| class.starts_with('_')));
  assert_eq!(a[1], b[0]);
  assert_ne!(a[0], a[1]);
}

#[test]
fn global_templates_are_removed() {
  let plugin = plugin();
  let output = transform(
    &plugin,
    "import { createGlobalStyle } from '@acab/ecsstatic';\ncreateGlobalStyle`\n  body { margin: 0; }\n`;\nexport const a = 1;",
  );

  assert!(!output.code.contains("createGlobalStyle"));
  assert!(output.code.contains("export const a = 1;"));

  let class_name = class_name_for("ecsstatic", "body { margin: 0; }");
  assert_eq!(
    plugin.load(&format!("/app/src/{}.global.acab.css", class_name)),
    Some("body{margin:0}".to_string())
  );
}

#[test]
fn modules_templates_become_class_maps() {
  let plugin = plugin();
  let output = transform(
    &plugin,
    "import { css } from '@acab/ecsstatic/modules';\nconst styles = css`\n  .title { color: red; }\n  .body { margin: 0; }\n`;",
  );
  let class_name = class_name_for("ecsstatic", ".title { color: red; }\n  .body { margin: 0; }");

  assert!(
    output.code.contains(&format!(
      "const styles = {{\"title\": \"{0}_title\", \"body\": \"{0}_body\"}};",
      class_name
    )),
    "{}",
    output.code
  );

  assert!(output.code.contains(&format!("import \"./{}.module.acab.css\";", class_name)));
  let css = plugin
    .load(&format!("/app/src/{}.module.acab.css", class_name))
    .unwrap();
  assert!(css.contains(&format!(".{}_title{{color:red}}", class_name)), "{}", css);
}

#[test]
fn forms_sharing_a_template_text_keep_their_own_stylesheets() {
  let plugin = plugin();
  let output = transform(
    &plugin,
    r#"import { css, createGlobalStyle } from '@acab/ecsstatic';
import { css as modules } from '@acab/ecsstatic/modules';
const scoped = css`.a { color: red; }`;
createGlobalStyle`.a { color: red; }`;
const styles = modules`.a { color: red; }`;
"#,
  );
  let class_name = class_name_for("ecsstatic", ".a { color: red; }");

  assert_eq!(assigned_string(&output.code, "scoped"), class_name);
  assert_eq!(plugin.registry().len(), 3);
  assert_eq!(
    plugin.load(&format!("/app/src/{}.acab.css", class_name)),
    Some(format!(".{} .a{{color:red}}", class_name))
  );
  assert_eq!(
    plugin.load(&format!("/app/src/{}.global.acab.css", class_name)),
    Some(".a{color:red}".to_string())
  );
  assert_eq!(
    plugin.load(&format!("/app/src/{}.module.acab.css", class_name)),
    Some(format!(".{}_a{{color:red}}", class_name))
  );
  for suffix in ["acab.css", "global.acab.css", "module.acab.css"] {
    assert!(output.code.contains(&format!("import \"./{}.{}\";", class_name, suffix)));
  }

  // Another file of the same directory registers the same id with the same rules
  plugin
    .transform(
      "import { createGlobalStyle } from '@acab/ecsstatic';\ncreateGlobalStyle`.a { color: red; }`;",
      "/app/src/Other.tsx",
    )
    .unwrap()
    .unwrap();
  assert_eq!(plugin.registry().len(), 3);
  assert_eq!(
    plugin.load(&format!("/app/src/{}.global.acab.css", class_name)),
    Some(".a{color:red}".to_string())
  );
}

#[test]
fn keeps_imports_of_tags_used_as_values() {
  let plugin = plugin();
  let output = transform(
    &plugin,
    "import { css } from '@acab/ecsstatic';\nconst a = css`color: red;`;\nexport const tag = css;",
  );

  assert!(output.code.contains("import { css } from '@acab/ecsstatic';"));
  assert_eq!(assigned_string(&output.code, "a"), class_name_for("ecsstatic", "color: red;"));
  assert!(output.code.contains("export const tag = css;"));
}

#[test]
fn sass_templates_are_registered_as_scss() {
  let plugin = plugin();
  let output = transform(
    &plugin,
    "import { scss } from '@acab/ecsstatic';\nconst card = scss`\n  $gap: 4px;\n  padding: $gap;\n`;",
  );
  let class_name = assigned_string(&output.code, "card").to_string();

  assert!(output.code.contains(&format!("import \"./{}.acab.scss\";", class_name)));
  let css = plugin.load(&format!("/app/src/{}.acab.scss", class_name)).unwrap();
  assert_eq!(css, format!(".{}{{$gap: 4px;\n  padding: $gap;}}", class_name));
}

#[test]
fn malformed_styles_fail_with_the_file_name() {
  let plugin = plugin();

  let error = plugin
    .transform("import { scss } from '@acab/ecsstatic';\nconst a = scss`color: red; }`;", BUTTON)
    .unwrap_err();

  assert!(error.to_string().contains(BUTTON));
  assert!(matches!(
    error.downcast_ref::<EcsstaticError>(),
    Some(EcsstaticError::Normalization(_))
  ));
}

#[test]
fn serves_registered_stylesheets() {
  let plugin = plugin();
  let output = transform(&plugin, "import { css } from '@acab/ecsstatic';\nconst a = css`color: red;`;");
  let class_name = assigned_string(&output.code, "a").to_string();
  let file_name = format!("./{}.acab.css", class_name);

  assert_eq!(
    plugin.resolve_id(&file_name, Some(BUTTON)),
    Some(stylesheet_id(&class_name))
  );
  assert_eq!(
    plugin.resolve_id(&format!("/src/{}.acab.css", class_name), Some(BUTTON)),
    Some(stylesheet_id(&class_name))
  );
  assert_eq!(plugin.resolve_id(&file_name, None), None);
  assert_eq!(plugin.resolve_id("./missing.acab.css", Some(BUTTON)), None);
  assert!(plugin.load(&stylesheet_id(&class_name)).is_some());

  plugin.build_start();
  assert_eq!(plugin.resolve_id(&file_name, Some(BUTTON)), None);
  assert_eq!(plugin.load(&stylesheet_id(&class_name)), None);
}

#[test]
fn retransforming_a_file_replaces_its_stylesheets() {
  let plugin = plugin();
  let events = plugin.registry().subscribe();

  let first = transform(&plugin, "import { css } from '@acab/ecsstatic';\nconst a = css`color: red;`;");
  let old_id = stylesheet_id(assigned_string(&first.code, "a"));
  let second = transform(&plugin, "import { css } from '@acab/ecsstatic';\nconst a = css`color: blue;`;");
  let new_id = stylesheet_id(assigned_string(&second.code, "a"));

  assert!(!plugin.registry().contains(&old_id));
  assert!(plugin.registry().contains(&new_id));
  assert_eq!(
    events.try_recv(),
    Ok(ecsstatic_plugin::RegistryEvent::Invalidated {
      source: BUTTON.into(),
      ids: vec![old_id],
    })
  );
}

#[test]
fn strips_queries_from_ids() {
  let plugin = plugin();

  let output = plugin
    .transform(
      "import { css } from '@acab/ecsstatic';\nconst a = css`color: red;`;",
      "/app/src/Button.tsx?v=1",
    )
    .unwrap();

  assert!(output.is_some());
  assert_eq!(
    plugin.registry().ids_for_source(BUTTON),
    vec![stylesheet_id(&class_name_for("ecsstatic", "color: red;"))]
  );
}

#[test]
fn produces_a_source_map_for_the_rewritten_module() {
  let plugin = plugin();
  let code = "import { css } from '@acab/ecsstatic';\nconst a = css`color: red;`;\nexport const b = a;\n";
  let output = transform(&plugin, code);

  let map = sourcemap::SourceMap::from_slice(output.map.as_bytes()).unwrap();
  let line = output
    .code
    .lines()
    .position(|line| line.starts_with("export const b"))
    .unwrap() as u32;
  let token = map.lookup_token(line, 0).unwrap();

  assert_eq!(token.get_src_line(), 2);
  assert_eq!(token.get_source(), Some(BUTTON));
}
