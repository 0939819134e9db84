use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;

use ecsstatic_core::types::is_style_module;
use ecsstatic_core::types::SourceKind;
use ecsstatic_core::types::StyleForm;
use ecsstatic_core::ResolveCause;
use ecsstatic_filesystem::to_slash;
use ecsstatic_filesystem::FileSystem;
use indexmap::IndexMap;
use swc_core::ecma::ast::Decl;
use swc_core::ecma::ast::DefaultDecl;
use swc_core::ecma::ast::ExportSpecifier;
use swc_core::ecma::ast::Expr;
use swc_core::ecma::ast::ImportSpecifier;
use swc_core::ecma::ast::ModuleDecl;
use swc_core::ecma::ast::ModuleExportName;
use swc_core::ecma::ast::ModuleItem;
use swc_core::ecma::ast::Stmt;
use swc_core::ecma::ast::TsEnumDecl;
use swc_core::ecma::ast::TsEnumMemberId;
use swc_core::ecma::ast::VarDecl;
use swc_core::ecma::ast::VarDeclKind;

use crate::locator::tag_bindings;
use crate::parse::parse_module;
use crate::parse::ParsedModule;
use crate::resolve::resolve_specifier;
use crate::resolve::Resolution;
use crate::resolve::RESOLVE_EXTENSIONS;

/// Local name given to `export default <expression>`
pub const DEFAULT_EXPORT_LOCAL: &str = "__ecsstatic_default";

/// Where an imported binding comes from
#[derive(Clone, Debug, PartialEq)]
pub enum ImportSource {
  /// A module inlined in the snippet, keyed by path
  Module(PathBuf),
  /// A package that is not inlined
  External(String),
  /// An import that could not be followed, reported if the binding is ever evaluated
  Unresolved(ResolveCause),
}

#[derive(Clone, Debug, PartialEq)]
pub enum ImportedName {
  Named(String),
  Default,
  Namespace,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImportedBinding {
  pub local: String,
  pub source: ImportSource,
  pub imported: ImportedName,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExportedBinding {
  Local {
    exported: String,
    local: String,
  },
  Reexport {
    exported: String,
    source: ImportSource,
    imported: ImportedName,
  },
}

impl ExportedBinding {
  pub fn exported(&self) -> &str {
    match self {
      ExportedBinding::Local { exported, .. } => exported,
      ExportedBinding::Reexport { exported, .. } => exported,
    }
  }
}

/// A style tag bound in a module of the snippet
#[derive(Clone, Debug, PartialEq)]
pub struct StyleTag {
  pub local: String,
  pub source_kind: SourceKind,
  pub style_form: StyleForm,
}

/// The declarations kept from one module
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SnippetModule {
  pub path: PathBuf,
  /// Variable, function and enum declarations, in original order
  pub code: String,
  /// Declarations whose value is a style tagged template
  ///
  /// These are only ever evaluated through the class name stand-in.
  pub class_stubs: String,
  pub imports: Vec<ImportedBinding>,
  pub exports: Vec<ExportedBinding>,
  pub star_exports: Vec<ImportSource>,
  pub style_tags: Vec<StyleTag>,
}

/// Everything needed to evaluate expressions of one file, without its side effects
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeclarationSnippet {
  /// Dependencies come before their dependents, the entry module is last
  pub modules: IndexMap<PathBuf, SnippetModule>,
  pub entry: PathBuf,
}

impl DeclarationSnippet {
  pub fn entry_module(&self) -> Option<&SnippetModule> {
    self.modules.get(&self.entry)
  }

  /// All kept declarations as one text, for diagnostics
  pub fn source(&self) -> String {
    let mut source = String::new();
    for module in self.modules.values() {
      source.push_str(&format!("// {}\n", to_slash(&module.path)));
      source.push_str(&module.code);
    }
    source
  }
}

#[derive(Clone, Copy, Debug)]
pub struct BundleOptions<'a> {
  pub package_name: &'a str,
  pub resolve_packages: &'a [String],
}

/// Collect the declarations of `entry` and of every module it imports
///
/// Relative imports are always followed, package imports only when listed in
/// `resolve_packages`. Statements other than declarations are dropped, so nothing is
/// ever executed for its side effects. Import cycles are followed once.
pub fn build_snippet(
  fs: &dyn FileSystem,
  entry: &Path,
  code: &str,
  options: &BundleOptions<'_>,
) -> Result<DeclarationSnippet, ResolveCause> {
  let mut bundler = Bundler {
    fs,
    options,
    modules: IndexMap::new(),
    in_progress: HashSet::new(),
  };

  bundler.visit(entry, code)?;

  tracing::debug!(
    entry = ?entry,
    modules = bundler.modules.len(),
    "Built declaration snippet"
  );

  Ok(DeclarationSnippet {
    modules: bundler.modules,
    entry: entry.to_path_buf(),
  })
}

struct Bundler<'a> {
  fs: &'a dyn FileSystem,
  options: &'a BundleOptions<'a>,
  modules: IndexMap<PathBuf, SnippetModule>,
  in_progress: HashSet<PathBuf>,
}

fn is_script(path: &Path) -> bool {
  let name = path.to_string_lossy();
  RESOLVE_EXTENSIONS
    .iter()
    .chain([".cjs", ".cts"].iter())
    .any(|extension| name.ends_with(extension))
}

fn export_name(name: &ModuleExportName) -> String {
  match name {
    ModuleExportName::Ident(ident) => ident.sym.to_string(),
    ModuleExportName::Str(name) => name.value.to_string(),
  }
}

fn var_kind(kind: VarDeclKind) -> &'static str {
  match kind {
    VarDeclKind::Var => "var",
    VarDeclKind::Let => "let",
    VarDeclKind::Const => "const",
  }
}

/// Text of `export default ...` without the keywords
fn strip_export_default(text: &str) -> &str {
  text
    .trim_start()
    .trim_start_matches("export")
    .trim_start()
    .trim_start_matches("default")
    .trim_start()
}

fn declared_names(decl: &VarDecl) -> Vec<String> {
  let mut names = Vec::new();
  for declarator in &decl.decls {
    collect_pat_names(&declarator.name, &mut names);
  }
  names
}

pub(crate) fn collect_pat_names(pat: &swc_core::ecma::ast::Pat, names: &mut Vec<String>) {
  use swc_core::ecma::ast::ObjectPatProp;
  use swc_core::ecma::ast::Pat;

  match pat {
    Pat::Ident(binding) => names.push(binding.id.sym.to_string()),
    Pat::Array(array) => {
      for elem in array.elems.iter().flatten() {
        collect_pat_names(elem, names);
      }
    }
    Pat::Object(object) => {
      for prop in &object.props {
        match prop {
          ObjectPatProp::KeyValue(key_value) => collect_pat_names(&key_value.value, names),
          ObjectPatProp::Assign(assign) => names.push(assign.key.sym.to_string()),
          ObjectPatProp::Rest(rest) => collect_pat_names(&rest.arg, names),
        }
      }
    }
    Pat::Assign(assign) => collect_pat_names(&assign.left, names),
    Pat::Rest(rest) => collect_pat_names(&rest.arg, names),
    Pat::Expr(_) | Pat::Invalid(_) => {}
  }
}

impl Bundler<'_> {
  fn visit(&mut self, path: &Path, code: &str) -> Result<(), ResolveCause> {
    self.in_progress.insert(path.to_path_buf());

    let file_name = to_slash(path);
    let module = if file_name.ends_with(".json") {
      SnippetModule {
        path: path.to_path_buf(),
        code: format!("const {} = {};\n", DEFAULT_EXPORT_LOCAL, code.trim()),
        exports: vec![ExportedBinding::Local {
          exported: "default".into(),
          local: DEFAULT_EXPORT_LOCAL.into(),
        }],
        ..SnippetModule::default()
      }
    } else {
      let parsed = parse_module(code, &file_name).map_err(|error| ResolveCause::Syntax(error.to_string()))?;
      self.collect(path, &parsed)
    };

    self.in_progress.remove(path);
    self.modules.insert(path.to_path_buf(), module);
    Ok(())
  }

  fn import_source(&mut self, importer: &Path, specifier: &str) -> ImportSource {
    let resolution =
      match resolve_specifier(self.fs, importer, specifier, self.options.resolve_packages) {
        Ok(resolution) => resolution,
        Err(cause) => return ImportSource::Unresolved(cause),
      };

    let path = match resolution {
      Resolution::External(package) => return ImportSource::External(package),
      Resolution::File(path) => path,
    };

    if !is_script(&path) && !path.to_string_lossy().ends_with(".json") {
      return ImportSource::Unresolved(ResolveCause::Unsupported(format!(
        "import of non-script module {}",
        specifier
      )));
    }

    if self.modules.contains_key(&path) || self.in_progress.contains(&path) {
      return ImportSource::Module(path);
    }

    let code = match self.fs.read_to_string(&path) {
      Ok(code) => code,
      Err(error) => {
        return ImportSource::Unresolved(ResolveCause::Runtime(format!(
          "Failed to read {}: {}",
          path.display(),
          error
        )))
      }
    };

    match self.visit(&path, &code) {
      Ok(()) => ImportSource::Module(path),
      Err(cause) => {
        self.in_progress.remove(&path);
        ImportSource::Unresolved(cause)
      }
    }
  }

  fn collect(&mut self, path: &Path, parsed: &ParsedModule) -> SnippetModule {
    let style_tags: Vec<StyleTag> = tag_bindings(parsed, self.options.package_name)
      .into_iter()
      .map(|(_, binding)| StyleTag {
        local: binding.local_alias,
        source_kind: binding.source_kind,
        style_form: binding.style_form,
      })
      .collect();
    let tag_names: HashSet<&str> = style_tags.iter().map(|tag| tag.local.as_str()).collect();
    let is_style_tagged = |expr: &Expr| match expr {
      Expr::TaggedTpl(tagged) => {
        matches!(&*tagged.tag, Expr::Ident(tag) if tag_names.contains(&*tag.sym))
      }
      _ => false,
    };

    let mut module = SnippetModule {
      path: path.to_path_buf(),
      ..SnippetModule::default()
    };

    let push_var = |module: &mut SnippetModule, decl: &VarDecl| {
      if decl.declare {
        return;
      }
      for declarator in &decl.decls {
        let text = format!("{} {};\n", var_kind(decl.kind), parsed.text(declarator));
        if declarator.init.as_deref().is_some_and(is_style_tagged) {
          module.class_stubs.push_str(&text);
        } else {
          module.code.push_str(&text);
        }
      }
    };

    for item in &parsed.module.body {
      match item {
        ModuleItem::ModuleDecl(ModuleDecl::Import(import)) => {
          if import.type_only
            || import.specifiers.is_empty()
            || is_style_module(self.options.package_name, &import.src.value)
          {
            continue;
          }

          let source = self.import_source(path, &import.src.value);
          for specifier in &import.specifiers {
            let (local, imported) = match specifier {
              ImportSpecifier::Named(named) => {
                if named.is_type_only {
                  continue;
                }
                let imported = named
                  .imported
                  .as_ref()
                  .map(export_name)
                  .unwrap_or_else(|| named.local.sym.to_string());
                let imported = if imported == "default" {
                  ImportedName::Default
                } else {
                  ImportedName::Named(imported)
                };
                (named.local.sym.to_string(), imported)
              }
              ImportSpecifier::Default(default) => {
                (default.local.sym.to_string(), ImportedName::Default)
              }
              ImportSpecifier::Namespace(namespace) => {
                (namespace.local.sym.to_string(), ImportedName::Namespace)
              }
            };
            module.imports.push(ImportedBinding {
              local,
              source: source.clone(),
              imported,
            });
          }
        }
        ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(export)) => match &export.decl {
          Decl::Var(var) => {
            push_var(&mut module, var);
            for name in declared_names(var) {
              module.exports.push(ExportedBinding::Local {
                exported: name.clone(),
                local: name,
              });
            }
          }
          Decl::Fn(function) => {
            module.code.push_str(parsed.text(&export.decl));
            module.code.push('\n');
            let name = function.ident.sym.to_string();
            module.exports.push(ExportedBinding::Local {
              exported: name.clone(),
              local: name,
            });
          }
          Decl::TsEnum(ts_enum) => {
            module.code.push_str(&enum_object(parsed, ts_enum));
            let name = ts_enum.id.sym.to_string();
            module.exports.push(ExportedBinding::Local {
              exported: name.clone(),
              local: name,
            });
          }
          _ => {}
        },
        ModuleItem::ModuleDecl(ModuleDecl::ExportNamed(named)) => {
          if named.type_only {
            continue;
          }
          let source = named
            .src
            .as_ref()
            .map(|src| self.import_source(path, &src.value));

          for specifier in &named.specifiers {
            let export = match (specifier, &source) {
              (ExportSpecifier::Named(named), None) => {
                if named.is_type_only {
                  continue;
                }
                let local = export_name(&named.orig);
                ExportedBinding::Local {
                  exported: named.exported.as_ref().map(export_name).unwrap_or_else(|| local.clone()),
                  local,
                }
              }
              (ExportSpecifier::Named(named), Some(source)) => {
                if named.is_type_only {
                  continue;
                }
                let orig = export_name(&named.orig);
                ExportedBinding::Reexport {
                  exported: named.exported.as_ref().map(export_name).unwrap_or_else(|| orig.clone()),
                  source: source.clone(),
                  imported: if orig == "default" {
                    ImportedName::Default
                  } else {
                    ImportedName::Named(orig)
                  },
                }
              }
              (ExportSpecifier::Namespace(namespace), Some(source)) => ExportedBinding::Reexport {
                exported: export_name(&namespace.name),
                source: source.clone(),
                imported: ImportedName::Namespace,
              },
              (ExportSpecifier::Default(default), Some(source)) => ExportedBinding::Reexport {
                exported: default.exported.sym.to_string(),
                source: source.clone(),
                imported: ImportedName::Default,
              },
              _ => continue,
            };
            module.exports.push(export);
          }
        }
        ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultExpr(export)) => {
          let text = format!(
            "const {} = {};\n",
            DEFAULT_EXPORT_LOCAL,
            parsed.text(&*export.expr)
          );
          if is_style_tagged(&export.expr) {
            module.class_stubs.push_str(&text);
          } else {
            module.code.push_str(&text);
          }
          module.exports.push(ExportedBinding::Local {
            exported: "default".into(),
            local: DEFAULT_EXPORT_LOCAL.into(),
          });
        }
        ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultDecl(export)) => {
          if let DefaultDecl::Fn(function) = &export.decl {
            let text = strip_export_default(parsed.text(export));
            let local = match &function.ident {
              Some(ident) => {
                module.code.push_str(text);
                module.code.push('\n');
                ident.sym.to_string()
              }
              None => {
                module
                  .code
                  .push_str(&format!("const {} = {};\n", DEFAULT_EXPORT_LOCAL, text));
                DEFAULT_EXPORT_LOCAL.to_string()
              }
            };
            module.exports.push(ExportedBinding::Local {
              exported: "default".into(),
              local,
            });
          }
        }
        ModuleItem::ModuleDecl(ModuleDecl::ExportAll(export)) => {
          if !export.type_only {
            let source = self.import_source(path, &export.src.value);
            module.star_exports.push(source);
          }
        }
        ModuleItem::Stmt(Stmt::Decl(Decl::Var(var))) => push_var(&mut module, var),
        ModuleItem::Stmt(Stmt::Decl(decl @ Decl::Fn(_))) => {
          module.code.push_str(parsed.text(decl));
          module.code.push('\n');
        }
        ModuleItem::Stmt(Stmt::Decl(Decl::TsEnum(ts_enum))) => {
          module.code.push_str(&enum_object(parsed, ts_enum));
        }
        _ => {}
      }
    }

    module.style_tags = style_tags;
    module
  }
}

/// A TypeScript enum as a plain object declaration
fn enum_object(parsed: &ParsedModule, ts_enum: &TsEnumDecl) -> String {
  let mut members = Vec::new();
  let mut next_value = Some(0f64);

  for member in &ts_enum.members {
    let key = match &member.id {
      TsEnumMemberId::Ident(ident) => ident.sym.to_string(),
      TsEnumMemberId::Str(name) => name.value.to_string(),
    };
    let value = match &member.init {
      Some(init) => {
        next_value = match &**init {
          Expr::Lit(swc_core::ecma::ast::Lit::Num(number)) => Some(number.value + 1.0),
          _ => None,
        };
        parsed.text(&**init).to_string()
      }
      None => {
        let value = next_value.unwrap_or(f64::NAN);
        next_value = next_value.map(|value| value + 1.0);
        value.to_string()
      }
    };
    members.push(format!("{:?}: {}", key, value));
  }

  format!("const {} = {{ {} }};\n", ts_enum.id.sym, members.join(", "))
}
