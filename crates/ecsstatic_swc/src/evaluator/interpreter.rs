use std::cell::Cell;
use std::cell::RefCell;
use std::collections::HashMap;
use std::collections::HashSet;
use std::path::PathBuf;
use std::rc::Rc;

use ecsstatic_core::types::StyleForm;
use ecsstatic_core::CONFIGURATION_ERROR_MESSAGE;
use ecsstatic_core::ResolveCause;
use ecsstatic_css::modules::rename_local_classes;
use ecsstatic_css::normalizer::split_directives;
use ecsstatic_filesystem::to_slash;
use ecsstatic_hash::class_name_for;
use indexmap::IndexMap;
use indexmap::IndexSet;
use swc_core::ecma::ast::*;

use super::builtins;
use super::value::number_to_string;
use super::value::Closure;
use super::value::ClosureBody;
use super::value::JsValue;
use super::value::Scope;
use crate::bundler::collect_pat_names;
use crate::bundler::DeclarationSnippet;
use crate::bundler::ExportedBinding;
use crate::bundler::ImportSource;
use crate::bundler::ImportedBinding;
use crate::bundler::ImportedName;
use crate::bundler::SnippetModule;
use crate::parse::parse_module;

/// Nesting limit for function calls and re-export chains
const MAX_DEPTH: usize = 200;

type EvalResult = Result<JsValue, ResolveCause>;

enum Declaration {
  Binding {
    pattern: Rc<Pat>,
    init: Option<Rc<Expr>>,
  },
  Function(Rc<Function>),
}

struct ModuleScope {
  declarations: HashMap<String, Declaration>,
  imports: HashMap<String, ImportedBinding>,
  exports: Vec<ExportedBinding>,
  star_exports: Vec<ImportSource>,
  style_tags: HashMap<String, StyleForm>,
}

impl ModuleScope {
  fn new(module: &SnippetModule) -> Result<Self, ResolveCause> {
    let file_name = to_slash(&module.path);
    let mut declarations = HashMap::new();

    for code in [&module.code, &module.class_stubs] {
      if code.trim().is_empty() {
        continue;
      }
      let parsed =
        parse_module(code, &file_name).map_err(|error| ResolveCause::Syntax(error.to_string()))?;

      for item in parsed.module.body {
        match item {
          ModuleItem::Stmt(Stmt::Decl(Decl::Var(var))) => {
            for declarator in var.decls {
              let pattern = Rc::new(declarator.name);
              let init = declarator.init.map(|init| Rc::new(*init));
              let mut names = Vec::new();
              collect_pat_names(&pattern, &mut names);
              for name in names {
                declarations.insert(
                  name,
                  Declaration::Binding {
                    pattern: pattern.clone(),
                    init: init.clone(),
                  },
                );
              }
            }
          }
          ModuleItem::Stmt(Stmt::Decl(Decl::Fn(function))) => {
            declarations.insert(
              function.ident.sym.to_string(),
              Declaration::Function(Rc::new(*function.function)),
            );
          }
          _ => {}
        }
      }
    }

    Ok(ModuleScope {
      declarations,
      imports: module
        .imports
        .iter()
        .map(|binding| (binding.local.clone(), binding.clone()))
        .collect(),
      exports: module.exports.clone(),
      star_exports: module.star_exports.clone(),
      style_tags: module
        .style_tags
        .iter()
        .map(|tag| (tag.local.clone(), tag.style_form))
        .collect(),
    })
  }
}

#[derive(Clone)]
struct Context {
  module: usize,
  scope: Option<Rc<Scope>>,
}

/// Evaluates expressions against the declarations of a snippet
///
/// Module-level bindings are evaluated lazily and at most once. Nothing outside the
/// snippet is reachable: no I/O, no timers, no host objects.
pub(crate) struct Interpreter<'a> {
  modules: Vec<ModuleScope>,
  module_index: HashMap<PathBuf, usize>,
  entry: usize,
  class_name_prefix: &'a str,
  memo: RefCell<HashMap<(usize, String), JsValue>>,
  in_progress: RefCell<HashSet<(usize, String)>>,
  depth: Cell<usize>,
}

fn describe(expr: &Expr) -> &'static str {
  match expr {
    Expr::Assign(_) => "assignment",
    Expr::Update(_) => "update expression",
    Expr::New(_) => "`new` expression",
    Expr::Class(_) => "class expression",
    Expr::Await(_) => "`await` expression",
    Expr::Yield(_) => "`yield` expression",
    Expr::JSXElement(_) | Expr::JSXFragment(_) | Expr::JSXEmpty(_) | Expr::JSXMember(_) => "JSX",
    Expr::MetaProp(_) => "meta property",
    Expr::SuperProp(_) => "`super` property",
    Expr::PrivateName(_) => "private name",
    _ => "expression",
  }
}

fn to_int32(value: f64) -> i32 {
  if !value.is_finite() {
    return 0;
  }
  (value.trunc() % 4294967296.0) as i64 as u32 as i32
}

fn property_key(value: &JsValue) -> String {
  match value {
    JsValue::Number(number) => number_to_string(*number),
    other => other.to_js_string(),
  }
}

fn is_primitive_for_addition(value: &JsValue) -> bool {
  matches!(
    value,
    JsValue::Undefined | JsValue::Null | JsValue::Bool(_) | JsValue::Number(_)
  )
}

impl<'a> Interpreter<'a> {
  pub(crate) fn new(
    snippet: &DeclarationSnippet,
    class_name_prefix: &'a str,
  ) -> Result<Self, ResolveCause> {
    let mut modules = Vec::with_capacity(snippet.modules.len());
    let mut module_index = HashMap::new();

    for (index, (path, module)) in snippet.modules.iter().enumerate() {
      module_index.insert(path.clone(), index);
      modules.push(ModuleScope::new(module)?);
    }

    let entry = module_index.get(&snippet.entry).copied().ok_or_else(|| {
      ResolveCause::Runtime(format!(
        "{} is missing from the declaration snippet",
        to_slash(&snippet.entry)
      ))
    })?;

    Ok(Interpreter {
      modules,
      module_index,
      entry,
      class_name_prefix,
      memo: RefCell::default(),
      in_progress: RefCell::default(),
      depth: Cell::new(0),
    })
  }

  /// Evaluate an expression in the scope of the entry module
  pub(crate) fn evaluate(&self, expr: &Expr) -> EvalResult {
    let context = Context {
      module: self.entry,
      scope: None,
    };
    let value = self.eval(expr, &context)?;
    self.materialize(value)
  }

  fn module_binding(&self, module: usize, name: &str) -> Option<EvalResult> {
    let scope = &self.modules[module];
    if let Some(declaration) = scope.declarations.get(name) {
      return Some(self.declaration_value(module, name, declaration));
    }
    scope
      .imports
      .get(name)
      .map(|binding| self.import_value(&binding.source, &binding.imported, name))
  }

  fn declaration_value(&self, module: usize, name: &str, declaration: &Declaration) -> EvalResult {
    let key = (module, name.to_string());
    if let Some(value) = self.memo.borrow().get(&key) {
      return Ok(value.clone());
    }
    if !self.in_progress.borrow_mut().insert(key.clone()) {
      return Err(ResolveCause::Cycle(name.to_string()));
    }

    let context = Context {
      module,
      scope: None,
    };
    let result = match declaration {
      Declaration::Binding { pattern, init } => {
        let value = match init {
          Some(init) => self.eval(init, &context),
          None => Ok(JsValue::Undefined),
        };
        value.and_then(|value| match &**pattern {
          Pat::Ident(_) => Ok(value),
          pattern => {
            let scope = Scope::child(None);
            self.bind_pattern(pattern, value, &scope, &context)?;
            Ok(scope.lookup(name).unwrap_or(JsValue::Undefined))
          }
        })
      }
      Declaration::Function(function) => Ok(self.function_value(function, module, None)),
    };

    self.in_progress.borrow_mut().remove(&key);
    if let Ok(value) = &result {
      self.memo.borrow_mut().insert(key, value.clone());
    }
    result
  }

  fn import_value(&self, source: &ImportSource, imported: &ImportedName, local: &str) -> EvalResult {
    match source {
      ImportSource::Module(path) => {
        let module = self
          .module_index
          .get(path)
          .copied()
          .ok_or_else(|| ResolveCause::UnresolvedReference(local.to_string()))?;
        match imported {
          ImportedName::Named(name) => self.export_value(module, name),
          ImportedName::Default => self.export_value(module, "default"),
          ImportedName::Namespace => Ok(JsValue::Namespace(module)),
        }
      }
      ImportSource::External(package) => Err(ResolveCause::ExternalPackage(package.clone())),
      ImportSource::Unresolved(cause) => Err(cause.clone()),
    }
  }

  fn export_value(&self, module: usize, name: &str) -> EvalResult {
    self.find_export(module, name, 0).unwrap_or_else(|| {
      Err(ResolveCause::UnresolvedReference(format!(
        "{} (not exported by {})",
        name,
        self
          .module_index
          .iter()
          .find(|(_, index)| **index == module)
          .map(|(path, _)| to_slash(path))
          .unwrap_or_default()
      )))
    })
  }

  fn find_export(&self, module: usize, name: &str, depth: usize) -> Option<EvalResult> {
    if depth > MAX_DEPTH {
      return Some(Err(ResolveCause::Cycle(name.to_string())));
    }

    let scope = &self.modules[module];
    if let Some(export) = scope.exports.iter().find(|export| export.exported() == name) {
      return Some(match export {
        ExportedBinding::Local { local, .. } => self
          .module_binding(module, local)
          .unwrap_or_else(|| Err(ResolveCause::UnresolvedReference(local.clone()))),
        ExportedBinding::Reexport {
          source, imported, ..
        } => self.import_value(source, imported, name),
      });
    }

    if name == "default" {
      return None;
    }

    scope.star_exports.iter().find_map(|source| match source {
      ImportSource::Module(path) => {
        let index = *self.module_index.get(path)?;
        self.find_export(index, name, depth + 1)
      }
      _ => None,
    })
  }

  fn export_names(&self, module: usize, names: &mut IndexSet<String>, depth: usize) {
    if depth > MAX_DEPTH {
      return;
    }
    let scope = &self.modules[module];
    for export in &scope.exports {
      names.insert(export.exported().to_string());
    }
    for source in &scope.star_exports {
      if let ImportSource::Module(path) = source {
        if let Some(index) = self.module_index.get(path) {
          let mut starred = IndexSet::new();
          self.export_names(*index, &mut starred, depth + 1);
          names.extend(starred.into_iter().filter(|name| name != "default"));
        }
      }
    }
  }

  /// Turn a module namespace into a plain object of its exports
  fn materialize(&self, value: JsValue) -> EvalResult {
    let JsValue::Namespace(module) = value else {
      return Ok(value);
    };

    let mut names = IndexSet::new();
    self.export_names(module, &mut names, 0);
    let mut object = IndexMap::new();
    for name in names {
      let value = self.export_value(module, &name)?;
      object.insert(name, value);
    }
    Ok(JsValue::Object(object))
  }

  fn identifier(&self, name: &str, context: &Context) -> EvalResult {
    if let Some(value) = context.scope.as_ref().and_then(|scope| scope.lookup(name)) {
      return Ok(value);
    }
    if let Some(result) = self.module_binding(context.module, name) {
      return result;
    }
    builtins::global(name).ok_or_else(|| ResolveCause::UnresolvedReference(name.to_string()))
  }

  fn eval(&self, expr: &Expr, context: &Context) -> EvalResult {
    match expr {
      Expr::Lit(lit) => literal(lit),
      Expr::Tpl(tpl) => {
        let mut text = String::new();
        for (index, quasi) in tpl.quasis.iter().enumerate() {
          match &quasi.cooked {
            Some(cooked) => text.push_str(cooked),
            None => text.push_str(&quasi.raw),
          }
          if let Some(expr) = tpl.exprs.get(index) {
            text.push_str(&self.eval(expr, context)?.to_js_string());
          }
        }
        Ok(JsValue::String(text))
      }
      Expr::TaggedTpl(tagged) => self.tagged_template(tagged, context),
      Expr::Ident(ident) => self.identifier(&ident.sym, context),
      Expr::This(_) => Ok(JsValue::Undefined),
      Expr::Paren(paren) => self.eval(&paren.expr, context),
      Expr::TsAs(cast) => self.eval(&cast.expr, context),
      Expr::TsSatisfies(cast) => self.eval(&cast.expr, context),
      Expr::TsNonNull(cast) => self.eval(&cast.expr, context),
      Expr::TsConstAssertion(cast) => self.eval(&cast.expr, context),
      Expr::TsTypeAssertion(cast) => self.eval(&cast.expr, context),
      Expr::TsInstantiation(cast) => self.eval(&cast.expr, context),
      Expr::Member(member) => {
        let object = self.eval(&member.obj, context)?;
        let key = self.member_key(&member.prop, context)?;
        self.get_property(&object, &key)
      }
      Expr::OptChain(chain) => Ok(self.opt_chain(chain, context)?.unwrap_or(JsValue::Undefined)),
      Expr::Array(array) => {
        let mut items = Vec::with_capacity(array.elems.len());
        for elem in &array.elems {
          match elem {
            None => items.push(JsValue::Undefined),
            Some(ExprOrSpread {
              spread: Some(_),
              expr,
            }) => {
              let value = self.eval(expr, context)?;
              items.extend(self.iterate(value)?);
            }
            Some(ExprOrSpread { expr, .. }) => items.push(self.eval(expr, context)?),
          }
        }
        Ok(JsValue::Array(items))
      }
      Expr::Object(object) => self.object(object, context),
      Expr::Unary(unary) => self.unary(unary, context),
      Expr::Bin(bin) => self.binary(bin, context),
      Expr::Cond(cond) => {
        if self.eval(&cond.test, context)?.is_truthy() {
          self.eval(&cond.cons, context)
        } else {
          self.eval(&cond.alt, context)
        }
      }
      Expr::Seq(seq) => {
        let mut value = JsValue::Undefined;
        for expr in &seq.exprs {
          value = self.eval(expr, context)?;
        }
        Ok(value)
      }
      Expr::Arrow(arrow) => Ok(JsValue::Function(Rc::new(Closure {
        params: arrow.params.clone(),
        body: match &*arrow.body {
          BlockStmtOrExpr::BlockStmt(block) => ClosureBody::Block(block.stmts.clone()),
          BlockStmtOrExpr::Expr(expr) => ClosureBody::Expr(expr.clone()),
        },
        module: context.module,
        scope: context.scope.clone(),
      }))),
      Expr::Fn(function) => Ok(self.function_value(
        &function.function,
        context.module,
        context.scope.clone(),
      )),
      Expr::Call(call) => self.call(call, context),
      other => Err(ResolveCause::Unsupported(describe(other).to_string())),
    }
  }

  fn function_value(&self, function: &Function, module: usize, scope: Option<Rc<Scope>>) -> JsValue {
    JsValue::Function(Rc::new(Closure {
      params: function.params.iter().map(|param| param.pat.clone()).collect(),
      body: ClosureBody::Block(
        function
          .body
          .as_ref()
          .map(|body| body.stmts.clone())
          .unwrap_or_default(),
      ),
      module,
      scope,
    }))
  }

  /// Form of the style tag `expr` refers to, unless a local binding shadows it
  fn style_tag(&self, expr: &Expr, context: &Context) -> Option<StyleForm> {
    match expr {
      Expr::Ident(tag)
        if context
          .scope
          .as_ref()
          .map_or(true, |scope| scope.lookup(&tag.sym).is_none()) =>
      {
        self.modules[context.module].style_tags.get(&*tag.sym).copied()
      }
      _ => None,
    }
  }

  /// Stand-in for a style tagged template: the class name the template compiles to
  fn tagged_template(&self, tagged: &TaggedTpl, context: &Context) -> EvalResult {
    let Some(form) = self.style_tag(&tagged.tag, context) else {
      return Err(ResolveCause::Unsupported("tagged template".into()));
    };

    let mut text = String::new();
    for (index, quasi) in tagged.tpl.quasis.iter().enumerate() {
      text.push_str(&quasi.raw);
      if let Some(expr) = tagged.tpl.exprs.get(index) {
        text.push_str(&self.eval(expr, context)?.to_js_string());
      }
    }

    let class_name = class_name_for(self.class_name_prefix, &text);
    Ok(match form {
      StyleForm::Scoped => JsValue::String(class_name),
      StyleForm::GlobalUnscoped => JsValue::Undefined,
      StyleForm::Modules => {
        let (_, body) = split_directives(text.trim());
        JsValue::Object(
          rename_local_classes(&body, &class_name)
            .classes
            .into_iter()
            .map(|(local, generated)| (local, JsValue::String(generated)))
            .collect(),
        )
      }
    })
  }

  fn member_key(&self, prop: &MemberProp, context: &Context) -> Result<String, ResolveCause> {
    match prop {
      MemberProp::Ident(ident) => Ok(ident.sym.to_string()),
      MemberProp::Computed(computed) => Ok(property_key(&self.eval(&computed.expr, context)?)),
      MemberProp::PrivateName(_) => Err(ResolveCause::Unsupported("private name".into())),
    }
  }

  fn prop_name(&self, name: &PropName, context: &Context) -> Result<String, ResolveCause> {
    match name {
      PropName::Ident(ident) => Ok(ident.sym.to_string()),
      PropName::Str(name) => Ok(name.value.to_string()),
      PropName::Num(number) => Ok(number_to_string(number.value)),
      PropName::Computed(computed) => Ok(property_key(&self.eval(&computed.expr, context)?)),
      PropName::BigInt(_) => Err(ResolveCause::Unsupported("BigInt property name".into())),
    }
  }

  fn get_property(&self, object: &JsValue, key: &str) -> EvalResult {
    let value = match object {
      JsValue::Undefined | JsValue::Null => {
        return Err(ResolveCause::Runtime(format!(
          "Cannot read properties of {} (reading '{}')",
          object.to_js_string(),
          key
        )))
      }
      JsValue::String(value) => match key {
        "length" => JsValue::Number(value.encode_utf16().count() as f64),
        _ => key
          .parse::<usize>()
          .ok()
          .and_then(|index| value.chars().nth(index))
          .map(|c| JsValue::String(c.to_string()))
          .unwrap_or(JsValue::Undefined),
      },
      JsValue::Array(items) => match key {
        "length" => JsValue::Number(items.len() as f64),
        _ => key
          .parse::<usize>()
          .ok()
          .and_then(|index| items.get(index).cloned())
          .unwrap_or(JsValue::Undefined),
      },
      JsValue::Object(entries) => entries.get(key).cloned().unwrap_or(JsValue::Undefined),
      JsValue::Namespace(module) => {
        return self.find_export(*module, key, 0).unwrap_or(Ok(JsValue::Undefined))
      }
      JsValue::Builtin(builtin) => builtins::property(*builtin, key),
      JsValue::Bool(_) | JsValue::Number(_) | JsValue::Function(_) => JsValue::Undefined,
    };
    Ok(value)
  }

  fn opt_chain(&self, chain: &OptChainExpr, context: &Context) -> Result<Option<JsValue>, ResolveCause> {
    match &*chain.base {
      OptChainBase::Member(member) => {
        let Some(object) = self.chain_link(&member.obj, context)? else {
          return Ok(None);
        };
        if chain.optional && object.is_nullish() {
          return Ok(None);
        }
        let key = self.member_key(&member.prop, context)?;
        self.get_property(&object, &key).map(Some)
      }
      OptChainBase::Call(call) => {
        let method = match &*call.callee {
          Expr::Member(member) => Some((member, false)),
          Expr::OptChain(inner) => match &*inner.base {
            OptChainBase::Member(member) => Some((member, inner.optional)),
            OptChainBase::Call(_) => None,
          },
          _ => None,
        };

        if let Some((member, optional)) = method {
          let Some(receiver) = self.chain_link(&member.obj, context)? else {
            return Ok(None);
          };
          if optional && receiver.is_nullish() {
            return Ok(None);
          }
          let name = self.member_key(&member.prop, context)?;
          if chain.optional && self.get_property(&receiver, &name)?.is_nullish() {
            return Ok(None);
          }
          let args = self.arguments(&call.args, context)?;
          return self.call_method(receiver, &name, args).map(Some);
        }

        let Some(function) = self.chain_link(&call.callee, context)? else {
          return Ok(None);
        };
        if chain.optional && function.is_nullish() {
          return Ok(None);
        }
        let args = self.arguments(&call.args, context)?;
        self.call_value(&function, args).map(Some)
      }
    }
  }

  /// Value of an inner link of an optional chain, `None` once the chain short-circuits
  fn chain_link(&self, expr: &Expr, context: &Context) -> Result<Option<JsValue>, ResolveCause> {
    match expr {
      Expr::OptChain(inner) => self.opt_chain(inner, context),
      expr => self.eval(expr, context).map(Some),
    }
  }

  fn iterate(&self, value: JsValue) -> Result<Vec<JsValue>, ResolveCause> {
    match value {
      JsValue::Array(items) => Ok(items),
      JsValue::String(value) => Ok(
        value
          .chars()
          .map(|c| JsValue::String(c.to_string()))
          .collect(),
      ),
      other => Err(ResolveCause::Runtime(format!(
        "{} is not iterable",
        other.to_js_string()
      ))),
    }
  }

  fn entries(&self, value: JsValue) -> Result<IndexMap<String, JsValue>, ResolveCause> {
    Ok(match self.materialize(value)? {
      JsValue::Object(entries) => entries,
      JsValue::Array(items) => items
        .into_iter()
        .enumerate()
        .map(|(index, item)| (index.to_string(), item))
        .collect(),
      JsValue::String(value) => value
        .chars()
        .enumerate()
        .map(|(index, c)| (index.to_string(), JsValue::String(c.to_string())))
        .collect(),
      _ => IndexMap::new(),
    })
  }

  fn object(&self, object: &ObjectLit, context: &Context) -> EvalResult {
    let mut entries = IndexMap::new();

    for prop in &object.props {
      match prop {
        PropOrSpread::Spread(spread) => {
          let value = self.eval(&spread.expr, context)?;
          entries.extend(self.entries(value)?);
        }
        PropOrSpread::Prop(prop) => match &**prop {
          Prop::Shorthand(ident) => {
            entries.insert(ident.sym.to_string(), self.identifier(&ident.sym, context)?);
          }
          Prop::KeyValue(key_value) => {
            let key = self.prop_name(&key_value.key, context)?;
            entries.insert(key, self.eval(&key_value.value, context)?);
          }
          Prop::Method(method) => {
            let key = self.prop_name(&method.key, context)?;
            entries.insert(
              key,
              self.function_value(&method.function, context.module, context.scope.clone()),
            );
          }
          Prop::Getter(_) | Prop::Setter(_) => {
            return Err(ResolveCause::Unsupported("object accessor".into()))
          }
          Prop::Assign(_) => return Err(ResolveCause::Unsupported("assignment".into())),
        },
      }
    }

    Ok(JsValue::Object(entries))
  }

  fn unary(&self, unary: &UnaryExpr, context: &Context) -> EvalResult {
    if unary.op == UnaryOp::TypeOf {
      let value = match &*unary.arg {
        Expr::Ident(ident) => match self.identifier(&ident.sym, context) {
          Err(ResolveCause::UnresolvedReference(_)) => JsValue::Undefined,
          other => other?,
        },
        arg => self.eval(arg, context)?,
      };
      return Ok(JsValue::String(value.type_of().to_string()));
    }

    let value = self.eval(&unary.arg, context)?;
    Ok(match unary.op {
      UnaryOp::Minus => JsValue::Number(-value.to_number()),
      UnaryOp::Plus => JsValue::Number(value.to_number()),
      UnaryOp::Bang => JsValue::Bool(!value.is_truthy()),
      UnaryOp::Tilde => JsValue::Number(f64::from(!to_int32(value.to_number()))),
      UnaryOp::Void => JsValue::Undefined,
      _ => return Err(ResolveCause::Unsupported("`delete` expression".into())),
    })
  }

  fn binary(&self, bin: &BinExpr, context: &Context) -> EvalResult {
    let left = self.eval(&bin.left, context)?;
    match bin.op {
      BinaryOp::LogicalAnd if !left.is_truthy() => return Ok(left),
      BinaryOp::LogicalOr if left.is_truthy() => return Ok(left),
      BinaryOp::NullishCoalescing if !left.is_nullish() => return Ok(left),
      BinaryOp::LogicalAnd | BinaryOp::LogicalOr | BinaryOp::NullishCoalescing => {
        return self.eval(&bin.right, context)
      }
      _ => {}
    }

    let left = self.materialize(left)?;
    let right = self.materialize(self.eval(&bin.right, context)?)?;
    let number = |op: fn(f64, f64) -> f64| JsValue::Number(op(left.to_number(), right.to_number()));
    let int = |op: fn(i32, i32) -> i32| {
      JsValue::Number(f64::from(op(
        to_int32(left.to_number()),
        to_int32(right.to_number()),
      )))
    };
    let compare = |op: fn(std::cmp::Ordering) -> bool| {
      let ordering = match (&left, &right) {
        (JsValue::String(a), JsValue::String(b)) => Some(a.cmp(b)),
        _ => left.to_number().partial_cmp(&right.to_number()),
      };
      JsValue::Bool(ordering.is_some_and(op))
    };

    Ok(match bin.op {
      BinaryOp::Add => {
        if is_primitive_for_addition(&left) && is_primitive_for_addition(&right) {
          JsValue::Number(left.to_number() + right.to_number())
        } else {
          JsValue::String(format!("{}{}", left.to_js_string(), right.to_js_string()))
        }
      }
      BinaryOp::Sub => number(|a, b| a - b),
      BinaryOp::Mul => number(|a, b| a * b),
      BinaryOp::Div => number(|a, b| a / b),
      BinaryOp::Mod => number(|a, b| a % b),
      BinaryOp::Exp => number(f64::powf),
      BinaryOp::Lt => compare(|ordering| ordering.is_lt()),
      BinaryOp::LtEq => compare(|ordering| ordering.is_le()),
      BinaryOp::Gt => compare(|ordering| ordering.is_gt()),
      BinaryOp::GtEq => compare(|ordering| ordering.is_ge()),
      BinaryOp::EqEqEq => JsValue::Bool(left.strict_equals(&right)),
      BinaryOp::NotEqEq => JsValue::Bool(!left.strict_equals(&right)),
      BinaryOp::EqEq => JsValue::Bool(left.loose_equals(&right)),
      BinaryOp::NotEq => JsValue::Bool(!left.loose_equals(&right)),
      BinaryOp::BitAnd => int(|a, b| a & b),
      BinaryOp::BitOr => int(|a, b| a | b),
      BinaryOp::BitXor => int(|a, b| a ^ b),
      BinaryOp::LShift => int(|a, b| a.wrapping_shl(b as u32 & 31)),
      BinaryOp::RShift => int(|a, b| a.wrapping_shr(b as u32 & 31)),
      BinaryOp::ZeroFillRShift => JsValue::Number(f64::from(
        (to_int32(left.to_number()) as u32) >> (to_int32(right.to_number()) as u32 & 31),
      )),
      BinaryOp::In => {
        let key = property_key(&left);
        match &right {
          JsValue::Object(entries) => JsValue::Bool(entries.contains_key(&key)),
          JsValue::Array(items) => JsValue::Bool(
            key == "length" || key.parse::<usize>().is_ok_and(|index| index < items.len()),
          ),
          other => {
            return Err(ResolveCause::Runtime(format!(
              "Cannot use 'in' operator to search for '{}' in {}",
              key,
              other.to_js_string()
            )))
          }
        }
      }
      op => return Err(ResolveCause::Unsupported(format!("operator {:?}", op))),
    })
  }

  fn arguments(&self, args: &[ExprOrSpread], context: &Context) -> Result<Vec<JsValue>, ResolveCause> {
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
      let value = self.eval(&arg.expr, context)?;
      if arg.spread.is_some() {
        values.extend(self.iterate(value)?);
      } else {
        values.push(value);
      }
    }
    Ok(values)
  }

  fn call(&self, call: &CallExpr, context: &Context) -> EvalResult {
    let callee = match &call.callee {
      Callee::Expr(callee) => callee,
      Callee::Super(_) => return Err(ResolveCause::Unsupported("`super` call".into())),
      Callee::Import(_) => return Err(ResolveCause::Unsupported("dynamic import".into())),
    };

    if let Expr::Member(member) = &**callee {
      let receiver = self.eval(&member.obj, context)?;
      let name = self.member_key(&member.prop, context)?;
      let args = self.arguments(&call.args, context)?;
      return self.call_method(receiver, &name, args);
    }

    // Style tags only work as template tags, anything else is what the runtime stub does
    if self.style_tag(callee, context).is_some() {
      return Err(ResolveCause::Runtime(CONFIGURATION_ERROR_MESSAGE.to_string()));
    }

    let function = self.eval(callee, context)?;
    let args = self.arguments(&call.args, context)?;
    self.call_value(&function, args)
  }

  fn call_method(&self, receiver: JsValue, name: &str, args: Vec<JsValue>) -> EvalResult {
    let result = match &receiver {
      JsValue::String(value) => builtins::string_method(value, name, &args),
      JsValue::Number(value) => builtins::number_method(*value, name, &args),
      JsValue::Array(items) => match self.array_callback_method(items, name, &args)? {
        Some(value) => Some(Ok(value)),
        None => builtins::array_method(items, name, &args),
      },
      _ => None,
    };
    if let Some(result) = result {
      return result;
    }

    match self.get_property(&receiver, name)? {
      function @ (JsValue::Function(_) | JsValue::Builtin(_)) => self.call_value(&function, args),
      _ => Err(ResolveCause::Runtime(format!(
        "{}.{} is not a function",
        receiver.type_of(),
        name
      ))),
    }
  }

  fn array_callback_method(
    &self,
    items: &[JsValue],
    name: &str,
    args: &[JsValue],
  ) -> Result<Option<JsValue>, ResolveCause> {
    let callback = args.first().cloned().unwrap_or(JsValue::Undefined);
    let call = |item: &JsValue, index: usize| {
      self.call_value(&callback, vec![item.clone(), JsValue::Number(index as f64)])
    };

    let value = match name {
      "map" => {
        let mut mapped = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
          mapped.push(call(item, index)?);
        }
        JsValue::Array(mapped)
      }
      "flatMap" => {
        let mut mapped = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
          match call(item, index)? {
            JsValue::Array(inner) => mapped.extend(inner),
            value => mapped.push(value),
          }
        }
        JsValue::Array(mapped)
      }
      "filter" => {
        let mut kept = Vec::new();
        for (index, item) in items.iter().enumerate() {
          if call(item, index)?.is_truthy() {
            kept.push(item.clone());
          }
        }
        JsValue::Array(kept)
      }
      "find" | "findIndex" => {
        let mut found = None;
        for (index, item) in items.iter().enumerate() {
          if call(item, index)?.is_truthy() {
            found = Some((index, item.clone()));
            break;
          }
        }
        match (name, found) {
          ("find", found) => found.map(|(_, item)| item).unwrap_or(JsValue::Undefined),
          (_, found) => JsValue::Number(found.map(|(index, _)| index as f64).unwrap_or(-1.0)),
        }
      }
      "some" => {
        let mut any = false;
        for (index, item) in items.iter().enumerate() {
          if call(item, index)?.is_truthy() {
            any = true;
            break;
          }
        }
        JsValue::Bool(any)
      }
      "every" => {
        let mut all = true;
        for (index, item) in items.iter().enumerate() {
          if !call(item, index)?.is_truthy() {
            all = false;
            break;
          }
        }
        JsValue::Bool(all)
      }
      "reduce" => {
        let mut remaining = items.iter().enumerate();
        let mut accumulator = match args.get(1) {
          Some(initial) => initial.clone(),
          None => match remaining.next() {
            Some((_, first)) => first.clone(),
            None => {
              return Err(ResolveCause::Runtime(
                "Reduce of empty array with no initial value".into(),
              ))
            }
          },
        };
        for (index, item) in remaining {
          accumulator = self.call_value(
            &callback,
            vec![accumulator, item.clone(), JsValue::Number(index as f64)],
          )?;
        }
        accumulator
      }
      _ => return Ok(None),
    };

    Ok(Some(value))
  }

  fn call_value(&self, function: &JsValue, args: Vec<JsValue>) -> EvalResult {
    match function {
      JsValue::Function(closure) => {
        let depth = self.depth.get();
        if depth >= MAX_DEPTH {
          return Err(ResolveCause::Runtime(
            "Maximum call stack size exceeded".into(),
          ));
        }
        self.depth.set(depth + 1);
        let result = self.invoke(closure, args);
        self.depth.set(depth);
        result
      }
      JsValue::Builtin(builtin) => {
        let mut materialized = Vec::with_capacity(args.len());
        for arg in args {
          materialized.push(self.materialize(arg)?);
        }
        builtins::call(builtin, &materialized)
      }
      other => Err(ResolveCause::Runtime(format!(
        "{} is not a function",
        other.to_js_string()
      ))),
    }
  }

  fn invoke(&self, closure: &Closure, args: Vec<JsValue>) -> EvalResult {
    let scope = Scope::child(closure.scope.clone());
    let context = Context {
      module: closure.module,
      scope: Some(scope.clone()),
    };

    let mut args = args.into_iter();
    for param in &closure.params {
      match param {
        Pat::Rest(rest) => {
          let remaining = JsValue::Array(args.by_ref().collect());
          self.bind_pattern(&rest.arg, remaining, &scope, &context)?;
        }
        param => {
          let value = args.next().unwrap_or(JsValue::Undefined);
          self.bind_pattern(param, value, &scope, &context)?;
        }
      }
    }

    match &closure.body {
      ClosureBody::Expr(expr) => self.eval(expr, &context),
      ClosureBody::Block(stmts) => Ok(
        self
          .exec_block(stmts, &context)?
          .unwrap_or(JsValue::Undefined),
      ),
    }
  }

  /// Run statements of a function body, returning the value of a `return`
  fn exec_block(&self, stmts: &[Stmt], context: &Context) -> Result<Option<JsValue>, ResolveCause> {
    if let Some(scope) = &context.scope {
      for stmt in stmts {
        if let Stmt::Decl(Decl::Fn(function)) = stmt {
          scope.declare(
            function.ident.sym.to_string(),
            self.function_value(&function.function, context.module, Some(scope.clone())),
          );
        }
      }
    }

    for stmt in stmts {
      if let Some(value) = self.exec(stmt, context)? {
        return Ok(Some(value));
      }
    }
    Ok(None)
  }

  fn exec(&self, stmt: &Stmt, context: &Context) -> Result<Option<JsValue>, ResolveCause> {
    match stmt {
      Stmt::Decl(Decl::Var(var)) => {
        let Some(scope) = &context.scope else {
          return Err(ResolveCause::Unsupported("declaration outside a function".into()));
        };
        for declarator in &var.decls {
          let value = match &declarator.init {
            Some(init) => self.eval(init, context)?,
            None => JsValue::Undefined,
          };
          self.bind_pattern(&declarator.name, value, scope, context)?;
        }
        Ok(None)
      }
      Stmt::Decl(Decl::Fn(_) | Decl::TsInterface(_) | Decl::TsTypeAlias(_)) | Stmt::Empty(_) => {
        Ok(None)
      }
      Stmt::Expr(ExprStmt { expr, .. }) if matches!(&**expr, Expr::Lit(_)) => Ok(None),
      Stmt::Return(ret) => Ok(Some(match &ret.arg {
        Some(arg) => self.eval(arg, context)?,
        None => JsValue::Undefined,
      })),
      Stmt::If(if_stmt) => {
        if self.eval(&if_stmt.test, context)?.is_truthy() {
          self.exec(&if_stmt.cons, context)
        } else if let Some(alt) = &if_stmt.alt {
          self.exec(alt, context)
        } else {
          Ok(None)
        }
      }
      Stmt::Block(block) => {
        let context = Context {
          module: context.module,
          scope: Some(Scope::child(context.scope.clone())),
        };
        self.exec_block(&block.stmts, &context)
      }
      Stmt::Throw(throw) => Err(ResolveCause::Runtime(format!(
        "Uncaught {}",
        self.eval(&throw.arg, context)?.to_js_string()
      ))),
      _ => Err(ResolveCause::Unsupported("statement with side effects".into())),
    }
  }

  fn bind_pattern(
    &self,
    pattern: &Pat,
    value: JsValue,
    scope: &Scope,
    context: &Context,
  ) -> Result<(), ResolveCause> {
    match pattern {
      Pat::Ident(binding) => {
        scope.declare(binding.id.sym.to_string(), value);
        Ok(())
      }
      Pat::Assign(assign) => {
        let value = match value {
          JsValue::Undefined => self.eval(&assign.right, context)?,
          value => value,
        };
        self.bind_pattern(&assign.left, value, scope, context)
      }
      Pat::Rest(rest) => self.bind_pattern(&rest.arg, value, scope, context),
      Pat::Array(array) => {
        let items = self.iterate(value)?;
        for (index, elem) in array.elems.iter().enumerate() {
          match elem {
            None => {}
            Some(Pat::Rest(rest)) => {
              let remaining = items.get(index..).unwrap_or_default().to_vec();
              self.bind_pattern(&rest.arg, JsValue::Array(remaining), scope, context)?;
            }
            Some(pattern) => {
              let item = items.get(index).cloned().unwrap_or(JsValue::Undefined);
              self.bind_pattern(pattern, item, scope, context)?;
            }
          }
        }
        Ok(())
      }
      Pat::Object(object) => {
        if value.is_nullish() {
          return Err(ResolveCause::Runtime(format!(
            "Cannot destructure '{}' as it is {}",
            value.to_js_string(),
            value.to_js_string()
          )));
        }

        let mut used = Vec::new();
        for prop in &object.props {
          match prop {
            ObjectPatProp::KeyValue(key_value) => {
              let key = self.prop_name(&key_value.key, context)?;
              let item = self.get_property(&value, &key)?;
              self.bind_pattern(&key_value.value, item, scope, context)?;
              used.push(key);
            }
            ObjectPatProp::Assign(assign) => {
              let key = assign.key.sym.to_string();
              let item = match (self.get_property(&value, &key)?, &assign.value) {
                (JsValue::Undefined, Some(default)) => self.eval(default, context)?,
                (item, _) => item,
              };
              scope.declare(key.clone(), item);
              used.push(key);
            }
            ObjectPatProp::Rest(rest) => {
              let mut remaining = self.entries(value.clone())?;
              remaining.retain(|key, _| !used.contains(key));
              self.bind_pattern(&rest.arg, JsValue::Object(remaining), scope, context)?;
            }
          }
        }
        Ok(())
      }
      Pat::Expr(_) | Pat::Invalid(_) => {
        Err(ResolveCause::Unsupported("assignment target".into()))
      }
    }
  }
}

fn literal(lit: &Lit) -> EvalResult {
  match lit {
    Lit::Str(value) => Ok(JsValue::String(value.value.to_string())),
    Lit::Num(number) => Ok(JsValue::Number(number.value)),
    Lit::Bool(value) => Ok(JsValue::Bool(value.value)),
    Lit::Null(_) => Ok(JsValue::Null),
    Lit::BigInt(_) => Err(ResolveCause::Unsupported("BigInt literal".into())),
    Lit::Regex(_) => Err(ResolveCause::Unsupported("regular expression".into())),
    Lit::JSXText(_) => Err(ResolveCause::Unsupported("JSX".into())),
  }
}
